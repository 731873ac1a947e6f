//! Background progress reporting
//!
//! [`Reporter`] is the handle decision code uses to emit progress lines; it
//! never waits on the status store. [`ReportWorker`] is the single consumer
//! that drains the log mailbox and renews the component heartbeat.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::errors::HadbError;
use crate::hadb::types::HaLogEntry;
use crate::hadb::StatusStore;
use crate::mailbox::{Mailbox, OverflowPolicy};

/// Capacity of the report-log mailbox
pub const REPORT_LOG_CAPACITY: usize = 1024;

/// Periodic liveness renewal run by the report worker
#[async_trait]
pub trait Heartbeat: Send + Sync {
    async fn beat(&self) -> anyhow::Result<()>;
}

#[derive(Clone)]
pub struct Reporter {
    mailbox: Mailbox<HaLogEntry>,
    store: Arc<dyn StatusStore>,
    mon_ip: String,
    module: String,
    cloud_id: i64,
}

impl Reporter {
    pub fn new(store: Arc<dyn StatusStore>, mon_ip: &str, module: &str, cloud_id: i64) -> Self {
        Self {
            mailbox: Mailbox::new("report_log", REPORT_LOG_CAPACITY, OverflowPolicy::DropOldest),
            store,
            mon_ip: mon_ip.to_string(),
            module: module.to_string(),
            cloud_id,
        }
    }

    fn entry(&self, app: &str, ip: &str, port: u16, comment: String) -> HaLogEntry {
        HaLogEntry {
            app: app.to_string(),
            ip: ip.to_string(),
            port,
            mon_ip: self.mon_ip.clone(),
            module: self.module.clone(),
            cloud_id: self.cloud_id,
            comment,
        }
    }

    /// Queue a progress line. Under back pressure the oldest lines are lost.
    pub fn log(&self, app: &str, ip: &str, port: u16, comment: impl Into<String>) {
        let entry = self.entry(app, ip, port, comment.into());
        if let Err(e) = self.mailbox.try_send(entry) {
            debug!("report log line discarded: {}", e);
        }
    }

    /// Write a line straight to the store and wait for it.
    ///
    /// Used where a later step must not start unless the record exists.
    pub async fn checkpoint(
        &self,
        app: &str,
        ip: &str,
        port: u16,
        comment: impl Into<String>,
    ) -> Result<i64, HadbError> {
        let entry = self.entry(app, ip, port, comment.into());
        self.store.report_log(&entry).await
    }

    pub fn dropped(&self) -> u64 {
        self.mailbox.dropped()
    }

    pub fn mailbox(&self) -> &Mailbox<HaLogEntry> {
        &self.mailbox
    }
}

pub struct ReportWorker {
    reporter: Reporter,
    heartbeat: Arc<dyn Heartbeat>,
    heartbeat_interval: Duration,
}

impl ReportWorker {
    pub fn new(reporter: Reporter, heartbeat: Arc<dyn Heartbeat>, heartbeat_interval: Duration) -> Self {
        Self {
            reporter,
            heartbeat,
            heartbeat_interval,
        }
    }

    /// Run until `shutdown` flips to true, then flush what is already queued
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = interval(self.heartbeat_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mailbox = self.reporter.mailbox.clone();
        let store = self.reporter.store.clone();

        info!(
            "Report worker started, heartbeat every {:?}",
            self.heartbeat_interval
        );

        loop {
            tokio::select! {
                entry = mailbox.recv() => {
                    match entry {
                        Some(entry) => write_log(store.as_ref(), &entry).await,
                        None => break,
                    }
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.heartbeat.beat().await {
                        error!("Heartbeat failed: {:#}", e);
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        mailbox.close();
        while let Some(entry) = mailbox.recv().await {
            write_log(store.as_ref(), &entry).await;
        }

        let dropped = mailbox.dropped();
        if dropped > 0 {
            warn!("Report worker stopped, {} log lines were dropped", dropped);
        } else {
            info!("Report worker stopped");
        }
    }
}

async fn write_log(store: &dyn StatusStore, entry: &HaLogEntry) {
    if let Err(e) = store.report_log(entry).await {
        warn!(
            "report log for {}:{} failed: {}",
            entry.ip, entry.port, e
        );
    }
}
