//! Detection sweep: probe the instances this agent owns and escalate
//! repeated failures to a group manager.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::Local;
use futures::future::join_all;
use ha_common::hadb::DetectReport;
use ha_common::instance::status;
use ha_common::{FailureReport, InstanceInfo, StatusStore};
use sqlx::mysql::MySqlConnectOptions;
use sqlx::{ConnectOptions, Connection, Executor};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval, timeout, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::assignment::{compute_assignment, owns, AssignmentError};
use crate::config::{AgentConfig, ProbeConfig};
use crate::constants::probe;
use crate::gm_client::GmNotifier;

#[async_trait]
pub trait Prober: Send + Sync {
    async fn probe(&self, instance: &InstanceInfo) -> Result<()>;
}

/// Fresh connection plus `select 1`, both under one timeout
pub struct MysqlProber {
    user: String,
    password: String,
    timeout: Duration,
}

impl MysqlProber {
    pub fn new(config: &ProbeConfig) -> Self {
        Self {
            user: config.user.clone(),
            password: config.password.clone(),
            timeout: Duration::from_secs(config.connect_timeout_seconds),
        }
    }
}

#[async_trait]
impl Prober for MysqlProber {
    async fn probe(&self, instance: &InstanceInfo) -> Result<()> {
        let options = MySqlConnectOptions::new()
            .host(&instance.ip)
            .port(instance.port)
            .username(&self.user)
            .password(&self.password);

        let check = async {
            let mut conn = options.connect().await?;
            (&mut conn).execute(probe::PROBE_STATEMENT).await?;
            conn.close().await?;
            Ok::<(), sqlx::Error>(())
        };

        match timeout(self.timeout, check).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(anyhow!("probe {} failed: {}", instance.addr(), e)),
            Err(_) => Err(anyhow!(
                "probe {} timed out after {:?}",
                instance.addr(),
                self.timeout
            )),
        }
    }
}

/// What one sweep did, mostly for logging and tests
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SweepSummary {
    pub probed: usize,
    pub failed: usize,
    /// `ip:port` of instances handed to a GM during this sweep
    pub escalated: Vec<String>,
}

pub struct Detector {
    store: Arc<dyn StatusStore>,
    prober: Arc<dyn Prober>,
    notifier: Arc<dyn GmNotifier>,
    config: Arc<AgentConfig>,
    failures: HashMap<String, u32>,
}

impl Detector {
    pub fn new(
        store: Arc<dyn StatusStore>,
        prober: Arc<dyn Prober>,
        notifier: Arc<dyn GmNotifier>,
        config: Arc<AgentConfig>,
    ) -> Self {
        Self {
            store,
            prober,
            notifier,
            config,
            failures: HashMap::new(),
        }
    }

    /// Consecutive failed probes recorded for `addr`
    pub fn failure_count(&self, addr: &str) -> u32 {
        self.failures.get(addr).copied().unwrap_or(0)
    }

    /// One pass over the owned instances.
    ///
    /// The assignment is recomputed every time; an agent that cannot place
    /// itself in the roster probes nothing this round.
    pub async fn sweep(&mut self) -> Result<SweepSummary> {
        let config = self.config.clone();
        let assignment = match compute_assignment(
            self.store.as_ref(),
            &config.ip,
            config.city_id,
            &config.db_type,
            Duration::from_secs(config.freshness_seconds),
        )
        .await
        {
            Ok(assignment) => assignment,
            Err(e @ AssignmentError::Store(_)) => return Err(e.into()),
            Err(e) => {
                warn!("skip detection sweep: {}", e);
                return Ok(SweepSummary::default());
            }
        };

        let owned: Vec<&InstanceInfo> = config
            .instances
            .iter()
            .filter(|instance| owns(instance, &assignment))
            .collect();
        debug!(
            "sweep {} of {} instances with mod {} value {}",
            owned.len(),
            config.instances.len(),
            assignment.hash_mod,
            assignment.hash_value
        );
        self.failures
            .retain(|addr, _| owned.iter().any(|instance| instance.addr() == *addr));

        let results = join_all(owned.iter().map(|instance| self.prober.probe(instance))).await;

        let mut summary = SweepSummary {
            probed: owned.len(),
            ..Default::default()
        };
        for (instance, result) in owned.into_iter().zip(results) {
            let addr = instance.addr();
            let mut bind_gm = String::new();

            let detect_status = match result {
                Ok(()) => {
                    self.failures.remove(&addr);
                    status::AVAILABLE
                }
                Err(e) => {
                    summary.failed += 1;
                    let count = self.failures.entry(addr.clone()).or_insert(0);
                    *count += 1;
                    warn!(
                        "{} failed {}/{} checks: {}",
                        addr, count, config.double_check_times, e
                    );

                    if *count >= config.double_check_times {
                        self.failures.remove(&addr);
                        match self.escalate(instance, &e.to_string()).await {
                            Ok(gm) => {
                                bind_gm = gm;
                                summary.escalated.push(addr.clone());
                            }
                            Err(e) => error!("report {} to gm failed: {}", addr, e),
                        }
                    }
                    status::UNAVAILABLE
                }
            };

            let report = DetectReport {
                app: instance.app.clone(),
                agent_ip: config.ip.clone(),
                ip: instance.ip.clone(),
                port: instance.port,
                db_type: instance.db_type.clone(),
                status: detect_status.to_string(),
                bind_gm,
            };
            if let Err(e) = self.store.report_detect_status(&report).await {
                warn!("report detect status of {} failed: {}", addr, e);
            }
        }

        Ok(summary)
    }

    async fn escalate(&self, instance: &InstanceInfo, reason: &str) -> Result<String> {
        let mut broken = instance.clone();
        broken.status = status::UNAVAILABLE.to_string();
        let report = FailureReport {
            agent_ip: self.config.ip.clone(),
            instance: broken,
            detected_at: Local::now(),
            reason: reason.to_string(),
        };
        self.notifier.notify(&report).await
    }

    /// Sweep on a fixed ticker until shutdown flips to true
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = interval(Duration::from_secs(self.config.detect_interval_seconds));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!("Detection loop started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.sweep().await {
                        Ok(summary) if summary.failed > 0 => info!(
                            "sweep probed {} instances, {} failed, {} escalated",
                            summary.probed, summary.failed, summary.escalated.len()
                        ),
                        Ok(_) => {}
                        Err(e) => error!("detection sweep failed: {}", e),
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        info!("Detection loop stopped");
    }
}
