//! Ordered shutdown of the GM background tasks

use anyhow::Result;
use ha_common::{FailureReport, Mailbox};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Handles of everything `main` spawns
pub struct Daemon {
    pub switch_queue: Mailbox<FailureReport>,
    pub switch_loop: JoinHandle<()>,
    pub web_server: JoinHandle<Result<()>>,
    pub report_worker: JoinHandle<()>,
    pub shutdown: watch::Sender<bool>,
}

impl Daemon {
    /// Close intake and let the switch loop drain before the report worker
    /// is told to stop, so every progress line of a running switch is written.
    pub async fn shutdown(self) {
        self.switch_queue.close();
        if let Err(e) = self.switch_loop.await {
            error!("Switch loop task failed: {}", e);
        }

        let _ = self.shutdown.send(true);
        match self.web_server.await {
            Ok(Err(e)) => error!("Web server stopped with error: {}", e),
            Err(e) => error!("Web server task failed: {}", e),
            Ok(Ok(())) => {}
        }
        if let Err(e) = self.report_worker.await {
            error!("Report worker task failed: {}", e);
        }
        info!("All gm tasks stopped");
    }
}
