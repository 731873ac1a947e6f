use async_trait::async_trait;
use ha_common::hadb::types::module;
use ha_common::{Heartbeat, StatusStore};
use std::sync::Arc;

/// Renews the GM's liveness row
pub struct GmHeartbeat {
    store: Arc<dyn StatusStore>,
    ip: String,
    interval_seconds: u64,
}

impl GmHeartbeat {
    pub fn new(store: Arc<dyn StatusStore>, ip: &str, interval_seconds: u64) -> Self {
        Self {
            store,
            ip: ip.to_string(),
            interval_seconds,
        }
    }
}

#[async_trait]
impl Heartbeat for GmHeartbeat {
    async fn beat(&self) -> anyhow::Result<()> {
        self.store
            .report_gm_heartbeat(&self.ip, module::GM, self.interval_seconds)
            .await?;
        Ok(())
    }
}
