use anyhow::{anyhow, Result};
use async_trait::async_trait;
use ha_common::hadb::types::{module, GmInfo};
use ha_common::{FailureReport, StatusStore};
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::constants::gm;

/// Hands a confirmed failure to a group manager
#[async_trait]
pub trait GmNotifier: Send + Sync {
    /// Returns the `ip:port` of the GM that accepted the report
    async fn notify(&self, report: &FailureReport) -> Result<String>;
}

/// Picks alive GMs from the status store and posts to their intake
pub struct HttpGmClient {
    store: Arc<dyn StatusStore>,
    client: Client,
    city_id: i64,
    freshness: Duration,
}

impl HttpGmClient {
    pub fn new(
        store: Arc<dyn StatusStore>,
        city_id: i64,
        freshness: Duration,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| anyhow!("Failed to build GM client: {}", e))?;
        Ok(Self {
            store,
            client,
            city_id,
            freshness,
        })
    }
}

/// Same-city GMs first, then by address
pub fn order_gms(mut gms: Vec<GmInfo>, city_id: i64) -> Vec<GmInfo> {
    gms.sort_by(|a, b| {
        (a.city_id != city_id, &a.ip, a.port).cmp(&(b.city_id != city_id, &b.ip, b.port))
    });
    gms
}

#[async_trait]
impl GmNotifier for HttpGmClient {
    async fn notify(&self, report: &FailureReport) -> Result<String> {
        let gms = self
            .store
            .get_alive_component(module::GM, self.freshness)
            .await?;

        for gm_info in order_gms(gms, self.city_id) {
            let addr = format!("{}:{}", gm_info.ip, gm_info.port);
            let url = format!("http://{}{}", addr, gm::DOUBLE_CHECK_PATH);

            match self.client.post(&url).json(report).send().await {
                Ok(response) if response.status().is_success() => {
                    info!(
                        "gm {} accepted failure report for {}",
                        addr,
                        report.instance.addr()
                    );
                    return Ok(addr);
                }
                Ok(response) => {
                    warn!("gm {} rejected report: http status {}", addr, response.status());
                }
                Err(e) => warn!("send report to gm {} failed: {}", addr, e),
            }
        }

        Err(anyhow!(
            "no gm accepted the failure report for {}",
            report.instance.addr()
        ))
    }
}
