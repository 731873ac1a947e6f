use async_trait::async_trait;
use ha_common::{Heartbeat, StatusStore};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

use crate::assignment::{compute_assignment, AssignmentError};
use crate::config::AgentConfig;

/// Renews the agent row together with its current `(hash_mod, hash_value)`
pub struct AgentHeartbeat {
    store: Arc<dyn StatusStore>,
    config: Arc<AgentConfig>,
}

impl AgentHeartbeat {
    pub fn new(store: Arc<dyn StatusStore>, config: Arc<AgentConfig>) -> Self {
        Self { store, config }
    }
}

#[async_trait]
impl Heartbeat for AgentHeartbeat {
    async fn beat(&self) -> anyhow::Result<()> {
        let config = &self.config;
        let (hash_mod, hash_value) = match compute_assignment(
            self.store.as_ref(),
            &config.ip,
            config.city_id,
            &config.db_type,
            Duration::from_secs(config.freshness_seconds),
        )
        .await
        {
            Ok(assignment) => (assignment.hash_mod, assignment.hash_value),
            Err(AssignmentError::NotFound { ip, hash_mod }) => {
                warn!(
                    "agent {} missing from {} alive agents, reporting degraded heartbeat",
                    ip, hash_mod
                );
                (0, 0)
            }
            Err(e @ AssignmentError::Duplicate { .. }) => {
                error!("skip heartbeat: {}", e);
                return Ok(());
            }
            Err(AssignmentError::Store(e)) => return Err(e.into()),
        };

        self.store
            .report_agent_heartbeat(
                &config.ip,
                &config.db_type,
                config.heartbeat_interval_seconds,
                hash_mod,
                hash_value,
            )
            .await?;
        debug!("heartbeat reported with mod {} value {}", hash_mod, hash_value);
        Ok(())
    }
}
