use async_trait::async_trait;
use ha_common::hadb::types::{
    DetectStatus, GmInfo, HaLogEntry, ShieldConfig, SlaveCheckConfig, SwitchCountScope,
    SwitchLogEntry, SwitchQueueEntry,
};
use ha_common::hadb::{DetectReport, Registration};
use ha_common::{HadbError, StatusStore};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Default)]
pub struct StoreState {
    pub registrations: Vec<Registration>,
    pub gm_heartbeats: Vec<(String, String, u64)>,
    pub logs: Vec<HaLogEntry>,
    pub queue: Vec<(i64, SwitchQueueEntry)>,
    pub queue_updates: Vec<(i64, SwitchQueueEntry)>,
    pub switch_logs: Vec<SwitchLogEntry>,
    pub shields: HashMap<String, ShieldConfig>,
    /// Count answered per scope label
    pub switch_counts: HashMap<&'static str, i64>,
    pub fail_report_log: bool,
    /// Number of upcoming `insert_switch_log` calls that fail
    pub fail_switch_log: usize,
    pub switch_log_attempts: usize,
    /// `(ip, port, app)` per time-delay refresh
    pub time_delay_updates: Vec<(String, u16, String)>,
    pub slave_check: SlaveCheckConfig,
}

/// Status store kept in memory; every write is recorded
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<StoreState>,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with<R>(&self, f: impl FnOnce(&mut StoreState) -> R) -> R {
        let mut state = self.state.lock().unwrap();
        f(&mut state)
    }

    pub fn comments(&self) -> Vec<String> {
        self.with(|state| state.logs.iter().map(|log| log.comment.clone()).collect())
    }

    pub fn switch_logs(&self) -> Vec<SwitchLogEntry> {
        self.with(|state| state.switch_logs.clone())
    }

    pub fn queue(&self) -> Vec<(i64, SwitchQueueEntry)> {
        self.with(|state| state.queue.clone())
    }

    pub fn queue_updates(&self) -> Vec<(i64, SwitchQueueEntry)> {
        self.with(|state| state.queue_updates.clone())
    }

    fn unsupported(operation: &str) -> HadbError {
        HadbError::Api {
            operation: operation.to_string(),
            code: 1,
            message: "not used by the group manager tests".to_string(),
        }
    }
}

#[async_trait]
impl StatusStore for MemoryStore {
    async fn register_component(&self, registration: &Registration) -> Result<(), HadbError> {
        self.with(|state| state.registrations.push(registration.clone()));
        Ok(())
    }

    async fn report_agent_heartbeat(
        &self,
        _ip: &str,
        _db_type: &str,
        _interval_seconds: u64,
        _hash_mod: usize,
        _hash_value: usize,
    ) -> Result<(), HadbError> {
        Err(Self::unsupported("reporter_agent_heartbeat"))
    }

    async fn report_gm_heartbeat(
        &self,
        ip: &str,
        module: &str,
        interval_seconds: u64,
    ) -> Result<(), HadbError> {
        self.with(|state| {
            state
                .gm_heartbeats
                .push((ip.to_string(), module.to_string(), interval_seconds))
        });
        Ok(())
    }

    async fn get_alive_agents(
        &self,
        _city_id: i64,
        _db_type: &str,
        _freshness: Duration,
    ) -> Result<Vec<String>, HadbError> {
        Err(Self::unsupported("get_alive_agent_info"))
    }

    async fn get_alive_component(
        &self,
        _module: &str,
        _freshness: Duration,
    ) -> Result<Vec<GmInfo>, HadbError> {
        Err(Self::unsupported("get_alive_ha_info"))
    }

    async fn report_detect_status(&self, _report: &DetectReport) -> Result<(), HadbError> {
        Err(Self::unsupported("update_instance_status"))
    }

    async fn get_db_detect_info(&self) -> Result<Vec<DetectStatus>, HadbError> {
        Err(Self::unsupported("get_instance_status"))
    }

    async fn report_log(&self, entry: &HaLogEntry) -> Result<i64, HadbError> {
        self.with(|state| {
            if state.fail_report_log {
                return Err(HadbError::Transport {
                    operation: "reporter_log".to_string(),
                    reason: "connection reset".to_string(),
                });
            }
            state.logs.push(entry.clone());
            Ok(state.logs.len() as i64)
        })
    }

    async fn insert_switch_queue(&self, entry: &SwitchQueueEntry) -> Result<i64, HadbError> {
        self.with(|state| {
            let uid = state.queue.len() as i64 + 100;
            state.queue.push((uid, entry.clone()));
            Ok(uid)
        })
    }

    async fn update_switch_queue(
        &self,
        uid: i64,
        update: &SwitchQueueEntry,
    ) -> Result<(), HadbError> {
        self.with(|state| state.queue_updates.push((uid, update.clone())));
        Ok(())
    }

    async fn query_switch_count(
        &self,
        scope: &SwitchCountScope,
        _window: Duration,
    ) -> Result<i64, HadbError> {
        Ok(self.with(|state| state.switch_counts.get(scope.label()).copied().unwrap_or(0)))
    }

    async fn update_time_delay(&self, ip: &str, port: u16, app: &str) -> Result<(), HadbError> {
        self.with(|state| {
            state
                .time_delay_updates
                .push((ip.to_string(), port, app.to_string()))
        });
        Ok(())
    }

    async fn insert_switch_log(&self, entry: &SwitchLogEntry) -> Result<(), HadbError> {
        self.with(|state| {
            state.switch_log_attempts += 1;
            if state.fail_switch_log > 0 {
                state.fail_switch_log -= 1;
                return Err(HadbError::Transport {
                    operation: "insert_switch_log".to_string(),
                    reason: "connection reset".to_string(),
                });
            }
            state.switch_logs.push(entry.clone());
            Ok(())
        })
    }

    async fn query_slave_check_config(
        &self,
        _ip: &str,
        _port: u16,
        _app: &str,
    ) -> Result<SlaveCheckConfig, HadbError> {
        Ok(self.with(|state| state.slave_check))
    }

    async fn get_shield_config(
        &self,
        _app: &str,
        _ip: &str,
        _shield_type: &str,
    ) -> Result<HashMap<String, ShieldConfig>, HadbError> {
        Ok(self.with(|state| state.shields.clone()))
    }
}
