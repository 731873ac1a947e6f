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
    /// Answer of `get_alive_agents`, returned as given
    pub alive_agents: Vec<String>,
    pub alive_gms: Vec<GmInfo>,
    /// `(ip, hash_mod, hash_value)` per heartbeat
    pub heartbeats: Vec<(String, usize, usize)>,
    pub detect_reports: Vec<DetectReport>,
    pub fail_alive_agents: bool,
}

/// Status store kept in memory for the agent-side operations
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<StoreState>,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_agents(agents: &[&str]) -> Arc<Self> {
        let store = Self::new();
        store.with(|state| state.alive_agents = agents.iter().map(|ip| ip.to_string()).collect());
        store
    }

    pub fn with<R>(&self, f: impl FnOnce(&mut StoreState) -> R) -> R {
        let mut state = self.state.lock().unwrap();
        f(&mut state)
    }

    pub fn heartbeats(&self) -> Vec<(String, usize, usize)> {
        self.with(|state| state.heartbeats.clone())
    }

    pub fn detect_reports(&self) -> Vec<DetectReport> {
        self.with(|state| state.detect_reports.clone())
    }

    fn unsupported(operation: &str) -> HadbError {
        HadbError::Api {
            operation: operation.to_string(),
            code: 1,
            message: "not used by the agent tests".to_string(),
        }
    }
}

#[async_trait]
impl StatusStore for MemoryStore {
    async fn register_component(&self, _registration: &Registration) -> Result<(), HadbError> {
        Ok(())
    }

    async fn report_agent_heartbeat(
        &self,
        ip: &str,
        _db_type: &str,
        _interval_seconds: u64,
        hash_mod: usize,
        hash_value: usize,
    ) -> Result<(), HadbError> {
        self.with(|state| {
            state
                .heartbeats
                .push((ip.to_string(), hash_mod, hash_value))
        });
        Ok(())
    }

    async fn report_gm_heartbeat(
        &self,
        _ip: &str,
        _module: &str,
        _interval_seconds: u64,
    ) -> Result<(), HadbError> {
        Err(Self::unsupported("reporter_gm_heartbeat"))
    }

    async fn get_alive_agents(
        &self,
        _city_id: i64,
        _db_type: &str,
        _freshness: Duration,
    ) -> Result<Vec<String>, HadbError> {
        self.with(|state| {
            if state.fail_alive_agents {
                Err(HadbError::Transport {
                    operation: "get_alive_agent_info".to_string(),
                    reason: "connection refused".to_string(),
                })
            } else {
                Ok(state.alive_agents.clone())
            }
        })
    }

    async fn get_alive_component(
        &self,
        _module: &str,
        _freshness: Duration,
    ) -> Result<Vec<GmInfo>, HadbError> {
        Ok(self.with(|state| state.alive_gms.clone()))
    }

    async fn report_detect_status(&self, report: &DetectReport) -> Result<(), HadbError> {
        self.with(|state| state.detect_reports.push(report.clone()));
        Ok(())
    }

    async fn get_db_detect_info(&self) -> Result<Vec<DetectStatus>, HadbError> {
        Ok(self.with(|state| {
            state
                .detect_reports
                .iter()
                .map(|report| DetectStatus {
                    app: Some(report.app.clone()),
                    agent_ip: Some(report.agent_ip.clone()),
                    ip: Some(report.ip.clone()),
                    port: Some(report.port),
                    db_type: Some(report.db_type.clone()),
                    status: Some(report.status.clone()),
                    report_gm: Some(report.bind_gm.clone()),
                    ..Default::default()
                })
                .collect()
        }))
    }

    async fn report_log(&self, _entry: &HaLogEntry) -> Result<i64, HadbError> {
        Ok(0)
    }

    async fn insert_switch_queue(&self, _entry: &SwitchQueueEntry) -> Result<i64, HadbError> {
        Err(Self::unsupported("insert_switch_queue"))
    }

    async fn update_switch_queue(
        &self,
        _uid: i64,
        _update: &SwitchQueueEntry,
    ) -> Result<(), HadbError> {
        Err(Self::unsupported("update_switch_queue"))
    }

    async fn query_switch_count(
        &self,
        _scope: &SwitchCountScope,
        _window: Duration,
    ) -> Result<i64, HadbError> {
        Err(Self::unsupported("query_switch_count"))
    }

    async fn update_time_delay(&self, _ip: &str, _port: u16, _app: &str) -> Result<(), HadbError> {
        Err(Self::unsupported("update_time_delay"))
    }

    async fn insert_switch_log(&self, _entry: &SwitchLogEntry) -> Result<(), HadbError> {
        Err(Self::unsupported("insert_switch_log"))
    }

    async fn get_shield_config(
        &self,
        _app: &str,
        _ip: &str,
        _shield_type: &str,
    ) -> Result<HashMap<String, ShieldConfig>, HadbError> {
        Ok(HashMap::new())
    }

    async fn query_slave_check_config(
        &self,
        _ip: &str,
        _port: u16,
        _app: &str,
    ) -> Result<SlaveCheckConfig, HadbError> {
        Err(Self::unsupported("query_slave_check_config"))
    }
}
