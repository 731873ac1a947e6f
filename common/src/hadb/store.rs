use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;

use super::types::{
    DetectStatus, GmInfo, HaLogEntry, ShieldConfig, SlaveCheckConfig, SwitchCountScope,
    SwitchLogEntry, SwitchQueueEntry,
};
use crate::errors::HadbError;

/// Identity written by the registration upsert
#[derive(Debug, Clone)]
pub struct Registration {
    pub ip: String,
    pub port: u16,
    pub module: String,
    pub city_id: i64,
    pub campus: String,
    pub db_type: String,
}

/// One detection result for one monitored instance
#[derive(Debug, Clone)]
pub struct DetectReport {
    pub app: String,
    pub agent_ip: String,
    pub ip: String,
    pub port: u16,
    pub db_type: String,
    pub status: String,
    pub bind_gm: String,
}

/// The narrow interface every HA component uses to reach the shared status store.
///
/// Writes are last-write-wins upserts; there is no locking across callers.
#[async_trait]
pub trait StatusStore: Send + Sync {
    async fn register_component(&self, registration: &Registration) -> Result<(), HadbError>;

    async fn report_agent_heartbeat(
        &self,
        ip: &str,
        db_type: &str,
        interval_seconds: u64,
        hash_mod: usize,
        hash_value: usize,
    ) -> Result<(), HadbError>;

    async fn report_gm_heartbeat(
        &self,
        ip: &str,
        module: &str,
        interval_seconds: u64,
    ) -> Result<(), HadbError>;

    /// IPs of running agents in the group that heartbeated within `freshness`, sorted
    async fn get_alive_agents(
        &self,
        city_id: i64,
        db_type: &str,
        freshness: Duration,
    ) -> Result<Vec<String>, HadbError>;

    async fn get_alive_component(
        &self,
        module: &str,
        freshness: Duration,
    ) -> Result<Vec<GmInfo>, HadbError>;

    async fn report_detect_status(&self, report: &DetectReport) -> Result<(), HadbError>;

    /// Every detection status row visible to this cloud; no rows is [`HadbError::Empty`]
    async fn get_db_detect_info(&self) -> Result<Vec<DetectStatus>, HadbError>;

    /// Returns the uid of the new log row
    async fn report_log(&self, entry: &HaLogEntry) -> Result<i64, HadbError>;

    /// Returns the uid of the new queue row, used as the switch id
    async fn insert_switch_queue(&self, entry: &SwitchQueueEntry) -> Result<i64, HadbError>;

    async fn update_switch_queue(
        &self,
        uid: i64,
        update: &SwitchQueueEntry,
    ) -> Result<(), HadbError>;

    async fn query_switch_count(
        &self,
        scope: &SwitchCountScope,
        window: Duration,
    ) -> Result<i64, HadbError>;

    /// Refresh the delay-switch bookkeeping of a queued instance
    async fn update_time_delay(&self, ip: &str, port: u16, app: &str) -> Result<(), HadbError>;

    async fn insert_switch_log(&self, entry: &SwitchLogEntry) -> Result<(), HadbError>;

    async fn query_slave_check_config(
        &self,
        ip: &str,
        port: u16,
        app: &str,
    ) -> Result<SlaveCheckConfig, HadbError>;

    /// Shield rows keyed by IP; no rows is an empty map, not an error
    async fn get_shield_config(
        &self,
        app: &str,
        ip: &str,
        shield_type: &str,
    ) -> Result<HashMap<String, ShieldConfig>, HadbError>;
}
