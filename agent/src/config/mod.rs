pub mod manager;

use ha_common::{HadbConfig, InstanceInfo};
use serde::{Deserialize, Serialize};
pub use manager::ConfigManager;

use crate::constants::{agent, gm, probe};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    pub ip: String,
    #[serde(default)]
    pub port: u16,
    pub city_id: i64,
    #[serde(default)]
    pub cloud_id: i64,
    #[serde(default)]
    pub campus: String,
    #[serde(default = "default_db_type")]
    pub db_type: String,
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval_seconds: u64,
    #[serde(default = "default_detect_interval")]
    pub detect_interval_seconds: u64,
    #[serde(default = "default_freshness")]
    pub freshness_seconds: u64,
    #[serde(default = "default_double_check_times")]
    pub double_check_times: u32,
    #[serde(default = "default_gm_timeout")]
    pub gm_timeout_seconds: u64,
    pub hadb: HadbConfig,
    pub probe: ProbeConfig,
    /// Filled from the per-cluster files next to main.toml
    #[serde(skip)]
    pub instances: Vec<InstanceInfo>,
}

fn default_db_type() -> String {
    agent::DB_TYPE.to_string()
}

fn default_heartbeat_interval() -> u64 {
    agent::HEARTBEAT_INTERVAL_SECONDS
}

fn default_detect_interval() -> u64 {
    agent::DETECT_INTERVAL_SECONDS
}

fn default_freshness() -> u64 {
    agent::FRESHNESS_SECONDS
}

fn default_double_check_times() -> u32 {
    agent::DOUBLE_CHECK_TIMES
}

fn default_gm_timeout() -> u64 {
    gm::REQUEST_TIMEOUT_SECONDS
}

/// Account used for the liveness probe
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeConfig {
    pub user: String,
    pub password: String,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_seconds: u64,
}

fn default_connect_timeout() -> u64 {
    probe::CONNECT_TIMEOUT_SECONDS
}

/// One per-cluster file: `[[instances]]` tables
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterConfigFile {
    #[serde(default)]
    pub instances: Vec<InstanceInfo>,
}
