pub mod manager;

use ha_common::{HadbConfig, ThrottleConfig};
use serde::{Deserialize, Serialize};
pub use manager::ConfigManager;

use crate::constants::{gcm, intake, mysql, REPORT_INTERVAL};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GmConfig {
    pub ip: String,
    pub port: u16,
    pub city_id: i64,
    #[serde(default)]
    pub cloud_id: i64,
    #[serde(default)]
    pub campus: String,
    #[serde(default = "default_db_type")]
    pub db_type: String,
    #[serde(default = "default_report_interval")]
    pub report_interval_seconds: u64,
    #[serde(default = "default_switch_queue_capacity")]
    pub switch_queue_capacity: usize,
    pub hadb: HadbConfig,
    pub mysql: MysqlConfig,
    #[serde(default)]
    pub gcm: GcmConfig,
    #[serde(default)]
    pub throttle: ThrottleConfig,
    #[serde(default)]
    pub binlog: BinlogConfig,
}

fn default_db_type() -> String {
    "tendbha".to_string()
}

fn default_report_interval() -> u64 {
    REPORT_INTERVAL.as_secs()
}

fn default_switch_queue_capacity() -> usize {
    intake::SWITCH_QUEUE_CAPACITY
}

/// Credentials and timeouts for connections to monitored instances
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MysqlConfig {
    pub user: String,
    pub password: String,
    /// Replication account written into generated CHANGE MASTER statements
    pub repl_user: String,
    pub repl_password: String,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_seconds: u64,
    #[serde(default = "default_query_timeout")]
    pub query_timeout_seconds: u64,
}

fn default_connect_timeout() -> u64 {
    mysql::CONNECT_TIMEOUT_SECONDS
}

fn default_query_timeout() -> u64 {
    mysql::QUERY_TIMEOUT_SECONDS
}

/// Promotion thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GcmConfig {
    #[serde(default = "default_checksum_offset")]
    pub allowed_checksum_max_offset: i64,
    #[serde(default = "default_slave_delay_max")]
    pub allowed_slave_delay_max: i64,
    #[serde(default = "default_time_delay_max")]
    pub allowed_time_delay_max: i64,
    #[serde(default = "default_exec_slow_kbytes")]
    pub exec_slow_kbytes: i64,
    #[serde(default = "default_slow_wait_loops")]
    pub slow_wait_loops: u32,
    #[serde(default = "default_slow_wait_interval")]
    pub slow_wait_interval_seconds: u64,
}

impl Default for GcmConfig {
    fn default() -> Self {
        Self {
            allowed_checksum_max_offset: default_checksum_offset(),
            allowed_slave_delay_max: default_slave_delay_max(),
            allowed_time_delay_max: default_time_delay_max(),
            exec_slow_kbytes: default_exec_slow_kbytes(),
            slow_wait_loops: default_slow_wait_loops(),
            slow_wait_interval_seconds: default_slow_wait_interval(),
        }
    }
}

fn default_checksum_offset() -> i64 {
    gcm::ALLOWED_CHECKSUM_MAX_OFFSET
}

fn default_slave_delay_max() -> i64 {
    gcm::ALLOWED_SLAVE_DELAY_MAX
}

fn default_time_delay_max() -> i64 {
    gcm::ALLOWED_TIME_DELAY_MAX
}

fn default_exec_slow_kbytes() -> i64 {
    gcm::EXEC_SLOW_KBYTES
}

fn default_slow_wait_loops() -> u32 {
    gcm::SLOW_WAIT_LOOPS
}

fn default_slow_wait_interval() -> u64 {
    gcm::SLOW_WAIT_INTERVAL_SECONDS
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BinlogConfig {
    #[serde(default = "default_mysqlbinlog_path")]
    pub mysqlbinlog_path: String,
    #[serde(default = "default_parse_concurrency")]
    pub parse_concurrency: usize,
}

impl Default for BinlogConfig {
    fn default() -> Self {
        Self {
            mysqlbinlog_path: default_mysqlbinlog_path(),
            parse_concurrency: default_parse_concurrency(),
        }
    }
}

fn default_mysqlbinlog_path() -> String {
    "mysqlbinlog".to_string()
}

fn default_parse_concurrency() -> usize {
    4
}
