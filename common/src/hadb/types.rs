//! Row and envelope types exchanged with the HA status store

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// Component status written on registration
pub const STATUS_RUNNING: &str = "RUNNING";

/// Module names stored in the `module` column
pub mod module {
    pub const AGENT: &str = "agent";
    pub const GM: &str = "gm";
}

/// Request envelope shared by every store operation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreRequest<Q, S> {
    pub db_cloud_token: String,
    pub bk_cloud_id: i64,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query_args: Option<Q>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub set_args: Option<S>,
}

/// Response envelope; `data` is decoded per operation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreResponse {
    pub code: i64,
    #[serde(alias = "msg", default)]
    pub message: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

/// Row of the component status table (agents and GMs).
///
/// Used both as filter and as mutation, so every column is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AgentRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub module: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub campus: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cloud_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub db_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Local>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_time: Option<DateTime<Local>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_interval: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash_mod: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash_value: Option<usize>,
}

/// Manager-role component as returned by the alive-component query
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GmInfo {
    pub ip: String,
    pub port: u16,
    #[serde(default)]
    pub city_id: i64,
    #[serde(default)]
    pub cloud_id: i64,
}

/// Per-instance detection status row
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DetectStatus {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub db_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cloud_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_time: Option<DateTime<Local>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_gm: Option<String>,
}

/// Free-form progress line written to the HA log table
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct HaLogEntry {
    pub app: String,
    pub ip: String,
    pub port: u16,
    pub mon_ip: String,
    pub module: String,
    pub cloud_id: i64,
    pub comment: String,
}

/// Proposed switch; append-only, counted by the throttle queries
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SwitchQueueEntry {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uid: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(rename = "idc_id", skip_serializing_if = "Option::is_none")]
    pub idc: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confirm_check_time: Option<DateTime<Local>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cluster: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub db_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slave_ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slave_port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub switch_result: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub switch_finished_time: Option<DateTime<Local>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cloud_id: Option<i64>,
}

/// Result column of a switch log row
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SwitchResult {
    Success,
    Failed,
}

impl SwitchResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            SwitchResult::Success => "success",
            SwitchResult::Failed => "failed",
        }
    }
}

/// Audit record, written once per completed switch attempt
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SwitchLogEntry {
    pub switch_id: i64,
    pub app: String,
    pub ip: String,
    pub port: u16,
    pub result: SwitchResult,
    pub comment: String,
    #[serde(rename = "datetime")]
    pub finish_time: DateTime<Local>,
}

/// Shield kinds understood by the store
pub mod shield_type {
    pub const CHECK: &str = "check";
    pub const SWITCH: &str = "switch";
}

/// Operator override for one instance
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ShieldConfig {
    pub ip: String,
    #[serde(default)]
    pub app: String,
    #[serde(default)]
    pub shield_type: String,
    #[serde(default)]
    pub ignore_checksum: bool,
    #[serde(default)]
    pub ignore_slave_delay: bool,
}

/// Per-instance slave check switches kept by the store.
///
/// The store answers with integer flags; anything non-zero enables the check.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SlaveCheckConfig {
    #[serde(default)]
    pub do_checksum: i64,
    #[serde(rename = "do_timedelay", default)]
    pub do_time_delay: i64,
}

impl SlaveCheckConfig {
    pub fn checksum_enabled(&self) -> bool {
        self.do_checksum != 0
    }

    pub fn time_delay_enabled(&self) -> bool {
        self.do_time_delay != 0
    }
}

/// Which slice of the switch queue a rate-limit query counts
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwitchCountScope {
    SingleInstance { ip: String, port: u16 },
    Global,
    PerIdc { ip: String, idc: i64 },
}

impl SwitchCountScope {
    pub fn operation_name(&self) -> &'static str {
        match self {
            SwitchCountScope::SingleInstance { .. } => "query_single_total",
            SwitchCountScope::Global => "query_interval_total",
            SwitchCountScope::PerIdc { .. } => "query_single_idc",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SwitchCountScope::SingleInstance { .. } => "single-instance",
            SwitchCountScope::Global => "global",
            SwitchCountScope::PerIdc { .. } => "per-idc",
        }
    }
}

/// Shape of the `data` field for mutation operations
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RowsAffected {
    #[serde(rename = "rowsAffected", default)]
    pub rows_affected: i64,
    #[serde(default)]
    pub uid: i64,
}

/// Shape of the `data` field for count operations
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CountResult {
    #[serde(default)]
    pub count: i64,
}
