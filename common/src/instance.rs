//! Monitored-instance model shared by agents and the GM
//!
//! Agents declare instances in their config files and ship the full record to
//! the GM when a failure is confirmed, so the GM needs no topology source of its own.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// Instance availability as recorded in the topology
pub mod status {
    pub const AVAILABLE: &str = "AVAILABLE";
    pub const UNAVAILABLE: &str = "UNAVAILABLE";
}

/// Role of a spider node; slaves carry no control node
pub mod spider_role {
    pub const MASTER: &str = "spider_master";
    pub const SLAVE: &str = "spider_slave";
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum InstanceRole {
    Master,
    Slave,
    /// Spider proxy whose admin port hosts a control node
    Spider,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SlaveInfo {
    pub ip: String,
    pub port: u16,
    #[serde(default)]
    pub is_standby: bool,
    #[serde(default = "default_status")]
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SpiderNode {
    pub ip: String,
    pub port: u16,
    pub admin_port: u16,
    #[serde(default = "default_status")]
    pub status: String,
    #[serde(default = "default_spider_role")]
    pub spider_role: String,
}

impl SpiderNode {
    /// Only available spider masters host a control node worth connecting to
    pub fn is_control_candidate(&self) -> bool {
        self.status != status::UNAVAILABLE && self.spider_role != spider_role::SLAVE
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InstanceInfo {
    pub app: String,
    pub ip: String,
    pub port: u16,
    pub db_type: String,
    #[serde(default)]
    pub cluster: String,
    #[serde(default)]
    pub idc: i64,
    #[serde(default = "default_status")]
    pub status: String,
    pub role: InstanceRole,
    #[serde(default)]
    pub slaves: Vec<SlaveInfo>,
    #[serde(default)]
    pub spider_nodes: Vec<SpiderNode>,
}

impl InstanceInfo {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.ip, self.port)
    }

    /// First slave flagged standby, otherwise the first slave
    pub fn standby_slave(&self) -> Option<&SlaveInfo> {
        self.slaves
            .iter()
            .find(|slave| slave.is_standby)
            .or_else(|| self.slaves.first())
    }
}

/// Confirmed failure, sent by an agent to a GM
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureReport {
    pub agent_ip: String,
    pub instance: InstanceInfo,
    pub detected_at: DateTime<Local>,
    pub reason: String,
}

fn default_status() -> String {
    status::AVAILABLE.to_string()
}

fn default_spider_role() -> String {
    spider_role::MASTER.to_string()
}
