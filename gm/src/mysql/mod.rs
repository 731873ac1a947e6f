//! Connections to monitored MySQL instances and TDBCTL control nodes
//!
//! Decision code only sees [`InstanceConnector`] and [`InstanceSession`]; the
//! sqlx implementation lives in [`session`]. Every session is short-lived and
//! dedicated to one target, and every statement on it is bounded by a timeout.

pub mod session;

pub use session::MysqlConnector;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::GmError;

/// Subset of `SHOW SLAVE STATUS` the checks rely on
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlaveStatus {
    pub master_host: String,
    pub master_port: u16,
    pub master_log_file: String,
    pub read_master_log_pos: u64,
    pub relay_master_log_file: String,
    pub exec_master_log_pos: u64,
    pub slave_io_running: String,
    pub slave_sql_running: String,
    pub master_server_id: u64,
}

/// Replication coordinates reduced to file indexes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinlogStatus {
    pub master_host: String,
    pub master_port: u16,
    pub master_log_file_index: i64,
    pub relay_master_log_file_index: i64,
    pub read_master_log_pos: u64,
    pub exec_master_log_pos: u64,
}

impl BinlogStatus {
    /// Requires a running SQL thread and `name.index` binlog file names
    pub fn from_slave_status(status: &SlaveStatus) -> Result<Self, GmError> {
        if status.slave_sql_running != "Yes" {
            return Err(GmError::precondition(
                "slave status",
                format!("slave's SQL_thread[{}] is abnormal", status.slave_sql_running),
            ));
        }

        Ok(Self {
            master_host: status.master_host.clone(),
            master_port: status.master_port,
            master_log_file_index: binlog_file_index(&status.master_log_file)?,
            relay_master_log_file_index: binlog_file_index(&status.relay_master_log_file)?,
            read_master_log_pos: status.read_master_log_pos,
            exec_master_log_pos: status.exec_master_log_pos,
        })
    }

    /// How far, in KB, the SQL thread trails what the IO thread has read
    pub fn exec_slow_kbytes(&self, max_binlog_size_mb: u64) -> i64 {
        let file_gap = self.master_log_file_index - self.relay_master_log_file_index;
        max_binlog_size_mb as i64 * 1024 * file_gap - (self.exec_master_log_pos / 1024) as i64
            + (self.read_master_log_pos / 1024) as i64
    }
}

fn binlog_file_index(file: &str) -> Result<i64, GmError> {
    let (_, index) = file.split_once('.').ok_or_else(|| {
        GmError::precondition("slave status", format!("can't find master log file[{}]", file))
    })?;
    index.parse::<i64>().map_err(|e| {
        GmError::precondition(
            "slave status",
            format!("invalid binlog file index in [{}]: {}", file, e),
        )
    })
}

/// `SHOW MASTER STATUS` of a replica about to become master
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MasterStatus {
    pub file: String,
    pub position: u64,
}

/// Replication lag in seconds
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelayInfo {
    /// SQL thread
    pub slave_delay: i64,
    /// IO thread, measured by the heartbeat table
    pub time_delay: i64,
}

/// Row of `information_schema.TDBCTL_NODES`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TdbctlNode {
    pub server_name: String,
    pub host: String,
    pub port: u16,
    pub replication_master: String,
    pub cluster_role: String,
    pub status: String,
    pub message: String,
    pub replication_info: String,
}

/// Row of `mysql.servers` on a control node
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteInfo {
    pub server_name: String,
    pub host: String,
    pub username: String,
    pub password: String,
    pub port: u16,
    pub wrapper: String,
}

/// One open connection to one instance
#[async_trait]
pub trait InstanceSession: Send {
    /// `host:port` of the connected instance
    fn target(&self) -> &str;

    /// Run a statement, returning the affected-row count
    async fn execute(&mut self, statement: &str) -> Result<u64, GmError>;

    async fn slave_status(&mut self) -> Result<SlaveStatus, GmError>;

    async fn master_status(&mut self) -> Result<MasterStatus, GmError>;

    /// `max_binlog_size` in bytes
    async fn max_binlog_size(&mut self) -> Result<u64, GmError>;

    async fn databases(&mut self) -> Result<Vec<String>, GmError>;

    /// First column of the first row of a count query
    async fn count(&mut self, statement: &str) -> Result<i64, GmError>;

    async fn delay_info(&mut self, master_server_id: u64) -> Result<DelayInfo, GmError>;

    async fn tdbctl_nodes(&mut self) -> Result<Vec<TdbctlNode>, GmError>;

    async fn route_table(&mut self) -> Result<Vec<RouteInfo>, GmError>;
}

/// Opens sessions; failure is always [`GmError::Connectivity`]
#[async_trait]
pub trait InstanceConnector: Send + Sync {
    async fn connect(&self, host: &str, port: u16) -> Result<Box<dyn InstanceSession>, GmError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slave_status(master_file: &str, relay_file: &str, read: u64, exec: u64) -> SlaveStatus {
        SlaveStatus {
            master_host: "10.0.0.1".to_string(),
            master_port: 3306,
            master_log_file: master_file.to_string(),
            read_master_log_pos: read,
            relay_master_log_file: relay_file.to_string(),
            exec_master_log_pos: exec,
            slave_io_running: "Yes".to_string(),
            slave_sql_running: "Yes".to_string(),
            master_server_id: 1001,
        }
    }

    #[test]
    fn test_exec_slow_same_file_is_position_gap() {
        let status = slave_status("binlog.000010", "binlog.000010", 4096 * 1024, 1024 * 1024);
        let binlog = BinlogStatus::from_slave_status(&status).unwrap();
        assert_eq!(binlog.exec_slow_kbytes(1024), 3072);
    }

    #[test]
    fn test_exec_slow_counts_whole_files_between_threads() {
        let status = slave_status("binlog.000012", "binlog.000010", 0, 0);
        let binlog = BinlogStatus::from_slave_status(&status).unwrap();
        assert_eq!(binlog.exec_slow_kbytes(512), 2 * 512 * 1024);
    }

    #[test]
    fn test_stopped_sql_thread_is_rejected() {
        let mut status = slave_status("binlog.000010", "binlog.000010", 0, 0);
        status.slave_sql_running = "No".to_string();
        let err = BinlogStatus::from_slave_status(&status).unwrap_err();
        assert!(err.to_string().contains("SQL_thread[No] is abnormal"));
    }

    #[test]
    fn test_binlog_file_without_index_is_rejected() {
        let status = slave_status("binlog", "binlog.000010", 0, 0);
        let err = BinlogStatus::from_slave_status(&status).unwrap_err();
        assert!(err.to_string().contains("can't find master log file"));
    }
}
