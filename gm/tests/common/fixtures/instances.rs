use chrono::Local;
use gm::config::{GcmConfig, MysqlConfig};
use gm::mysql::{SlaveStatus, TdbctlNode};
use ha_common::hadb::types::module;
use ha_common::instance::{spider_role, status, InstanceRole};
use ha_common::{FailureReport, InstanceInfo, Reporter, SlaveInfo, SpiderNode, StatusStore};
use std::sync::Arc;

pub const MASTER_IP: &str = "10.0.0.1";
pub const PORT: u16 = 3306;

pub fn slave(ip: &str, is_standby: bool) -> SlaveInfo {
    SlaveInfo {
        ip: ip.to_string(),
        port: PORT,
        is_standby,
        status: status::AVAILABLE.to_string(),
    }
}

/// Broken master as an agent ships it: already marked unavailable
pub fn broken_master(slaves: Vec<SlaveInfo>) -> InstanceInfo {
    InstanceInfo {
        app: "payments".to_string(),
        ip: MASTER_IP.to_string(),
        port: PORT,
        db_type: "tendbha:backend".to_string(),
        cluster: "db.payments.test".to_string(),
        idc: 1,
        status: status::UNAVAILABLE.to_string(),
        role: InstanceRole::Master,
        slaves,
        spider_nodes: vec![],
    }
}

pub fn spider_node(ip: &str, port: u16, admin_port: u16) -> SpiderNode {
    SpiderNode {
        ip: ip.to_string(),
        port,
        admin_port,
        status: status::AVAILABLE.to_string(),
        spider_role: spider_role::MASTER.to_string(),
    }
}

pub fn broken_spider(ip: &str, port: u16, cluster: Vec<SpiderNode>) -> InstanceInfo {
    InstanceInfo {
        app: "orders".to_string(),
        ip: ip.to_string(),
        port,
        db_type: "tendbcluster:proxy".to_string(),
        cluster: "spider.orders.test".to_string(),
        idc: 2,
        status: status::UNAVAILABLE.to_string(),
        role: InstanceRole::Spider,
        slaves: vec![],
        spider_nodes: cluster,
    }
}

pub fn report(instance: InstanceInfo) -> FailureReport {
    FailureReport {
        agent_ip: "10.0.9.9".to_string(),
        instance,
        detected_at: Local::now(),
        reason: "connect timeout after 3 checks".to_string(),
    }
}

/// Slave status of a replica that is fully caught up with `master_ip`
pub fn caught_up(master_ip: &str, master_port: u16) -> SlaveStatus {
    SlaveStatus {
        master_host: master_ip.to_string(),
        master_port,
        master_log_file: "binlog.000010".to_string(),
        read_master_log_pos: 4096,
        relay_master_log_file: "binlog.000010".to_string(),
        exec_master_log_pos: 4096,
        slave_io_running: "No".to_string(),
        slave_sql_running: "Yes".to_string(),
        master_server_id: 101,
    }
}

/// Same replica, `files` binlog files behind on the SQL thread
pub fn lagging(master_ip: &str, master_port: u16, files: u32) -> SlaveStatus {
    SlaveStatus {
        relay_master_log_file: format!("binlog.{:06}", 10 - files),
        ..caught_up(master_ip, master_port)
    }
}

pub fn tdbctl_node(name: &str, host: &str, role: &str, status: &str, master: &str) -> TdbctlNode {
    TdbctlNode {
        server_name: name.to_string(),
        host: host.to_string(),
        port: 26000,
        replication_master: master.to_string(),
        cluster_role: role.to_string(),
        status: status.to_string(),
        message: String::new(),
        replication_info: String::new(),
    }
}

/// Thresholds with no real waiting
pub fn gcm(allowed_checksum_max_offset: i64) -> GcmConfig {
    GcmConfig {
        allowed_checksum_max_offset,
        allowed_slave_delay_max: 60,
        allowed_time_delay_max: 60,
        exec_slow_kbytes: 1024,
        slow_wait_loops: 2,
        slow_wait_interval_seconds: 0,
    }
}

pub fn mysql_config() -> MysqlConfig {
    MysqlConfig {
        user: "admin".to_string(),
        password: "admin-pw".to_string(),
        repl_user: "repl".to_string(),
        repl_password: "repl-pw".to_string(),
        connect_timeout_seconds: 1,
        query_timeout_seconds: 1,
    }
}

pub fn reporter(store: Arc<dyn StatusStore>) -> Reporter {
    Reporter::new(store, "10.0.8.8", module::GM, 0)
}

/// Progress lines queued so far, without a report worker running
pub async fn drain(reporter: &Reporter) -> Vec<String> {
    let mut lines = Vec::new();
    while !reporter.mailbox().is_empty() {
        if let Some(entry) = reporter.mailbox().recv().await {
            lines.push(entry.comment);
        }
    }
    lines
}
