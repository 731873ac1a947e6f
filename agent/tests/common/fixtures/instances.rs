use agent::config::{AgentConfig, ProbeConfig};
use ha_common::instance::{status, InstanceRole};
use ha_common::{HadbConfig, InstanceInfo};
use std::sync::Arc;

pub const AGENT_IP: &str = "10.0.9.1";

pub fn instance(ip: &str, port: u16) -> InstanceInfo {
    InstanceInfo {
        app: "payments".to_string(),
        ip: ip.to_string(),
        port,
        db_type: "tendbha:backend".to_string(),
        cluster: "payments.db".to_string(),
        idc: 1,
        status: status::AVAILABLE.to_string(),
        role: InstanceRole::Master,
        slaves: vec![],
        spider_nodes: vec![],
    }
}

/// `count` masters on 10.1.0.x:3306
pub fn instances(count: usize) -> Vec<InstanceInfo> {
    (0..count)
        .map(|i| instance(&format!("10.1.0.{}", i), 3306))
        .collect()
}

pub fn agent_config(hadb: HadbConfig, instances: Vec<InstanceInfo>) -> Arc<AgentConfig> {
    Arc::new(AgentConfig {
        ip: AGENT_IP.to_string(),
        port: 0,
        city_id: 1,
        cloud_id: 0,
        campus: "sz".to_string(),
        db_type: "tendbha".to_string(),
        heartbeat_interval_seconds: 10,
        detect_interval_seconds: 10,
        freshness_seconds: 60,
        double_check_times: 3,
        gm_timeout_seconds: 2,
        hadb,
        probe: ProbeConfig {
            user: "monitor".to_string(),
            password: "monitor-pw".to_string(),
            connect_timeout_seconds: 1,
        },
        instances,
    })
}

pub fn unused_hadb() -> HadbConfig {
    HadbConfig {
        url: "http://127.0.0.1:1".to_string(),
        token: String::new(),
        cloud_id: 0,
        timeout_seconds: 1,
    }
}
