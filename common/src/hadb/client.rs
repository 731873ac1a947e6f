use async_trait::async_trait;
use chrono::Local;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, error, info};

use super::store::{DetectReport, Registration, StatusStore};
use super::types::{
    module, AgentRecord, CountResult, DetectStatus, GmInfo, HaLogEntry, RowsAffected,
    ShieldConfig, SlaveCheckConfig, StoreRequest, StoreResponse, SwitchCountScope,
    SwitchLogEntry, SwitchQueueEntry, STATUS_RUNNING,
};
use super::HadbConfig;
use crate::errors::HadbError;

/// Table endpoints, relative to the store URL
mod endpoint {
    pub const HA_STATUS: &str = "hastatus";
    pub const DB_STATUS: &str = "dbstatus";
    pub const HA_LOGS: &str = "halogs";
    pub const SWITCH_QUEUE: &str = "switchqueue";
    pub const SWITCH_LOGS: &str = "switchlogs";
    pub const SHIELD_CONFIG: &str = "shieldconfig";
    pub const SLAVE_CHECK_CONFIG: &str = "slavecheckconfig";
}

/// Operation names carried in the envelope's `name` field
mod op {
    pub const REGISTER: &str = "register_dbha_info";
    pub const AGENT_HEARTBEAT: &str = "reporter_agent_heartbeat";
    pub const GM_HEARTBEAT: &str = "reporter_gm_heartbeat";
    pub const ALIVE_AGENTS: &str = "get_alive_agent_info";
    pub const ALIVE_COMPONENT: &str = "get_alive_ha_info";
    pub const UPDATE_INSTANCE_STATUS: &str = "update_instance_status";
    pub const INSERT_INSTANCE_STATUS: &str = "insert_instance_status";
    pub const REPORT_LOG: &str = "reporter_log";
    pub const INSERT_SWITCH_QUEUE: &str = "insert_switch_queue";
    pub const UPDATE_SWITCH_QUEUE: &str = "update_switch_queue";
    pub const INSERT_SWITCH_LOG: &str = "insert_switch_log";
    pub const GET_SHIELD: &str = "get_shield_info";
    pub const GET_INSTANCE_STATUS: &str = "get_instance_status";
    pub const UPDATE_TIME_DELAY: &str = "update_time_delay";
    pub const QUERY_SLAVE_CHECK_CONFIG: &str = "query_slave_check_config";
}

/// HTTP implementation of [`StatusStore`]
#[derive(Clone)]
pub struct HaDbClient {
    config: HadbConfig,
    client: Client,
}

impl HaDbClient {
    pub fn new(config: HadbConfig) -> Result<Self, HadbError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| HadbError::Transport {
                operation: "client_init".to_string(),
                reason: e.to_string(),
            })?;

        Ok(Self { config, client })
    }

    pub fn cloud_id(&self) -> i64 {
        self.config.cloud_id
    }

    fn url(&self, table: &str) -> String {
        format!("{}/{}/", self.config.url.trim_end_matches('/'), table)
    }

    /// Send one envelope and decode `data` into `R`
    async fn call<Q, S, R>(
        &self,
        table: &str,
        name: &str,
        query_args: Option<Q>,
        set_args: Option<S>,
    ) -> Result<R, HadbError>
    where
        Q: Serialize + Send,
        S: Serialize + Send,
        R: DeserializeOwned,
    {
        let request = StoreRequest {
            db_cloud_token: self.config.token.clone(),
            bk_cloud_id: self.config.cloud_id,
            name: name.to_string(),
            query_args,
            set_args,
        };

        debug!(
            "{} param:{}",
            name,
            serde_json::to_string(&request).unwrap_or_default()
        );

        let response = self
            .client
            .post(self.url(table))
            .json(&request)
            .send()
            .await
            .map_err(|e| HadbError::Transport {
                operation: name.to_string(),
                reason: e.to_string(),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(HadbError::Transport {
                operation: name.to_string(),
                reason: format!("http status {}: {}", status, body),
            });
        }

        let envelope: StoreResponse = response.json().await.map_err(|e| HadbError::Decode {
            operation: name.to_string(),
            reason: e.to_string(),
        })?;

        if envelope.code != 0 {
            return Err(HadbError::Api {
                operation: name.to_string(),
                code: envelope.code,
                message: envelope.message,
            });
        }

        serde_json::from_value(envelope.data).map_err(|e| HadbError::Decode {
            operation: name.to_string(),
            reason: e.to_string(),
        })
    }
}

#[async_trait]
impl StatusStore for HaDbClient {
    async fn register_component(&self, registration: &Registration) -> Result<(), HadbError> {
        let now = Local::now();
        let query = AgentRecord {
            ip: Some(registration.ip.clone()),
            module: Some(registration.module.clone()),
            db_type: Some(registration.db_type.clone()),
            ..Default::default()
        };
        let set = AgentRecord {
            ip: Some(registration.ip.clone()),
            port: Some(registration.port),
            module: Some(registration.module.clone()),
            city_id: Some(registration.city_id),
            campus: Some(registration.campus.clone()),
            cloud_id: Some(self.config.cloud_id),
            db_type: Some(registration.db_type.clone()),
            status: Some(STATUS_RUNNING.to_string()),
            start_time: Some(now),
            last_time: Some(now),
            ..Default::default()
        };

        let _: RowsAffected = self
            .call(endpoint::HA_STATUS, op::REGISTER, Some(query), Some(set))
            .await?;
        info!(
            "Registered {} {} (city {}, db_type {})",
            registration.module, registration.ip, registration.city_id, registration.db_type
        );
        Ok(())
    }

    async fn report_agent_heartbeat(
        &self,
        ip: &str,
        db_type: &str,
        interval_seconds: u64,
        hash_mod: usize,
        hash_value: usize,
    ) -> Result<(), HadbError> {
        let query = AgentRecord {
            ip: Some(ip.to_string()),
            db_type: Some(db_type.to_string()),
            ..Default::default()
        };
        let set = AgentRecord {
            report_interval: Some(interval_seconds),
            last_time: Some(Local::now()),
            hash_mod: Some(hash_mod),
            hash_value: Some(hash_value),
            ..Default::default()
        };

        let _: RowsAffected = self
            .call(endpoint::HA_STATUS, op::AGENT_HEARTBEAT, Some(query), Some(set))
            .await?;
        Ok(())
    }

    async fn report_gm_heartbeat(
        &self,
        ip: &str,
        module: &str,
        interval_seconds: u64,
    ) -> Result<(), HadbError> {
        let query = AgentRecord {
            ip: Some(ip.to_string()),
            module: Some(module.to_string()),
            ..Default::default()
        };
        let set = AgentRecord {
            report_interval: Some(interval_seconds),
            last_time: Some(Local::now()),
            ..Default::default()
        };

        let _: RowsAffected = self
            .call(endpoint::HA_STATUS, op::GM_HEARTBEAT, Some(query), Some(set))
            .await?;
        Ok(())
    }

    async fn get_alive_agents(
        &self,
        city_id: i64,
        db_type: &str,
        freshness: Duration,
    ) -> Result<Vec<String>, HadbError> {
        let query = AgentRecord {
            city_id: Some(city_id),
            db_type: Some(db_type.to_string()),
            module: Some(module::AGENT.to_string()),
            status: Some(STATUS_RUNNING.to_string()),
            cloud_id: Some(self.config.cloud_id),
            last_time: Some(cutoff(freshness)),
            ..Default::default()
        };

        let mut agents: Vec<String> = self
            .call::<_, AgentRecord, _>(endpoint::HA_STATUS, op::ALIVE_AGENTS, Some(query), None)
            .await?;

        // hash values are ranks in this list, so the order must not depend on the store
        agents.sort();
        Ok(agents)
    }

    async fn get_alive_component(
        &self,
        module: &str,
        freshness: Duration,
    ) -> Result<Vec<GmInfo>, HadbError> {
        let query = AgentRecord {
            module: Some(module.to_string()),
            cloud_id: Some(self.config.cloud_id),
            last_time: Some(cutoff(freshness)),
            ..Default::default()
        };

        let components: Vec<GmInfo> = self
            .call::<_, AgentRecord, _>(endpoint::HA_STATUS, op::ALIVE_COMPONENT, Some(query), None)
            .await
            .inspect_err(|e| error!("get alive {} failed: {}", module, e))?;

        if components.is_empty() {
            return Err(HadbError::Empty {
                operation: op::ALIVE_COMPONENT.to_string(),
                what: format!("alive {} component", module),
            });
        }
        Ok(components)
    }

    async fn report_detect_status(&self, report: &DetectReport) -> Result<(), HadbError> {
        let now = Local::now();
        let query = DetectStatus {
            app: Some(report.app.clone()),
            agent_ip: Some(report.agent_ip.clone()),
            ip: Some(report.ip.clone()),
            port: Some(report.port),
            ..Default::default()
        };
        let set = DetectStatus {
            app: Some(report.app.clone()),
            db_type: Some(report.db_type.clone()),
            status: Some(report.status.clone()),
            cloud_id: Some(self.config.cloud_id),
            last_time: Some(now),
            report_gm: Some(report.bind_gm.clone()),
            ..Default::default()
        };

        let updated: RowsAffected = self
            .call(endpoint::DB_STATUS, op::UPDATE_INSTANCE_STATUS, Some(query), Some(set))
            .await?;
        if updated.rows_affected == 1 {
            return Ok(());
        }
        if updated.rows_affected > 1 {
            error!(
                "bug: update instance status {}:{} affected {} rows",
                report.ip, report.port, updated.rows_affected
            );
        }

        let insert = DetectStatus {
            app: Some(report.app.clone()),
            agent_ip: Some(report.agent_ip.clone()),
            ip: Some(report.ip.clone()),
            port: Some(report.port),
            db_type: Some(report.db_type.clone()),
            status: Some(report.status.clone()),
            cloud_id: Some(self.config.cloud_id),
            last_time: Some(now),
            report_gm: None,
        };
        let _: RowsAffected = self
            .call::<DetectStatus, _, _>(
                endpoint::DB_STATUS,
                op::INSERT_INSTANCE_STATUS,
                None,
                Some(insert),
            )
            .await?;
        Ok(())
    }

    async fn get_db_detect_info(&self) -> Result<Vec<DetectStatus>, HadbError> {
        let rows: Vec<DetectStatus> = self
            .call::<_, DetectStatus, _>(
                endpoint::DB_STATUS,
                op::GET_INSTANCE_STATUS,
                Some(DetectStatus::default()),
                None,
            )
            .await?;

        if rows.is_empty() {
            return Err(HadbError::Empty {
                operation: op::GET_INSTANCE_STATUS.to_string(),
                what: "instance detect status".to_string(),
            });
        }
        Ok(rows)
    }

    async fn report_log(&self, entry: &HaLogEntry) -> Result<i64, HadbError> {
        info!(
            "reporter log. ip:{}, port:{}, module:{}, comment:{}",
            entry.ip, entry.port, entry.module, entry.comment
        );
        let mut set = entry.clone();
        set.cloud_id = self.config.cloud_id;

        let result: RowsAffected = self
            .call::<HaLogEntry, _, _>(endpoint::HA_LOGS, op::REPORT_LOG, None, Some(set))
            .await?;
        Ok(result.uid)
    }

    async fn insert_switch_queue(&self, entry: &SwitchQueueEntry) -> Result<i64, HadbError> {
        let mut set = entry.clone();
        set.cloud_id = Some(self.config.cloud_id);

        let result: RowsAffected = self
            .call::<SwitchQueueEntry, _, _>(
                endpoint::SWITCH_QUEUE,
                op::INSERT_SWITCH_QUEUE,
                None,
                Some(set),
            )
            .await?;
        Ok(result.uid)
    }

    async fn update_switch_queue(
        &self,
        uid: i64,
        update: &SwitchQueueEntry,
    ) -> Result<(), HadbError> {
        let query = SwitchQueueEntry {
            uid: Some(uid),
            ..Default::default()
        };

        let _: RowsAffected = self
            .call(
                endpoint::SWITCH_QUEUE,
                op::UPDATE_SWITCH_QUEUE,
                Some(query),
                Some(update.clone()),
            )
            .await?;
        Ok(())
    }

    async fn query_switch_count(
        &self,
        scope: &SwitchCountScope,
        window: Duration,
    ) -> Result<i64, HadbError> {
        let mut query = SwitchQueueEntry {
            confirm_check_time: Some(cutoff(window)),
            ..Default::default()
        };
        match scope {
            SwitchCountScope::SingleInstance { ip, port } => {
                query.ip = Some(ip.clone());
                query.port = Some(*port);
            }
            SwitchCountScope::Global => {}
            SwitchCountScope::PerIdc { ip, idc } => {
                query.ip = Some(ip.clone());
                query.idc = Some(*idc);
            }
        }

        let result: CountResult = self
            .call::<_, SwitchQueueEntry, _>(
                endpoint::SWITCH_QUEUE,
                scope.operation_name(),
                Some(query),
                None,
            )
            .await?;
        Ok(result.count)
    }

    async fn update_time_delay(&self, ip: &str, port: u16, app: &str) -> Result<(), HadbError> {
        let query = SwitchQueueEntry {
            ip: Some(ip.to_string()),
            port: Some(port),
            app: Some(app.to_string()),
            ..Default::default()
        };

        let result: RowsAffected = self
            .call::<_, SwitchQueueEntry, _>(
                endpoint::SWITCH_QUEUE,
                op::UPDATE_TIME_DELAY,
                Some(query),
                None,
            )
            .await?;
        debug!(
            "update time delay of {}:{} affected {} rows",
            ip, port, result.rows_affected
        );
        Ok(())
    }

    async fn insert_switch_log(&self, entry: &SwitchLogEntry) -> Result<(), HadbError> {
        let _: RowsAffected = self
            .call::<SwitchLogEntry, _, _>(
                endpoint::SWITCH_LOGS,
                op::INSERT_SWITCH_LOG,
                None,
                Some(entry.clone()),
            )
            .await?;
        Ok(())
    }

    async fn get_shield_config(
        &self,
        app: &str,
        ip: &str,
        shield_type: &str,
    ) -> Result<HashMap<String, ShieldConfig>, HadbError> {
        let query = ShieldConfig {
            ip: ip.to_string(),
            app: app.to_string(),
            shield_type: shield_type.to_string(),
            ..Default::default()
        };

        let rows: Vec<ShieldConfig> = self
            .call::<_, ShieldConfig, _>(endpoint::SHIELD_CONFIG, op::GET_SHIELD, Some(query), None)
            .await?;
        if rows.is_empty() {
            debug!("no shield config found for {}#{}", app, ip);
        }

        Ok(rows.into_iter().map(|row| (row.ip.clone(), row)).collect())
    }

    async fn query_slave_check_config(
        &self,
        ip: &str,
        port: u16,
        app: &str,
    ) -> Result<SlaveCheckConfig, HadbError> {
        let query = SlaveCheckQuery {
            ip: ip.to_string(),
            port,
            app: app.to_string(),
        };

        self.call::<_, SlaveCheckQuery, _>(
            endpoint::SLAVE_CHECK_CONFIG,
            op::QUERY_SLAVE_CHECK_CONFIG,
            Some(query),
            None,
        )
        .await
    }
}

#[derive(Debug, Serialize)]
struct SlaveCheckQuery {
    ip: String,
    port: u16,
    app: String,
}

fn cutoff(window: Duration) -> chrono::DateTime<Local> {
    let window = chrono::Duration::from_std(window).unwrap_or(chrono::Duration::zero());
    Local::now() - window
}
