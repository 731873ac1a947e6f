use async_trait::async_trait;
use gm::constants::{sql, tdbctl};
use gm::mysql::{
    DelayInfo, InstanceConnector, InstanceSession, MasterStatus, RouteInfo, SlaveStatus, TdbctlNode,
};
use gm::GmError;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

/// What one fake instance answers
#[derive(Debug, Clone)]
pub struct InstanceScript {
    pub reachable: bool,
    pub max_binlog_size: u64,
    /// Answers in order; the last one repeats
    pub slave_status: VecDeque<SlaveStatus>,
    pub master_status: MasterStatus,
    pub databases: Vec<String>,
    pub checksum_done: i64,
    pub checksum_failed: i64,
    pub delay: DelayInfo,
    pub tdbctl_nodes: Vec<TdbctlNode>,
    pub routes: Vec<RouteInfo>,
    pub affected_rows: u64,
    /// Statement prefix -> error reason
    pub failures: HashMap<String, String>,
    pub executed: Vec<String>,
    pub connects: usize,
}

impl Default for InstanceScript {
    fn default() -> Self {
        Self {
            reachable: true,
            max_binlog_size: 1024 * 1024 * 1024,
            slave_status: VecDeque::new(),
            master_status: MasterStatus::default(),
            databases: vec!["mysql".to_string(), "infodba_schema".to_string()],
            checksum_done: 0,
            checksum_failed: 0,
            delay: DelayInfo::default(),
            tdbctl_nodes: vec![],
            routes: vec![],
            affected_rows: 1,
            failures: HashMap::new(),
            executed: vec![],
            connects: 0,
        }
    }
}

impl InstanceScript {
    pub fn fail(&mut self, statement: &str, reason: &str) {
        self.failures.insert(statement.to_string(), reason.to_string());
    }
}

/// Connector over fake instances keyed by `host:port`
#[derive(Default)]
pub struct ScriptedConnector {
    instances: Mutex<HashMap<String, Arc<Mutex<InstanceScript>>>>,
}

impl ScriptedConnector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn script(&self, host: &str, port: u16) -> Arc<Mutex<InstanceScript>> {
        self.instances
            .lock()
            .unwrap()
            .entry(format!("{}:{}", host, port))
            .or_default()
            .clone()
    }

    pub fn with<R>(&self, host: &str, port: u16, f: impl FnOnce(&mut InstanceScript) -> R) -> R {
        let script = self.script(host, port);
        let mut guard = script.lock().unwrap();
        f(&mut guard)
    }

    pub fn executed(&self, host: &str, port: u16) -> Vec<String> {
        self.with(host, port, |script| script.executed.clone())
    }

    pub fn connects(&self, host: &str, port: u16) -> usize {
        self.with(host, port, |script| script.connects)
    }
}

#[async_trait]
impl InstanceConnector for ScriptedConnector {
    async fn connect(&self, host: &str, port: u16) -> Result<Box<dyn InstanceSession>, GmError> {
        let target = format!("{}:{}", host, port);
        let script = self.script(host, port);
        {
            let mut guard = script.lock().unwrap();
            if !guard.reachable {
                return Err(GmError::connectivity(&target, "connection refused"));
            }
            guard.connects += 1;
        }
        Ok(Box::new(ScriptedSession { target, script }))
    }
}

pub struct ScriptedSession {
    target: String,
    script: Arc<Mutex<InstanceScript>>,
}

impl ScriptedSession {
    /// Record the statement and run `answer` unless a failure is scripted for it
    fn answer<T>(
        &self,
        statement: &str,
        answer: impl FnOnce(&mut InstanceScript) -> T,
    ) -> Result<T, GmError> {
        let mut script = self.script.lock().unwrap();
        script.executed.push(statement.to_string());
        let failure = script
            .failures
            .iter()
            .find(|(prefix, _)| statement.starts_with(prefix.as_str()))
            .map(|(_, reason)| reason.clone());
        if let Some(reason) = failure {
            return Err(GmError::query(&self.target, statement, reason));
        }
        Ok(answer(&mut script))
    }
}

#[async_trait]
impl InstanceSession for ScriptedSession {
    fn target(&self) -> &str {
        &self.target
    }

    async fn execute(&mut self, statement: &str) -> Result<u64, GmError> {
        self.answer(statement, |script| script.affected_rows)
    }

    async fn slave_status(&mut self) -> Result<SlaveStatus, GmError> {
        self.answer(sql::SHOW_SLAVE_STATUS, |script| {
            if script.slave_status.len() > 1 {
                script.slave_status.pop_front().unwrap_or_default()
            } else {
                script.slave_status.front().cloned().unwrap_or_default()
            }
        })
    }

    async fn master_status(&mut self) -> Result<MasterStatus, GmError> {
        self.answer(sql::SHOW_MASTER_STATUS, |script| script.master_status.clone())
    }

    async fn max_binlog_size(&mut self) -> Result<u64, GmError> {
        self.answer(sql::MAX_BINLOG_SIZE, |script| script.max_binlog_size)
    }

    async fn databases(&mut self) -> Result<Vec<String>, GmError> {
        self.answer(sql::SHOW_DATABASES, |script| script.databases.clone())
    }

    async fn count(&mut self, statement: &str) -> Result<i64, GmError> {
        self.answer(statement, |script| {
            if statement == sql::CHECKSUM_FAIL_COUNT {
                script.checksum_failed
            } else {
                script.checksum_done
            }
        })
    }

    async fn delay_info(&mut self, _master_server_id: u64) -> Result<DelayInfo, GmError> {
        self.answer(sql::DELAY_BY_MASTER_ID, |script| script.delay)
    }

    async fn tdbctl_nodes(&mut self) -> Result<Vec<TdbctlNode>, GmError> {
        self.answer(tdbctl::GET_NODES, |script| script.tdbctl_nodes.clone())
    }

    async fn route_table(&mut self) -> Result<Vec<RouteInfo>, GmError> {
        self.answer(tdbctl::GET_ROUTE, |script| script.routes.clone())
    }
}
