use chrono::Local;
use ha_common::hadb::types::{SwitchLogEntry, SwitchQueueEntry, SwitchResult};
use ha_common::instance::InstanceRole;
use ha_common::{
    FailureReport, InstanceInfo, Mailbox, Reporter, SlaveInfo, StatusStore, SwitchThrottle,
};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

use super::{change_master_sql, RoleSetter, RouteQuerier, SlaveChecker};
use crate::config::MysqlConfig;
use crate::errors::GmError;
use crate::mysql::MasterStatus;

/// Queue status values written by the switch service
pub mod queue_status {
    pub const DOING: &str = "doing";
    pub const DONE: &str = "done";
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwitchOutcome {
    /// A replica was promoted and every sibling follows it
    Switched {
        switch_id: i64,
        new_master: String,
        coordinates: MasterStatus,
    },
    /// A spider node was taken out of the routing table
    RouteRemoved { switch_id: i64, primary: String },
    /// Nothing to do for this instance
    Skipped { reason: String },
}

impl SwitchOutcome {
    fn summary(&self) -> String {
        match self {
            SwitchOutcome::Switched {
                new_master,
                coordinates,
                ..
            } => format!(
                "switch to new master {} success, binlog_file:{}, binlog_pos:{}",
                new_master, coordinates.file, coordinates.position
            ),
            SwitchOutcome::RouteRemoved { primary, .. } => {
                format!("remove route through primary {} success", primary)
            }
            SwitchOutcome::Skipped { reason } => reason.clone(),
        }
    }
}

/// Runs one failover from a confirmed failure report to the audit record
pub struct SwitchService {
    store: Arc<dyn StatusStore>,
    throttle: SwitchThrottle,
    reporter: Reporter,
    checker: Arc<dyn SlaveChecker>,
    setter: Arc<dyn RoleSetter>,
    router: Arc<dyn RouteQuerier>,
    repl_user: String,
    repl_password: String,
    cloud_id: i64,
}

impl SwitchService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<dyn StatusStore>,
        throttle: SwitchThrottle,
        reporter: Reporter,
        checker: Arc<dyn SlaveChecker>,
        setter: Arc<dyn RoleSetter>,
        router: Arc<dyn RouteQuerier>,
        mysql: &MysqlConfig,
        cloud_id: i64,
    ) -> Self {
        Self {
            store,
            throttle,
            reporter,
            checker,
            setter,
            router,
            repl_user: mysql.repl_user.clone(),
            repl_password: mysql.repl_password.clone(),
            cloud_id,
        }
    }

    fn progress(&self, broken: &InstanceInfo, comment: String) {
        self.reporter.log(&broken.app, &broken.ip, broken.port, comment);
    }

    /// Drain the switch queue one report at a time until it is closed
    pub async fn run(&self, queue: Mailbox<FailureReport>) {
        info!("Switch loop started");
        while let Some(report) = queue.recv().await {
            let addr = report.instance.addr();
            match self.handle_failure(&report).await {
                Ok(outcome) => info!("switch for {} finished: {}", addr, outcome.summary()),
                Err(e) if e.is_expected() => info!("switch for {} not run: {}", addr, e),
                Err(e) if e.is_fatal() => error!("switch for {} needs an operator: {}", addr, e),
                Err(e) => warn!("switch for {} failed: {}", addr, e),
            }
        }
        info!("Switch loop stopped");
    }

    /// Throttle, queue, switch, then write exactly one switch log row.
    ///
    /// A throttled switch returns [`GmError::Throttled`] before anything is written.
    #[instrument(skip(self, report), fields(broken = %report.instance.addr()))]
    pub async fn handle_failure(&self, report: &FailureReport) -> Result<SwitchOutcome, GmError> {
        let broken = &report.instance;
        if broken.role == InstanceRole::Slave {
            let reason = format!("{} is a slave, no switch needed", broken.addr());
            info!("{}", reason);
            return Ok(SwitchOutcome::Skipped { reason });
        }

        let decision = self.throttle.check(&broken.ip, broken.port, broken.idc).await?;
        if !decision.is_allowed() {
            self.progress(broken, format!("switch rejected: {}", decision));
            return Err(GmError::Throttled(decision));
        }

        let switch_id = self
            .store
            .insert_switch_queue(&SwitchQueueEntry {
                app: Some(broken.app.clone()),
                ip: Some(broken.ip.clone()),
                port: Some(broken.port),
                idc: Some(broken.idc),
                confirm_check_time: Some(report.detected_at),
                cluster: Some(broken.cluster.clone()),
                db_type: Some(broken.db_type.clone()),
                status: Some(queue_status::DOING.to_string()),
                cloud_id: Some(self.cloud_id),
                ..Default::default()
            })
            .await?;
        info!("switch {} queued for {}: {}", switch_id, broken.addr(), report.reason);

        let result = match broken.role {
            InstanceRole::Spider => self.remove_spider(switch_id, broken).await,
            _ => self.switch_master(switch_id, broken).await,
        };

        self.finish(switch_id, broken, &result).await;
        result
    }

    async fn finish(
        &self,
        switch_id: i64,
        broken: &InstanceInfo,
        result: &Result<SwitchOutcome, GmError>,
    ) {
        let (switch_result, comment) = match result {
            Ok(outcome) => (SwitchResult::Success, outcome.summary()),
            Err(e) => {
                error!("switch {} for {} failed: {}", switch_id, broken.addr(), e);
                (SwitchResult::Failed, e.to_string())
            }
        };
        let finished = Local::now();

        let log = SwitchLogEntry {
            switch_id,
            app: broken.app.clone(),
            ip: broken.ip.clone(),
            port: broken.port,
            result: switch_result,
            comment,
            finish_time: finished,
        };
        self.record_switch_log(broken, &log).await;

        let (slave_ip, slave_port) = match result {
            Ok(SwitchOutcome::Switched { new_master, .. }) => broken
                .slaves
                .iter()
                .find(|slave| slave_addr(slave) == *new_master)
                .map(|slave| (Some(slave.ip.clone()), Some(slave.port)))
                .unwrap_or((None, None)),
            _ => (None, None),
        };
        let update = SwitchQueueEntry {
            slave_ip,
            slave_port,
            status: Some(queue_status::DONE.to_string()),
            switch_result: Some(switch_result.as_str().to_string()),
            switch_finished_time: Some(finished),
            ..Default::default()
        };
        if let Err(e) = self.store.update_switch_queue(switch_id, &update).await {
            warn!("update switch queue {} failed: {}", switch_id, e);
        }
    }

    /// One retry, then the outcome goes to the report log so it still reaches the store
    async fn record_switch_log(&self, broken: &InstanceInfo, log: &SwitchLogEntry) {
        let first = match self.store.insert_switch_log(log).await {
            Ok(()) => return,
            Err(e) => e,
        };
        warn!(
            "insert switch log for switch {} failed, retrying: {}",
            log.switch_id, first
        );
        let e = match self.store.insert_switch_log(log).await {
            Ok(()) => return,
            Err(e) => e,
        };
        error!("insert switch log for switch {} failed: {}", log.switch_id, e);

        let comment = format!(
            "switch {} finished {} but switch log was not written ({}): {}",
            log.switch_id,
            log.result.as_str(),
            e,
            log.comment
        );
        if let Err(e) = self
            .reporter
            .checkpoint(&broken.app, &broken.ip, broken.port, comment)
            .await
        {
            error!(
                "switch {} result lost: switch log and report log both failed: {}",
                log.switch_id, e
            );
        }
    }

    async fn switch_master(
        &self,
        switch_id: i64,
        broken: &InstanceInfo,
    ) -> Result<SwitchOutcome, GmError> {
        let standby = broken.standby_slave().ok_or_else(|| {
            GmError::precondition("choose standby", format!("{} has no slave", broken.addr()))
        })?;
        self.progress(
            broken,
            format!("try to switch to standby slave[{}]", slave_addr(standby)),
        );

        self.checker.check_slave(broken, standby).await?;
        self.progress(broken, format!("slave[{}] is eligible", slave_addr(standby)));

        let coordinates = self
            .setter
            .promote(broken, &standby.ip, standby.port)
            .await?;

        self.reporter
            .checkpoint(
                &broken.app,
                &broken.ip,
                broken.port,
                format!(
                    "switch {}: new master {} binlog_file:{}, binlog_pos:{}",
                    switch_id,
                    slave_addr(standby),
                    coordinates.file,
                    coordinates.position
                ),
            )
            .await
            .map_err(|e| GmError::switch("record coordinates", &slave_addr(standby), e))?;

        let change_sql = change_master_sql(
            &standby.ip,
            standby.port,
            &self.repl_user,
            &self.repl_password,
            &coordinates,
        );
        let mut failed = Vec::new();
        for sibling in broken.slaves.iter().filter(|slave| *slave != standby) {
            if let Err(e) = self
                .setter
                .repoint(broken, &sibling.ip, sibling.port, &change_sql)
                .await
            {
                self.progress(
                    broken,
                    format!("change master on {} failed: {}", slave_addr(sibling), e),
                );
                failed.push(format!("{}({})", slave_addr(sibling), e));
            }
        }

        if !broken.spider_nodes.is_empty() {
            let election = self.router.elect_primary(broken, &broken.spider_nodes).await?;
            self.router
                .repoint_route(
                    &election,
                    (&broken.ip, broken.port),
                    (&standby.ip, standby.port),
                )
                .await?;
            self.progress(
                broken,
                format!(
                    "route repointed to {} through primary {}",
                    slave_addr(standby),
                    election.primary.server_name
                ),
            );
        }

        if !failed.is_empty() {
            return Err(GmError::switch(
                "change master on slaves",
                &broken.addr(),
                failed.join("; "),
            ));
        }

        Ok(SwitchOutcome::Switched {
            switch_id,
            new_master: slave_addr(standby),
            coordinates,
        })
    }

    async fn remove_spider(
        &self,
        switch_id: i64,
        broken: &InstanceInfo,
    ) -> Result<SwitchOutcome, GmError> {
        let candidates: Vec<_> = broken
            .spider_nodes
            .iter()
            .filter(|node| !(node.ip == broken.ip && node.port == broken.port))
            .cloned()
            .collect();

        let election = self.router.elect_primary(broken, &candidates).await?;
        self.router
            .remove_route(&election, &broken.ip, broken.port)
            .await?;
        self.progress(
            broken,
            format!(
                "route of {} removed through primary {}",
                broken.addr(),
                election.primary.server_name
            ),
        );

        Ok(SwitchOutcome::RouteRemoved {
            switch_id,
            primary: election.primary.server_name,
        })
    }
}

fn slave_addr(slave: &SlaveInfo) -> String {
    format!("{}:{}", slave.ip, slave.port)
}
