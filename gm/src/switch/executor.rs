use ha_common::{InstanceInfo, Reporter};
use std::sync::Arc;
use tracing::{info, instrument};

use crate::constants::{quote_literal, sql};
use crate::errors::GmError;
use crate::mysql::{InstanceConnector, MasterStatus};

/// Stage names carried by switch errors
pub mod stage {
    pub const CONNECT: &str = "connect";
    pub const STOP_SLAVE: &str = "stop slave";
    pub const SHOW_MASTER_STATUS: &str = "show master status";
    pub const RESET_SLAVE: &str = "reset slave";
    pub const SHOW_SLAVE_STATUS: &str = "show slave status";
    pub const CHANGE_MASTER: &str = "change master";
    pub const START_SLAVE: &str = "start slave";
}

/// Build the statement that points a sibling at the new master
pub fn change_master_sql(
    master_host: &str,
    master_port: u16,
    repl_user: &str,
    repl_password: &str,
    coordinates: &MasterStatus,
) -> String {
    format!(
        "CHANGE MASTER TO MASTER_HOST='{}', MASTER_PORT={}, MASTER_USER='{}', \
         MASTER_PASSWORD='{}', MASTER_LOG_FILE='{}', MASTER_LOG_POS={}",
        quote_literal(master_host),
        master_port,
        quote_literal(repl_user),
        quote_literal(repl_password),
        quote_literal(&coordinates.file),
        coordinates.position
    )
}

/// Ordered role-change sequences on one replica.
///
/// No step is retried: after `stop slave` the replica's replication state is
/// no longer what it was, so a failure is surfaced as it happened.
pub struct SwitchExecutor {
    connector: Arc<dyn InstanceConnector>,
    reporter: Reporter,
}

impl SwitchExecutor {
    pub fn new(connector: Arc<dyn InstanceConnector>, reporter: Reporter) -> Self {
        Self {
            connector,
            reporter,
        }
    }

    fn progress(&self, broken: &InstanceInfo, comment: String) {
        self.reporter.log(&broken.app, &broken.ip, broken.port, comment);
    }

    /// Stop replication on the replica, capture its own binlog coordinates
    /// and clear its slave configuration. Coordinates are only returned when
    /// every step succeeded.
    #[instrument(skip(self, broken), fields(broken = %broken.addr()))]
    pub async fn reset_slave_extend(
        &self,
        broken: &InstanceInfo,
        host: &str,
        port: u16,
    ) -> Result<MasterStatus, GmError> {
        let target = format!("{}:{}", host, port);
        info!("gonna RESET SLAVE on {}", target);

        let mut session = self
            .connector
            .connect(host, port)
            .await
            .map_err(|e| GmError::switch(stage::CONNECT, &target, e))?;

        session
            .execute(sql::STOP_SLAVE)
            .await
            .map_err(|e| GmError::switch(stage::STOP_SLAVE, &target, e))?;
        info!("execute {} success", sql::STOP_SLAVE);

        let master_status = session
            .master_status()
            .await
            .map_err(|e| GmError::switch(stage::SHOW_MASTER_STATUS, &target, e))?;
        self.progress(
            broken,
            format!(
                "get new master binlog info succeed. binlog_file:{}, binlog_pos:{}",
                master_status.file, master_status.position
            ),
        );

        session
            .execute(sql::RESET_SLAVE_ALL)
            .await
            .map_err(|e| GmError::switch(stage::RESET_SLAVE, &target, e))?;
        info!("executed {} on {} successed", sql::RESET_SLAVE_ALL, target);

        Ok(master_status)
    }

    /// Stop replication, record the pre-change coordinates, run the supplied
    /// `CHANGE MASTER TO` statement and restart replication
    #[instrument(skip(self, broken, change_sql), fields(broken = %broken.addr()))]
    pub async fn change_master_auto(
        &self,
        broken: &InstanceInfo,
        host: &str,
        port: u16,
        change_sql: &str,
    ) -> Result<(), GmError> {
        let target = format!("{}:{}", host, port);
        self.progress(broken, format!("try to connect node:{}", target));

        let mut session = self
            .connector
            .connect(host, port)
            .await
            .map_err(|e| GmError::switch(stage::CONNECT, &target, e))?;

        self.progress(broken, format!("node:{} do stop slave", target));
        session
            .execute(sql::STOP_SLAVE)
            .await
            .map_err(|e| GmError::switch(stage::STOP_SLAVE, &target, e))?;
        self.progress(broken, format!("node:{} do stop slave success", target));

        let before = session
            .slave_status()
            .await
            .map_err(|e| GmError::switch(stage::SHOW_SLAVE_STATUS, &target, e))?;
        self.progress(
            broken,
            format!(
                "before change to new master, binlog_file:{}, binlog_pos:{}",
                before.relay_master_log_file, before.exec_master_log_pos
            ),
        );

        session
            .execute(change_sql)
            .await
            .map_err(|e| GmError::switch(stage::CHANGE_MASTER, &target, e))?;
        self.progress(broken, format!("node:{} do CHANGE SQL success", target));

        session
            .execute(sql::START_SLAVE)
            .await
            .map_err(|e| GmError::switch(stage::START_SLAVE, &target, e))?;
        self.progress(
            broken,
            format!("node:{} execute START SLAVE success", target),
        );

        Ok(())
    }
}
