use ha_common::hadb::types::shield_type;
use ha_common::instance::status;
use ha_common::{InstanceInfo, Reporter, SlaveInfo, StatusStore};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::config::GcmConfig;
use crate::constants::{sql, SYSTEM_DATABASES};
use crate::errors::GmError;
use crate::mysql::{BinlogStatus, DelayInfo, InstanceConnector, InstanceSession};

/// Stage names carried by eligibility errors
pub mod stage {
    pub const SHIELD: &str = "get shield config";
    pub const SLAVE_SLOW: &str = "check slave slow";
    pub const SLAVE_DELAY: &str = "get slave delay";
    pub const USEFUL_DATABASE: &str = "find useful database";
    pub const CHECKSUM: &str = "check slave checksum";
    pub const DELAY_RANGE: &str = "check slave delay";
}

/// Operator overrides that apply to one candidate
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShieldOverrides {
    pub ignore_checksum: bool,
    pub ignore_slave_delay: bool,
}

/// Decides whether a replica may be promoted in place of a broken master
pub struct SlaveHealthChecker {
    connector: Arc<dyn InstanceConnector>,
    store: Arc<dyn StatusStore>,
    reporter: Reporter,
    gcm: GcmConfig,
}

impl SlaveHealthChecker {
    pub fn new(
        connector: Arc<dyn InstanceConnector>,
        store: Arc<dyn StatusStore>,
        reporter: Reporter,
        gcm: GcmConfig,
    ) -> Self {
        Self {
            connector,
            store,
            reporter,
            gcm,
        }
    }

    async fn connect(&self, candidate: &SlaveInfo) -> Result<Box<dyn InstanceSession>, GmError> {
        self.connector.connect(&candidate.ip, candidate.port).await
    }

    fn progress(&self, broken: &InstanceInfo, comment: String) {
        self.reporter.log(&broken.app, &broken.ip, broken.port, comment);
    }

    pub async fn load_shield(&self, broken: &InstanceInfo) -> Result<ShieldOverrides, GmError> {
        let shields = self
            .store
            .get_shield_config(&broken.app, &broken.ip, shield_type::CHECK)
            .await
            .map_err(|e| GmError::precondition(stage::SHIELD, e.to_string()))?;

        Ok(shields
            .get(&broken.ip)
            .map(|shield| ShieldOverrides {
                ignore_checksum: shield.ignore_checksum,
                ignore_slave_delay: shield.ignore_slave_delay,
            })
            .unwrap_or_default())
    }

    /// Verify the candidate replicates from `broken` and wait, bounded, for
    /// its SQL thread to catch up with what its IO thread has read.
    ///
    /// With `ignore_delay` only the master pointer is verified.
    pub async fn check_slave_slow(
        &self,
        broken: &InstanceInfo,
        candidate: &SlaveInfo,
        ignore_delay: bool,
    ) -> Result<(), GmError> {
        let mut session = self.connect(candidate).await?;

        let binlog_size_mb = session.max_binlog_size().await? / (1024 * 1024);
        info!("the slave max_binlog_size value is {}M", binlog_size_mb);

        let mut binlog = BinlogStatus::from_slave_status(&session.slave_status().await?)?;
        debug!(
            "Relay_Master_Log_File_Index:{}, Exec_Master_Log_Pos:{}",
            binlog.relay_master_log_file_index, binlog.exec_master_log_pos
        );

        if binlog.master_host != broken.ip || binlog.master_port != broken.port {
            return Err(GmError::precondition(
                stage::SLAVE_SLOW,
                format!(
                    "slave status's master info[{}#{}] not equal broken-down instance[{}#{}]",
                    binlog.master_host, binlog.master_port, broken.ip, broken.port
                ),
            ));
        }

        if ignore_delay {
            info!("ignore delay check configured, skip check replication delay");
            return Ok(());
        }

        let allowed = self.gcm.exec_slow_kbytes;
        let mut exec_slow = binlog.exec_slow_kbytes(binlog_size_mb);
        if exec_slow > allowed {
            self.progress(
                broken,
                format!(
                    "slave delay kbytes[{}] large than allowed[{}],try to loop wait",
                    exec_slow, allowed
                ),
            );

            let mut caught_up = false;
            for attempt in 0..self.gcm.slow_wait_loops {
                tokio::time::sleep(Duration::from_secs(self.gcm.slow_wait_interval_seconds)).await;
                binlog = BinlogStatus::from_slave_status(&session.slave_status().await?)?;
                exec_slow = binlog.exec_slow_kbytes(binlog_size_mb);
                if exec_slow <= allowed {
                    caught_up = true;
                    break;
                }
                warn!(
                    "loop[{}], slave slower too much: Execute {}K, allowed {}K",
                    attempt, exec_slow, allowed
                );
            }

            if !caught_up {
                return Err(GmError::precondition(
                    stage::SLAVE_SLOW,
                    format!(
                        "slave still slower than allowed after {} waits: Execute {}K > {}K",
                        self.gcm.slow_wait_loops, exec_slow, allowed
                    ),
                ));
            }
        }

        self.progress(
            broken,
            format!(
                "check slave[{}:{}] status success",
                candidate.ip, candidate.port
            ),
        );
        Ok(())
    }

    /// SQL-thread and IO-thread lag, keyed by the candidate's master server id
    pub async fn get_slave_delay(&self, candidate: &SlaveInfo) -> Result<DelayInfo, GmError> {
        let mut session = self.connect(candidate).await?;
        let status = session.slave_status().await?;
        debug!("slave status info:{:?}", status);
        session.delay_info(status.master_server_id).await
    }

    /// True when any database outside the system set exists
    pub async fn find_useful_database(&self, candidate: &SlaveInfo) -> Result<bool, GmError> {
        let mut session = self.connect(candidate).await?;
        let databases = session.databases().await?;

        let useful = databases
            .iter()
            .any(|db| !SYSTEM_DATABASES.contains(&db.as_str()));
        if !useful {
            info!("no user-created database found on {}", session.target());
        }
        Ok(useful)
    }

    /// Returns `(checked tables, failed tables)`
    pub async fn get_slave_checksum(&self, candidate: &SlaveInfo) -> Result<(i64, i64), GmError> {
        let mut session = self.connect(candidate).await?;
        let done = session.count(sql::CHECKSUM_COUNT).await?;
        let failed = session.count(sql::CHECKSUM_FAIL_COUNT).await?;
        Ok((done, failed))
    }

    /// Fail-fast promotion check; `Ok(())` means eligible
    #[instrument(skip(self, broken, candidate), fields(broken = %broken.addr(), candidate = %candidate.ip))]
    pub async fn check_promotion_eligible(
        &self,
        broken: &InstanceInfo,
        candidate: &SlaveInfo,
    ) -> Result<(), GmError> {
        let shield = self.load_shield(broken).await?;
        if shield != ShieldOverrides::default() {
            self.progress(
                broken,
                format!(
                    "shield configured: ignore_checksum={}, ignore_slave_delay={}",
                    shield.ignore_checksum, shield.ignore_slave_delay
                ),
            );
        }

        self.progress(broken, "try to check slave status info.".to_string());
        self.check_slave_slow(broken, candidate, shield.ignore_slave_delay)
            .await
            .map_err(|e| e.at_stage(stage::SLAVE_SLOW))?;

        let mut delay = if shield.ignore_slave_delay {
            DelayInfo::default()
        } else {
            self.get_slave_delay(candidate)
                .await
                .map_err(|e| e.at_stage(stage::SLAVE_DELAY))?
        };

        let useful = self
            .find_useful_database(candidate)
            .await
            .map_err(|e| e.at_stage(stage::USEFUL_DATABASE))?;
        if !useful {
            self.progress(
                broken,
                "none user-created database, skip check checksum".to_string(),
            );
            return Ok(());
        }

        self.progress(broken, "try to check slave checksum info.".to_string());
        let (checksum_done, checksum_failed) = if broken.status == status::AVAILABLE {
            delay = DelayInfo::default();
            self.progress(
                broken,
                "instance is available, skip check delay and checksum".to_string(),
            );
            (1, 0)
        } else if shield.ignore_checksum {
            (1, 0)
        } else {
            self.get_slave_checksum(candidate)
                .await
                .map_err(|e| e.at_stage(stage::CHECKSUM))?
        };

        self.progress(
            broken,
            format!(
                "checksumCnt:{}, checksumFail:{}, slaveDelay:{}, timeDelay:{}",
                checksum_done, checksum_failed, delay.slave_delay, delay.time_delay
            ),
        );

        if checksum_done == 0 {
            return Err(GmError::precondition(
                stage::CHECKSUM,
                "none checksum done on this db",
            ));
        }

        let max_offset = self.gcm.allowed_checksum_max_offset;
        if checksum_failed > max_offset {
            return Err(GmError::precondition(
                stage::CHECKSUM,
                format!(
                    "too many fail on tables checksum({} > {})",
                    checksum_failed, max_offset
                ),
            ));
        }
        self.progress(
            broken,
            format!(
                "checksum failedCnt[{}] in allowed range[{}]",
                checksum_failed, max_offset
            ),
        );

        let slave_delay_max = self.gcm.allowed_slave_delay_max;
        if delay.slave_delay > slave_delay_max {
            return Err(GmError::precondition(
                stage::DELAY_RANGE,
                format!(
                    "SQL_Thread delay on slave too large than allowed range({} > {})",
                    delay.slave_delay, slave_delay_max
                ),
            ));
        }

        let time_delay_max = self.gcm.allowed_time_delay_max;
        if delay.time_delay > time_delay_max {
            return Err(GmError::precondition(
                stage::DELAY_RANGE,
                format!(
                    "heartbeat delay on slave too large than master({} > {})",
                    delay.time_delay, time_delay_max
                ),
            ));
        }

        self.progress(
            broken,
            format!(
                "SQL_Thread delay [{}] and IO_Thread delay [{}] in allowed range[{}, {}]",
                delay.slave_delay, delay.time_delay, slave_delay_max, time_delay_max
            ),
        );
        Ok(())
    }
}
