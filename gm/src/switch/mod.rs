//! Switch capabilities and their MySQL / spider implementations
//!
//! The switch service only depends on three small capabilities:
//!
//! - [`SlaveChecker`]: may this replica be promoted?
//! - [`RoleSetter`]: promote a replica, repoint a sibling.
//! - [`RouteQuerier`]: elect the control-node primary and edit routes through it.
//!
//! [`MysqlSwitch`] provides the first two for master/slave pairs;
//! [`SpiderSwitch`] provides route handling for sharded clusters.

pub mod executor;
pub mod service;

pub use executor::{change_master_sql, SwitchExecutor};
pub use service::{SwitchOutcome, SwitchService};

use async_trait::async_trait;
use ha_common::{InstanceInfo, SlaveInfo, SpiderNode};
use std::sync::Arc;

use crate::errors::GmError;
use crate::health::SlaveHealthChecker;
use crate::mysql::{InstanceConnector, InstanceSession, MasterStatus};
use crate::spider::{PrimaryElection, SpiderPrimaryElector};

#[async_trait]
pub trait SlaveChecker: Send + Sync {
    async fn check_slave(&self, broken: &InstanceInfo, candidate: &SlaveInfo) -> Result<(), GmError>;
}

#[async_trait]
pub trait RoleSetter: Send + Sync {
    /// Turn the replica into a master and return its binlog coordinates
    async fn promote(&self, broken: &InstanceInfo, host: &str, port: u16)
        -> Result<MasterStatus, GmError>;

    async fn repoint(
        &self,
        broken: &InstanceInfo,
        host: &str,
        port: u16,
        change_sql: &str,
    ) -> Result<(), GmError>;
}

#[async_trait]
pub trait RouteQuerier: Send + Sync {
    async fn elect_primary(
        &self,
        broken: &InstanceInfo,
        candidates: &[SpiderNode],
    ) -> Result<PrimaryElection, GmError>;

    /// Drop the route of `host:port` and flush routing
    async fn remove_route(
        &self,
        election: &PrimaryElection,
        host: &str,
        port: u16,
    ) -> Result<(), GmError>;

    /// Move the route of `old` to `new` and flush routing
    async fn repoint_route(
        &self,
        election: &PrimaryElection,
        old: (&str, u16),
        new: (&str, u16),
    ) -> Result<(), GmError>;
}

/// Master/slave switch: health checks plus role changes
pub struct MysqlSwitch {
    checker: SlaveHealthChecker,
    executor: SwitchExecutor,
}

impl MysqlSwitch {
    pub fn new(checker: SlaveHealthChecker, executor: SwitchExecutor) -> Self {
        Self { checker, executor }
    }
}

#[async_trait]
impl SlaveChecker for MysqlSwitch {
    async fn check_slave(&self, broken: &InstanceInfo, candidate: &SlaveInfo) -> Result<(), GmError> {
        self.checker.check_promotion_eligible(broken, candidate).await
    }
}

#[async_trait]
impl RoleSetter for MysqlSwitch {
    async fn promote(
        &self,
        broken: &InstanceInfo,
        host: &str,
        port: u16,
    ) -> Result<MasterStatus, GmError> {
        self.executor.reset_slave_extend(broken, host, port).await
    }

    async fn repoint(
        &self,
        broken: &InstanceInfo,
        host: &str,
        port: u16,
        change_sql: &str,
    ) -> Result<(), GmError> {
        self.executor
            .change_master_auto(broken, host, port, change_sql)
            .await
    }
}

/// Sharded-cluster route handling through the primary control node
pub struct SpiderSwitch {
    connector: Arc<dyn InstanceConnector>,
    elector: SpiderPrimaryElector,
}

impl SpiderSwitch {
    pub fn new(connector: Arc<dyn InstanceConnector>, elector: SpiderPrimaryElector) -> Self {
        Self { connector, elector }
    }

    async fn connect_primary(
        &self,
        election: &PrimaryElection,
    ) -> Result<Box<dyn InstanceSession>, GmError> {
        if election.self_is_primary {
            return Err(GmError::precondition(
                "connect primary",
                format!(
                    "primary control node {} is on the broken host, promote a secondary manually",
                    election.primary.server_name
                ),
            ));
        }
        self.connector
            .connect(&election.primary.host, election.primary.port)
            .await
    }
}

#[async_trait]
impl RouteQuerier for SpiderSwitch {
    async fn elect_primary(
        &self,
        broken: &InstanceInfo,
        candidates: &[SpiderNode],
    ) -> Result<PrimaryElection, GmError> {
        self.elector.elect_primary(broken, candidates).await
    }

    async fn remove_route(
        &self,
        election: &PrimaryElection,
        host: &str,
        port: u16,
    ) -> Result<(), GmError> {
        let mut primary = self.connect_primary(election).await?;
        self.elector
            .remove_node_from_route(primary.as_mut(), host, port)
            .await?;
        self.elector.flush_routing(primary.as_mut()).await
    }

    async fn repoint_route(
        &self,
        election: &PrimaryElection,
        old: (&str, u16),
        new: (&str, u16),
    ) -> Result<(), GmError> {
        let mut primary = self.connect_primary(election).await?;
        self.elector
            .repoint_node_route(primary.as_mut(), old, new)
            .await?;
        self.elector.flush_routing(primary.as_mut()).await
    }
}
