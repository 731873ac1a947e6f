use ha_common::{InstanceInfo, Reporter, SpiderNode};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::constants::tdbctl;
use crate::errors::GmError;
use crate::mysql::{InstanceConnector, InstanceSession, RouteInfo, TdbctlNode};

/// Control node chosen as primary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TdbctlInfo {
    pub server_name: String,
    pub host: String,
    pub port: u16,
}

/// Outcome of one election over one consistent node table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrimaryElection {
    pub primary: TdbctlInfo,
    /// Primary was inferred from secondaries and lives on the broken host
    pub self_is_primary: bool,
    /// Primary was inferred rather than self-reported
    pub inferred: bool,
    /// Fewer than half of the roster reported Online
    pub minority_view: bool,
    /// Control node whose table was used
    pub source: String,
}

/// Elects the live primary control node of a sharded cluster
pub struct SpiderPrimaryElector {
    connector: Arc<dyn InstanceConnector>,
    reporter: Reporter,
}

impl SpiderPrimaryElector {
    pub fn new(connector: Arc<dyn InstanceConnector>, reporter: Reporter) -> Self {
        Self {
            connector,
            reporter,
        }
    }

    fn progress(&self, broken: &InstanceInfo, comment: String) {
        self.reporter.log(&broken.app, &broken.ip, broken.port, comment);
    }

    /// Walk the candidates in order and elect from the first node table read.
    ///
    /// Unreachable candidates are skipped; split brain and disagreeing
    /// replication pointers fail immediately.
    #[instrument(skip(self, broken, candidates), fields(broken = %broken.addr()))]
    pub async fn elect_primary(
        &self,
        broken: &InstanceInfo,
        candidates: &[SpiderNode],
    ) -> Result<PrimaryElection, GmError> {
        for spider in candidates.iter().filter(|spider| spider.is_control_candidate()) {
            let target = format!("{}#{}", spider.ip, spider.admin_port);
            self.progress(broken, format!("try to connect tdbctl[{}] and get primary", target));

            let mut session = match self.connector.connect(&spider.ip, spider.admin_port).await {
                Ok(session) => session,
                Err(e) => {
                    self.progress(
                        broken,
                        format!("connect tdbctl[{}] failed:{}, retry others", target, e),
                    );
                    continue;
                }
            };
            self.progress(broken, format!("connect tdbctl[{}] success", target));

            let nodes = match self.query_nodes_info(session.as_mut()).await {
                Ok(nodes) => nodes,
                Err(e) => {
                    self.progress(
                        broken,
                        format!("get all tdbctl node info from {} failed:{}, try other nodes", target, e),
                    );
                    continue;
                }
            };

            let election = classify_nodes(&broken.ip, &nodes, &target)?;
            if election.minority_view {
                warn!(
                    "only a minority of {} control nodes is Online in the view of {}, primary {} needs operator review",
                    nodes.len(),
                    target,
                    election.primary.server_name
                );
                self.progress(
                    broken,
                    format!(
                        "minority view: fewer than half of {} control nodes online, verify primary {} manually",
                        nodes.len(),
                        election.primary.server_name
                    ),
                );
            }
            if election.self_is_primary {
                self.progress(broken, "current broken-down node is primary".to_string());
            }
            self.progress(
                broken,
                format!(
                    "get primary node[{}#{}] success",
                    election.primary.host, election.primary.port
                ),
            );
            return Ok(election);
        }

        Err(GmError::precondition("elect primary", "no primary node found"))
    }

    /// Node table keyed by server name; an empty table is an error
    pub async fn query_nodes_info(
        &self,
        session: &mut dyn InstanceSession,
    ) -> Result<HashMap<String, TdbctlNode>, GmError> {
        let nodes: HashMap<String, TdbctlNode> = session
            .tdbctl_nodes()
            .await?
            .into_iter()
            .map(|node| (node.server_name.clone(), node))
            .collect();

        if nodes.is_empty() {
            return Err(GmError::query(
                session.target(),
                tdbctl::GET_NODES,
                "no node info found",
            ));
        }
        debug!("node info:{:?}", nodes);
        Ok(nodes)
    }

    /// Routing table of a control node; an empty table is an error
    pub async fn query_route_info(
        &self,
        session: &mut dyn InstanceSession,
    ) -> Result<Vec<RouteInfo>, GmError> {
        let routes = session.route_table().await?;
        if routes.is_empty() {
            return Err(GmError::query(
                session.target(),
                tdbctl::GET_ROUTE,
                "no route info found",
            ));
        }
        Ok(routes)
    }

    /// Drop the route of `host:port` through the primary control node.
    ///
    /// A missing route means it is already gone. An affected-row count other
    /// than one is only logged: control nodes do not report it reliably.
    pub async fn remove_node_from_route(
        &self,
        primary: &mut dyn InstanceSession,
        host: &str,
        port: u16,
    ) -> Result<(), GmError> {
        let routes = self.query_route_info(primary).await?;
        let Some(route) = get_node_route(&routes, host, port) else {
            warn!("no route info found for instance[{}#{}]", host, port);
            return Ok(());
        };

        let statement = tdbctl::drop_node(&route.server_name);
        let affected = primary.execute(&statement).await?;
        if affected != 1 {
            warn!("execute[{}] rowsAffected num:{}", statement, affected);
        }
        info!("removed route {} of {}#{}", route.server_name, host, port);
        Ok(())
    }

    /// Point the route of `old` at `new`, keeping the route's credentials
    pub async fn repoint_node_route(
        &self,
        primary: &mut dyn InstanceSession,
        old: (&str, u16),
        new: (&str, u16),
    ) -> Result<(), GmError> {
        let routes = self.query_route_info(primary).await?;
        let route = get_node_route(&routes, old.0, old.1).ok_or_else(|| {
            GmError::inconsistency(format!("no route info found for instance[{}#{}]", old.0, old.1))
        })?;

        let statement = tdbctl::alter_node(
            &route.server_name,
            new.0,
            &route.username,
            &route.password,
            new.1,
        );
        primary.execute(&statement).await?;
        info!(
            "route {} moved from {}#{} to {}#{}",
            route.server_name, old.0, old.1, new.0, new.1
        );
        Ok(())
    }

    pub async fn flush_routing(&self, primary: &mut dyn InstanceSession) -> Result<(), GmError> {
        primary.execute(tdbctl::FLUSH_ROUTING_FORCE).await?;
        Ok(())
    }
}

pub fn get_node_route<'a>(routes: &'a [RouteInfo], host: &str, port: u16) -> Option<&'a RouteInfo> {
    routes
        .iter()
        .find(|route| route.host == host && route.port == port)
}

/// Elect a primary from one node table.
///
/// Exactly one node may report Online primary. Otherwise all secondaries
/// must agree on one replication master, which is then taken as the primary.
pub fn classify_nodes(
    broken_host: &str,
    nodes: &HashMap<String, TdbctlNode>,
    source: &str,
) -> Result<PrimaryElection, GmError> {
    // stable order so split-brain messages are reproducible
    let ordered: BTreeMap<&String, &TdbctlNode> = nodes.iter().collect();

    let mut primary: Option<&TdbctlNode> = None;
    let mut replication_master: Option<&str> = None;

    for node in ordered.values().copied() {
        let online = node.status.eq_ignore_ascii_case(tdbctl::STATUS_ONLINE);

        if online && node.cluster_role.eq_ignore_ascii_case(tdbctl::ROLE_PRIMARY) {
            if let Some(existing) = primary {
                return Err(GmError::inconsistency(format!(
                    "multi primary node [{}#{}] and [{}#{}] found",
                    existing.host, existing.port, node.host, node.port
                )));
            }
            if node.host == broken_host {
                return Err(GmError::precondition(
                    "elect primary",
                    format!(
                        "broken-down node is primary, but its status is {}",
                        tdbctl::STATUS_ONLINE
                    ),
                ));
            }
            primary = Some(node);
        }

        if node.cluster_role.eq_ignore_ascii_case(tdbctl::ROLE_SECONDARY) {
            if node.replication_master.is_empty() {
                warn!("secondary {} has no replication master", node.server_name);
                continue;
            }
            match replication_master {
                None => replication_master = Some(node.replication_master.as_str()),
                Some(existing) if existing != node.replication_master => {
                    return Err(GmError::inconsistency(format!(
                        "multi ReplicationMaster found[{},{}]",
                        existing, node.replication_master
                    )));
                }
                Some(_) => {}
            }
        }
    }

    let online = nodes
        .values()
        .filter(|node| node.status.eq_ignore_ascii_case(tdbctl::STATUS_ONLINE))
        .count();
    let minority_view = online * 2 < nodes.len();

    if let Some(node) = primary {
        return Ok(PrimaryElection {
            primary: tdbctl_info(node),
            self_is_primary: false,
            inferred: false,
            minority_view,
            source: source.to_string(),
        });
    }

    let Some(server_name) = replication_master else {
        return Err(GmError::precondition("elect primary", "no primary node found"));
    };

    let node = nodes.get(server_name).ok_or_else(|| {
        GmError::inconsistency(format!(
            "replication master {} is not in the node table",
            server_name
        ))
    })?;
    info!("primary node's server name is {}", server_name);

    Ok(PrimaryElection {
        primary: tdbctl_info(node),
        self_is_primary: node.host == broken_host,
        inferred: true,
        minority_view,
        source: source.to_string(),
    })
}

fn tdbctl_info(node: &TdbctlNode) -> TdbctlInfo {
    TdbctlInfo {
        server_name: node.server_name.clone(),
        host: node.host.clone(),
        port: node.port,
    }
}
