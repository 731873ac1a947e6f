//! Hash partitioning of monitored instances across the live agents of one
//! (city, db type) group.
//!
//! The roster is read and the rank computed without any lock, so two agents
//! heartbeating at the same moment may briefly disagree on `hash_mod`. Every
//! cycle recomputes from scratch; only a duplicated IP is treated as corruption.

use ha_common::instance::InstanceInfo;
use ha_common::{HadbError, StatusStore};
use sha2::{Digest, Sha256};
use std::fmt;
use std::time::Duration;

/// This agent's share of the group
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Assignment {
    /// Number of live agents in the group
    pub hash_mod: usize,
    /// 0-based rank of this agent in the sorted roster
    pub hash_value: usize,
}

#[derive(Debug)]
pub enum AssignmentError {
    /// Roster lists this agent more than once
    Duplicate { ip: String, count: usize },
    /// This agent is missing from its own roster
    NotFound { ip: String, hash_mod: usize },
    Store(HadbError),
}

impl fmt::Display for AssignmentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssignmentError::Duplicate { ip, count } => {
                write!(f, "agent {} appears {} times in the alive roster", ip, count)
            }
            AssignmentError::NotFound { ip, hash_mod } => {
                write!(f, "agent {} not found among {} alive agents", ip, hash_mod)
            }
            AssignmentError::Store(e) => write!(f, "get alive agents failed: {}", e),
        }
    }
}

impl std::error::Error for AssignmentError {}

impl From<HadbError> for AssignmentError {
    fn from(err: HadbError) -> Self {
        AssignmentError::Store(err)
    }
}

/// Rank `self_ip` in `roster`
pub fn assign_from_roster(self_ip: &str, roster: &[String]) -> Result<Assignment, AssignmentError> {
    let mut sorted: Vec<&str> = roster.iter().map(String::as_str).collect();
    sorted.sort_unstable();

    let count = sorted.iter().filter(|ip| **ip == self_ip).count();
    if count > 1 {
        return Err(AssignmentError::Duplicate {
            ip: self_ip.to_string(),
            count,
        });
    }

    let hash_mod = sorted.len();
    let hash_value = sorted
        .iter()
        .position(|ip| *ip == self_ip)
        .ok_or_else(|| AssignmentError::NotFound {
            ip: self_ip.to_string(),
            hash_mod,
        })?;

    Ok(Assignment {
        hash_mod,
        hash_value,
    })
}

/// Read the live roster and rank this agent in it. Never cached.
pub async fn compute_assignment(
    store: &dyn StatusStore,
    self_ip: &str,
    city_id: i64,
    db_type: &str,
    freshness: Duration,
) -> Result<Assignment, AssignmentError> {
    let roster = store.get_alive_agents(city_id, db_type, freshness).await?;
    assign_from_roster(self_ip, &roster)
}

/// Stable across processes and restarts: first 8 bytes of SHA-256 over `ip:port`
pub fn instance_hash(ip: &str, port: u16) -> u64 {
    let digest = Sha256::digest(format!("{}:{}", ip, port).as_bytes());
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(prefix)
}

pub fn owns(instance: &InstanceInfo, assignment: &Assignment) -> bool {
    if assignment.hash_mod == 0 {
        return false;
    }
    instance_hash(&instance.ip, instance.port) % assignment.hash_mod as u64
        == assignment.hash_value as u64
}
