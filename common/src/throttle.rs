//! Switch-rate circuit breaker
//!
//! Counts recent switch proposals in three slices of the switch queue and
//! rejects a new switch once any slice reaches its limit.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::errors::HadbError;
use crate::hadb::types::SwitchCountScope;
use crate::hadb::StatusStore;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThrottleConfig {
    #[serde(default = "default_single_window")]
    pub single_window_seconds: u64,
    #[serde(default = "default_single_limit")]
    pub single_limit: i64,
    #[serde(default = "default_global_window")]
    pub global_window_seconds: u64,
    #[serde(default = "default_global_limit")]
    pub global_limit: i64,
    #[serde(default = "default_idc_window")]
    pub idc_window_seconds: u64,
    #[serde(default = "default_idc_limit")]
    pub idc_limit: i64,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            single_window_seconds: default_single_window(),
            single_limit: default_single_limit(),
            global_window_seconds: default_global_window(),
            global_limit: default_global_limit(),
            idc_window_seconds: default_idc_window(),
            idc_limit: default_idc_limit(),
        }
    }
}

fn default_single_window() -> u64 {
    86400
}

fn default_single_limit() -> i64 {
    1
}

fn default_global_window() -> u64 {
    300
}

fn default_global_limit() -> i64 {
    50
}

fn default_idc_window() -> u64 {
    300
}

fn default_idc_limit() -> i64 {
    30
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThrottleDecision {
    Allowed,
    Rejected {
        scope: &'static str,
        count: i64,
        limit: i64,
    },
}

impl ThrottleDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, ThrottleDecision::Allowed)
    }
}

impl fmt::Display for ThrottleDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ThrottleDecision::Allowed => write!(f, "allowed"),
            ThrottleDecision::Rejected {
                scope,
                count,
                limit,
            } => write!(
                f,
                "{} switch count {} reached limit {}",
                scope, count, limit
            ),
        }
    }
}

pub struct SwitchThrottle {
    store: Arc<dyn StatusStore>,
    config: ThrottleConfig,
}

impl SwitchThrottle {
    pub fn new(store: Arc<dyn StatusStore>, config: ThrottleConfig) -> Self {
        Self { store, config }
    }

    /// Check the single-instance, global and per-IDC slices in that order.
    ///
    /// A rejection is a normal outcome; only store failures are errors.
    pub async fn check(&self, ip: &str, port: u16, idc: i64) -> Result<ThrottleDecision, HadbError> {
        let slices = [
            (
                SwitchCountScope::SingleInstance {
                    ip: ip.to_string(),
                    port,
                },
                self.config.single_window_seconds,
                self.config.single_limit,
            ),
            (
                SwitchCountScope::Global,
                self.config.global_window_seconds,
                self.config.global_limit,
            ),
            (
                SwitchCountScope::PerIdc {
                    ip: ip.to_string(),
                    idc,
                },
                self.config.idc_window_seconds,
                self.config.idc_limit,
            ),
        ];

        for (scope, window_seconds, limit) in slices {
            let count = self
                .store
                .query_switch_count(&scope, Duration::from_secs(window_seconds))
                .await?;

            if count >= limit {
                warn!(
                    "{}:{} switch throttled, {} count {} in {}s reached limit {}",
                    ip,
                    port,
                    scope.label(),
                    count,
                    window_seconds,
                    limit
                );
                return Ok(ThrottleDecision::Rejected {
                    scope: scope.label(),
                    count,
                    limit,
                });
            }
        }

        info!("{}:{} switch allowed by throttle", ip, port);
        Ok(ThrottleDecision::Allowed)
    }
}
