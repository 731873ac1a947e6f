//! Client for the shared HA status store
//!
//! The store is the single source of truth for component liveness, detection
//! results, switch proposals and the switch audit trail. Every component talks
//! to it through the same request/response envelope:
//!
//! ```text
//! POST {url}/{table}/  {db_cloud_token, bk_cloud_id, name, query_args?, set_args?}
//!                 <-   {code, message, data}
//! ```
//!
//! `code != 0` is always an error; `data` is decoded per operation.

pub mod client;
pub mod store;
pub mod types;

pub use client::HaDbClient;
pub use store::{DetectReport, Registration, StatusStore};

use serde::{Deserialize, Serialize};

/// Connection settings for the status store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HadbConfig {
    pub url: String,
    pub token: String,
    #[serde(default)]
    pub cloud_id: i64,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

fn default_timeout_seconds() -> u64 {
    10
}
