pub mod handlers;
pub mod server;

pub use server::{create_router, start_web_server};

use ha_common::{FailureReport, Mailbox};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::GmConfig;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GmConfig>,
    /// Confirmed failures waiting for the switch loop
    pub switch_queue: Mailbox<FailureReport>,
}

impl AppState {
    pub fn new(config: Arc<GmConfig>, switch_queue: Mailbox<FailureReport>) -> Self {
        Self {
            config,
            switch_queue,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GmIdentity {
    pub ip: String,
    pub port: u16,
    pub city_id: i64,
    pub cloud_id: i64,
    pub db_type: String,
    pub queued_switches: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct EnqueueReceipt {
    pub instance: String,
    pub queued: usize,
}

/// Operator request to turn binlog files into SQL files
#[derive(Debug, Clone, Deserialize)]
pub struct ParseBinlogRequest {
    pub binlog_dir: String,
    pub output_dir: String,
    pub files: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ParsedBinlogs {
    pub files: Vec<String>,
}
