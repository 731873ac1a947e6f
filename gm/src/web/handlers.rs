use axum::{extract::State, http::StatusCode, response::Json};
use chrono::Utc;
use ha_common::FailureReport;
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info};

use crate::binlog::{parse_binlog_files, MysqlBinlogParser};
use crate::web::{AppState, EnqueueReceipt, GmIdentity, ParseBinlogRequest, ParsedBinlogs};

pub type ApiResult<T> = Result<Json<ApiResponse<T>>, (StatusCode, Json<ApiResponse<()>>)>;

#[derive(Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
    pub timestamp: String,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

impl ApiResponse<()> {
    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

pub async fn health(State(state): State<AppState>) -> ApiResult<GmIdentity> {
    let config = &state.config;
    Ok(Json(ApiResponse::success(GmIdentity {
        ip: config.ip.clone(),
        port: config.port,
        city_id: config.city_id,
        cloud_id: config.cloud_id,
        db_type: config.db_type.clone(),
        queued_switches: state.switch_queue.len(),
    })))
}

/// Accept a confirmed failure from an agent. Waits while the switch queue is full.
pub async fn double_check(
    State(state): State<AppState>,
    Json(report): Json<FailureReport>,
) -> ApiResult<EnqueueReceipt> {
    let instance = report.instance.addr();
    info!(
        "agent {} reports {} down: {}",
        report.agent_ip, instance, report.reason
    );

    if state.switch_queue.send(report).await.is_err() {
        error!("switch queue closed, report for {} rejected", instance);
        return Err((
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ApiResponse::error("gm is shutting down".to_string())),
        ));
    }

    Ok(Json(ApiResponse::success(EnqueueReceipt {
        instance,
        queued: state.switch_queue.len(),
    })))
}

/// Run the binlog parse pool over the requested files
pub async fn parse_binlog(
    State(state): State<AppState>,
    Json(request): Json<ParseBinlogRequest>,
) -> ApiResult<ParsedBinlogs> {
    let binlog = &state.config.binlog;
    let parser = Arc::new(MysqlBinlogParser::new(
        binlog,
        &request.binlog_dir,
        &request.output_dir,
    ));

    match parse_binlog_files(&request.files, binlog.parse_concurrency, parser).await {
        Ok(paths) => Ok(Json(ApiResponse::success(ParsedBinlogs {
            files: paths.iter().map(|p| p.display().to_string()).collect(),
        }))),
        Err(e) => {
            error!("parse binlog in {} failed: {}", request.binlog_dir, e);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error(e.to_string())),
            ))
        }
    }
}
