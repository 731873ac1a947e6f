//! Mock HA status store
//!
//! Answers the JSON envelope on the same table endpoints as the real store,
//! matching on the operation name carried in the request body.

use chrono::{DateTime, Duration, Local};
use ha_common::{HaDbClient, HadbConfig};
use serde_json::{json, Value};
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

pub struct MockStoreServer {
    pub server: MockServer,
    pub base_url: String,
}

impl MockStoreServer {
    pub async fn start() -> Self {
        let server = MockServer::start().await;
        let base_url = server.uri();
        Self { server, base_url }
    }

    pub fn client(&self) -> HaDbClient {
        HaDbClient::new(HadbConfig {
            url: self.base_url.clone(),
            token: "test-token".to_string(),
            cloud_id: 0,
            timeout_seconds: 2,
        })
        .expect("Failed to build status store client")
    }

    /// Answer `name` on `table` with `code = 0` and the given data
    pub async fn mock_ok(&self, table: &str, name: &str, data: Value) {
        Mock::given(method("POST"))
            .and(path(format!("/{}/", table)))
            .and(body_partial_json(json!({ "name": name })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": 0,
                "message": "",
                "data": data
            })))
            .mount(&self.server)
            .await;
    }

    /// Answer `name` on `table` with a non-zero code
    pub async fn mock_api_error(&self, table: &str, name: &str, code: i64, message: &str) {
        Mock::given(method("POST"))
            .and(path(format!("/{}/", table)))
            .and(body_partial_json(json!({ "name": name })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": code,
                "message": message,
                "data": null
            })))
            .mount(&self.server)
            .await;
    }

    /// Answer every request with an HTTP 500
    pub async fn mock_unavailable(&self) {
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&self.server)
            .await;
    }

    /// Count queue rows for `name` against the cutoff sent by the client
    pub async fn mock_switch_queue(&self, name: &str, rows: Vec<QueuedSwitch>) {
        Mock::given(method("POST"))
            .and(path("/switchqueue/"))
            .and(body_partial_json(json!({ "name": name })))
            .respond_with(WindowedCount { rows })
            .mount(&self.server)
            .await;
    }

    /// Bodies of every request received so far
    pub async fn request_bodies(&self) -> Vec<Value> {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter_map(|request| serde_json::from_slice(&request.body).ok())
            .collect()
    }

    /// Names of every operation received so far, in order
    pub async fn operation_names(&self) -> Vec<String> {
        self.request_bodies()
            .await
            .iter()
            .filter_map(|body| body["name"].as_str().map(str::to_string))
            .collect()
    }
}

/// A queued switch proposal as stored in the switch queue table
#[derive(Debug, Clone)]
pub struct QueuedSwitch {
    pub ip: String,
    pub port: u16,
    pub idc: i64,
    pub confirm_check_time: DateTime<Local>,
}

impl QueuedSwitch {
    pub fn minutes_ago(ip: &str, port: u16, minutes: i64) -> Self {
        Self {
            ip: ip.to_string(),
            port,
            idc: 1,
            confirm_check_time: Local::now() - Duration::minutes(minutes),
        }
    }
}

/// Counts rows matching the request filter whose confirm time is at or after the cutoff
struct WindowedCount {
    rows: Vec<QueuedSwitch>,
}

impl Respond for WindowedCount {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let body: Value = match serde_json::from_slice(&request.body) {
            Ok(body) => body,
            Err(_) => return ResponseTemplate::new(400),
        };
        let query = &body["query_args"];

        let cutoff = query["confirm_check_time"]
            .as_str()
            .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok());
        let ip = query["ip"].as_str();
        let port = query["port"].as_u64();
        let idc = query["idc_id"].as_i64();

        let count = self
            .rows
            .iter()
            .filter(|row| cutoff.is_none_or(|cutoff| row.confirm_check_time >= cutoff))
            .filter(|row| ip.is_none_or(|ip| row.ip == ip))
            .filter(|row| port.is_none_or(|port| u64::from(row.port) == port))
            .filter(|row| idc.is_none_or(|idc| row.idc == idc))
            .count();

        ResponseTemplate::new(200).set_body_json(json!({
            "code": 0,
            "message": "",
            "data": { "count": count }
        }))
    }
}
