//! Mock HA status store speaking the real JSON envelope

use ha_common::{HaDbClient, HadbConfig};
use serde_json::{json, Value};
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

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

    pub fn config(&self) -> HadbConfig {
        HadbConfig {
            url: self.base_url.clone(),
            token: "test-token".to_string(),
            cloud_id: 0,
            timeout_seconds: 2,
        }
    }

    pub fn client(&self) -> HaDbClient {
        HaDbClient::new(self.config()).expect("Failed to build status store client")
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

    pub async fn request_bodies(&self) -> Vec<Value> {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter_map(|request| serde_json::from_slice(&request.body).ok())
            .collect()
    }

    /// Bodies of the requests carrying operation `name`
    pub async fn requests_named(&self, name: &str) -> Vec<Value> {
        self.request_bodies()
            .await
            .into_iter()
            .filter(|body| body["name"] == name)
            .collect()
    }
}
