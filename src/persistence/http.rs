use super::backend::{BackendAck, ScenarioBackend};
use super::document::{ImportRequest, ScenarioDocument};
use crate::config::BackendConfig;
use crate::error::BackendError;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

/// `ScenarioBackend` over the backend's REST API.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: String,
    base: Url,
    user_id: Option<i64>,
}

#[derive(Debug, Serialize)]
struct TokenBody<'a> {
    token: &'a str,
}

#[derive(Debug, Serialize)]
struct UserTokenBody<'a> {
    user_id: i64,
    bot_id: &'a str,
    token: &'a str,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TokenResponse {
    token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RunningStatus {
    is_running: bool,
}

impl HttpBackend {
    pub fn new(config: &BackendConfig) -> Result<Self, BackendError> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| BackendError::Network(format!("Failed to create HTTP client: {}", e)))?;
        let base = Url::parse(config.base())
            .ok()
            .filter(|url| !url.cannot_be_a_base())
            .ok_or_else(|| BackendError::Network(format!("Invalid backend URL: {}", config.base())))?;
        Ok(Self {
            client,
            base_url: config.base().to_string(),
            base,
            user_id: config.user_id,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `{base}/api/{endpoint}/{ids..}/` with each id percent-encoded as a
    /// single path segment.
    fn url(&self, endpoint: &str, ids: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .push("api")
                .extend(endpoint.split('/'))
                .extend(ids)
                .push("");
        }
        url
    }

    /// Attach `user_id` when one is configured.
    fn for_user(&self, request: RequestBuilder) -> RequestBuilder {
        match self.user_id {
            Some(user_id) => request.query(&[("user_id", user_id)]),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, BackendError> {
        let response = request.send().await.map_err(map_transport)?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let message = extract_message(&body);
        warn!(status = status.as_u16(), message = ?message, "Backend request failed");
        Err(BackendError::Status {
            status: status.as_u16(),
            message,
        })
    }

    async fn json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, BackendError> {
        let response = self.send(request).await?;
        let bytes = response.bytes().await.map_err(map_transport)?;
        serde_json::from_slice(&bytes).map_err(|e| BackendError::Decode(e.to_string()))
    }

    async fn ack(&self, request: RequestBuilder) -> Result<BackendAck, BackendError> {
        let response = self.send(request).await?;
        let bytes = response.bytes().await.map_err(map_transport)?;
        // Some endpoints answer with an empty body or plain text.
        let ack: BackendAck = serde_json::from_slice(&bytes).unwrap_or_default();
        check_ack(ack)
    }
}

#[async_trait]
impl ScenarioBackend for HttpBackend {
    async fn get_scenario(&self, bot_id: &str) -> Result<ScenarioDocument, BackendError> {
        debug!(bot_id = %bot_id, "Fetching scenario");
        let request = self.client.get(self.url("get_scenario", &[bot_id]));
        self.json(request).await
    }

    async fn save_scenario(
        &self,
        bot_id: &str,
        document: &ScenarioDocument,
    ) -> Result<BackendAck, BackendError> {
        info!(bot_id = %bot_id, nodes = document.nodes.len(), edges = document.edges.len(), "Saving scenario");
        let request = self
            .client
            .post(self.url("save_scenario", &[bot_id]))
            .json(document);
        self.ack(self.for_user(request)).await
    }

    async fn create_bot(&self, bot_id: &str) -> Result<BackendAck, BackendError> {
        info!(bot_id = %bot_id, "Creating bot");
        let request = self
            .client
            .post(self.url("create_bot", &[]))
            .query(&[("bot_id", bot_id)]);
        self.ack(self.for_user(request)).await
    }

    async fn delete_bot(&self, bot_id: &str) -> Result<BackendAck, BackendError> {
        info!(bot_id = %bot_id, "Deleting bot");
        let request = self.client.delete(self.url("delete_bot", &[bot_id]));
        self.ack(request).await
    }

    async fn rename_bot(&self, old_id: &str, new_id: &str) -> Result<BackendAck, BackendError> {
        info!(from = %old_id, to = %new_id, "Renaming bot");
        let request = self
            .client
            .post(self.url("rename_bot", &[old_id, new_id]));
        self.ack(request).await
    }

    async fn list_bots(&self) -> Result<Vec<String>, BackendError> {
        let request = self.for_user(self.client.get(self.url("get_bots", &[])));
        // Anything but an array is treated as "no bots".
        let value: Value = self.json(request).await?;
        Ok(match value {
            Value::Array(items) => items
                .into_iter()
                .filter_map(|item| match item {
                    Value::String(id) => Some(id),
                    Value::Number(n) => Some(n.to_string()),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        })
    }

    async fn get_token(&self, bot_id: &str) -> Result<Option<String>, BackendError> {
        let request = match self.user_id {
            Some(user_id) => self
                .client
                .get(self.url("user/get_token", &[bot_id]))
                .query(&[("user_id", user_id)]),
            None => self.client.get(self.url("get_token", &[bot_id])),
        };
        let response: TokenResponse = self.json(request).await?;
        Ok(response.token.filter(|t| !t.trim().is_empty()))
    }

    async fn save_token(&self, bot_id: &str, token: &str) -> Result<BackendAck, BackendError> {
        debug!(bot_id = %bot_id, "Saving token");
        let request = match self.user_id {
            Some(user_id) => self.client.post(self.url("user/save_token", &[])).json(&UserTokenBody {
                user_id,
                bot_id,
                token,
            }),
            None => self
                .client
                .post(self.url("save_token", &[bot_id]))
                .json(&TokenBody { token }),
        };
        self.ack(request).await
    }

    async fn delete_token(&self, bot_id: &str) -> Result<BackendAck, BackendError> {
        let request = self.client.delete(self.url("delete_token", &[bot_id]));
        self.ack(request).await
    }

    async fn run_bot(&self, bot_id: &str, token: &str) -> Result<BackendAck, BackendError> {
        info!(bot_id = %bot_id, "Starting bot");
        let request = self
            .client
            .post(self.url("run_bot", &[bot_id]))
            .json(&TokenBody { token });
        self.ack(request).await
    }

    async fn stop_bot(&self, bot_id: &str) -> Result<BackendAck, BackendError> {
        info!(bot_id = %bot_id, "Stopping bot");
        let request = self.client.get(self.url("stop_bot", &[bot_id]));
        self.ack(request).await
    }

    async fn running_status(&self, bot_id: &str) -> Result<bool, BackendError> {
        let request = self
            .client
            .get(self.url("bot_running_status", &[bot_id]));
        let status: RunningStatus = self.json(request).await?;
        Ok(status.is_running)
    }

    async fn import_bot(
        &self,
        bot_id: &str,
        document: &ScenarioDocument,
    ) -> Result<BackendAck, BackendError> {
        info!(bot_id = %bot_id, "Importing bot");
        let request = self.client.post(self.url("import_bot", &[])).json(&ImportRequest {
            bot_id,
            scenario: document,
        });
        self.ack(self.for_user(request)).await
    }

    async fn export_archive(&self, bot_id: &str) -> Result<Vec<u8>, BackendError> {
        let request = self
            .client
            .post(self.url("export_bot_zip", &[bot_id]));
        let response = self.send(request).await?;
        let bytes = response.bytes().await.map_err(map_transport)?;
        Ok(bytes.to_vec())
    }
}

fn map_transport(e: reqwest::Error) -> BackendError {
    if e.is_timeout() {
        BackendError::Timeout
    } else if e.is_decode() {
        BackendError::Decode(e.to_string())
    } else {
        BackendError::Network(e.to_string())
    }
}

/// Pull a human-readable message out of an error body: `message`, then
/// `detail`, then the raw text.
fn extract_message(body: &str) -> Option<String> {
    let body = body.trim();
    if body.is_empty() {
        return None;
    }
    match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(map)) => ["message", "detail"]
            .iter()
            .filter_map(|key| map.get(*key))
            .find_map(|value| match value {
                Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
                Value::Null | Value::String(_) => None,
                other => Some(other.to_string()),
            }),
        Ok(Value::String(s)) => Some(s),
        Ok(_) => None,
        Err(_) => Some(body.to_string()),
    }
}

/// A 2xx response can still report `"status": "error"`.
fn check_ack(ack: BackendAck) -> Result<BackendAck, BackendError> {
    match ack.status.as_deref() {
        Some("error") | Some("failed") => Err(BackendError::Status {
            status: 200,
            message: ack.message,
        }),
        _ => Ok(ack),
    }
}
