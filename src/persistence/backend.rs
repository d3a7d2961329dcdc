use super::document::ScenarioDocument;
use crate::error::BackendError;
use async_trait::async_trait;
use serde::Deserialize;

/// Acknowledgement returned by mutating backend calls.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BackendAck {
    pub status: Option<String>,
    pub message: Option<String>,
}

impl BackendAck {
    pub fn with_message(message: impl Into<String>) -> Self {
        Self {
            status: Some("success".to_string()),
            message: Some(message.into()),
        }
    }
}

/// The remote service that stores scenarios and runs bots.
///
/// Implementations report failures as `BackendError` and never retry.
#[async_trait]
pub trait ScenarioBackend: Send + Sync {
    async fn get_scenario(&self, bot_id: &str) -> Result<ScenarioDocument, BackendError>;

    async fn save_scenario(
        &self,
        bot_id: &str,
        document: &ScenarioDocument,
    ) -> Result<BackendAck, BackendError>;

    async fn create_bot(&self, bot_id: &str) -> Result<BackendAck, BackendError>;

    async fn delete_bot(&self, bot_id: &str) -> Result<BackendAck, BackendError>;

    async fn rename_bot(&self, old_id: &str, new_id: &str) -> Result<BackendAck, BackendError>;

    async fn list_bots(&self) -> Result<Vec<String>, BackendError>;

    /// `None` when no token has been saved for the bot.
    async fn get_token(&self, bot_id: &str) -> Result<Option<String>, BackendError>;

    async fn save_token(&self, bot_id: &str, token: &str) -> Result<BackendAck, BackendError>;

    async fn delete_token(&self, bot_id: &str) -> Result<BackendAck, BackendError>;

    async fn run_bot(&self, bot_id: &str, token: &str) -> Result<BackendAck, BackendError>;

    async fn stop_bot(&self, bot_id: &str) -> Result<BackendAck, BackendError>;

    async fn running_status(&self, bot_id: &str) -> Result<bool, BackendError>;

    /// Create a bot from an uploaded scenario. The token is not part of the
    /// request.
    async fn import_bot(
        &self,
        bot_id: &str,
        document: &ScenarioDocument,
    ) -> Result<BackendAck, BackendError>;

    /// Server-built archive of the bot.
    async fn export_archive(&self, bot_id: &str) -> Result<Vec<u8>, BackendError>;
}
