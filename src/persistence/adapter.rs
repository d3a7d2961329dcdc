use super::backend::{BackendAck, ScenarioBackend};
use super::document::{ExportBundle, ScenarioDocument};
use crate::block::BlockRegistry;
use crate::error::{PersistenceError, ValidationError};
use crate::graph::Scenario;
use serde_json::Value;
use tracing::{debug, info};

/// Result of a successful import.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportReceipt {
    pub bot_id: String,
    pub message: Option<String>,
}

/// Converts scenarios to and from the wire format and forwards them to the
/// backend.
///
/// Input is validated before anything is sent. Failures are returned as
/// they are; nothing is retried.
pub struct PersistenceAdapter<B> {
    backend: B,
    registry: BlockRegistry,
}

impl<B: ScenarioBackend> PersistenceAdapter<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            registry: BlockRegistry::new(),
        }
    }

    /// Resolve block types through `registry` when loading.
    pub fn with_registry(mut self, registry: BlockRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn registry(&self) -> &BlockRegistry {
        &self.registry
    }

    /// Write `scenario` to the backend. Selection flags and editor-only
    /// keys are not sent.
    pub async fn save(&self, scenario: &Scenario) -> Result<BackendAck, PersistenceError> {
        let bot_id = required("bot_id", &scenario.bot_id)?;
        let document = ScenarioDocument::from_scenario(scenario);
        let ack = self.backend.save_scenario(bot_id, &document).await?;
        info!(bot_id = %bot_id, blocks = scenario.blocks.len(), edges = scenario.edges.len(), "Scenario saved");
        Ok(ack)
    }

    pub async fn load(&self, bot_id: &str) -> Result<Scenario, PersistenceError> {
        let bot_id = required("bot_id", bot_id)?;
        let document = self.backend.get_scenario(bot_id).await?;
        let scenario = document.into_scenario(bot_id, &self.registry)?;
        info!(bot_id = %bot_id, blocks = scenario.blocks.len(), edges = scenario.edges.len(), "Scenario loaded");
        Ok(scenario)
    }

    /// Delete the bot and its stored token.
    pub async fn delete_scenario(&self, bot_id: &str) -> Result<BackendAck, PersistenceError> {
        let bot_id = required("bot_id", bot_id)?;
        let ack = self.backend.delete_bot(bot_id).await?;
        self.backend.delete_token(bot_id).await?;
        Ok(ack)
    }

    /// Rename `old_id` to `new_id`. `existing` is the caller's current list
    /// of bots, used to reject a name that is already taken.
    ///
    /// Returns `Ok(None)` without calling the backend when the name does not
    /// change.
    pub async fn rename_scenario(
        &self,
        old_id: &str,
        new_id: &str,
        existing: &[String],
    ) -> Result<Option<BackendAck>, PersistenceError> {
        let old_id = required("bot_id", old_id)?;
        let new_id = required("new_name", new_id)?;
        if old_id == new_id {
            debug!(bot_id = %old_id, "Rename to the same name, nothing to do");
            return Ok(None);
        }
        if existing.iter().any(|name| name == new_id) {
            return Err(ValidationError::DuplicateName(new_id.to_string()).into());
        }
        let ack = self.backend.rename_bot(old_id, new_id).await?;
        Ok(Some(ack))
    }

    /// Scenario and token of `bot_id`, ready to be written to a file.
    pub async fn export_scenario(&self, bot_id: &str) -> Result<ExportBundle, PersistenceError> {
        let bot_id = required("bot_id", bot_id)?;
        let scenario = self.backend.get_scenario(bot_id).await?;
        let token = self.backend.get_token(bot_id).await?.unwrap_or_default();
        Ok(ExportBundle {
            bot_id: bot_id.to_string(),
            scenario,
            token,
        })
    }

    /// The backend's own archive of the bot.
    pub async fn export_archive(&self, bot_id: &str) -> Result<Vec<u8>, PersistenceError> {
        let bot_id = required("bot_id", bot_id)?;
        Ok(self.backend.export_archive(bot_id).await?)
    }

    /// Create a bot from an uploaded document.
    ///
    /// The document must carry `bot_id`, `scenario` and `token`; otherwise
    /// nothing is sent. The token is stored through its own call and is not
    /// part of the import request.
    pub async fn import_scenario(&self, upload: Value) -> Result<ImportReceipt, PersistenceError> {
        let bundle = ExportBundle::from_value(upload)?;
        let ack = self.backend.import_bot(&bundle.bot_id, &bundle.scenario).await?;
        self.backend.save_token(&bundle.bot_id, &bundle.token).await?;
        info!(bot_id = %bundle.bot_id, "Bot imported");
        Ok(ImportReceipt {
            bot_id: bundle.bot_id,
            message: ack.message,
        })
    }

    /// Create a bot, store its token and seed it with the starter scenario.
    pub async fn create_bot(&self, bot_id: &str, token: &str) -> Result<Scenario, PersistenceError> {
        let bot_id = required("bot_id", bot_id)?;
        let token = required("token", token)?;
        self.backend.create_bot(bot_id).await?;
        self.backend.save_token(bot_id, token).await?;
        let scenario = Scenario::template(bot_id);
        self.save(&scenario).await?;
        Ok(scenario)
    }

    pub async fn list_bots(&self) -> Result<Vec<String>, PersistenceError> {
        Ok(self.backend.list_bots().await?)
    }

    pub async fn token(&self, bot_id: &str) -> Result<Option<String>, PersistenceError> {
        let bot_id = required("bot_id", bot_id)?;
        Ok(self.backend.get_token(bot_id).await?)
    }

    pub async fn save_token(&self, bot_id: &str, token: &str) -> Result<BackendAck, PersistenceError> {
        let bot_id = required("bot_id", bot_id)?;
        let token = required("token", token)?;
        Ok(self.backend.save_token(bot_id, token).await?)
    }
}

fn required<'a>(field: &'static str, value: &'a str) -> Result<&'a str, ValidationError> {
    let value = value.trim();
    if value.is_empty() {
        Err(ValidationError::EmptyField(field))
    } else {
        Ok(value)
    }
}
