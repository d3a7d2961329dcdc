//! Common test utilities: an in-memory backend and scenario fixtures.
use async_trait::async_trait;
use botflow::error::BackendError;
use botflow::persistence::{BackendAck, ScenarioBackend};
use botflow::prelude::*;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::result::Result;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

#[derive(Debug, Default)]
struct MockState {
    scenarios: HashMap<String, ScenarioDocument>,
    tokens: HashMap<String, String>,
    bots: Vec<String>,
    running: HashMap<String, bool>,
    calls: Vec<String>,
    failures: HashMap<&'static str, BackendError>,
    pending: HashSet<&'static str>,
}

/// A `ScenarioBackend` that keeps everything in memory and records the name
/// of every call it receives. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct MockBackend {
    state: Arc<Mutex<MockState>>,
}

#[allow(dead_code)]
impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// A backend that already stores `document` under `bot_id`.
    pub fn with_scenario(bot_id: &str, document: ScenarioDocument) -> Self {
        let backend = Self::new();
        {
            let mut state = backend.state.lock().unwrap();
            state.scenarios.insert(bot_id.to_string(), document);
            state.bots.push(bot_id.to_string());
        }
        backend
    }

    pub fn with_token(self, bot_id: &str, token: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .tokens
            .insert(bot_id.to_string(), token.to_string());
        self
    }

    pub fn with_bots(self, bots: &[&str]) -> Self {
        self.state
            .lock()
            .unwrap()
            .bots
            .extend(bots.iter().map(|b| b.to_string()));
        self
    }

    /// Make every later call to `method` fail with `error`.
    pub fn fail_on(&self, method: &'static str, error: BackendError) {
        self.state.lock().unwrap().failures.insert(method, error);
    }

    /// The next call to `method` yields once before answering, so a test
    /// can issue another request while it is in flight.
    pub fn pend_next(&self, method: &'static str) {
        self.state.lock().unwrap().pending.insert(method);
    }

    pub fn set_running(&self, bot_id: &str, running: bool) {
        self.state
            .lock()
            .unwrap()
            .running
            .insert(bot_id.to_string(), running);
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn stored(&self, bot_id: &str) -> Option<ScenarioDocument> {
        self.state.lock().unwrap().scenarios.get(bot_id).cloned()
    }

    pub fn token_of(&self, bot_id: &str) -> Option<String> {
        self.state.lock().unwrap().tokens.get(bot_id).cloned()
    }

    pub fn bots(&self) -> Vec<String> {
        self.state.lock().unwrap().bots.clone()
    }

    async fn enter(&self, method: &'static str) -> Result<(), BackendError> {
        let pend = {
            let mut state = self.state.lock().unwrap();
            state.calls.push(method.to_string());
            if let Some(error) = state.failures.get(method) {
                return Err(error.clone());
            }
            state.pending.remove(method)
        };
        if pend {
            YieldOnce::default().await;
        }
        Ok(())
    }
}

#[async_trait]
impl ScenarioBackend for MockBackend {
    async fn get_scenario(&self, bot_id: &str) -> Result<ScenarioDocument, BackendError> {
        self.enter("get_scenario").await?;
        self.state
            .lock()
            .unwrap()
            .scenarios
            .get(bot_id)
            .cloned()
            .ok_or_else(|| BackendError::Status {
                status: 404,
                message: Some(format!("Bot {} not found", bot_id)),
            })
    }

    async fn save_scenario(
        &self,
        bot_id: &str,
        document: &ScenarioDocument,
    ) -> Result<BackendAck, BackendError> {
        self.enter("save_scenario").await?;
        self.state
            .lock()
            .unwrap()
            .scenarios
            .insert(bot_id.to_string(), document.clone());
        Ok(BackendAck::with_message("Scenario saved"))
    }

    async fn create_bot(&self, bot_id: &str) -> Result<BackendAck, BackendError> {
        self.enter("create_bot").await?;
        self.state.lock().unwrap().bots.push(bot_id.to_string());
        Ok(BackendAck::with_message("Bot created"))
    }

    async fn delete_bot(&self, bot_id: &str) -> Result<BackendAck, BackendError> {
        self.enter("delete_bot").await?;
        let mut state = self.state.lock().unwrap();
        state.bots.retain(|b| b != bot_id);
        state.scenarios.remove(bot_id);
        Ok(BackendAck::with_message("Bot deleted"))
    }

    async fn rename_bot(&self, old_id: &str, new_id: &str) -> Result<BackendAck, BackendError> {
        self.enter("rename_bot").await?;
        let mut state = self.state.lock().unwrap();
        for bot in state.bots.iter_mut() {
            if bot.as_str() == old_id {
                *bot = new_id.to_string();
            }
        }
        if let Some(document) = state.scenarios.remove(old_id) {
            state.scenarios.insert(new_id.to_string(), document);
        }
        Ok(BackendAck::with_message("Bot renamed"))
    }

    async fn list_bots(&self) -> Result<Vec<String>, BackendError> {
        self.enter("list_bots").await?;
        Ok(self.bots())
    }

    async fn get_token(&self, bot_id: &str) -> Result<Option<String>, BackendError> {
        self.enter("get_token").await?;
        Ok(self.token_of(bot_id))
    }

    async fn save_token(&self, bot_id: &str, token: &str) -> Result<BackendAck, BackendError> {
        self.enter("save_token").await?;
        self.state
            .lock()
            .unwrap()
            .tokens
            .insert(bot_id.to_string(), token.to_string());
        Ok(BackendAck::with_message("Token saved"))
    }

    async fn delete_token(&self, bot_id: &str) -> Result<BackendAck, BackendError> {
        self.enter("delete_token").await?;
        self.state.lock().unwrap().tokens.remove(bot_id);
        Ok(BackendAck::default())
    }

    async fn run_bot(&self, bot_id: &str, _token: &str) -> Result<BackendAck, BackendError> {
        self.enter("run_bot").await?;
        self.set_running(bot_id, true);
        Ok(BackendAck::with_message("Bot started"))
    }

    async fn stop_bot(&self, bot_id: &str) -> Result<BackendAck, BackendError> {
        self.enter("stop_bot").await?;
        self.set_running(bot_id, false);
        Ok(BackendAck::with_message("Bot stopped"))
    }

    async fn running_status(&self, bot_id: &str) -> Result<bool, BackendError> {
        // Answered before any delay, like a server whose reply is slow to arrive.
        let running = self
            .state
            .lock()
            .unwrap()
            .running
            .get(bot_id)
            .copied()
            .unwrap_or(false);
        self.enter("running_status").await?;
        Ok(running)
    }

    async fn import_bot(
        &self,
        bot_id: &str,
        document: &ScenarioDocument,
    ) -> Result<BackendAck, BackendError> {
        self.enter("import_bot").await?;
        let mut state = self.state.lock().unwrap();
        state.bots.push(bot_id.to_string());
        state.scenarios.insert(bot_id.to_string(), document.clone());
        Ok(BackendAck::with_message("Bot imported"))
    }

    async fn export_archive(&self, bot_id: &str) -> Result<Vec<u8>, BackendError> {
        self.enter("export_archive").await?;
        Ok(format!("PK-{}", bot_id).into_bytes())
    }
}

/// Returns `Pending` on the first poll, waking itself, then `Ready`.
#[derive(Debug, Default)]
struct YieldOnce {
    yielded: bool,
}

impl Future for YieldOnce {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if self.yielded {
            return Poll::Ready(());
        }
        self.yielded = true;
        cx.waker().wake_by_ref();
        Poll::Pending
    }
}

/// A scenario document in the shape the web editor writes: generic
/// `editable` node type, UI keys on nodes and edges, an edge without an id.
///
/// Flow: start(1) -> condition(2) --yes--> message(3), --no--> buttons(4)
#[allow(dead_code)]
pub const SAMPLE_SCENARIO_JSON: &str = r##"{
  "nodes": [
    {
      "id": "1",
      "type": "editable",
      "position": { "x": 250, "y": 100 },
      "selected": false,
      "dragging": false,
      "width": 180,
      "height": 64,
      "data": { "blockType": "start", "label": "Welcome!", "onChange": null }
    },
    {
      "id": "2",
      "type": "editable",
      "position": { "x": 250, "y": 220 },
      "data": { "blockType": "condition", "condition": "age >= 18" }
    },
    {
      "id": "3",
      "type": "message",
      "position": { "x": 100, "y": 360 },
      "style": { "background": "#a0c4ff" },
      "data": { "blockType": "message", "label": "Adults only", "parseMode": "HTML" }
    },
    {
      "id": "4",
      "type": "editable",
      "position": { "x": 400, "y": 360 },
      "data": {
        "blockType": "button",
        "label": "Pick one",
        "buttons": [
          { "label": "Catalog", "callbackData": "catalog" },
          { "label": "Support", "callbackData": "support" }
        ],
        "buttonLayout": "row",
        "buttonsPerRow": "2"
      }
    }
  ],
  "edges": [
    { "source": "1", "target": "2" },
    { "id": "e2-3", "source": "2", "target": "3", "sourceHandle": "yes", "animated": true },
    { "id": "e2-4", "source": "2", "target": "4", "sourceHandle": "no", "markerEnd": { "type": "arrow" } }
  ],
  "adminChatId": "123456789"
}"##;

#[allow(dead_code)]
pub fn sample_document() -> ScenarioDocument {
    ScenarioDocument::from_json(SAMPLE_SCENARIO_JSON).unwrap()
}

#[allow(dead_code)]
pub fn sample_scenario(bot_id: &str) -> Scenario {
    sample_document()
        .into_scenario(bot_id, &BlockRegistry::new())
        .unwrap()
}

/// A store holding the sample scenario.
#[allow(dead_code)]
pub fn sample_store() -> GraphStore {
    GraphStore::from_scenario(sample_scenario("sample_bot"))
}

/// Panics if any edge in `store` references a block that is not present.
#[allow(dead_code)]
pub fn assert_no_dangling_edges(store: &GraphStore) {
    for edge in store.edges() {
        assert!(
            store.contains_block(&edge.source) && store.contains_block(&edge.target),
            "edge {} ({} -> {}) references a missing block",
            edge.id,
            edge.source,
            edge.target
        );
    }
}

/// Ids of the blocks in `store`, in order.
#[allow(dead_code)]
pub fn block_ids(store: &GraphStore) -> Vec<String> {
    store.blocks().iter().map(|b| b.id().to_string()).collect()
}
