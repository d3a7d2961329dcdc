//! The editing session: one owned value that ties the graph store, the undo
//! history and the block catalog together and decides which edits are
//! recorded.

pub mod confirm;
pub mod policy;
pub mod viewport;

pub use confirm::{AlwaysConfirm, Confirm, DeleteOutcome, DeletePrompt};
pub use policy::ConnectionPolicy;
pub use viewport::Viewport;

use crate::block::{BlockKind, BlockRegistry};
use crate::config::EditorConfig;
use crate::error::{ContentError, GraphError, PersistenceError, ValidationError};
use crate::graph::model::validate_chat_id;
use crate::graph::{
    Block, Edge, GraphSnapshot, GraphStore, PendingConnection, Position, RemovalSummary, Scenario,
};
use crate::history::HistoryManager;
use crate::persistence::{BackendAck, PersistenceAdapter, ScenarioBackend};
use serde_json::Value;
use tracing::{debug, info};

/// Editing state for one bot's scenario.
///
/// Structural edits (adding, connecting, deleting) record a history entry
/// immediately. Field edits and drags do not; they are folded into one entry
/// by `commit`, which hosts call when a field loses focus and which `save`
/// calls before writing. Structural edits and undo/redo commit pending
/// changes first, so each keeps its own entry.
pub struct EditingSession {
    bot_id: String,
    admin_chat_id: Option<String>,
    store: GraphStore,
    history: HistoryManager<GraphSnapshot>,
    registry: BlockRegistry,
    policy: ConnectionPolicy,
    viewport: Viewport,
}

impl EditingSession {
    pub fn new(scenario: Scenario) -> Self {
        Self::with_config(scenario, &EditorConfig::default())
    }

    pub fn with_config(scenario: Scenario, config: &EditorConfig) -> Self {
        let bot_id = scenario.bot_id.clone();
        let admin_chat_id = scenario.admin_chat_id().map(str::to_string);
        let store = GraphStore::from_scenario(scenario);
        let history = HistoryManager::with_capacity(store.snapshot(), config.history_capacity);
        Self {
            bot_id,
            admin_chat_id,
            store,
            history,
            registry: BlockRegistry::new(),
            policy: config.connection_policy,
            viewport: Viewport::default(),
        }
    }

    pub fn with_registry(mut self, registry: BlockRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_policy(mut self, policy: ConnectionPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Load `bot_id` through `adapter` and start editing it.
    pub async fn open<B: ScenarioBackend>(
        adapter: &PersistenceAdapter<B>,
        bot_id: &str,
        config: &EditorConfig,
    ) -> Result<Self, PersistenceError> {
        let scenario = adapter.load(bot_id).await?;
        Ok(Self::with_config(scenario, config).with_registry(adapter.registry().clone()))
    }

    pub fn bot_id(&self) -> &str {
        &self.bot_id
    }

    pub fn store(&self) -> &GraphStore {
        &self.store
    }

    pub fn history(&self) -> &HistoryManager<GraphSnapshot> {
        &self.history
    }

    pub fn registry(&self) -> &BlockRegistry {
        &self.registry
    }

    pub fn policy(&self) -> ConnectionPolicy {
        self.policy
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }

    pub fn admin_chat_id(&self) -> Option<&str> {
        self.admin_chat_id.as_deref()
    }

    pub fn set_admin_chat_id(&mut self, chat_id: Option<&str>) -> Result<(), ValidationError> {
        self.admin_chat_id = validate_chat_id(chat_id)?;
        Ok(())
    }

    /// The scenario as it currently stands, ready to be saved.
    pub fn scenario(&self) -> Scenario {
        let mut scenario = self.store.clone().into_scenario(self.bot_id.clone());
        scenario.admin_chat_id_mut().clone_from(&self.admin_chat_id);
        scenario
    }

    /// Create a block from a palette drag. `tag` comes from the drag payload
    /// and `screen` is the drop point in screen coordinates.
    ///
    /// Tags the registry does not know are ignored.
    pub fn drop_block(&mut self, tag: &str, screen: Position) -> Option<&Block> {
        let Some(kind) = self.registry.resolve(tag) else {
            debug!(block_type = %tag, "Ignoring drop of unknown block type");
            return None;
        };
        let position = self.viewport.to_graph(screen);
        Some(self.add_block(kind, position))
    }

    /// Create a block at a graph position.
    pub fn add_block(&mut self, kind: BlockKind, position: Position) -> &Block {
        self.commit();
        let index = self.store.blocks().len();
        self.store.insert_block(self.registry.defaults(kind), position);
        self.record();
        &self.store.blocks()[index]
    }

    /// Connect two blocks according to the session's connection policy.
    pub fn connect(&mut self, connection: PendingConnection) -> Result<&Edge, GraphError> {
        self.policy.check(&self.store, &connection)?;
        self.commit();
        let index = self.store.edges().len();
        self.store.add_connection(&connection)?;
        self.record();
        Ok(&self.store.edges()[index])
    }

    /// Merge a field patch into a block. Not recorded until `commit`.
    pub fn edit_field(&mut self, block_id: &str, patch: &Value) -> Result<bool, ContentError> {
        self.store.update_block_data(block_id, patch)
    }

    /// Drag a block. Not recorded until `commit`.
    pub fn move_block(&mut self, block_id: &str, position: Position) -> bool {
        self.store.move_block(block_id, position)
    }

    pub fn select_block(&mut self, block_id: &str, selected: bool) -> bool {
        self.store.select_block(block_id, selected)
    }

    pub fn select_edge(&mut self, edge_id: &str, selected: bool) -> bool {
        self.store.select_edge(edge_id, selected)
    }

    pub fn clear_selection(&mut self) {
        self.store.clear_selection();
    }

    /// Record pending field edits and moves as one history entry. Returns
    /// false when nothing changed since the current entry.
    pub fn commit(&mut self) -> bool {
        let snapshot = self.store.snapshot();
        if &snapshot == self.history.current() {
            return false;
        }
        self.history.record(snapshot);
        true
    }

    /// Remove the selected blocks and edges after asking `confirm`.
    pub fn delete_selected(&mut self, confirm: &mut impl Confirm) -> DeleteOutcome {
        let blocks = self.store.selected_blocks().count();
        let edges = self.store.selected_edges().count();
        if blocks == 0 && edges == 0 {
            return DeleteOutcome::NothingSelected;
        }
        if !confirm.confirm(&DeletePrompt::Selection { blocks, edges }) {
            return DeleteOutcome::Cancelled;
        }
        self.commit();
        let summary = self.store.remove_selected();
        self.record();
        DeleteOutcome::Removed(summary)
    }

    /// Remove everything after asking `confirm`.
    pub fn delete_all(&mut self, confirm: &mut impl Confirm) -> DeleteOutcome {
        if self.store.is_empty() {
            return DeleteOutcome::Empty;
        }
        if !confirm.confirm(&DeletePrompt::All) {
            return DeleteOutcome::Cancelled;
        }
        self.commit();
        let summary = self.store.clear();
        self.record();
        DeleteOutcome::Removed(summary)
    }

    /// Remove one block from its context menu. No confirmation is asked.
    pub fn delete_block(&mut self, block_id: &str) -> RemovalSummary {
        if self.store.contains_block(block_id) {
            self.commit();
        }
        let summary = self.store.remove_block(block_id);
        if !summary.is_empty() {
            self.record();
        }
        summary
    }

    pub fn delete_edge(&mut self, edge_id: &str) -> bool {
        if self.store.edge(edge_id).is_some() {
            self.commit();
        }
        let removed = self.store.remove_edge(edge_id);
        if removed {
            self.record();
        }
        removed
    }

    /// Step back one entry. Uncommitted edits are committed first, so undo
    /// always reverts the most recent change.
    pub fn undo(&mut self) -> bool {
        self.commit();
        match self.history.undo() {
            Some(snapshot) => {
                self.store.restore(snapshot.clone());
                true
            }
            None => false,
        }
    }

    pub fn redo(&mut self) -> bool {
        if self.commit() {
            // A fresh entry truncated whatever could have been redone.
            return false;
        }
        match self.history.redo() {
            Some(snapshot) => {
                self.store.restore(snapshot.clone());
                true
            }
            None => false,
        }
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo() || &self.store.snapshot() != self.history.current()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    /// Commit pending edits and write the scenario through `adapter`.
    pub async fn save<B: ScenarioBackend>(
        &mut self,
        adapter: &PersistenceAdapter<B>,
    ) -> Result<BackendAck, PersistenceError> {
        self.commit();
        let ack = adapter.save(&self.scenario()).await?;
        info!(bot_id = %self.bot_id, "Session saved");
        Ok(ack)
    }

    fn record(&mut self) {
        self.history.record(self.store.snapshot());
    }
}
