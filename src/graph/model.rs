use crate::block::{BlockData, BlockKind, DEFAULT_HANDLE};
use crate::error::ValidationError;
use ahash::AHashSet;
use serde::{Deserialize, Serialize};

/// A point on the canvas, in graph coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// One step of a conversation flow.
///
/// The id and the block's type are fixed for the block's lifetime; only the
/// position, the field values and the selection flag change.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    id: String,
    pub position: Position,
    data: BlockData,
    /// Transient UI flag. Never persisted.
    pub selected: bool,
}

impl Block {
    pub fn new(id: impl Into<String>, position: Position, data: BlockData) -> Self {
        Self {
            id: id.into(),
            position,
            data,
            selected: false,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn data(&self) -> &BlockData {
        &self.data
    }

    pub(crate) fn data_mut(&mut self) -> &mut BlockData {
        &mut self.data
    }

    /// `None` for blocks loaded with a tag the catalog does not know.
    pub fn kind(&self) -> Option<BlockKind> {
        self.data.kind()
    }

    pub fn tag(&self) -> &str {
        self.data.tag()
    }

    pub fn label(&self) -> Option<&str> {
        self.data.label.as_deref()
    }

    pub fn exit_handles(&self) -> Vec<String> {
        self.data.exit_handles()
    }
}

/// A directed connection from one block's exit to another block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge {
    pub id: String,
    pub source: String,
    pub target: String,
    pub source_handle: Option<String>,
    pub target_handle: Option<String>,
    /// Transient UI flag. Never persisted.
    pub selected: bool,
}

impl Edge {
    pub fn new(
        id: impl Into<String>,
        source: impl Into<String>,
        target: impl Into<String>,
        source_handle: Option<String>,
    ) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            target: target.into(),
            source_handle,
            target_handle: None,
            selected: false,
        }
    }

    /// The exit this edge leaves from; an absent handle means the default exit.
    pub fn handle(&self) -> &str {
        self.source_handle.as_deref().unwrap_or(DEFAULT_HANDLE)
    }

    pub fn touches(&self, block_id: &str) -> bool {
        self.source == block_id || self.target == block_id
    }

    /// Same endpoints and same exit handle.
    pub fn parallels(&self, other: &Edge) -> bool {
        self.source == other.source && self.target == other.target && self.handle() == other.handle()
    }
}

/// A connection the user is dragging out, not yet part of the graph.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingConnection {
    pub source: String,
    pub source_handle: Option<String>,
    pub target: String,
    pub target_handle: Option<String>,
}

impl PendingConnection {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            ..Default::default()
        }
    }

    pub fn from_handle(mut self, handle: impl Into<String>) -> Self {
        self.source_handle = Some(handle.into());
        self
    }
}

/// Full copy of the graph at one moment, used for undo/redo.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GraphSnapshot {
    pub blocks: Vec<Block>,
    pub edges: Vec<Edge>,
}

/// Counts reported by a removal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RemovalSummary {
    pub removed_blocks: usize,
    pub removed_edges: usize,
}

impl RemovalSummary {
    pub fn is_empty(&self) -> bool {
        self.removed_blocks == 0 && self.removed_edges == 0
    }
}

/// The complete block and edge graph for one bot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Scenario {
    pub bot_id: String,
    pub blocks: Vec<Block>,
    pub edges: Vec<Edge>,
    admin_chat_id: Option<String>,
}

pub const TEMPLATE_WELCOME_TEXT: &str = "Welcome! The bot is running.";
pub const TEMPLATE_MESSAGE_TEXT: &str = "This is a test message from your bot!";

impl Scenario {
    pub fn empty(bot_id: impl Into<String>) -> Self {
        Self {
            bot_id: bot_id.into(),
            ..Default::default()
        }
    }

    /// The scenario every new bot starts with: a `start` block wired to a
    /// `message` block.
    pub fn template(bot_id: impl Into<String>) -> Self {
        let start = template_block("1", BlockKind::Start, 100.0, TEMPLATE_WELCOME_TEXT);
        let message = template_block("2", BlockKind::Message, 200.0, TEMPLATE_MESSAGE_TEXT);
        Self {
            bot_id: bot_id.into(),
            blocks: vec![start, message],
            edges: vec![Edge::new("e1-2", "1", "2", None)],
            admin_chat_id: None,
        }
    }

    pub fn admin_chat_id(&self) -> Option<&str> {
        self.admin_chat_id.as_deref()
    }

    /// Set the chat that receives operator notifications. Blank clears it;
    /// anything else must be digits only.
    pub fn set_admin_chat_id(&mut self, chat_id: Option<&str>) -> Result<(), ValidationError> {
        self.admin_chat_id = validate_chat_id(chat_id)?;
        Ok(())
    }

    /// Unvalidated access for values that were checked on the way in.
    pub(crate) fn admin_chat_id_mut(&mut self) -> &mut Option<String> {
        &mut self.admin_chat_id
    }

    pub fn block(&self, id: &str) -> Option<&Block> {
        self.blocks.iter().find(|b| b.id() == id)
    }

    /// Edges whose source or target block is missing. Loading a scenario
    /// into a `GraphStore` drops them.
    pub fn dangling_edges(&self) -> Vec<&Edge> {
        let ids: AHashSet<&str> = self.blocks.iter().map(Block::id).collect();
        self.edges
            .iter()
            .filter(|e| !ids.contains(e.source.as_str()) || !ids.contains(e.target.as_str()))
            .collect()
    }

    /// Edges leaving from a handle their source block does not expose.
    pub fn misrouted_edges(&self) -> Vec<&Edge> {
        self.edges
            .iter()
            .filter(|e| {
                self.block(&e.source)
                    .is_some_and(|b| !b.exit_handles().iter().any(|h| h == e.handle()))
            })
            .collect()
    }
}

pub(crate) fn validate_chat_id(chat_id: Option<&str>) -> Result<Option<String>, ValidationError> {
    match chat_id.map(str::trim) {
        None | Some("") => Ok(None),
        Some(id) if id.chars().all(|c| c.is_ascii_digit()) => Ok(Some(id.to_string())),
        Some(id) => Err(ValidationError::InvalidChatId(id.to_string())),
    }
}

fn template_block(id: &str, kind: BlockKind, y: f64, text: &str) -> Block {
    let mut data = BlockData::for_kind(kind);
    data.label = Some(text.to_string());
    Block::new(id, Position::new(250.0, y), data)
}
