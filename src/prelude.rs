//! Prelude module for convenient imports
//!
//! Re-exports the types most hosts need to open, edit and save a scenario.
//!
//! # Example
//!
//! ```rust,no_run
//! use botflow::prelude::*;
//!
//! # fn run_example() -> Result<()> {
//! let json = std::fs::read_to_string("path/to/scenario.json")?;
//! let scenario = ScenarioDocument::from_json(&json)?.into_scenario("demo", &BlockRegistry::new())?;
//!
//! let mut session = EditingSession::new(scenario);
//! session.add_block(BlockKind::Message, Position::new(250.0, 300.0));
//! println!("{} blocks", session.store().blocks().len());
//! # Ok(())
//! # }
//! ```

// Block catalog
pub use crate::block::{BlockContent, BlockData, BlockKind, BlockLookup, BlockRegistry};

// Graph model
pub use crate::graph::{
    Block, Edge, GraphSnapshot, GraphStore, PendingConnection, Position, RemovalSummary, Scenario,
};

// Editing
pub use crate::history::HistoryManager;
pub use crate::session::{
    AlwaysConfirm, Confirm, ConnectionPolicy, DeleteOutcome, DeletePrompt, EditingSession, Viewport,
};

// Persistence
pub use crate::config::{BackendConfig, EditorConfig};
pub use crate::persistence::{
    BotController, ControlOutcome, Draft, DraftStore, ExportBundle, HttpBackend,
    PersistenceAdapter, ScenarioBackend, ScenarioDocument,
};

// Error types
pub use crate::error::{
    BackendError, ContentError, ControlError, DocumentError, GraphError, PersistenceError,
    ValidationError,
};

// Result type alias for convenience
pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;
