//! # Botflow - Scenario Editing Core for Telegram Bot Flows
//!
//! **Botflow** holds the model behind a visual bot-flow editor: typed blocks
//! (message, condition, buttons, delay, API call...) placed on a canvas and
//! wired into a directed graph, an undo history over that graph, and the
//! persistence contract with the backend that stores scenarios and runs the
//! bots. Rendering is left to the host.
//!
//! ## Core Workflow
//!
//! 1.  **Load**: Build a `PersistenceAdapter` over a `ScenarioBackend` (the
//!     bundled `HttpBackend`, or your own) and open an `EditingSession` for a bot.
//! 2.  **Edit**: Drop blocks from the palette, connect their exit handles,
//!     edit fields, delete behind a confirmation gate, undo and redo.
//! 3.  **Save**: `EditingSession::save` commits pending edits and writes the
//!     scenario back. Failures come back as errors; nothing is retried.
//! 4.  **Run**: Start, stop and poll the bot with a `BotController`.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use botflow::prelude::*;
//! use serde_json::json;
//!
//! async fn edit() -> Result<()> {
//!     let config = EditorConfig::default();
//!     let adapter = PersistenceAdapter::new(HttpBackend::new(&config.backend)?);
//!
//!     let mut session = EditingSession::open(&adapter, "support_bot", &config).await?;
//!
//!     // A block dragged from the palette and dropped at a screen position.
//!     let question = session
//!         .drop_block("condition", Position::new(420.0, 180.0))
//!         .map(|block| block.id().to_string());
//!
//!     if let Some(id) = question {
//!         session.edit_field(&id, &json!({ "condition": "age >= 18" }))?;
//!         session.commit();
//!     }
//!
//!     session.save(&adapter).await?;
//!     Ok(())
//! }
//! ```

pub mod block;
pub mod config;
pub mod error;
pub mod graph;
pub mod history;
pub mod persistence;
pub mod prelude;
pub mod session;
