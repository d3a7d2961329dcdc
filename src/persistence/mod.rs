//! Everything that leaves the process: the scenario wire format, the
//! backend seam and its HTTP implementation, bot lifecycle control and the
//! local draft fallback.

pub mod adapter;
pub mod backend;
pub mod control;
pub mod document;
pub mod draft;
pub mod http;

pub use adapter::{ImportReceipt, PersistenceAdapter};
pub use backend::{BackendAck, ScenarioBackend};
pub use control::{BotAction, BotController, ControlOutcome};
pub use document::{EdgeDocument, ExportBundle, IMPORT_KEYS, NodeDocument, ScenarioDocument};
pub use draft::{Draft, DraftStore};
pub use http::HttpBackend;
