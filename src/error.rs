use thiserror::Error;

/// Fallback text shown when a failed request carries no usable message.
pub const GENERIC_NETWORK_MESSAGE: &str = "Network error. Please check your connection and try again.";

/// Errors raised while merging a field patch into a block's content.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ContentError {
    #[error("Field patch for block '{block_id}' must be a JSON object, got: {found}")]
    PatchNotAnObject { block_id: String, found: String },

    #[error("Field patch does not fit a '{block_type}' block: {message}")]
    InvalidFields { block_type: String, message: String },
}

/// Errors raised by graph mutations that would break the scenario's invariants.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("Block '{0}' does not exist in this scenario")]
    UnknownBlock(String),

    #[error("Block '{block_id}' has no exit handle named '{handle}'")]
    UnknownHandle { block_id: String, handle: String },

    #[error("A block cannot be connected to itself ('{0}')")]
    SelfLoop(String),

    #[error("Block '{source_id}' is already connected to '{target_id}' on that handle")]
    DuplicateConnection { source_id: String, target_id: String },
}

/// Errors caught before any network call is made.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("'{0}' must not be empty")]
    EmptyField(&'static str),

    #[error("Import document is missing the required '{0}' key")]
    MissingImportKey(&'static str),

    #[error("Import document is malformed: {0}")]
    MalformedImport(String),

    #[error("A bot named '{0}' already exists")]
    DuplicateName(String),

    #[error("Admin chat id must contain only digits, got '{0}'")]
    InvalidChatId(String),

    #[error("Bot '{0}' has no saved token; save the token first")]
    MissingToken(String),
}

/// Transport and application-level failures reported by the backend.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("Request timed out; is the backend server running?")]
    Timeout,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Backend responded with status {status}: {}", .message.as_deref().unwrap_or("no message"))]
    Status { status: u16, message: Option<String> },

    #[error("Could not decode backend response: {0}")]
    Decode(String),
}

impl BackendError {
    /// The text to show a human: the backend's own message when it sent one,
    /// otherwise a generic network-error notice.
    pub fn user_message(&self) -> String {
        match self {
            BackendError::Status {
                message: Some(message),
                ..
            } if !message.trim().is_empty() => message.clone(),
            _ => GENERIC_NETWORK_MESSAGE.to_string(),
        }
    }
}

/// Errors raised when a scenario document cannot be interpreted.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DocumentError {
    #[error("Failed to parse scenario JSON: {0}")]
    JsonParseError(String),

    #[error("Node at index {index} has no id")]
    MissingNodeId { index: usize },

    #[error("Node id '{0}' appears more than once")]
    DuplicateNodeId(String),

    #[error("Node '{node_id}' has invalid data: {message}")]
    InvalidNodeData { node_id: String, message: String },
}

/// Errors surfaced by the persistence adapter.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PersistenceError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Document(#[from] DocumentError),
}

impl PersistenceError {
    /// Message suitable for an interactive notice.
    pub fn user_message(&self) -> String {
        match self {
            PersistenceError::Backend(e) => e.user_message(),
            other => other.to_string(),
        }
    }
}

/// Errors surfaced by bot run/stop/restart control.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ControlError {
    #[error("Another '{0}' request is still in flight")]
    Busy(&'static str),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Errors raised by the local draft store.
#[derive(Error, Debug)]
pub enum DraftError {
    #[error("Draft I/O failed for '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Draft encoding failed: {0}")]
    Codec(String),

    #[error("Draft file for '{expected}' holds bot '{found}'")]
    BotMismatch { expected: String, found: String },
}

/// Errors raised while loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Could not read config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config: {0}")]
    Invalid(String),
}
