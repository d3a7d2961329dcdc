use crate::block::DEFAULT_HANDLE;
use crate::error::GraphError;
use crate::graph::{GraphStore, PendingConnection};
use serde::{Deserialize, Serialize};

/// Which connections `EditingSession::connect` accepts.
///
/// The default accepts self-loops and parallel edges: a block wired back to
/// itself is how a flow asks the same question again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionPolicy {
    pub allow_self_loops: bool,
    pub allow_duplicates: bool,
    /// Reject handles the source block does not expose.
    pub strict_handles: bool,
}

impl Default for ConnectionPolicy {
    fn default() -> Self {
        Self {
            allow_self_loops: true,
            allow_duplicates: true,
            strict_handles: false,
        }
    }
}

impl ConnectionPolicy {
    /// Rejects self-loops, parallel edges and unknown handles.
    pub fn strict() -> Self {
        Self {
            allow_self_loops: false,
            allow_duplicates: false,
            strict_handles: true,
        }
    }

    pub fn check(&self, store: &GraphStore, connection: &PendingConnection) -> Result<(), GraphError> {
        let source = store
            .block(&connection.source)
            .ok_or_else(|| GraphError::UnknownBlock(connection.source.clone()))?;
        if !store.contains_block(&connection.target) {
            return Err(GraphError::UnknownBlock(connection.target.clone()));
        }

        if !self.allow_self_loops && connection.source == connection.target {
            return Err(GraphError::SelfLoop(connection.source.clone()));
        }

        let handle = connection.source_handle.as_deref().unwrap_or(DEFAULT_HANDLE);
        if self.strict_handles && !source.exit_handles().iter().any(|h| h == handle) {
            return Err(GraphError::UnknownHandle {
                block_id: connection.source.clone(),
                handle: handle.to_string(),
            });
        }

        if !self.allow_duplicates {
            let duplicate = store
                .outgoing(&connection.source)
                .any(|e| e.target == connection.target && e.handle() == handle);
            if duplicate {
                return Err(GraphError::DuplicateConnection {
                    source_id: connection.source.clone(),
                    target_id: connection.target.clone(),
                });
            }
        }

        Ok(())
    }
}
