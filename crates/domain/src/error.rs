//! Unified error taxonomy for the control core.
//!
//! Every kind maps to a stable HTTP status class at the API boundary; the
//! session service translates adapter errors 1:1 and never retries.

use thiserror::Error;

use crate::capability::BackendKind;

/// Unified error type for control-plane operations.
#[derive(Debug, Clone, Error)]
pub enum CoreError {
    /// The configured concurrent-session cap is reached.
    #[error("session capacity exhausted")]
    CapacityExhausted,

    /// A session / program / snapshot / co-sim member id is unknown.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// No adapter is registered for the requested backend kind.
    #[error("no backend registered for kind: {0}")]
    BackendUnknown(BackendKind),

    /// The backend variant does not implement the requested operation.
    #[error("backend {backend} does not support {op}")]
    Unsupported {
        backend: BackendKind,
        op: &'static str,
    },

    /// The operation requires a running co-sim group.
    #[error("co-simulation group is not running")]
    NotRunning,

    /// Could not allocate a port or start the child process.
    #[error("spawn failed: {0}")]
    Spawn(String),

    /// Monitor dial/write failed, or an external process exited non-zero.
    #[error("backend transport error: {0}")]
    Transport(String),

    /// The durable store rejected a write or delete.
    #[error("persistence error: {0}")]
    Persist(String),

    /// Caller cancellation observed.
    #[error("operation cancelled")]
    Cancelled,

    /// Invariant violation not otherwise classified.
    #[error("internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Create a NotFound error with entity type and id context.
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn unsupported(backend: BackendKind, op: &'static str) -> Self {
        Self::Unsupported { backend, op }
    }

    pub fn spawn(msg: impl ToString) -> Self {
        Self::Spawn(msg.to_string())
    }

    pub fn transport(msg: impl ToString) -> Self {
        Self::Transport(msg.to_string())
    }

    pub fn persist(msg: impl ToString) -> Self {
        Self::Persist(msg.to_string())
    }

    pub fn internal(msg: impl ToString) -> Self {
        Self::Internal(msg.to_string())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::Unsupported { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_carries_entity_and_id() {
        let err = CoreError::not_found("session", "abc123");
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "session not found: abc123");
    }

    #[test]
    fn unsupported_names_backend_and_operation() {
        let err = CoreError::unsupported(BackendKind::Qemu, "step");
        assert!(err.is_unsupported());
        assert!(err.to_string().contains("qemu"));
        assert!(err.to_string().contains("step"));
    }
}
