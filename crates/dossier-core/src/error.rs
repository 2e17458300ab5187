//! Error types for the research pipeline
//!
//! Two layers:
//! - [`CapabilityError`] / [`StageError`]: content-generation failures,
//!   always recovered inside the stage that hit them
//! - [`CoreError`]: what crosses the pipeline boundary (invalid input,
//!   storage failures, terminal failure or cancellation)

use dossier_model::{IntegrityError, ModelError, SessionId};
use dossier_store::StoreError;

/// Failure reported by an external capability adapter
#[derive(Debug, thiserror::Error)]
pub enum CapabilityError {
    /// Adapter reported a failure
    #[error("capability failed: {0}")]
    Failed(String),

    /// Adapter call exceeded its time budget
    #[error("{operation} timed out after {secs}s")]
    Timeout {
        /// Capability operation name
        operation: &'static str,
        /// Budget in seconds
        secs: u64,
    },

    /// Any other adapter error
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CapabilityError {
    /// Whether this is a timeout
    #[inline]
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// Why a stage fell back
#[derive(Debug, thiserror::Error)]
pub enum StageError {
    /// Capability call failed or timed out
    #[error(transparent)]
    Capability(#[from] CapabilityError),

    /// Output referenced data outside the session
    #[error("integrity violation: {0}")]
    Integrity(#[from] IntegrityError),

    /// Output was well-formed but unusable
    #[error("invalid output: {0}")]
    InvalidOutput(String),
}

/// Pipeline error
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// Caller input rejected before any stage ran
    #[error("validation failed: {0}")]
    Validation(String),

    /// Session store failure
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Every stage fell back; the failed session was stored
    #[error("all stages failed for session {session_id}")]
    AllStagesFailed {
        /// Id of the stored failed session
        session_id: SessionId,
    },

    /// Run was cancelled; the partial session was stored
    #[error("research cancelled for session {session_id}")]
    Cancelled {
        /// Id of the stored partial session
        session_id: SessionId,
    },

    /// Invalid pipeline configuration
    #[error("configuration error: {0}")]
    Config(String),

    /// Internal session state error
    #[error("session state error: {0}")]
    Model(#[from] ModelError),
}

impl CoreError {
    /// Id of the stored session, if the run got far enough to store one
    #[must_use]
    pub fn session_id(&self) -> Option<SessionId> {
        match self {
            Self::AllStagesFailed { session_id } | Self::Cancelled { session_id } => {
                Some(*session_id)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_message() {
        let err = CapabilityError::Timeout {
            operation: "search",
            secs: 15,
        };
        assert!(err.is_timeout());
        assert_eq!(err.to_string(), "search timed out after 15s");
    }

    #[test]
    fn anyhow_errors_convert() {
        let err: CapabilityError = anyhow::anyhow!("quota exceeded").into();
        assert_eq!(err.to_string(), "quota exceeded");
        let stage: StageError = err.into();
        assert!(matches!(stage, StageError::Capability(_)));
    }

    #[test]
    fn stored_session_id_is_exposed() {
        let id = SessionId::new();
        assert_eq!(CoreError::Cancelled { session_id: id }.session_id(), Some(id));
        assert_eq!(CoreError::Validation("empty".into()).session_id(), None);
    }
}
