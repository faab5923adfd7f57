use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{op}: clip not found: {id}")]
    ClipNotFound { op: &'static str, id: Uuid },

    #[error("{op}: track not found: {id}")]
    TrackNotFound { op: &'static str, id: Uuid },

    #[error("{op}: clip {id} is not an audio clip")]
    NotAudio { op: &'static str, id: Uuid },

    #[error("{op}: clip {id} would overlap a neighbouring clip")]
    Overlap { op: &'static str, id: Uuid },

    #[error("{op}: clip {id} would fall below the minimum visible duration")]
    BelowMinimumDuration { op: &'static str, id: Uuid },

    #[error("{op}: nothing to act on")]
    EmptyBatch { op: &'static str },

    #[error("a gesture is already in progress")]
    GestureInProgress,

    #[error("no gesture in progress")]
    NoActiveGesture,

    #[error("Timeline invariant violated: {0}")]
    InvariantViolation(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),
}

pub type Result<T> = std::result::Result<T, CoreError>;
