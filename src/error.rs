//! Error taxonomy for the viewer engine.
//!
//! Most of these never reach the caller: measurement gaps degrade to a fade,
//! interrupted animations resolve through cancellation, and decode failures are
//! pinned to a single paged item. They are still typed so they can be logged
//! and matched consistently.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ViewerError {
    /// The source thumbnail handle did not resolve to an on-screen rectangle.
    #[error("no on-screen rectangle for {uri} in group {group_id}")]
    MeasurementUnavailable { group_id: String, uri: String },

    /// An image or video failed to load.
    #[error("failed to decode {uri}: {reason}")]
    DecodeFailure { uri: String, reason: String },

    /// A gesture combination the arbiter does not handle.
    #[error("unhandled gesture combination: {0}")]
    GestureConflict(String),

    /// An animation was superseded before it settled.
    #[error("animation interrupted")]
    AnimationInterrupted,

    #[error("no entry for {uri} in group {group_id}")]
    EntryNotFound { group_id: String, uri: String },

    #[error("viewer has no active session")]
    NoSession,

    #[error("invalid viewer configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, ViewerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = ViewerError::EntryNotFound {
            group_id: "g1".to_string(),
            uri: "a.jpg".to_string(),
        };
        assert_eq!(err.to_string(), "no entry for a.jpg in group g1");

        let err = ViewerError::DecodeFailure {
            uri: "b.mp4".to_string(),
            reason: "codec".to_string(),
        };
        assert!(err.to_string().contains("b.mp4"));
    }
}
