use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure classes surfaced in operation results. Not tied to any transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidInput,
    NotFound,
    Ambiguous,
    StaleRef,
    FrameUnavailable,
    Timeout,
    Blocked,
    Transport,
    LlmFailed,
    Cancelled,
    Internal,
}

#[derive(Debug, Error)]
pub enum AutomationError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("element not found: {0}")]
    NotFound(String),

    #[error("identifier '{identifier}' is ambiguous ({count} matches, none textually equal)")]
    Ambiguous { identifier: String, count: usize },

    #[error("stale ref '{0}', take a new snapshot")]
    StaleRef(String),

    #[error("frame unavailable: {0}")]
    FrameUnavailable(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("blocked: {0}")]
    Blocked(String),

    #[error("CDP transport error: {0}")]
    Transport(String),

    #[error("code generation failed: {0}")]
    LlmFailed(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AutomationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidInput(_) => ErrorKind::InvalidInput,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Ambiguous { .. } => ErrorKind::Ambiguous,
            Self::StaleRef(_) => ErrorKind::StaleRef,
            Self::FrameUnavailable(_) => ErrorKind::FrameUnavailable,
            Self::Timeout(_) => ErrorKind::Timeout,
            Self::Blocked(_) => ErrorKind::Blocked,
            Self::Transport(_) => ErrorKind::Transport,
            Self::LlmFailed(_) => ErrorKind::LlmFailed,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }
}

impl From<chromiumoxide::error::CdpError> for AutomationError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        Self::Transport(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AutomationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping_is_stable() {
        assert_eq!(
            AutomationError::InvalidInput("x".into()).kind(),
            ErrorKind::InvalidInput
        );
        assert_eq!(AutomationError::Cancelled.kind(), ErrorKind::Cancelled);
        assert_eq!(
            AutomationError::StaleRef("@e1".into()).kind(),
            ErrorKind::StaleRef
        );
        assert_eq!(
            AutomationError::Timeout(Duration::from_secs(10)).kind(),
            ErrorKind::Timeout
        );
    }

    #[test]
    fn test_error_kind_serializes_snake_case() {
        let json = serde_json::to_string(&ErrorKind::FrameUnavailable).unwrap();
        assert_eq!(json, "\"frame_unavailable\"");
        let back: ErrorKind = serde_json::from_str("\"stale_ref\"").unwrap();
        assert_eq!(back, ErrorKind::StaleRef);
    }
}
