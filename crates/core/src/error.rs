//! Error taxonomy shared by every component of the companion core.

use std::path::PathBuf;

/// Convenience alias used throughout the crate.
pub type Result<T, E = CompanionError> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum CompanionError {
    /// A tool argument was missing or out of range. Nothing was changed.
    #[error("{0}")]
    Validation(String),

    /// An animation, pose, voice or search result could not be resolved.
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// A collaborating process or service could not be reached.
    #[error("{collaborator} is not reachable: {hint}")]
    Unreachable {
        collaborator: &'static str,
        hint: String,
    },

    #[error("speech synthesis failed: {0}")]
    Synthesis(String),

    #[error("audio playback failed: {0}")]
    Playback(String),

    /// Best-effort removal of a played asset failed. Only ever logged.
    #[error("could not remove asset {}: {source}", path.display())]
    AssetCleanup {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("animation catalog {} failed: {source}", path.display())]
    Catalog {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl CompanionError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    pub fn unreachable(collaborator: &'static str, hint: impl Into<String>) -> Self {
        Self::Unreachable {
            collaborator,
            hint: hint.into(),
        }
    }

    /// True for errors caused by a missing collaborator rather than bad input.
    pub fn is_unreachable(&self) -> bool {
        matches!(self, Self::Unreachable { .. })
    }
}
