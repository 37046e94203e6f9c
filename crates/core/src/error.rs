//! Error taxonomy for tool access.

use thiserror::Error;

/// Failure of the external settings/credential store. This is the only error
/// the subsystem lets escape; every other outcome is a result value.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Settings store unavailable: {0}")]
    Unavailable(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

/// Typed form of a failed resolution or permission check, for call sites that
/// want to propagate with `?` instead of matching on result values.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AccessError {
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Tool '{name}' requires connecting {}", .providers.join(" or "))]
    ProviderNotConnected { name: String, providers: Vec<String> },

    #[error("Tool name '{name}' is ambiguous; use one of: {}", .candidates.join(", "))]
    AmbiguousToolName { name: String, candidates: Vec<String> },

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("{0}")]
    VacationModeActive(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl AccessError {
    /// Whether the caller can recover without operator intervention.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, AccessError::Store(_))
    }
}
