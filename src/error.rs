//! Typed error taxonomy shared across the directive engine.
//!
//! Tool handlers convert these into MCP error strings; multi-tier operations
//! report per-tier outcomes instead of collapsing to a single error (see
//! [`crate::directive::sync`]).

use thiserror::Error;

/// Errors surfaced by directive operations.
#[derive(Debug, Error)]
pub enum DirigentError {
    /// A required parameter is missing or malformed. Surfaced directly to the
    /// caller; never retried.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The directive (or requested version) does not exist at the requested
    /// tier.
    #[error("not found: {0}")]
    NotFound(String),

    /// Directive content failed structural checks. Carries the full list of
    /// violations so the caller can fix all of them at once.
    #[error("validation failed: {}", .0.join("; "))]
    ValidationFailed(Vec<String>),

    /// Publish-time conflict between the caller-supplied version and the
    /// version declared inside the directive content. Hard reject, never
    /// coerced.
    #[error("version mismatch: publishing as '{supplied}' but content declares version '{declared}'")]
    VersionMismatch { supplied: String, declared: String },

    /// The registry is unreachable or not configured. Distinct from
    /// [`DirigentError::NotFound`] so callers can tell "doesn't exist" from
    /// "couldn't check".
    #[error("registry unavailable: {0}")]
    RegistryUnavailable(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<crate::registry::RegistryError> for DirigentError {
    fn from(err: crate::registry::RegistryError) -> Self {
        match err {
            crate::registry::RegistryError::NotFound(what) => Self::NotFound(what),
            crate::registry::RegistryError::Unavailable(why) => Self::RegistryUnavailable(why),
            crate::registry::RegistryError::Storage(e) => Self::Other(e.into()),
        }
    }
}
