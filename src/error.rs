//! Error type shared by the cascade engine and the bundled backends.

use thiserror::Error;

/// Boxed error produced by third-party stores wrapped in a backend.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Error, Debug)]
pub enum CascadeError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    /// A store wrapped by a backend failed.
    #[error("Backend `{backend}` failed: {source}")]
    Backend {
        backend: String,
        #[source]
        source: BoxError,
    },

    /// A callback tier was invoked for a primitive that was never wired in.
    #[error("Operation `{operation}` is not configured on callback backend")]
    NotConfigured { operation: &'static str },

    /// An item key was required but the tier has no item-to-key adapter.
    #[error("Item key adapter is not configured for tier `{tier}`")]
    ItemKeyNotConfigured { tier: String },

    #[error("Cannot build an empty tier chain")]
    EmptyChain,

    #[error("Duplicate tier name `{0}`")]
    DuplicateTier(String),
}

impl CascadeError {
    /// Wrap an arbitrary store error.
    pub fn backend(backend: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Backend {
            backend: backend.into(),
            source: source.into(),
        }
    }
}

/// Result alias used across the crate.
pub type Result<T, E = CascadeError> = std::result::Result<T, E>;
