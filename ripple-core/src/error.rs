//! Error types for the reactive core.

use thiserror::Error;

/// Boxed error returned by host-supplied getters and callbacks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the reactive core.
///
/// `PathParse` and `InvalidMutation` are only logged; the operations that
/// raise them fall back to a no-op.
#[derive(Debug, Error)]
pub enum Error {
    /// A watch path contains characters outside `[A-Za-z0-9_.$]`.
    #[error("failed watching path \"{path}\": only simple dot-delimited paths are supported")]
    PathParse { path: String },

    /// The property's descriptor forbids converting it to a reactive slot.
    #[error("property \"{key}\" is not configurable")]
    NonConfigurable { key: String },

    /// The getter of a computation failed.
    #[error("getter for watcher \"{expression}\" failed: {source}")]
    Getter {
        expression: String,
        #[source]
        source: BoxError,
    },

    /// The change callback of a computation failed.
    #[error("callback for watcher \"{expression}\" failed: {source}")]
    Callback {
        expression: String,
        #[source]
        source: BoxError,
    },

    /// Adding or removing properties on root data or an internal instance.
    #[error("{message}")]
    InvalidMutation { message: String },

    /// New key or mutating operation on a frozen or non-extensible value.
    #[error("value is not extensible")]
    NotExtensible,
}

impl Error {
    /// Whether the error came out of host-supplied code rather than the core.
    pub fn is_host_error(&self) -> bool {
        matches!(self, Error::Getter { .. } | Error::Callback { .. })
    }
}
