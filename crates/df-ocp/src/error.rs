//! Error types for OCP loading and transformation.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading or transforming a symbolic OCP.
#[derive(Error, Debug)]
pub enum OcpError {
    #[error("Schema error: {what}")]
    Schema { what: String },

    #[error("XML error at byte {position}: {message}")]
    Xml { position: u64, message: String },

    #[error("Unsolvable structure: {what}")]
    UnsolvableStructure { what: String },

    #[error("Variable not found: {name}")]
    NameNotFound { name: String },

    #[error("Failed to read model description: {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type OcpResult<T> = Result<T, OcpError>;

impl OcpError {
    pub(crate) fn schema(what: impl Into<String>) -> Self {
        OcpError::Schema { what: what.into() }
    }

    pub(crate) fn unsolvable(what: impl Into<String>) -> Self {
        OcpError::UnsolvableStructure { what: what.into() }
    }
}
