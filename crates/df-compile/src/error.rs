//! Error types for model compilation.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CompileError {
    /// Neither a usable toolchain nor a precompiled artifact.
    #[error("Configuration error: {what}")]
    Configuration { what: String },

    #[error("Compiler failed for model {model}: {message}")]
    Toolchain { model: String, message: String },

    #[error("Invalid model name: '{name}'")]
    InvalidModelName { name: String },

    #[error("I/O error on {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type CompileResult<T> = Result<T, CompileError>;

impl CompileError {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| CompileError::Io { path, source }
    }
}
