//! df-results: run cache and time series storage.

pub mod hash;
pub mod query;
pub mod store;
pub mod types;

pub use hash::compute_run_id;
pub use query::{RunSummary, extract_series, summarize};
pub use store::RunStore;
pub use types::*;

pub type ResultsResult<T> = Result<T, ResultsError>;

#[derive(thiserror::Error, Debug)]
pub enum ResultsError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Run not found: {run_id}")]
    RunNotFound { run_id: String },

    #[error("Variable '{name}' not recorded in run {run_id}")]
    VariableNotFound { run_id: String, name: String },

    #[error("Invalid path: {message}")]
    InvalidPath { message: String },

    #[error("Record at t={time} has {got} values, expected {expected}")]
    RowWidth {
        time: f64,
        got: usize,
        expected: usize,
    },
}
