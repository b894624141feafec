//! Application service layer for daeflow.
//!
//! Provides:
//! - `StudyContext`: a loaded study with its compiler mode resolved once
//! - `run_study`: per-example runs; a failure is tagged with its stage and
//!   never stops the remaining examples
//! - run cache lookups and series export

pub mod error;
pub mod pipeline;
pub mod query;
pub mod run_service;
pub mod study_service;

pub use df_results::{RunManifest, RunSummary, summarize};
pub use error::{AppError, AppResult};
pub use pipeline::{ExampleFailure, Stage};
pub use query::{run_series, write_series_csv};
pub use run_service::{
    ENGINE_VERSION, ExampleOutcome, RunOptions, RunResponse, RunTiming, StudyReport,
    compile_example, delete_run, inspect, integrator_options, list_runs, load_run, run_example,
    run_study,
};
pub use study_service::{ExampleSummary, StudyContext, load_study};
