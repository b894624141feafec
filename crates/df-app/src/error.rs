//! Error types for the df-app service layer.

/// Application error wrapping the backend crates' errors for the CLI.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Study error: {0}")]
    Study(String),

    #[error("Example not found: {0}")]
    ExampleNotFound(String),

    #[error("Compiler error: {0}")]
    Compile(String),

    #[error("Model error: {0}")]
    Model(String),

    #[error("Simulation error: {0}")]
    Simulation(String),

    #[error("Results error: {0}")]
    Results(String),

    #[error("Run not found: {0}")]
    RunNotFound(String),

    #[error("{failed} of {total} examples failed")]
    ExamplesFailed { failed: usize, total: usize },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for df-app operations.
pub type AppResult<T> = Result<T, AppError>;

impl From<df_project::ProjectError> for AppError {
    fn from(err: df_project::ProjectError) -> Self {
        match err {
            df_project::ProjectError::UnknownExample { id } => AppError::ExampleNotFound(id),
            other => AppError::Study(other.to_string()),
        }
    }
}

impl From<df_compile::CompileError> for AppError {
    fn from(err: df_compile::CompileError) -> Self {
        AppError::Compile(err.to_string())
    }
}

impl From<df_ocp::OcpError> for AppError {
    fn from(err: df_ocp::OcpError) -> Self {
        AppError::Model(err.to_string())
    }
}

impl From<df_sim::SimError> for AppError {
    fn from(err: df_sim::SimError) -> Self {
        AppError::Simulation(err.to_string())
    }
}

impl From<df_results::ResultsError> for AppError {
    fn from(err: df_results::ResultsError) -> Self {
        match err {
            df_results::ResultsError::RunNotFound { run_id } => AppError::RunNotFound(run_id),
            other => AppError::Results(other.to_string()),
        }
    }
}
