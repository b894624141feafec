//! Error types for building and running simulations.

use thiserror::Error;

use crate::simulator::SimRecord;

/// Errors encountered while building or running a simulation.
#[derive(Error, Debug)]
pub enum SimError {
    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },

    #[error("OCP is not in explicit form; call make_explicit first")]
    NotExplicit,

    #[error("Variable not found: {name}")]
    NameNotFound { name: String },

    #[error(transparent)]
    Integration(#[from] Box<IntegrationFailure>),

    #[error("Backend error: {message}")]
    Backend { message: String },
}

pub type SimResult<T> = Result<T, SimError>;

/// A run that stopped before the end of its grid.
///
/// `partial` holds every row computed before the failure, so callers can
/// decide whether a truncated result is still useful.
#[derive(Error, Debug)]
#[error(
    "Integration failed at t = {t_failed} after grid index {last_good_index}: {reason}"
)]
pub struct IntegrationFailure {
    pub last_good_index: usize,
    pub t_failed: f64,
    pub reason: String,
    pub partial: SimRecord,
}

impl From<df_core::DfError> for SimError {
    fn from(e: df_core::DfError) -> Self {
        match e {
            df_core::DfError::InvalidArg { what }
            | df_core::DfError::InvalidGrid { what, .. }
            | df_core::DfError::NonFinite { what, .. } => SimError::InvalidArg { what },
        }
    }
}

impl From<df_ocp::OcpError> for SimError {
    fn from(e: df_ocp::OcpError) -> Self {
        match e {
            df_ocp::OcpError::NameNotFound { name } => SimError::NameNotFound { name },
            other => SimError::Backend {
                message: other.to_string(),
            },
        }
    }
}
