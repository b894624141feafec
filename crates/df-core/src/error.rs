use thiserror::Error;

pub type DfResult<T> = Result<T, DfError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DfError {
    #[error("Non-finite numeric value for {what}: {value}")]
    NonFinite { what: &'static str, value: f64 },

    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },

    #[error("Invalid time grid: {what} (index={index})")]
    InvalidGrid { what: &'static str, index: usize },
}
