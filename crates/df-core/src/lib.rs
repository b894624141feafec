//! df-core: shared foundation for daeflow.
//!
//! Contains:
//! - numeric (Real, finiteness checks, error norms)
//! - grid (time grid construction and validation)
//! - ids (compact variable IDs)
//! - error (shared error types)

pub mod error;
pub mod grid;
pub mod ids;
pub mod numeric;

// Re-exports: nice ergonomics for downstream crates
pub use error::{DfError, DfResult};
pub use grid::{linspace, validate_grid};
pub use ids::*;
pub use numeric::*;
