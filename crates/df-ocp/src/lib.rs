//! Symbolic optimal-control-problem representation.
//!
//! Provides:
//! - Expression trees for model equations (`expr`)
//! - Affine isolation of unknowns (`affine`)
//! - Model description XML loading (`xml`)
//! - `SymbolicOcp` with variable classification and binding equations
//! - Implicit DAE to explicit ODE transformation (`explicit`)

pub mod affine;
pub mod error;
pub mod explicit;
pub mod expr;
pub mod ocp;
pub mod xml;

pub use error::{OcpError, OcpResult};
pub use explicit::{ExplicitForm, SolveStep};
pub use expr::{Expr, Symbol, UnaryFn};
pub use ocp::{DeclaredVariable, SymbolicOcp, Variable, VariableKind};
pub use xml::{load, parse_str};
