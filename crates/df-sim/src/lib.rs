//! Numeric simulation of explicit OCPs.
//!
//! Provides:
//! - `DaeFunction`: the explicit program compiled to slot-indexed expressions
//! - Fixed-step (Euler, RK4) and adaptive (Dormand-Prince 4(5)) integrators
//! - Output functions over named variables
//! - `Simulator`: grid-driven runs with partial results on failure

pub mod builder;
pub mod dae;
pub mod error;
pub mod integrator;
pub mod model;
pub mod output;
pub mod simulator;

pub use builder::build;
pub use dae::{DaeFunction, SlotLayout};
pub use error::{IntegrationFailure, SimError, SimResult};
pub use integrator::{
    Dopri45, ForwardEuler, Integrator, IntegratorOptions, IntegratorStats, Method, Rk4,
    StepFailure, StepMethod,
};
pub use model::TransientModel;
pub use output::{OutputFunction, OutputFunctionFactory};
pub use simulator::{SimRecord, Simulator};
