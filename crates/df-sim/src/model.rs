//! TransientModel trait for pluggable dynamic systems.

use crate::error::SimResult;

/// A system `x_dot = f(t, x)` that the step methods can advance.
///
/// Implementors supply the state arithmetic the methods need, so the
/// methods stay independent of the state representation.
pub trait TransientModel {
    /// State type (must be Clone).
    type State: Clone;

    /// Declared initial state.
    fn initial_state(&self) -> Self::State;

    /// Compute state derivative dxdt = f(t, x).
    fn rhs(&self, t: f64, x: &Self::State) -> SimResult<Self::State>;

    /// Add two states element-wise: result = a + b.
    fn add(&self, a: &Self::State, b: &Self::State) -> Self::State;

    /// Scale a state by a scalar: result = scale * a.
    fn scale(&self, a: &Self::State, scale: f64) -> Self::State;

    /// Weighted RMS norm of `err`, scaled by `atol + rtol * max(|a|, |b|)`.
    fn error_norm(
        &self,
        err: &Self::State,
        a: &Self::State,
        b: &Self::State,
        atol: f64,
        rtol: f64,
    ) -> f64;

    /// True when every component is finite.
    fn is_finite(&self, x: &Self::State) -> bool;
}
