//! Time integrators.
//!
//! `StepMethod` implementations advance any [`TransientModel`] by one step.
//! [`Integrator`] owns a [`DaeFunction`], its current `(t, y)` and run
//! statistics, and advances grid interval by grid interval.

use std::sync::Arc;

use nalgebra::DVector;
use tracing::{debug, info};

use crate::dae::DaeFunction;
use crate::error::{SimError, SimResult};
use crate::model::TransientModel;

/// Fixed-step single-step methods.
pub trait StepMethod {
    /// Number of rhs evaluations per step.
    const STAGES: u64;

    /// Advance state by one time step using the transient model.
    fn step<M: TransientModel>(
        &self,
        model: &M,
        t: f64,
        x: &M::State,
        dt: f64,
    ) -> SimResult<M::State>;
}

/// Classical RK4 (Runge-Kutta 4th order) integrator.
#[derive(Clone, Debug)]
pub struct Rk4;

impl StepMethod for Rk4 {
    const STAGES: u64 = 4;

    fn step<M: TransientModel>(
        &self,
        model: &M,
        t: f64,
        x: &M::State,
        dt: f64,
    ) -> SimResult<M::State> {
        let k1 = model.rhs(t, x)?;

        let x2 = model.add(x, &model.scale(&k1, 0.5 * dt));
        let k2 = model.rhs(t + 0.5 * dt, &x2)?;

        let x3 = model.add(x, &model.scale(&k2, 0.5 * dt));
        let k3 = model.rhs(t + 0.5 * dt, &x3)?;

        let x4 = model.add(x, &model.scale(&k3, dt));
        let k4 = model.rhs(t + dt, &x4)?;

        // x_new = x + (dt/6) * (k1 + 2*k2 + 2*k3 + k4)
        let k_sum = model.add(
            &model.add(&k1, &model.scale(&k2, 2.0)),
            &model.add(&model.scale(&k3, 2.0), &k4),
        );

        Ok(model.add(x, &model.scale(&k_sum, dt / 6.0)))
    }
}

/// Forward Euler (explicit, 1st order).
#[derive(Clone, Debug)]
pub struct ForwardEuler;

impl StepMethod for ForwardEuler {
    const STAGES: u64 = 1;

    fn step<M: TransientModel>(
        &self,
        model: &M,
        t: f64,
        x: &M::State,
        dt: f64,
    ) -> SimResult<M::State> {
        let xdot = model.rhs(t, x)?;
        Ok(model.add(x, &model.scale(&xdot, dt)))
    }
}

/// Dormand-Prince 5(4) embedded pair.
#[derive(Clone, Debug)]
pub struct Dopri45;

/// Outcome of one Dormand-Prince attempt.
pub struct DopriAttempt<S> {
    /// 5th-order solution.
    pub x: S,
    /// Difference between the 5th and 4th order solutions.
    pub err: S,
    /// Derivative at the new point (first stage of the next step).
    pub k_last: S,
}

impl Dopri45 {
    pub const STAGES: u64 = 6;

    const C: [f64; 7] = [0.0, 1.0 / 5.0, 3.0 / 10.0, 4.0 / 5.0, 8.0 / 9.0, 1.0, 1.0];
    const A: [&'static [f64]; 7] = [
        &[],
        &[1.0 / 5.0],
        &[3.0 / 40.0, 9.0 / 40.0],
        &[44.0 / 45.0, -56.0 / 15.0, 32.0 / 9.0],
        &[
            19372.0 / 6561.0,
            -25360.0 / 2187.0,
            64448.0 / 6561.0,
            -212.0 / 729.0,
        ],
        &[
            9017.0 / 3168.0,
            -355.0 / 33.0,
            46732.0 / 5247.0,
            49.0 / 176.0,
            -5103.0 / 18656.0,
        ],
        &[
            35.0 / 384.0,
            0.0,
            500.0 / 1113.0,
            125.0 / 192.0,
            -2187.0 / 6784.0,
            11.0 / 84.0,
        ],
    ];
    /// 5th-order weights (equal to the last row of `A`).
    const B: [f64; 7] = [
        35.0 / 384.0,
        0.0,
        500.0 / 1113.0,
        125.0 / 192.0,
        -2187.0 / 6784.0,
        11.0 / 84.0,
        0.0,
    ];
    /// 4th-order weights.
    const B_HAT: [f64; 7] = [
        5179.0 / 57600.0,
        0.0,
        7571.0 / 16695.0,
        393.0 / 640.0,
        -92097.0 / 339200.0,
        187.0 / 2100.0,
        1.0 / 40.0,
    ];

    /// One trial step of size `h`, reusing `k1 = f(t, x)`.
    ///
    /// Costs six rhs evaluations.
    pub fn attempt<M: TransientModel>(
        &self,
        model: &M,
        t: f64,
        x: &M::State,
        k1: &M::State,
        h: f64,
    ) -> SimResult<DopriAttempt<M::State>> {
        let mut k: Vec<M::State> = Vec::with_capacity(7);
        k.push(k1.clone());
        for stage in 1..7 {
            let mut xs = x.clone();
            for (j, a) in Self::A[stage].iter().enumerate() {
                if *a != 0.0 {
                    xs = model.add(&xs, &model.scale(&k[j], h * a));
                }
            }
            k.push(model.rhs(t + Self::C[stage] * h, &xs)?);
        }

        let mut x_new = x.clone();
        let mut err = model.scale(x, 0.0);
        for (j, kj) in k.iter().enumerate() {
            if Self::B[j] != 0.0 {
                x_new = model.add(&x_new, &model.scale(kj, h * Self::B[j]));
            }
            let e = Self::B[j] - Self::B_HAT[j];
            if e != 0.0 {
                err = model.add(&err, &model.scale(kj, h * e));
            }
        }

        let k_last = k.pop().unwrap_or_else(|| k1.clone());
        Ok(DopriAttempt {
            x: x_new,
            err,
            k_last,
        })
    }
}

/// Integration method selection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Method {
    /// Forward Euler with fixed sub-steps.
    ForwardEuler,
    /// Classical RK4 with fixed sub-steps.
    Rk4,
    /// Adaptive Dormand-Prince 4(5).
    #[default]
    Dopri45,
}

impl Method {
    pub fn label(self) -> &'static str {
        match self {
            Method::ForwardEuler => "forward_euler",
            Method::Rk4 => "rk4",
            Method::Dopri45 => "dopri45",
        }
    }
}

/// Options for [`Integrator`].
#[derive(Clone, Debug, PartialEq)]
pub struct IntegratorOptions {
    pub method: Method,
    /// Fixed-step methods: largest sub-step (`None`: one step per grid
    /// interval). Dopri45: upper bound on the step size.
    pub max_step: Option<f64>,
    /// Relative tolerance (Dopri45).
    pub rtol: f64,
    /// Absolute tolerance (Dopri45).
    pub atol: f64,
    /// First trial step (Dopri45); estimated from the model when `None`.
    pub initial_step: Option<f64>,
    /// Smallest accepted step (Dopri45).
    pub min_step: f64,
    /// Step budget for one grid interval, accepted and rejected steps together.
    pub max_steps_per_interval: usize,
}

impl Default for IntegratorOptions {
    fn default() -> Self {
        Self {
            method: Method::default(),
            max_step: None,
            rtol: 1e-6,
            atol: 1e-8,
            initial_step: None,
            min_step: 1e-12,
            max_steps_per_interval: 100_000,
        }
    }
}

impl IntegratorOptions {
    pub fn validate(&self) -> SimResult<()> {
        if let Some(h) = self.max_step
            && !(h.is_finite() && h > 0.0)
        {
            return Err(SimError::InvalidArg {
                what: "max_step must be positive and finite",
            });
        }
        if !(self.rtol.is_finite() && self.rtol > 0.0) {
            return Err(SimError::InvalidArg {
                what: "rtol must be positive and finite",
            });
        }
        if !(self.atol.is_finite() && self.atol > 0.0) {
            return Err(SimError::InvalidArg {
                what: "atol must be positive and finite",
            });
        }
        if let Some(h) = self.initial_step
            && !(h.is_finite() && h > 0.0)
        {
            return Err(SimError::InvalidArg {
                what: "initial_step must be positive and finite",
            });
        }
        if !(self.min_step.is_finite() && self.min_step > 0.0) {
            return Err(SimError::InvalidArg {
                what: "min_step must be positive and finite",
            });
        }
        if self.max_steps_per_interval == 0 {
            return Err(SimError::InvalidArg {
                what: "max_steps_per_interval must be positive",
            });
        }
        Ok(())
    }
}

/// Counters accumulated over the life of an [`Integrator`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct IntegratorStats {
    pub accepted_steps: u64,
    pub rejected_steps: u64,
    pub rhs_evaluations: u64,
}

/// Why an integration stopped.
#[derive(Clone, Debug, PartialEq)]
pub struct StepFailure {
    /// Time at which the failing step started.
    pub t: f64,
    pub reason: String,
}

/// Stateful integrator over a shared [`DaeFunction`].
#[derive(Debug)]
pub struct Integrator {
    dae: Arc<DaeFunction>,
    options: IntegratorOptions,
    t: f64,
    x: DVector<f64>,
    /// Step size carried between intervals (Dopri45).
    h: Option<f64>,
    stats: IntegratorStats,
}

impl Integrator {
    pub fn new(dae: Arc<DaeFunction>, options: IntegratorOptions) -> SimResult<Self> {
        options.validate()?;
        let x = dae.initial_state();
        Ok(Self {
            dae,
            options,
            t: 0.0,
            x,
            h: None,
            stats: IntegratorStats::default(),
        })
    }

    pub fn dae(&self) -> &Arc<DaeFunction> {
        &self.dae
    }

    pub fn state(&self) -> &DVector<f64> {
        &self.x
    }

    pub fn stats(&self) -> IntegratorStats {
        self.stats
    }

    /// Restart from `x0` at `t0`. Statistics keep accumulating.
    pub fn reset(&mut self, t0: f64, x0: &[f64]) -> SimResult<()> {
        if x0.len() != self.dae.n_states() {
            return Err(SimError::InvalidArg {
                what: "initial state length does not match the number of states",
            });
        }
        df_core::ensure_finite(t0, "initial time")?;
        df_core::ensure_all_finite(x0, "initial state")?;
        self.t = t0;
        self.x = DVector::from_column_slice(x0);
        self.h = self.options.initial_step;
        Ok(())
    }

    /// Advance from the current time to `t_end`.
    pub fn integrate_to(&mut self, t_end: f64) -> Result<(), StepFailure> {
        if !(t_end > self.t) {
            return Err(StepFailure {
                t: self.t,
                reason: format!("target time {} is not after current time {}", t_end, self.t),
            });
        }
        if self.dae.n_states() == 0 {
            self.t = t_end;
            return Ok(());
        }
        match self.options.method {
            Method::ForwardEuler => self.fixed_steps(&ForwardEuler, t_end),
            Method::Rk4 => self.fixed_steps(&Rk4, t_end),
            Method::Dopri45 => self.adaptive_steps(t_end),
        }
    }

    fn fail(&self, reason: impl Into<String>) -> StepFailure {
        StepFailure {
            t: self.t,
            reason: reason.into(),
        }
    }

    fn fixed_steps<S: StepMethod>(&mut self, method: &S, t_end: f64) -> Result<(), StepFailure> {
        let span = t_end - self.t;
        let n = match self.options.max_step {
            Some(h) => (span / h).ceil().max(1.0),
            None => 1.0,
        };
        if n > self.options.max_steps_per_interval as f64 {
            return Err(self.fail(format!(
                "interval of length {} needs {} steps, more than max_steps_per_interval = {}",
                span, n, self.options.max_steps_per_interval
            )));
        }
        let n = n as usize;
        let dt = span / n as f64;
        let t0 = self.t;

        for i in 0..n {
            let t = t0 + dt * i as f64;
            self.stats.rhs_evaluations += S::STAGES;
            let x_new = method
                .step(self.dae.as_ref(), t, &self.x, dt)
                .map_err(|e| self.fail(e.to_string()))?;
            if !self.dae.is_finite(&x_new) {
                return Err(self.fail("state became non-finite"));
            }
            self.stats.accepted_steps += 1;
            self.x = x_new;
            self.t = if i + 1 == n { t_end } else { t0 + dt * (i + 1) as f64 };
        }
        Ok(())
    }

    /// Initial step guess: `0.01 * |x| / |f|` in the weighted norm.
    fn initial_step_guess(&self, f0: &DVector<f64>) -> f64 {
        let opts = &self.options;
        let d0 = self.dae.error_norm(&self.x, &self.x, &self.x, opts.atol, opts.rtol);
        let d1 = self.dae.error_norm(f0, &self.x, &self.x, opts.atol, opts.rtol);
        if d0 < 1e-5 || d1 < 1e-5 {
            1e-6
        } else {
            0.01 * d0 / d1
        }
    }

    fn adaptive_steps(&mut self, t_end: f64) -> Result<(), StepFailure> {
        const SAFETY: f64 = 0.9;
        const MIN_FACTOR: f64 = 0.2;
        const MAX_FACTOR: f64 = 5.0;

        let method = Dopri45;
        let opts = self.options.clone();
        let model = Arc::clone(&self.dae);

        self.stats.rhs_evaluations += 1;
        let mut k1 = model
            .rhs(self.t, &self.x)
            .map_err(|e| self.fail(e.to_string()))?;
        if !model.is_finite(&k1) {
            return Err(self.fail("derivative became non-finite"));
        }

        let mut h = match self.h {
            Some(h) => h,
            None => self.initial_step_guess(&k1),
        };
        let mut attempts = 0usize;

        while self.t < t_end {
            if attempts >= opts.max_steps_per_interval {
                return Err(self.fail(format!(
                    "max_steps_per_interval = {} exhausted before t = {}",
                    opts.max_steps_per_interval, t_end
                )));
            }
            attempts += 1;

            if let Some(max) = opts.max_step {
                h = h.min(max);
            }
            let remaining = t_end - self.t;
            let last = h >= remaining;
            let h_try = if last { remaining } else { h };

            self.stats.rhs_evaluations += Dopri45::STAGES;
            let trial = method
                .attempt(model.as_ref(), self.t, &self.x, &k1, h_try)
                .map_err(|e| self.fail(e.to_string()))?;

            let err = if model.is_finite(&trial.x) && model.is_finite(&trial.k_last) {
                model.error_norm(&trial.err, &self.x, &trial.x, opts.atol, opts.rtol)
            } else {
                f64::INFINITY
            };

            if err <= 1.0 {
                self.stats.accepted_steps += 1;
                self.t = if last { t_end } else { self.t + h_try };
                self.x = trial.x;
                k1 = trial.k_last;
                let factor = if err == 0.0 {
                    MAX_FACTOR
                } else {
                    (SAFETY * err.powf(-0.2)).clamp(MIN_FACTOR, MAX_FACTOR)
                };
                // A shortened final step says nothing about the next one.
                if !last {
                    h = h_try * factor;
                }
            } else {
                self.stats.rejected_steps += 1;
                let factor = if err.is_finite() {
                    (SAFETY * err.powf(-0.2)).clamp(MIN_FACTOR, 1.0)
                } else {
                    MIN_FACTOR
                };
                h = h_try * factor;
                if h < opts.min_step {
                    return Err(self.fail(format!(
                        "step size {:e} fell below min_step = {:e}",
                        h, opts.min_step
                    )));
                }
            }
        }

        self.h = Some(h);
        Ok(())
    }

    /// Log the accumulated statistics.
    pub fn print_stats(&self) {
        let s = self.stats;
        info!(
            model = self.dae.model(),
            method = self.options.method.label(),
            accepted_steps = s.accepted_steps,
            rejected_steps = s.rejected_steps,
            rhs_evaluations = s.rhs_evaluations,
            "integrator statistics"
        );
        debug!(t = self.t, "integrator position");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// dx/dt = -x, as a bare model for the step methods.
    struct Decay;

    impl TransientModel for Decay {
        type State = f64;

        fn initial_state(&self) -> f64 {
            1.0
        }

        fn rhs(&self, _t: f64, x: &f64) -> SimResult<f64> {
            Ok(-x)
        }

        fn add(&self, a: &f64, b: &f64) -> f64 {
            a + b
        }

        fn scale(&self, a: &f64, scale: f64) -> f64 {
            a * scale
        }

        fn error_norm(&self, err: &f64, a: &f64, b: &f64, atol: f64, rtol: f64) -> f64 {
            (err / (atol + rtol * a.abs().max(b.abs()))).abs()
        }

        fn is_finite(&self, x: &f64) -> bool {
            x.is_finite()
        }
    }

    fn integrate<S: StepMethod>(method: &S, n: usize) -> f64 {
        let dt = 1.0 / n as f64;
        let mut x = Decay.initial_state();
        for i in 0..n {
            x = method.step(&Decay, i as f64 * dt, &x, dt).unwrap();
        }
        x
    }

    #[test]
    fn rk4_is_fourth_order() {
        let exact = (-1.0f64).exp();
        let e1 = (integrate(&Rk4, 10) - exact).abs();
        let e2 = (integrate(&Rk4, 20) - exact).abs();
        let ratio = e1 / e2;
        assert!(ratio > 14.0 && ratio < 18.0, "ratio = {}", ratio);
    }

    #[test]
    fn euler_is_first_order() {
        let exact = (-1.0f64).exp();
        let e1 = (integrate(&ForwardEuler, 100) - exact).abs();
        let e2 = (integrate(&ForwardEuler, 200) - exact).abs();
        let ratio = e1 / e2;
        assert!(ratio > 1.8 && ratio < 2.2, "ratio = {}", ratio);
    }

    #[test]
    fn dopri_error_estimate_is_small_for_smooth_step() {
        let k1 = Decay.rhs(0.0, &1.0).unwrap();
        let trial = Dopri45.attempt(&Decay, 0.0, &1.0, &k1, 0.1).unwrap();
        assert!((trial.x - (-0.1f64).exp()).abs() < 1e-8);
        assert!(trial.err.abs() < 1e-6);
        assert!((trial.k_last + trial.x).abs() < 1e-15);
    }

    #[test]
    fn dopri_tableau_rows_sum_to_nodes() {
        for (row, c) in Dopri45::A.iter().zip(Dopri45::C) {
            let sum: f64 = row.iter().sum();
            assert!((sum - c).abs() < 1e-14);
        }
        let b: f64 = Dopri45::B.iter().sum();
        let b_hat: f64 = Dopri45::B_HAT.iter().sum();
        assert!((b - 1.0).abs() < 1e-14);
        assert!((b_hat - 1.0).abs() < 1e-14);
    }

    #[test]
    fn options_are_validated() {
        assert!(IntegratorOptions::default().validate().is_ok());
        let bad = IntegratorOptions {
            rtol: 0.0,
            ..Default::default()
        };
        assert!(bad.validate().is_err());
        let bad = IntegratorOptions {
            max_step: Some(-1.0),
            ..Default::default()
        };
        assert!(bad.validate().is_err());
        let bad = IntegratorOptions {
            max_steps_per_interval: 0,
            ..Default::default()
        };
        assert!(bad.validate().is_err());
    }
}
