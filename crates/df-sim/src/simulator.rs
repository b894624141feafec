//! Simulation over a time grid and result recording.

use nalgebra::DMatrix;
use tracing::{debug, warn};

use crate::error::{IntegrationFailure, SimError, SimResult};
use crate::integrator::{Integrator, IntegratorStats, StepFailure};
use crate::output::OutputFunction;

/// Outputs sampled on a grid.
#[derive(Clone, Debug, PartialEq)]
pub struct SimRecord {
    /// Column names, in output-function order.
    pub columns: Vec<String>,
    /// Grid points that have a row.
    pub t: Vec<f64>,
    /// One row per entry of `t`, one column per output.
    pub values: DMatrix<f64>,
    pub stats: IntegratorStats,
}

impl SimRecord {
    fn from_rows(
        columns: Vec<String>,
        t: Vec<f64>,
        rows: &[Vec<f64>],
        stats: IntegratorStats,
    ) -> Self {
        let values = DMatrix::from_fn(rows.len(), columns.len(), |r, c| rows[r][c]);
        Self {
            columns,
            t,
            values,
            stats,
        }
    }

    pub fn n_rows(&self) -> usize {
        self.values.nrows()
    }

    /// Values of one output column.
    pub fn column(&self, name: &str) -> SimResult<Vec<f64>> {
        let j = self
            .columns
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| SimError::NameNotFound {
                name: name.to_string(),
            })?;
        Ok(self.values.column(j).iter().copied().collect())
    }
}

/// Drives an [`Integrator`] across a grid and evaluates an
/// [`OutputFunction`] at every grid point.
#[derive(Debug)]
pub struct Simulator {
    integrator: Integrator,
    output: OutputFunction,
    grid: Vec<f64>,
}

impl Simulator {
    /// The grid must be non-empty, finite and strictly increasing.
    pub fn new(integrator: Integrator, output: OutputFunction, grid: Vec<f64>) -> SimResult<Self> {
        df_core::validate_grid(&grid)?;
        Ok(Self {
            integrator,
            output,
            grid,
        })
    }

    pub fn grid(&self) -> &[f64] {
        &self.grid
    }

    pub fn integrator(&self) -> &Integrator {
        &self.integrator
    }

    /// Simulate from `initial_state`, or from the declared start values.
    ///
    /// On failure the error carries every row computed so far.
    pub fn run(&mut self, initial_state: Option<&[f64]>) -> SimResult<SimRecord> {
        let dae = self.integrator.dae().clone();
        let x0: Vec<f64> = match initial_state {
            Some(x0) => x0.to_vec(),
            None => dae.start_values().to_vec(),
        };
        let t0 = self.grid[0];
        self.integrator.reset(t0, &x0)?;

        let columns = self.output.columns().to_vec();
        let mut scratch = Vec::new();
        let mut rows: Vec<Vec<f64>> = Vec::with_capacity(self.grid.len());
        let first = self
            .output
            .evaluate_into(t0, self.integrator.state().as_slice(), &mut scratch)?;
        rows.push(first);

        for (index, &t) in self.grid.iter().enumerate().skip(1) {
            let step = self.integrator.integrate_to(t).and_then(|()| {
                self.output
                    .evaluate_into(t, self.integrator.state().as_slice(), &mut scratch)
                    .map_err(|e| StepFailure {
                        t,
                        reason: e.to_string(),
                    })
            });
            match step {
                Ok(row) => rows.push(row),
                Err(failure) => {
                    let last_good_index = index - 1;
                    warn!(
                        model = dae.model(),
                        last_good_index,
                        t_failed = failure.t,
                        reason = %failure.reason,
                        "integration failed"
                    );
                    let partial = SimRecord::from_rows(
                        columns,
                        self.grid[..index].to_vec(),
                        &rows,
                        self.integrator.stats(),
                    );
                    return Err(SimError::Integration(Box::new(IntegrationFailure {
                        last_good_index,
                        t_failed: failure.t,
                        reason: failure.reason,
                        partial,
                    })));
                }
            }
        }

        debug!(
            model = dae.model(),
            rows = rows.len(),
            columns = columns.len(),
            "simulation finished"
        );
        Ok(SimRecord::from_rows(
            columns,
            self.grid.clone(),
            &rows,
            self.integrator.stats(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::build;
    use crate::integrator::{IntegratorOptions, Method};
    use df_ocp::{DeclaredVariable, Expr, SymbolicOcp, VariableKind};

    /// der(x) = -k*x, y = 2*x
    fn decay(k: f64) -> SymbolicOcp {
        SymbolicOcp::new(
            "Decay",
            vec![
                DeclaredVariable {
                    name: "x".into(),
                    start: Some(1.0),
                    ..Default::default()
                },
                DeclaredVariable {
                    name: "y".into(),
                    ..Default::default()
                },
                DeclaredVariable {
                    name: "k".into(),
                    kind: Some(VariableKind::Parameter),
                    start: Some(k),
                    ..Default::default()
                },
            ],
            vec![],
            vec![
                Expr::Add(
                    Box::new(Expr::der("x")),
                    Box::new(Expr::Mul(Box::new(Expr::var("k")), Box::new(Expr::var("x")))),
                ),
                Expr::Sub(
                    Box::new(Expr::var("y")),
                    Box::new(Expr::Mul(Box::new(Expr::Const(2.0)), Box::new(Expr::var("x")))),
                ),
            ],
        )
        .unwrap()
        .make_explicit()
        .unwrap()
    }

    fn simulator(method: Method, grid: Vec<f64>, names: &[&str]) -> Simulator {
        let options = IntegratorOptions {
            method,
            max_step: Some(0.01),
            ..Default::default()
        };
        let (integrator, outputs) = build(&decay(0.5), &options).unwrap();
        Simulator::new(integrator, outputs.output(names).unwrap(), grid).unwrap()
    }

    #[test]
    fn tracks_exact_solution() {
        let grid = df_core::linspace(0.0, 2.0, 11).unwrap();
        for method in [Method::Rk4, Method::Dopri45] {
            let mut sim = simulator(method, grid.clone(), &["x", "y", "time"]);
            let record = sim.run(None).unwrap();
            assert_eq!(record.values.shape(), (11, 3));
            for (r, t) in grid.iter().enumerate() {
                let exact = (-0.5 * t).exp();
                assert!((record.values[(r, 0)] - exact).abs() < 1e-6, "{:?}", method);
                assert!((record.values[(r, 1)] - 2.0 * exact).abs() < 2e-6);
                assert_eq!(record.values[(r, 2)], *t);
            }
        }
    }

    #[test]
    fn single_point_grid_yields_initial_row() {
        let mut sim = simulator(Method::Dopri45, vec![3.0], &["x"]);
        let record = sim.run(Some(&[4.0][..])).unwrap();
        assert_eq!(record.values.shape(), (1, 1));
        assert_eq!(record.values[(0, 0)], 4.0);
        assert_eq!(record.stats.accepted_steps, 0);
    }

    #[test]
    fn rejects_bad_grid() {
        let (integrator, outputs) = build(&decay(0.5), &IntegratorOptions::default()).unwrap();
        let output = outputs.output(&["x"]).unwrap();
        let err = Simulator::new(integrator, output, vec![0.0, 1.0, 1.0]).unwrap_err();
        assert!(matches!(err, SimError::InvalidArg { .. }));
    }

    #[test]
    fn rejects_wrong_initial_state_length() {
        let mut sim = simulator(Method::Rk4, vec![0.0, 1.0], &["x"]);
        assert!(matches!(
            sim.run(Some(&[1.0, 2.0][..])),
            Err(SimError::InvalidArg { .. })
        ));
    }

    #[test]
    fn rejects_non_finite_initial_state() {
        let mut sim = simulator(Method::Dopri45, vec![0.0, 1.0], &["x"]);
        assert!(matches!(
            sim.run(Some(&[f64::NAN][..])),
            Err(SimError::InvalidArg {
                what: "initial state"
            })
        ));
        let mut sim = simulator(Method::Rk4, vec![0.0, 1.0], &["x"]);
        assert!(matches!(
            sim.run(Some(&[f64::INFINITY][..])),
            Err(SimError::InvalidArg { .. })
        ));
    }

    #[test]
    fn column_lookup_by_name() {
        let mut sim = simulator(Method::Rk4, vec![0.0, 1.0], &["y", "x"]);
        let record = sim.run(None).unwrap();
        assert_eq!(record.column("y").unwrap()[0], 2.0);
        assert!(matches!(
            record.column("z"),
            Err(SimError::NameNotFound { .. })
        ));
    }
}
