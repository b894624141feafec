//! Numeric DAE function compiled from an explicit OCP.
//!
//! Every quantity the explicit program touches lives in one flat slot
//! vector laid out as
//!
//! ```text
//! [ time | xd (nx) | p (np) | der(xd) (nx) | z (nz) ]
//! ```
//!
//! Equations are re-indexed from names to slots once, at build time.

use std::collections::HashMap;

use df_ocp::{Expr, SolveStep, Symbol, SymbolicOcp};
use nalgebra::{DMatrix, DVector};

use crate::error::{SimError, SimResult};
use crate::model::TransientModel;

type SlotExpr = Expr<usize>;

/// Slot vector layout for one model.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlotLayout {
    pub nx: usize,
    pub np: usize,
    pub nz: usize,
}

impl SlotLayout {
    pub const TIME: usize = 0;

    pub fn state(&self, i: usize) -> usize {
        1 + i
    }

    pub fn param(&self, k: usize) -> usize {
        1 + self.nx + k
    }

    pub fn derivative(&self, i: usize) -> usize {
        1 + self.nx + self.np + i
    }

    pub fn algebraic(&self, j: usize) -> usize {
        1 + 2 * self.nx + self.np + j
    }

    /// Total number of slots.
    pub fn width(&self) -> usize {
        1 + 2 * self.nx + self.np + self.nz
    }
}

#[derive(Clone, Debug)]
enum CompiledStep {
    Assign {
        slot: usize,
        expr: SlotExpr,
    },
    Linear {
        slots: Vec<usize>,
        matrix: Vec<Vec<SlotExpr>>,
        rhs: Vec<SlotExpr>,
    },
}

/// `(t, y, ydot, p) -> ydot - f(t, y, p)`, plus the explicit `f` itself.
///
/// Immutable once built; share it through `Arc`.
#[derive(Clone, Debug)]
pub struct DaeFunction {
    model: String,
    layout: SlotLayout,
    steps: Vec<CompiledStep>,
    slot_of: HashMap<String, usize>,
    state_names: Vec<String>,
    parameters: Vec<f64>,
    start: Vec<f64>,
}

impl DaeFunction {
    /// Compile the explicit program of `ocp`.
    pub fn new(ocp: &SymbolicOcp) -> SimResult<Self> {
        let ode = ocp.ode().ok_or(SimError::NotExplicit)?;

        let layout = SlotLayout {
            nx: ocp.xd().len(),
            np: ocp.p().len(),
            nz: ocp.z().len(),
        };

        let mut slot_of = HashMap::new();
        let mut state_names = Vec::with_capacity(layout.nx);
        for (i, id) in ocp.xd().iter().enumerate() {
            let name = ocp.var(*id).name.clone();
            slot_of.insert(format!("der({})", name), layout.derivative(i));
            slot_of.insert(name.clone(), layout.state(i));
            state_names.push(name);
        }
        for (k, id) in ocp.p().iter().enumerate() {
            slot_of.insert(ocp.var(*id).name.clone(), layout.param(k));
        }
        for (j, id) in ocp.z().iter().enumerate() {
            slot_of.insert(ocp.var(*id).name.clone(), layout.algebraic(j));
        }

        let resolve = |s: &Symbol| -> SimResult<usize> {
            match s {
                Symbol::Time => Ok(SlotLayout::TIME),
                other => slot_of
                    .get(&other.to_string())
                    .copied()
                    .ok_or_else(|| SimError::NameNotFound {
                        name: other.to_string(),
                    }),
            }
        };
        let compile = |e: &Expr| e.try_map_symbols(&mut |s| resolve(s));

        let mut steps = Vec::with_capacity(ode.steps.len());
        for step in &ode.steps {
            steps.push(match step {
                SolveStep::Assign { target, expr } => CompiledStep::Assign {
                    slot: resolve(target)?,
                    expr: compile(expr)?,
                },
                SolveStep::Linear {
                    targets,
                    matrix,
                    rhs,
                } => CompiledStep::Linear {
                    slots: targets.iter().map(&resolve).collect::<SimResult<_>>()?,
                    matrix: matrix
                        .iter()
                        .map(|row| row.iter().map(&compile).collect::<SimResult<_>>())
                        .collect::<SimResult<_>>()?,
                    rhs: rhs.iter().map(&compile).collect::<SimResult<_>>()?,
                },
            });
        }

        let parameters = ocp.parameter_values()?;
        let start = ocp.start_values();

        Ok(Self {
            model: ocp.name().to_string(),
            layout,
            steps,
            slot_of,
            state_names,
            parameters,
            start,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn layout(&self) -> &SlotLayout {
        &self.layout
    }

    pub fn n_states(&self) -> usize {
        self.layout.nx
    }

    pub fn state_names(&self) -> &[String] {
        &self.state_names
    }

    /// Parameter values, evaluated once from start values and bindings.
    pub fn parameters(&self) -> &[f64] {
        &self.parameters
    }

    /// Declared start values of the states.
    pub fn start_values(&self) -> &[f64] {
        &self.start
    }

    /// Slot of a variable, `der(state)` or `time`.
    pub fn slot(&self, name: &str) -> Option<usize> {
        match self.slot_of.get(name) {
            Some(slot) => Some(*slot),
            None if name == "time" => Some(SlotLayout::TIME),
            None => None,
        }
    }

    /// Run the explicit program, filling every slot.
    pub fn eval_slots(&self, t: f64, y: &[f64], p: &[f64], slots: &mut Vec<f64>) -> SimResult<()> {
        let layout = &self.layout;
        if y.len() != layout.nx {
            return Err(SimError::InvalidArg {
                what: "state vector length does not match the number of states",
            });
        }
        if p.len() != layout.np {
            return Err(SimError::InvalidArg {
                what: "parameter vector length does not match the number of parameters",
            });
        }

        slots.clear();
        slots.resize(layout.width(), 0.0);
        slots[SlotLayout::TIME] = t;
        slots[layout.state(0)..layout.state(0) + layout.nx].copy_from_slice(y);
        slots[layout.param(0)..layout.param(0) + layout.np].copy_from_slice(p);

        for step in &self.steps {
            match step {
                CompiledStep::Assign { slot, expr } => {
                    let value = expr.eval(&|&i| slots[i]);
                    slots[*slot] = value;
                }
                CompiledStep::Linear {
                    slots: targets,
                    matrix,
                    rhs,
                } => {
                    let n = targets.len();
                    let a = DMatrix::from_fn(n, n, |r, c| matrix[r][c].eval(&|&i| slots[i]));
                    let b = DVector::from_fn(n, |r, _| rhs[r].eval(&|&i| slots[i]));
                    let u = a.lu().solve(&b).ok_or_else(|| SimError::Backend {
                        message: format!("singular linear block at t = {}", t),
                    })?;
                    for (slot, value) in targets.iter().zip(u.iter()) {
                        slots[*slot] = *value;
                    }
                }
            }
        }
        Ok(())
    }

    /// Explicit right-hand side `f(t, y, p)`.
    pub fn rhs_with(&self, t: f64, y: &[f64], p: &[f64]) -> SimResult<DVector<f64>> {
        let mut slots = Vec::new();
        self.eval_slots(t, y, p, &mut slots)?;
        let start = self.layout.derivative(0);
        Ok(DVector::from_column_slice(
            &slots[start..start + self.layout.nx],
        ))
    }

    /// Residual `ydot - f(t, y, p)`.
    pub fn residual(&self, t: f64, y: &[f64], ydot: &[f64], p: &[f64]) -> SimResult<DVector<f64>> {
        if ydot.len() != self.layout.nx {
            return Err(SimError::InvalidArg {
                what: "derivative vector length does not match the number of states",
            });
        }
        let f = self.rhs_with(t, y, p)?;
        Ok(DVector::from_column_slice(ydot) - f)
    }
}

impl TransientModel for DaeFunction {
    type State = DVector<f64>;

    fn initial_state(&self) -> Self::State {
        DVector::from_column_slice(&self.start)
    }

    fn rhs(&self, t: f64, x: &Self::State) -> SimResult<Self::State> {
        self.rhs_with(t, x.as_slice(), &self.parameters)
    }

    fn add(&self, a: &Self::State, b: &Self::State) -> Self::State {
        a + b
    }

    fn scale(&self, a: &Self::State, scale: f64) -> Self::State {
        a * scale
    }

    fn error_norm(
        &self,
        err: &Self::State,
        a: &Self::State,
        b: &Self::State,
        atol: f64,
        rtol: f64,
    ) -> f64 {
        df_core::weighted_rms(err.as_slice(), a.as_slice(), b.as_slice(), atol, rtol)
    }

    fn is_finite(&self, x: &Self::State) -> bool {
        x.iter().all(|v| v.is_finite())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use df_ocp::{DeclaredVariable, VariableKind};

    fn declared(name: &str, kind: Option<VariableKind>, start: Option<f64>) -> DeclaredVariable {
        DeclaredVariable {
            name: name.to_string(),
            kind,
            start,
            ..Default::default()
        }
    }

    fn sub(a: Expr, b: Expr) -> Expr {
        Expr::Sub(Box::new(a), Box::new(b))
    }

    fn mul(a: Expr, b: Expr) -> Expr {
        Expr::Mul(Box::new(a), Box::new(b))
    }

    /// der(x) = -k*x + y ; a + b = y ; a - b = time ; y = 2
    fn coupled_ocp() -> SymbolicOcp {
        SymbolicOcp::new(
            "Coupled",
            vec![
                declared("x", None, Some(1.0)),
                declared("k", Some(VariableKind::Parameter), Some(0.5)),
                declared("y", None, None),
                declared("a", None, None),
                declared("b", None, None),
            ],
            vec![],
            vec![
                sub(
                    Expr::der("x"),
                    Expr::Add(
                        Box::new(Expr::Neg(Box::new(mul(Expr::var("k"), Expr::var("x"))))),
                        Box::new(Expr::var("y")),
                    ),
                ),
                sub(
                    Expr::Add(Box::new(Expr::var("a")), Box::new(Expr::var("b"))),
                    Expr::var("y"),
                ),
                sub(sub(Expr::var("a"), Expr::var("b")), Expr::time()),
                sub(Expr::var("y"), Expr::Const(2.0)),
            ],
        )
        .unwrap()
        .make_explicit()
        .unwrap()
    }

    #[test]
    fn requires_explicit_form() {
        let ocp = SymbolicOcp::new(
            "Implicit",
            vec![declared("x", None, Some(1.0))],
            vec![],
            vec![sub(Expr::der("x"), Expr::var("x"))],
        )
        .unwrap();
        assert!(matches!(DaeFunction::new(&ocp), Err(SimError::NotExplicit)));
    }

    #[test]
    fn layout_orders_slots() {
        let dae = DaeFunction::new(&coupled_ocp()).unwrap();
        let layout = dae.layout();
        assert_eq!((layout.nx, layout.np, layout.nz), (1, 1, 3));
        assert_eq!(dae.slot("time"), Some(0));
        assert_eq!(dae.slot("x"), Some(1));
        assert_eq!(dae.slot("k"), Some(2));
        assert_eq!(dae.slot("der(x)"), Some(3));
        assert_eq!(dae.slot("y"), Some(4));
        assert_eq!(dae.slot("nope"), None);
    }

    #[test]
    fn evaluates_linear_block_and_rhs() {
        let dae = DaeFunction::new(&coupled_ocp()).unwrap();
        let mut slots = Vec::new();
        dae.eval_slots(1.0, &[4.0], &[0.5], &mut slots).unwrap();
        // a + b = 2, a - b = 1
        assert!((slots[dae.slot("a").unwrap()] - 1.5).abs() < 1e-12);
        assert!((slots[dae.slot("b").unwrap()] - 0.5).abs() < 1e-12);

        let f = dae.rhs(0.0, &DVector::from_vec(vec![4.0])).unwrap();
        assert!((f[0] - 0.0).abs() < 1e-12);
    }

    #[test]
    fn residual_vanishes_on_the_explicit_derivative() {
        let dae = DaeFunction::new(&coupled_ocp()).unwrap();
        let f = dae.rhs_with(0.3, &[1.0], &[0.5]).unwrap();
        let r = dae.residual(0.3, &[1.0], f.as_slice(), &[0.5]).unwrap();
        assert_eq!(r[0], 0.0);
        let r = dae.residual(0.3, &[1.0], &[f[0] + 1.0], &[0.5]).unwrap();
        assert_eq!(r[0], 1.0);
    }

    #[test]
    fn rejects_wrong_state_length() {
        let dae = DaeFunction::new(&coupled_ocp()).unwrap();
        assert!(matches!(
            dae.rhs_with(0.0, &[1.0, 2.0], &[0.5]),
            Err(SimError::InvalidArg { .. })
        ));
    }
}
