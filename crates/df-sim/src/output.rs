//! Output functions: projections of the slot vector onto named variables.

use std::sync::Arc;

use crate::dae::DaeFunction;
use crate::error::{SimError, SimResult};

/// Builds [`OutputFunction`]s for one compiled model.
#[derive(Clone, Debug)]
pub struct OutputFunctionFactory {
    dae: Arc<DaeFunction>,
}

impl OutputFunctionFactory {
    pub fn new(dae: Arc<DaeFunction>) -> Self {
        Self { dae }
    }

    /// Output function over `names`, in order.
    ///
    /// Each name must be a state, algebraic variable, parameter, `der(state)`
    /// or `time`.
    pub fn output<S: AsRef<str>>(&self, names: &[S]) -> SimResult<OutputFunction> {
        if names.is_empty() {
            return Err(SimError::InvalidArg {
                what: "output function needs at least one variable",
            });
        }
        let mut columns = Vec::with_capacity(names.len());
        let mut slots = Vec::with_capacity(names.len());
        for name in names {
            let name = name.as_ref();
            let slot = self.dae.slot(name).ok_or_else(|| SimError::NameNotFound {
                name: name.to_string(),
            })?;
            columns.push(name.to_string());
            slots.push(slot);
        }
        Ok(OutputFunction {
            dae: Arc::clone(&self.dae),
            columns,
            slots,
        })
    }
}

/// Maps `(t, y)` to one output row.
#[derive(Clone, Debug)]
pub struct OutputFunction {
    dae: Arc<DaeFunction>,
    columns: Vec<String>,
    slots: Vec<usize>,
}

impl OutputFunction {
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Evaluate at `(t, y)` with the model's parameter values.
    pub fn evaluate(&self, t: f64, y: &[f64]) -> SimResult<Vec<f64>> {
        let mut scratch = Vec::new();
        self.evaluate_into(t, y, &mut scratch)
    }

    /// Like [`OutputFunction::evaluate`], reusing `scratch` for the slot vector.
    pub fn evaluate_into(&self, t: f64, y: &[f64], scratch: &mut Vec<f64>) -> SimResult<Vec<f64>> {
        self.dae.eval_slots(t, y, self.dae.parameters(), scratch)?;
        Ok(self.slots.iter().map(|&i| scratch[i]).collect())
    }
}
