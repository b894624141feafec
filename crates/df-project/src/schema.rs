//! Study file schema definitions.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A study: a list of independent examples sharing one compiler setup.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Study {
    pub version: u32,
    pub name: String,
    /// Directory for compiled model descriptions, relative to the study file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub work_dir: Option<String>,
    #[serde(default)]
    pub compiler: CompilerDef,
    #[serde(default)]
    pub examples: Vec<ExampleDef>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum CompilerModeDef {
    #[default]
    Auto,
    Toolchain,
    Precompiled,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct CompilerDef {
    #[serde(default)]
    pub mode: CompilerModeDef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub program: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    /// Where `precompiled_<model>.xml` files live; defaults to the
    /// directory of each example's source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub precompiled_dir: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ExampleDef {
    pub id: String,
    /// Modelica model name, possibly dotted.
    pub model: String,
    /// Modelica source file, relative to the study file.
    pub source: String,
    pub grid: GridDef,
    pub outputs: Vec<String>,
    #[serde(default)]
    pub integrator: IntegratorDef,
    /// Overrides of state start values, by state name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_state: Option<BTreeMap<String, f64>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum GridDef {
    /// `points` values evenly spaced over `[start, end]`.
    Linspace { start: f64, end: f64, points: usize },
    /// Explicit time points.
    Times { times: Vec<f64> },
}

impl GridDef {
    pub fn points(&self) -> df_core::DfResult<Vec<f64>> {
        match self {
            GridDef::Linspace { start, end, points } => df_core::linspace(*start, *end, *points),
            GridDef::Times { times } => Ok(times.clone()),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum MethodDef {
    ForwardEuler,
    Rk4,
    #[default]
    Dopri45,
}

/// Integrator options; unset fields take the integrator defaults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct IntegratorDef {
    #[serde(default)]
    pub method: MethodDef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_step: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rtol: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub atol: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_step: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_step: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_steps_per_interval: Option<usize>,
}
