//! Symbolic optimal control problem.

use std::collections::{HashMap, HashSet};
use std::fmt;

use df_core::VarId;

use crate::error::{OcpError, OcpResult};
use crate::explicit::ExplicitForm;
use crate::expr::{Expr, Symbol};

/// Role of a variable in the DAE.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum VariableKind {
    /// Differential state: `der(x)` appears in the equations.
    State,
    /// Algebraic unknown.
    Algebraic,
    /// Independent parameter, valued by its start attribute.
    Parameter,
    /// Parameter defined by a binding equation.
    DependentParameter,
    /// Constant, valued by its start attribute or a binding equation.
    Constant,
    /// Top-level input, held at its start value.
    Input,
}

impl VariableKind {
    /// Parameters, constants and inputs: fixed over a simulation.
    pub fn is_fixed(self) -> bool {
        !matches!(self, VariableKind::State | VariableKind::Algebraic)
    }

    pub fn label(self) -> &'static str {
        match self {
            VariableKind::State => "state",
            VariableKind::Algebraic => "algebraic",
            VariableKind::Parameter => "parameter",
            VariableKind::DependentParameter => "dependent parameter",
            VariableKind::Constant => "constant",
            VariableKind::Input => "input",
        }
    }
}

/// Variable as declared in a model description, before classification.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct DeclaredVariable {
    pub name: String,
    /// `None` for continuous variables whose role is inferred from the equations.
    pub kind: Option<VariableKind>,
    pub start: Option<f64>,
    pub unit: Option<String>,
    pub description: Option<String>,
}

/// Classified model variable.
#[derive(Clone, Debug, PartialEq)]
pub struct Variable {
    pub id: VarId,
    pub name: String,
    pub kind: VariableKind,
    pub start: Option<f64>,
    pub unit: Option<String>,
    pub description: Option<String>,
}

/// In-memory symbolic OCP.
///
/// A deep value type: cloning copies every equation, so a clone can be
/// transformed without affecting the original.
#[derive(Clone, Debug, PartialEq)]
pub struct SymbolicOcp {
    name: String,
    variables: Vec<Variable>,
    index: HashMap<String, VarId>,
    xd: Vec<VarId>,
    z: Vec<VarId>,
    p: Vec<VarId>,
    bindings: Vec<(VarId, Expr)>,
    dae: Vec<Expr>,
    ode: Option<ExplicitForm>,
}

impl SymbolicOcp {
    /// Classify variables and check the equations against the declarations.
    ///
    /// `bindings` define dependent parameters; `dae` holds residuals `lhs - rhs`.
    pub fn new(
        name: impl Into<String>,
        declared: Vec<DeclaredVariable>,
        bindings: Vec<(String, Expr)>,
        dae: Vec<Expr>,
    ) -> OcpResult<Self> {
        let name = name.into();

        let mut index = HashMap::new();
        for (i, v) in declared.iter().enumerate() {
            if v.name.is_empty() {
                return Err(OcpError::schema("variable with empty name"));
            }
            if index.insert(v.name.clone(), VarId::from_index(i)).is_some() {
                return Err(OcpError::schema(format!(
                    "duplicate variable '{}'",
                    v.name
                )));
            }
        }

        let mut differentiated = HashSet::new();
        for (k, eq) in dae.iter().enumerate() {
            let mut undeclared = None;
            eq.visit_symbols(&mut |s| match s {
                Symbol::Time => {}
                Symbol::Var(n) | Symbol::Der(n) => {
                    if !index.contains_key(n) && undeclared.is_none() {
                        undeclared = Some(n.clone());
                    }
                    if let Symbol::Der(n) = s {
                        differentiated.insert(n.clone());
                    }
                }
            });
            if let Some(n) = undeclared {
                return Err(OcpError::schema(format!(
                    "equation {} references undeclared variable '{}'",
                    k, n
                )));
            }
        }

        let bound: HashSet<&str> = bindings.iter().map(|(n, _)| n.as_str()).collect();

        let mut variables = Vec::with_capacity(declared.len());
        for (i, d) in declared.into_iter().enumerate() {
            let kind = match d.kind {
                Some(VariableKind::Parameter) if bound.contains(d.name.as_str()) => {
                    VariableKind::DependentParameter
                }
                Some(kind) => kind,
                None if differentiated.contains(&d.name) => VariableKind::State,
                None => VariableKind::Algebraic,
            };
            if differentiated.contains(&d.name) && kind != VariableKind::State {
                return Err(OcpError::schema(format!(
                    "der({}) used but '{}' is declared as {}",
                    d.name,
                    d.name,
                    kind.label()
                )));
            }
            if kind.is_fixed() && d.start.is_none() && !bound.contains(d.name.as_str()) {
                return Err(OcpError::schema(format!(
                    "{} '{}' has neither a start value nor a binding equation",
                    kind.label(),
                    d.name
                )));
            }
            variables.push(Variable {
                id: VarId::from_index(i),
                name: d.name,
                kind,
                start: d.start,
                unit: d.unit,
                description: d.description,
            });
        }

        let ids_of = |pred: fn(VariableKind) -> bool| -> Vec<VarId> {
            variables
                .iter()
                .filter(|v| pred(v.kind))
                .map(|v| v.id)
                .collect()
        };
        let xd = ids_of(|k| k == VariableKind::State);
        let z = ids_of(|k| k == VariableKind::Algebraic);
        let p = ids_of(VariableKind::is_fixed);

        let bindings = order_bindings(&variables, &index, bindings)?;

        Ok(Self {
            name,
            variables,
            index,
            xd,
            z,
            p,
            bindings,
            dae,
            ode: None,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    /// Look a variable up by name.
    pub fn variable(&self, name: &str) -> OcpResult<&Variable> {
        self.index
            .get(name)
            .map(|id| &self.variables[id.index()])
            .ok_or_else(|| OcpError::NameNotFound {
                name: name.to_string(),
            })
    }

    pub fn var(&self, id: VarId) -> &Variable {
        &self.variables[id.index()]
    }

    /// Differential states.
    pub fn xd(&self) -> &[VarId] {
        &self.xd
    }

    /// Algebraic unknowns.
    pub fn z(&self) -> &[VarId] {
        &self.z
    }

    /// Parameters, constants and inputs.
    pub fn p(&self) -> &[VarId] {
        &self.p
    }

    /// Binding equations, ordered so each reads only earlier ones.
    pub fn bindings(&self) -> &[(VarId, Expr)] {
        &self.bindings
    }

    /// Implicit DAE residuals.
    pub fn dae(&self) -> &[Expr] {
        &self.dae
    }

    /// Explicit form, present after [`SymbolicOcp::make_explicit`].
    pub fn ode(&self) -> Option<&ExplicitForm> {
        self.ode.as_ref()
    }

    pub fn is_explicit(&self) -> bool {
        self.ode.is_some()
    }

    pub(crate) fn with_ode(mut self, ode: ExplicitForm) -> Self {
        self.ode = Some(ode);
        self
    }

    /// Declared start values of `xd` (0 when unspecified).
    pub fn start_values(&self) -> Vec<f64> {
        self.xd
            .iter()
            .map(|id| self.var(*id).start.unwrap_or(0.0))
            .collect()
    }

    /// Numeric values of `p`, with binding equations evaluated in order.
    pub fn parameter_values(&self) -> OcpResult<Vec<f64>> {
        let mut values: HashMap<VarId, f64> = self
            .p
            .iter()
            .filter_map(|id| self.var(*id).start.map(|s| (*id, s)))
            .collect();

        for (id, expr) in &self.bindings {
            let value = expr.eval(&|s: &Symbol| match s {
                Symbol::Var(n) => self
                    .index
                    .get(n)
                    .and_then(|vid| values.get(vid))
                    .copied()
                    .unwrap_or(f64::NAN),
                _ => f64::NAN,
            });
            if !value.is_finite() {
                return Err(OcpError::schema(format!(
                    "binding equation for '{}' evaluates to {}",
                    self.var(*id).name,
                    value
                )));
            }
            values.insert(*id, value);
        }

        self.p
            .iter()
            .map(|id| {
                values.get(id).copied().ok_or_else(|| {
                    OcpError::schema(format!("'{}' has no value", self.var(*id).name))
                })
            })
            .collect()
    }
}

/// Topologically order binding equations; they may only read fixed variables.
fn order_bindings(
    variables: &[Variable],
    index: &HashMap<String, VarId>,
    bindings: Vec<(String, Expr)>,
) -> OcpResult<Vec<(VarId, Expr)>> {
    let mut pending: Vec<(VarId, Expr)> = Vec::with_capacity(bindings.len());
    for (name, expr) in bindings {
        let id = *index.get(&name).ok_or_else(|| {
            OcpError::schema(format!("binding equation for undeclared '{}'", name))
        })?;
        if !variables[id.index()].kind.is_fixed() {
            return Err(OcpError::schema(format!(
                "binding equation for '{}', which is not a parameter",
                name
            )));
        }
        let mut bad = None;
        expr.visit_symbols(&mut |s| {
            if bad.is_some() {
                return;
            }
            match s {
                Symbol::Var(n) => match index.get(n) {
                    Some(vid) if variables[vid.index()].kind.is_fixed() => {}
                    _ => bad = Some(n.clone()),
                },
                other => bad = Some(other.to_string()),
            }
        });
        if let Some(n) = bad {
            return Err(OcpError::schema(format!(
                "binding equation for '{}' reads '{}', which is not a parameter",
                name, n
            )));
        }
        pending.push((id, expr));
    }

    let bound: HashSet<VarId> = pending.iter().map(|(id, _)| *id).collect();
    let mut resolved: HashSet<VarId> = HashSet::new();
    let mut ordered = Vec::with_capacity(pending.len());

    while !pending.is_empty() {
        let before = pending.len();
        let mut still = Vec::new();
        for (id, expr) in pending {
            let ready = !expr.contains_symbol(&|s: &Symbol| match s {
                Symbol::Var(n) => {
                    let vid = index[n];
                    bound.contains(&vid) && !resolved.contains(&vid)
                }
                _ => false,
            });
            if ready {
                resolved.insert(id);
                ordered.push((id, expr));
            } else {
                still.push((id, expr));
            }
        }
        if still.len() == before {
            let names: Vec<&str> = still
                .iter()
                .map(|(id, _)| variables[id.index()].name.as_str())
                .collect();
            return Err(OcpError::schema(format!(
                "cyclic binding equations among {:?}",
                names
            )));
        }
        pending = still;
    }

    Ok(ordered)
}

impl SymbolicOcp {
    fn write_section(&self, f: &mut fmt::Formatter<'_>, title: &str, ids: &[VarId]) -> fmt::Result {
        writeln!(f, "  {} ({}):", title, ids.len())?;
        for id in ids {
            let v = self.var(*id);
            write!(f, "    {}", v.name)?;
            if let Some(start) = v.start {
                write!(f, " (start = {})", start)?;
            }
            if v.kind.is_fixed() {
                write!(f, " [{}]", v.kind.label())?;
            }
            if let Some(unit) = &v.unit {
                write!(f, " {}", unit)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

impl fmt::Display for SymbolicOcp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Model: {}", self.name)?;

        self.write_section(f, "Differential states", &self.xd)?;
        self.write_section(f, "Algebraic variables", &self.z)?;
        self.write_section(f, "Parameters", &self.p)?;

        if !self.bindings.is_empty() {
            writeln!(f, "  Binding equations:")?;
            for (id, expr) in &self.bindings {
                writeln!(f, "    {} = {}", self.var(*id).name, expr)?;
            }
        }

        writeln!(f, "  DAE residuals ({}):", self.dae.len())?;
        for (k, eq) in self.dae.iter().enumerate() {
            writeln!(f, "    [{}] 0 = {}", k, eq)?;
        }

        if let Some(ode) = &self.ode {
            write!(f, "{}", ode)?;
        }
        Ok(())
    }
}
