//! Implicit DAE to explicit ODE transformation.
//!
//! The unknowns are `der(x)` for every differential state and every
//! algebraic variable. The residuals are matched to unknowns, sorted into
//! block lower triangular order and each block is solved affinely:
//!
//! 1. maximum bipartite matching (augmenting paths): an unmatched equation
//!    means the system is structurally singular
//! 2. strongly connected components of the equation dependency graph give
//!    the evaluation order (`petgraph::algo::tarjan_scc`)
//! 3. single-equation blocks are isolated symbolically, larger blocks become
//!    linear systems solved at evaluation time

use std::collections::BTreeMap;
use std::fmt;

use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use tracing::debug;

use crate::affine::{self, Affine};
use crate::error::{OcpError, OcpResult};
use crate::expr::{Expr, Symbol};
use crate::ocp::SymbolicOcp;

/// One step of the explicit solve program.
#[derive(Clone, Debug, PartialEq)]
pub enum SolveStep<S = Symbol> {
    /// `target := expr`
    Assign { target: S, expr: Expr<S> },
    /// Solve `matrix * targets = rhs` for `targets`.
    Linear {
        targets: Vec<S>,
        matrix: Vec<Vec<Expr<S>>>,
        rhs: Vec<Expr<S>>,
    },
}

impl<S> SolveStep<S> {
    pub fn targets(&self) -> &[S] {
        match self {
            SolveStep::Assign { target, .. } => std::slice::from_ref(target),
            SolveStep::Linear { targets, .. } => targets,
        }
    }
}

/// Explicit form: an ordered program whose targets are every `der(x)` and
/// every algebraic variable, each step reading only `time`, states,
/// parameters and targets of earlier steps.
#[derive(Clone, Debug, PartialEq)]
pub struct ExplicitForm {
    pub steps: Vec<SolveStep>,
}

impl ExplicitForm {
    /// Number of equations solved as coupled linear systems.
    pub fn coupled_equations(&self) -> usize {
        self.steps
            .iter()
            .filter_map(|s| match s {
                SolveStep::Linear { targets, .. } => Some(targets.len()),
                SolveStep::Assign { .. } => None,
            })
            .sum()
    }
}

impl fmt::Display for ExplicitForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "  Explicit form ({} steps):", self.steps.len())?;
        for step in &self.steps {
            match step {
                SolveStep::Assign { target, expr } => writeln!(f, "    {} := {}", target, expr)?,
                SolveStep::Linear {
                    targets,
                    matrix,
                    rhs,
                } => {
                    let names: Vec<String> = targets.iter().map(|t| t.to_string()).collect();
                    writeln!(f, "    [{}] := solve", names.join(", "))?;
                    for (row, b) in matrix.iter().zip(rhs) {
                        let terms: Vec<String> = row
                            .iter()
                            .zip(targets)
                            .filter(|(a, _)| a.as_const() != Some(0.0))
                            .map(|(a, t)| format!("({})*{}", a, t))
                            .collect();
                        writeln!(f, "      {} = {}", terms.join(" + "), b)?;
                    }
                }
            }
        }
        Ok(())
    }
}

impl SymbolicOcp {
    /// Return a copy whose `ode` isolates every `der(xd)`.
    ///
    /// Fails with [`OcpError::UnsolvableStructure`] when the DAE is not
    /// index-1 solvable by affine isolation.
    pub fn make_explicit(&self) -> OcpResult<SymbolicOcp> {
        let unknowns: Vec<Symbol> = self
            .xd()
            .iter()
            .map(|id| Symbol::der(self.var(*id).name.clone()))
            .chain(
                self.z()
                    .iter()
                    .map(|id| Symbol::var(self.var(*id).name.clone())),
            )
            .collect();
        let equations = self.dae();

        if equations.len() != unknowns.len() {
            return Err(OcpError::unsolvable(format!(
                "{} equations for {} unknowns ({} derivatives, {} algebraic)",
                equations.len(),
                unknowns.len(),
                self.xd().len(),
                self.z().len()
            )));
        }

        let position: BTreeMap<&Symbol, usize> =
            unknowns.iter().enumerate().map(|(i, s)| (s, i)).collect();

        // Structural incidence: unknowns occurring in each equation.
        let incidence: Vec<Vec<usize>> = equations
            .iter()
            .map(|eq| {
                let mut cols = Vec::new();
                eq.visit_symbols(&mut |s| {
                    if let Some(&j) = position.get(s)
                        && !cols.contains(&j)
                    {
                        cols.push(j);
                    }
                });
                cols.sort_unstable();
                cols
            })
            .collect();

        let eq_of_unknown = match_equations(&incidence, unknowns.len()).map_err(|eq| {
            OcpError::unsolvable(format!(
                "structurally singular: equation {} (0 = {}) cannot be assigned an unknown",
                eq, equations[eq]
            ))
        })?;
        let mut unknown_of_eq = vec![0; equations.len()];
        for (u, &eq) in eq_of_unknown.iter().enumerate() {
            unknown_of_eq[eq] = u;
        }

        // Edge i -> j: equation i reads the unknown solved by equation j.
        let mut graph: DiGraph<usize, ()> = DiGraph::with_capacity(equations.len(), 0);
        let nodes: Vec<NodeIndex> = (0..equations.len()).map(|i| graph.add_node(i)).collect();
        for (i, cols) in incidence.iter().enumerate() {
            for &u in cols {
                let j = eq_of_unknown[u];
                if j != i {
                    graph.add_edge(nodes[i], nodes[j], ());
                }
            }
        }

        // Postorder of SCCs puts dependencies first.
        let mut steps = Vec::new();
        for scc in tarjan_scc(&graph) {
            let mut block: Vec<usize> = scc.iter().map(|n| graph[*n]).collect();
            block.sort_unstable();
            let mut columns: Vec<usize> = block.iter().map(|&eq| unknown_of_eq[eq]).collect();
            columns.sort_unstable();
            let targets: Vec<Symbol> = columns.iter().map(|&u| unknowns[u].clone()).collect();
            steps.push(solve_block(&block, &targets, equations)?);
        }

        let form = ExplicitForm { steps };
        debug!(
            model = self.name(),
            steps = form.steps.len(),
            coupled = form.coupled_equations(),
            "made DAE explicit"
        );
        Ok(self.clone().with_ode(form))
    }
}

/// Maximum bipartite matching. Returns, per unknown, the matched equation,
/// or the first equation that could not be matched.
fn match_equations(incidence: &[Vec<usize>], n_unknowns: usize) -> Result<Vec<usize>, usize> {
    fn augment(
        eq: usize,
        incidence: &[Vec<usize>],
        owner: &mut [Option<usize>],
        visited: &mut [bool],
    ) -> bool {
        for &u in &incidence[eq] {
            if visited[u] {
                continue;
            }
            visited[u] = true;
            let free = match owner[u] {
                None => true,
                Some(other) => augment(other, incidence, owner, visited),
            };
            if free {
                owner[u] = Some(eq);
                return true;
            }
        }
        false
    }

    let mut owner: Vec<Option<usize>> = vec![None; n_unknowns];
    for eq in 0..incidence.len() {
        let mut visited = vec![false; n_unknowns];
        if !augment(eq, incidence, &mut owner, &mut visited) {
            return Err(eq);
        }
    }
    // Square system and every equation matched: every unknown is owned.
    owner
        .into_iter()
        .enumerate()
        .map(|(u, eq)| eq.ok_or(u))
        .collect()
}

fn solve_block(block: &[usize], targets: &[Symbol], equations: &[Expr]) -> OcpResult<SolveStep> {
    let is_target = |s: &Symbol| targets.contains(s);

    let mut forms: Vec<Affine> = Vec::with_capacity(block.len());
    for &eq in block {
        let form = affine::decompose(&equations[eq], &is_target).map_err(|nl| {
            OcpError::unsolvable(format!(
                "equation {} (0 = {}) is nonlinear in {}",
                eq, equations[eq], nl.unknown
            ))
        })?;
        forms.push(form);
    }

    if let [form] = forms.as_slice() {
        let target = &targets[0];
        let expr = affine::isolate(form, target).ok_or_else(|| {
            OcpError::unsolvable(format!(
                "equation {} has a zero coefficient for {}",
                block[0], target
            ))
        })?;
        return Ok(SolveStep::Assign {
            target: target.clone(),
            expr,
        });
    }

    let matrix = forms
        .iter()
        .map(|form| targets.iter().map(|t| form.coeff(t)).collect())
        .collect();
    let rhs = forms
        .into_iter()
        .map(|form| Expr::neg(form.rest))
        .collect();
    Ok(SolveStep::Linear {
        targets: targets.to_vec(),
        matrix,
        rhs,
    })
}
