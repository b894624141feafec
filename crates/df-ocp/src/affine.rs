//! Affine decomposition of an expression with respect to chosen unknowns.
//!
//! `e = sum_i c_i * u_i + r`, where neither the coefficients `c_i` nor the
//! remainder `r` contain any unknown. Expressions that are not affine in the
//! unknowns are rejected.

use std::collections::BTreeMap;

use crate::expr::{Expr, Symbol};

/// Affine form of an expression.
#[derive(Clone, Debug, PartialEq)]
pub struct Affine {
    pub coeffs: BTreeMap<Symbol, Expr>,
    pub rest: Expr,
}

/// An unknown appears nonlinearly.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Nonlinear {
    pub unknown: Symbol,
}

impl Affine {
    fn constant(e: Expr) -> Self {
        Self {
            coeffs: BTreeMap::new(),
            rest: e,
        }
    }

    fn unknown(s: Symbol) -> Self {
        let mut coeffs = BTreeMap::new();
        coeffs.insert(s, Expr::Const(1.0));
        Self {
            coeffs,
            rest: Expr::Const(0.0),
        }
    }

    fn is_constant(&self) -> bool {
        self.coeffs.is_empty()
    }

    fn first_unknown(&self) -> Option<Symbol> {
        self.coeffs.keys().next().cloned()
    }

    fn plus(mut self, other: Affine) -> Self {
        for (s, c) in other.coeffs {
            let merged = match self.coeffs.remove(&s) {
                Some(existing) => Expr::add(existing, c),
                None => c,
            };
            self.coeffs.insert(s, merged);
        }
        self.rest = Expr::add(self.rest, other.rest);
        self
    }

    fn negate(self) -> Self {
        Self {
            coeffs: self
                .coeffs
                .into_iter()
                .map(|(s, c)| (s, Expr::neg(c)))
                .collect(),
            rest: Expr::neg(self.rest),
        }
    }

    fn scale(self, factor: &Expr) -> Self {
        Self {
            coeffs: self
                .coeffs
                .into_iter()
                .map(|(s, c)| (s, Expr::mul(factor.clone(), c)))
                .collect(),
            rest: Expr::mul(factor.clone(), self.rest),
        }
    }

    fn divide(self, divisor: &Expr) -> Self {
        Self {
            coeffs: self
                .coeffs
                .into_iter()
                .map(|(s, c)| (s, Expr::div(c, divisor.clone())))
                .collect(),
            rest: Expr::div(self.rest, divisor.clone()),
        }
    }

    /// Coefficient of `unknown`, zero when absent.
    pub fn coeff(&self, unknown: &Symbol) -> Expr {
        self.coeffs
            .get(unknown)
            .cloned()
            .unwrap_or(Expr::Const(0.0))
    }
}

/// Decompose `e` affinely in the symbols selected by `is_unknown`.
pub fn decompose<U>(e: &Expr, is_unknown: &U) -> Result<Affine, Nonlinear>
where
    U: Fn(&Symbol) -> bool,
{
    match e {
        Expr::Sym(s) if is_unknown(s) => Ok(Affine::unknown(s.clone())),
        Expr::Const(_) | Expr::Sym(_) => Ok(Affine::constant(e.clone())),
        Expr::Neg(a) => Ok(decompose(a, is_unknown)?.negate()),
        Expr::Add(a, b) => Ok(decompose(a, is_unknown)?.plus(decompose(b, is_unknown)?)),
        Expr::Sub(a, b) => Ok(decompose(a, is_unknown)?.plus(decompose(b, is_unknown)?.negate())),
        Expr::Mul(a, b) => {
            let la = decompose(a, is_unknown)?;
            let lb = decompose(b, is_unknown)?;
            if la.is_constant() {
                Ok(lb.scale(&la.rest))
            } else if lb.is_constant() {
                Ok(la.scale(&lb.rest))
            } else {
                Err(Nonlinear {
                    unknown: la.first_unknown().unwrap_or(Symbol::Time),
                })
            }
        }
        Expr::Div(a, b) => {
            let lb = decompose(b, is_unknown)?;
            if let Some(unknown) = lb.first_unknown() {
                return Err(Nonlinear { unknown });
            }
            Ok(decompose(a, is_unknown)?.divide(&lb.rest))
        }
        Expr::Pow(..) | Expr::Call(..) => match e.find_symbol(is_unknown) {
            Some(unknown) => Err(Nonlinear { unknown }),
            None => Ok(Affine::constant(e.clone())),
        },
    }
}

/// Solve the single-unknown equation `e = 0` for `unknown`.
///
/// Returns `None` when `unknown` has a literal zero coefficient.
pub fn isolate(affine: &Affine, unknown: &Symbol) -> Option<Expr> {
    let coeff = affine.coeff(unknown);
    if coeff.as_const() == Some(0.0) {
        return None;
    }
    Some(Expr::div(Expr::neg(affine.rest.clone()), coeff))
}
