//! Scalar expression trees.
//!
//! `Expr<S>` is generic over its leaf symbol type: equations are loaded with
//! named [`Symbol`] leaves and later re-indexed to slot numbers (`Expr<usize>`)
//! for fast evaluation.

use std::fmt;

/// Named leaf of a model expression.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Symbol {
    /// The independent variable `time`.
    Time,
    /// A declared model variable.
    Var(String),
    /// Time derivative of a declared variable.
    Der(String),
}

impl Symbol {
    pub fn var(name: impl Into<String>) -> Self {
        Symbol::Var(name.into())
    }

    pub fn der(name: impl Into<String>) -> Self {
        Symbol::Der(name.into())
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Symbol::Time => write!(f, "time"),
            Symbol::Var(name) => write!(f, "{}", name),
            Symbol::Der(name) => write!(f, "der({})", name),
        }
    }
}

/// Elementary unary functions understood by the loader.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UnaryFn {
    Sin,
    Cos,
    Tan,
    Asin,
    Acos,
    Atan,
    Sinh,
    Cosh,
    Tanh,
    Exp,
    Log,
    Log10,
    Sqrt,
    Abs,
}

impl UnaryFn {
    const ALL: [UnaryFn; 14] = [
        UnaryFn::Sin,
        UnaryFn::Cos,
        UnaryFn::Tan,
        UnaryFn::Asin,
        UnaryFn::Acos,
        UnaryFn::Atan,
        UnaryFn::Sinh,
        UnaryFn::Cosh,
        UnaryFn::Tanh,
        UnaryFn::Exp,
        UnaryFn::Log,
        UnaryFn::Log10,
        UnaryFn::Sqrt,
        UnaryFn::Abs,
    ];

    /// Name used both in printed expressions and (capitalized) as XML element.
    pub fn name(self) -> &'static str {
        match self {
            UnaryFn::Sin => "sin",
            UnaryFn::Cos => "cos",
            UnaryFn::Tan => "tan",
            UnaryFn::Asin => "asin",
            UnaryFn::Acos => "acos",
            UnaryFn::Atan => "atan",
            UnaryFn::Sinh => "sinh",
            UnaryFn::Cosh => "cosh",
            UnaryFn::Tanh => "tanh",
            UnaryFn::Exp => "exp",
            UnaryFn::Log => "log",
            UnaryFn::Log10 => "log10",
            UnaryFn::Sqrt => "sqrt",
            UnaryFn::Abs => "abs",
        }
    }

    /// Match an XML element local name such as `Sin` or `Log10`.
    pub fn from_element(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|f| f.name().eq_ignore_ascii_case(name))
    }

    pub fn apply(self, x: f64) -> f64 {
        match self {
            UnaryFn::Sin => x.sin(),
            UnaryFn::Cos => x.cos(),
            UnaryFn::Tan => x.tan(),
            UnaryFn::Asin => x.asin(),
            UnaryFn::Acos => x.acos(),
            UnaryFn::Atan => x.atan(),
            UnaryFn::Sinh => x.sinh(),
            UnaryFn::Cosh => x.cosh(),
            UnaryFn::Tanh => x.tanh(),
            UnaryFn::Exp => x.exp(),
            UnaryFn::Log => x.ln(),
            UnaryFn::Log10 => x.log10(),
            UnaryFn::Sqrt => x.sqrt(),
            UnaryFn::Abs => x.abs(),
        }
    }
}

/// Scalar expression tree.
#[derive(Clone, Debug, PartialEq)]
pub enum Expr<S = Symbol> {
    Const(f64),
    Sym(S),
    Neg(Box<Expr<S>>),
    Add(Box<Expr<S>>, Box<Expr<S>>),
    Sub(Box<Expr<S>>, Box<Expr<S>>),
    Mul(Box<Expr<S>>, Box<Expr<S>>),
    Div(Box<Expr<S>>, Box<Expr<S>>),
    Pow(Box<Expr<S>>, Box<Expr<S>>),
    Call(UnaryFn, Box<Expr<S>>),
}

impl Expr<Symbol> {
    pub fn var(name: impl Into<String>) -> Self {
        Expr::Sym(Symbol::var(name))
    }

    pub fn der(name: impl Into<String>) -> Self {
        Expr::Sym(Symbol::der(name))
    }

    pub fn time() -> Self {
        Expr::Sym(Symbol::Time)
    }
}

impl<S: Clone> Expr<S> {
    pub fn as_const(&self) -> Option<f64> {
        match self {
            Expr::Const(c) => Some(*c),
            _ => None,
        }
    }

    fn is_const(&self, value: f64) -> bool {
        self.as_const() == Some(value)
    }

    // Folding constructors. They keep results of symbolic manipulation
    // readable; parsed equations use the raw variants.

    pub fn neg(a: Self) -> Self {
        match a {
            Expr::Const(c) => Expr::Const(-c),
            Expr::Neg(inner) => *inner,
            other => Expr::Neg(Box::new(other)),
        }
    }

    pub fn add(a: Self, b: Self) -> Self {
        match (a.as_const(), b.as_const()) {
            (Some(x), Some(y)) => Expr::Const(x + y),
            (Some(x), _) if x == 0.0 => b,
            (_, Some(y)) if y == 0.0 => a,
            _ => Expr::Add(Box::new(a), Box::new(b)),
        }
    }

    pub fn sub(a: Self, b: Self) -> Self {
        match (a.as_const(), b.as_const()) {
            (Some(x), Some(y)) => Expr::Const(x - y),
            (_, Some(y)) if y == 0.0 => a,
            (Some(x), _) if x == 0.0 => Expr::neg(b),
            _ => Expr::Sub(Box::new(a), Box::new(b)),
        }
    }

    pub fn mul(a: Self, b: Self) -> Self {
        match (a.as_const(), b.as_const()) {
            (Some(x), Some(y)) => Expr::Const(x * y),
            (Some(x), _) | (_, Some(x)) if x == 0.0 => Expr::Const(0.0),
            (Some(x), _) if x == 1.0 => b,
            (_, Some(y)) if y == 1.0 => a,
            (Some(x), _) if x == -1.0 => Expr::neg(b),
            (_, Some(y)) if y == -1.0 => Expr::neg(a),
            _ => Expr::Mul(Box::new(a), Box::new(b)),
        }
    }

    pub fn div(a: Self, b: Self) -> Self {
        match (a.as_const(), b.as_const()) {
            (Some(x), Some(y)) if y != 0.0 => Expr::Const(x / y),
            (_, Some(y)) if y == 1.0 => a,
            (_, Some(y)) if y == -1.0 => Expr::neg(a),
            (Some(x), _) if x == 0.0 => Expr::Const(0.0),
            _ => Expr::Div(Box::new(a), Box::new(b)),
        }
    }

    /// Visit every leaf symbol, left to right.
    pub fn visit_symbols<F: FnMut(&S)>(&self, f: &mut F) {
        match self {
            Expr::Const(_) => {}
            Expr::Sym(s) => f(s),
            Expr::Neg(a) | Expr::Call(_, a) => a.visit_symbols(f),
            Expr::Add(a, b)
            | Expr::Sub(a, b)
            | Expr::Mul(a, b)
            | Expr::Div(a, b)
            | Expr::Pow(a, b) => {
                a.visit_symbols(f);
                b.visit_symbols(f);
            }
        }
    }

    /// First leaf matching `pred`, if any.
    pub fn find_symbol<P: Fn(&S) -> bool>(&self, pred: &P) -> Option<S> {
        let mut found = None;
        self.visit_symbols(&mut |s| {
            if found.is_none() && pred(s) {
                found = Some(s.clone());
            }
        });
        found
    }

    pub fn contains_symbol<P: Fn(&S) -> bool>(&self, pred: &P) -> bool {
        self.find_symbol(pred).is_some()
    }

    /// Rebuild the tree with each leaf mapped through `f`.
    pub fn try_map_symbols<T, E, F>(&self, f: &mut F) -> Result<Expr<T>, E>
    where
        F: FnMut(&S) -> Result<T, E>,
    {
        Ok(match self {
            Expr::Const(c) => Expr::Const(*c),
            Expr::Sym(s) => Expr::Sym(f(s)?),
            Expr::Neg(a) => Expr::Neg(Box::new(a.try_map_symbols(f)?)),
            Expr::Call(func, a) => Expr::Call(*func, Box::new(a.try_map_symbols(f)?)),
            Expr::Add(a, b) => Expr::Add(
                Box::new(a.try_map_symbols(f)?),
                Box::new(b.try_map_symbols(f)?),
            ),
            Expr::Sub(a, b) => Expr::Sub(
                Box::new(a.try_map_symbols(f)?),
                Box::new(b.try_map_symbols(f)?),
            ),
            Expr::Mul(a, b) => Expr::Mul(
                Box::new(a.try_map_symbols(f)?),
                Box::new(b.try_map_symbols(f)?),
            ),
            Expr::Div(a, b) => Expr::Div(
                Box::new(a.try_map_symbols(f)?),
                Box::new(b.try_map_symbols(f)?),
            ),
            Expr::Pow(a, b) => Expr::Pow(
                Box::new(a.try_map_symbols(f)?),
                Box::new(b.try_map_symbols(f)?),
            ),
        })
    }

    /// Evaluate numerically, reading leaves through `lookup`.
    pub fn eval<L: Fn(&S) -> f64>(&self, lookup: &L) -> f64 {
        match self {
            Expr::Const(c) => *c,
            Expr::Sym(s) => lookup(s),
            Expr::Neg(a) => -a.eval(lookup),
            Expr::Add(a, b) => a.eval(lookup) + b.eval(lookup),
            Expr::Sub(a, b) => a.eval(lookup) - b.eval(lookup),
            Expr::Mul(a, b) => a.eval(lookup) * b.eval(lookup),
            Expr::Div(a, b) => a.eval(lookup) / b.eval(lookup),
            Expr::Pow(a, b) => a.eval(lookup).powf(b.eval(lookup)),
            Expr::Call(func, a) => func.apply(a.eval(lookup)),
        }
    }

    fn precedence(&self) -> u8 {
        match self {
            Expr::Add(..) | Expr::Sub(..) => 1,
            Expr::Mul(..) | Expr::Div(..) => 2,
            Expr::Neg(_) => 3,
            Expr::Const(c) if *c < 0.0 => 3,
            Expr::Pow(..) => 4,
            Expr::Const(_) | Expr::Sym(_) | Expr::Call(..) => 5,
        }
    }
}

impl<S: Clone + fmt::Display> Expr<S> {
    fn fmt_operand(&self, f: &mut fmt::Formatter<'_>, min_prec: u8) -> fmt::Result {
        if self.precedence() < min_prec {
            write!(f, "({})", self)
        } else {
            write!(f, "{}", self)
        }
    }
}

impl<S: Clone + fmt::Display> fmt::Display for Expr<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Const(c) => write!(f, "{}", c),
            Expr::Sym(s) => write!(f, "{}", s),
            Expr::Neg(a) => {
                write!(f, "-")?;
                a.fmt_operand(f, 4)
            }
            Expr::Add(a, b) => {
                a.fmt_operand(f, 1)?;
                write!(f, " + ")?;
                b.fmt_operand(f, 2)
            }
            Expr::Sub(a, b) => {
                a.fmt_operand(f, 1)?;
                write!(f, " - ")?;
                b.fmt_operand(f, 2)
            }
            Expr::Mul(a, b) => {
                a.fmt_operand(f, 2)?;
                write!(f, "*")?;
                b.fmt_operand(f, 4)
            }
            Expr::Div(a, b) => {
                a.fmt_operand(f, 2)?;
                write!(f, "/")?;
                b.fmt_operand(f, 4)
            }
            Expr::Pow(a, b) => {
                a.fmt_operand(f, 5)?;
                write!(f, "^")?;
                b.fmt_operand(f, 5)
            }
            Expr::Call(func, a) => write!(f, "{}({})", func.name(), a),
        }
    }
}
