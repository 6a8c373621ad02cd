//! Symbolic scalar expressions.
//!
//! `Expr` is a tree-shaped symbolic scalar with operator overloads, so the
//! same formulas can be written over `Expr` that one would write over `f64`.
//! It implements the arithmetic traits nalgebra requires, which lets
//! `Matrix4<Expr>`, `DMatrix<Expr>` etc. work unchanged.

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

use num_traits::{One, Zero};

use crate::error::{ExprError, Result};

/// A named real scalar symbol.
///
/// Cheap to clone; equality and ordering are by name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Sym(Arc<str>);

impl Sym {
    pub fn new(name: &str) -> Self {
        Sym(Arc::from(name))
    }

    pub fn name(&self) -> &str {
        &self.0
    }

    /// The symbol as an expression.
    pub fn expr(&self) -> Expr {
        Expr::Sym(self.clone())
    }
}

impl fmt::Display for Sym {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A symbolic scalar expression.
#[derive(Debug, Clone)]
pub enum Expr {
    Num(f64),
    Sym(Sym),
    Add(Box<Expr>, Box<Expr>),
    Sub(Box<Expr>, Box<Expr>),
    Mul(Box<Expr>, Box<Expr>),
    Div(Box<Expr>, Box<Expr>),
    /// Integer power of the base expression.
    Pow(Box<Expr>, i32),
    Sin(Box<Expr>),
    Cos(Box<Expr>),
    Sqrt(Box<Expr>),
    /// `Atan2(y, x)` is the two-argument arctangent atan2(y, x).
    Atan2(Box<Expr>, Box<Expr>),
}

impl Expr {
    /// Create a named real symbol.
    pub fn symbol(name: &str) -> Expr {
        Expr::Sym(Sym::new(name))
    }

    /// Create symbols from a comma-separated list: `symbols("a, b, c")`.
    pub fn symbols(names: &str) -> Vec<Sym> {
        names
            .split(',')
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(Sym::new)
            .collect()
    }

    /// Create an indexed symbol vector: `prefix1 .. prefixN`.
    pub fn symbol_vector(prefix: &str, n: usize) -> Vec<Sym> {
        (1..=n).map(|i| Sym::new(&format!("{prefix}{i}"))).collect()
    }

    pub fn num(v: f64) -> Expr {
        Expr::Num(v)
    }

    pub fn as_sym(&self) -> Option<&Sym> {
        match self {
            Expr::Sym(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_num(&self) -> bool {
        matches!(self, Expr::Num(_))
    }

    fn boxed(self) -> Box<Expr> {
        Box::new(self)
    }

    pub fn sin(self) -> Expr {
        match self {
            Expr::Num(v) => Expr::Num(v.sin()),
            e => Expr::Sin(e.boxed()),
        }
    }

    pub fn cos(self) -> Expr {
        match self {
            Expr::Num(v) => Expr::Num(v.cos()),
            e => Expr::Cos(e.boxed()),
        }
    }

    pub fn sqrt(self) -> Expr {
        match self {
            Expr::Num(v) if v >= 0.0 => Expr::Num(v.sqrt()),
            e => Expr::Sqrt(e.boxed()),
        }
    }

    /// Two-argument arctangent: `y.atan2(x)`.
    pub fn atan2(self, x: Expr) -> Expr {
        match (self, x) {
            (Expr::Num(y), Expr::Num(x)) => Expr::Num(y.atan2(x)),
            (y, x) => Expr::Atan2(y.boxed(), x.boxed()),
        }
    }

    /// Integer power.
    pub fn powi(self, k: i32) -> Expr {
        match (self, k) {
            (_, 0) => Expr::Num(1.0),
            (e, 1) => e,
            (Expr::Num(v), k) => Expr::Num(v.powi(k)),
            (Expr::Pow(b, j), k) => Expr::Pow(b, j * k),
            (e, k) => Expr::Pow(e.boxed(), k),
        }
    }

    /// Partial derivative with respect to `var`, treating every other
    /// symbol as a constant.
    pub fn diff(&self, var: &Sym) -> Expr {
        self.diff_with(&|s| {
            if s == var {
                Expr::Num(1.0)
            } else {
                Expr::Num(0.0)
            }
        })
    }

    /// Repeated partial derivative of order `k`.
    pub fn diff_n(&self, var: &Sym, k: usize) -> Expr {
        let mut e = self.clone();
        for _ in 0..k {
            e = e.diff(var);
        }
        e
    }

    /// Total derivative against an implicit parameter.
    ///
    /// `table` maps each dependent symbol to its derivative expression;
    /// symbols not in the table are constants. Product, quotient and chain
    /// rules are applied recursively.
    pub fn diff_table(&self, table: &HashMap<Sym, Expr>) -> Expr {
        self.diff_with(&|s| table.get(s).cloned().unwrap_or(Expr::Num(0.0)))
    }

    fn diff_with(&self, d: &dyn Fn(&Sym) -> Expr) -> Expr {
        match self {
            Expr::Num(_) => Expr::Num(0.0),
            Expr::Sym(s) => d(s),
            Expr::Add(a, b) => a.diff_with(d) + b.diff_with(d),
            Expr::Sub(a, b) => a.diff_with(d) - b.diff_with(d),
            Expr::Mul(a, b) => a.diff_with(d) * (**b).clone() + (**a).clone() * b.diff_with(d),
            Expr::Div(a, b) => {
                let num = a.diff_with(d) * (**b).clone() - (**a).clone() * b.diff_with(d);
                num / (**b).clone().powi(2)
            }
            Expr::Pow(a, k) => {
                Expr::Num(*k as f64) * (**a).clone().powi(k - 1) * a.diff_with(d)
            }
            Expr::Sin(a) => (**a).clone().cos() * a.diff_with(d),
            Expr::Cos(a) => Expr::Num(-1.0) * (**a).clone().sin() * a.diff_with(d),
            Expr::Sqrt(a) => {
                a.diff_with(d) / (Expr::Num(2.0) * (**a).clone().sqrt())
            }
            Expr::Atan2(y, x) => {
                // d atan2(y, x) = (x dy - y dx) / (x^2 + y^2)
                let num = (**x).clone() * y.diff_with(d) - (**y).clone() * x.diff_with(d);
                num / ((**x).clone().powi(2) + (**y).clone().powi(2))
            }
        }
    }

    /// Parallel symbol-to-expression substitution.
    pub fn subs(&self, map: &HashMap<Sym, Expr>) -> Expr {
        match self {
            Expr::Num(_) => self.clone(),
            Expr::Sym(s) => map.get(s).cloned().unwrap_or_else(|| self.clone()),
            Expr::Add(a, b) => a.subs(map) + b.subs(map),
            Expr::Sub(a, b) => a.subs(map) - b.subs(map),
            Expr::Mul(a, b) => a.subs(map) * b.subs(map),
            Expr::Div(a, b) => a.subs(map) / b.subs(map),
            Expr::Pow(a, k) => a.subs(map).powi(*k),
            Expr::Sin(a) => a.subs(map).sin(),
            Expr::Cos(a) => a.subs(map).cos(),
            Expr::Sqrt(a) => a.subs(map).sqrt(),
            Expr::Atan2(y, x) => y.subs(map).atan2(x.subs(map)),
        }
    }

    /// Vector-to-vector substitution: `from[i]` is replaced by `to[i]`.
    pub fn subs_vec(&self, from: &[Sym], to: &[Expr]) -> Expr {
        let map: HashMap<Sym, Expr> = from.iter().cloned().zip(to.iter().cloned()).collect();
        self.subs(&map)
    }

    /// Numeric evaluation against symbol bindings.
    pub fn eval(&self, env: &HashMap<Sym, f64>) -> Result<f64> {
        Ok(match self {
            Expr::Num(v) => *v,
            Expr::Sym(s) => *env
                .get(s)
                .ok_or_else(|| ExprError::UnboundSymbol(s.name().to_string()))?,
            Expr::Add(a, b) => a.eval(env)? + b.eval(env)?,
            Expr::Sub(a, b) => a.eval(env)? - b.eval(env)?,
            Expr::Mul(a, b) => a.eval(env)? * b.eval(env)?,
            Expr::Div(a, b) => a.eval(env)? / b.eval(env)?,
            Expr::Pow(a, k) => a.eval(env)?.powi(*k),
            Expr::Sin(a) => a.eval(env)?.sin(),
            Expr::Cos(a) => a.eval(env)?.cos(),
            Expr::Sqrt(a) => a.eval(env)?.sqrt(),
            Expr::Atan2(y, x) => y.eval(env)?.atan2(x.eval(env)?),
        })
    }

    /// Collect the free symbols of the expression.
    pub fn free_symbols(&self) -> BTreeSet<Sym> {
        let mut out = BTreeSet::new();
        self.collect_symbols(&mut out);
        out
    }

    fn collect_symbols(&self, out: &mut BTreeSet<Sym>) {
        match self {
            Expr::Num(_) => {}
            Expr::Sym(s) => {
                out.insert(s.clone());
            }
            Expr::Add(a, b)
            | Expr::Sub(a, b)
            | Expr::Mul(a, b)
            | Expr::Div(a, b)
            | Expr::Atan2(a, b) => {
                a.collect_symbols(out);
                b.collect_symbols(out);
            }
            Expr::Pow(a, _) | Expr::Sin(a) | Expr::Cos(a) | Expr::Sqrt(a) => {
                a.collect_symbols(out)
            }
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Expr::Num(_) => 0,
            Expr::Sym(_) => 1,
            Expr::Add(..) => 2,
            Expr::Sub(..) => 3,
            Expr::Mul(..) => 4,
            Expr::Div(..) => 5,
            Expr::Pow(..) => 6,
            Expr::Sin(_) => 7,
            Expr::Cos(_) => 8,
            Expr::Sqrt(_) => 9,
            Expr::Atan2(..) => 10,
        }
    }
}

impl From<f64> for Expr {
    fn from(v: f64) -> Self {
        Expr::Num(v)
    }
}

impl From<Sym> for Expr {
    fn from(s: Sym) -> Self {
        Expr::Sym(s)
    }
}

impl From<&Sym> for Expr {
    fn from(s: &Sym) -> Self {
        Expr::Sym(s.clone())
    }
}

// Structural total order, used as the canonical term order during
// simplification. Numeric leaves compare by `total_cmp` so the order is
// total; `PartialEq` is defined through it to stay consistent.
impl Ord for Expr {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Expr::Num(a), Expr::Num(b)) => a.total_cmp(b),
            (Expr::Sym(a), Expr::Sym(b)) => a.cmp(b),
            (Expr::Add(a1, a2), Expr::Add(b1, b2))
            | (Expr::Sub(a1, a2), Expr::Sub(b1, b2))
            | (Expr::Mul(a1, a2), Expr::Mul(b1, b2))
            | (Expr::Div(a1, a2), Expr::Div(b1, b2))
            | (Expr::Atan2(a1, a2), Expr::Atan2(b1, b2)) => {
                a1.cmp(b1).then_with(|| a2.cmp(b2))
            }
            (Expr::Pow(a, j), Expr::Pow(b, k)) => a.cmp(b).then_with(|| j.cmp(k)),
            (Expr::Sin(a), Expr::Sin(b))
            | (Expr::Cos(a), Expr::Cos(b))
            | (Expr::Sqrt(a), Expr::Sqrt(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for Expr {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Expr {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Expr {}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Num(v) => write!(f, "{v}"),
            Expr::Sym(s) => write!(f, "{s}"),
            Expr::Add(a, b) => write!(f, "({a} + {b})"),
            Expr::Sub(a, b) => write!(f, "({a} - {b})"),
            Expr::Mul(a, b) => write!(f, "({a} * {b})"),
            Expr::Div(a, b) => write!(f, "({a} / {b})"),
            Expr::Pow(a, k) => write!(f, "{a}^{k}"),
            Expr::Sin(a) => write!(f, "sin({a})"),
            Expr::Cos(a) => write!(f, "cos({a})"),
            Expr::Sqrt(a) => write!(f, "sqrt({a})"),
            Expr::Atan2(y, x) => write!(f, "atan2({y}, {x})"),
        }
    }
}

// Arithmetic with light peephole folding: numeric leaves fold eagerly and
// additive/multiplicative identities collapse, which keeps derivation-time
// trees from exploding with 0- and 1-noise.

impl std::ops::Add for Expr {
    type Output = Expr;
    fn add(self, rhs: Expr) -> Expr {
        match (self, rhs) {
            (Expr::Num(a), Expr::Num(b)) => Expr::Num(a + b),
            (Expr::Num(z), x) | (x, Expr::Num(z)) if z == 0.0 => x,
            (a, b) => Expr::Add(a.boxed(), b.boxed()),
        }
    }
}

impl std::ops::Sub for Expr {
    type Output = Expr;
    fn sub(self, rhs: Expr) -> Expr {
        match (self, rhs) {
            (Expr::Num(a), Expr::Num(b)) => Expr::Num(a - b),
            (x, Expr::Num(z)) if z == 0.0 => x,
            (Expr::Num(z), x) if z == 0.0 => -x,
            (a, b) => Expr::Sub(a.boxed(), b.boxed()),
        }
    }
}

impl std::ops::Mul for Expr {
    type Output = Expr;
    fn mul(self, rhs: Expr) -> Expr {
        match (self, rhs) {
            (Expr::Num(a), Expr::Num(b)) => Expr::Num(a * b),
            (Expr::Num(z), _) | (_, Expr::Num(z)) if z == 0.0 => Expr::Num(0.0),
            (Expr::Num(o), x) | (x, Expr::Num(o)) if o == 1.0 => x,
            (a, b) => Expr::Mul(a.boxed(), b.boxed()),
        }
    }
}

impl std::ops::Div for Expr {
    type Output = Expr;
    fn div(self, rhs: Expr) -> Expr {
        match (self, rhs) {
            (Expr::Num(a), Expr::Num(b)) if b != 0.0 => Expr::Num(a / b),
            (x, Expr::Num(o)) if o == 1.0 => x,
            (Expr::Num(z), _) if z == 0.0 => Expr::Num(0.0),
            (a, b) => Expr::Div(a.boxed(), b.boxed()),
        }
    }
}

impl std::ops::Neg for Expr {
    type Output = Expr;
    fn neg(self) -> Expr {
        match self {
            Expr::Num(v) => Expr::Num(-v),
            e => Expr::Num(-1.0) * e,
        }
    }
}

impl std::ops::AddAssign for Expr {
    fn add_assign(&mut self, rhs: Expr) {
        *self = std::mem::replace(self, Expr::Num(0.0)) + rhs;
    }
}

impl std::ops::SubAssign for Expr {
    fn sub_assign(&mut self, rhs: Expr) {
        *self = std::mem::replace(self, Expr::Num(0.0)) - rhs;
    }
}

impl std::ops::MulAssign for Expr {
    fn mul_assign(&mut self, rhs: Expr) {
        *self = std::mem::replace(self, Expr::Num(0.0)) * rhs;
    }
}

impl std::ops::DivAssign for Expr {
    fn div_assign(&mut self, rhs: Expr) {
        *self = std::mem::replace(self, Expr::Num(0.0)) / rhs;
    }
}

impl std::ops::Add<f64> for Expr {
    type Output = Expr;
    fn add(self, rhs: f64) -> Expr {
        self + Expr::Num(rhs)
    }
}

impl std::ops::Sub<f64> for Expr {
    type Output = Expr;
    fn sub(self, rhs: f64) -> Expr {
        self - Expr::Num(rhs)
    }
}

impl std::ops::Mul<f64> for Expr {
    type Output = Expr;
    fn mul(self, rhs: f64) -> Expr {
        self * Expr::Num(rhs)
    }
}

impl std::ops::Div<f64> for Expr {
    type Output = Expr;
    fn div(self, rhs: f64) -> Expr {
        self / Expr::Num(rhs)
    }
}

impl std::ops::Mul<Expr> for f64 {
    type Output = Expr;
    fn mul(self, rhs: Expr) -> Expr {
        Expr::Num(self) * rhs
    }
}

impl std::iter::Sum for Expr {
    fn sum<I: Iterator<Item = Expr>>(iter: I) -> Expr {
        iter.fold(Expr::Num(0.0), |acc, e| acc + e)
    }
}

impl Zero for Expr {
    fn zero() -> Expr {
        Expr::Num(0.0)
    }

    fn is_zero(&self) -> bool {
        matches!(self, Expr::Num(v) if *v == 0.0)
    }
}

impl One for Expr {
    fn one() -> Expr {
        Expr::Num(1.0)
    }
}
