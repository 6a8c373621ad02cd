//! Best-effort, semantics-preserving simplification.
//!
//! The pipeline is: constant fold, expand (distribute products over sums,
//! expand integer powers of sums, rewrite sin/cos of angle sums), collect
//! like terms over a canonical monomial order, then contract
//! a·sin²u + a·cos²u → a until fixpoint. Sub-expressions that are not
//! polynomial in the collected sense (quotients, sqrt, atan2) are simplified
//! recursively and treated as opaque factors.

use std::collections::BTreeMap;

use crate::expr::Expr;

/// Exponent map of one monomial: atom → integer power.
type Factors = BTreeMap<Expr, i32>;

/// Collected sum: monomial → numeric coefficient.
type Terms = BTreeMap<Factors, f64>;

impl Expr {
    /// Simplify, preserving semantics.
    pub fn simplify(&self) -> Expr {
        rebuild(reduce(collect(&expand(&fold(self)))))
    }

    /// Fold numeric subexpressions without restructuring.
    pub fn evalf(&self) -> Expr {
        fold(self)
    }
}

/// Bottom-up constant folding through the peephole constructors.
fn fold(e: &Expr) -> Expr {
    match e {
        Expr::Num(_) | Expr::Sym(_) => e.clone(),
        Expr::Add(a, b) => fold(a) + fold(b),
        Expr::Sub(a, b) => fold(a) - fold(b),
        Expr::Mul(a, b) => fold(a) * fold(b),
        Expr::Div(a, b) => fold(a) / fold(b),
        Expr::Pow(a, k) => fold(a).powi(*k),
        Expr::Sin(a) => fold(a).sin(),
        Expr::Cos(a) => fold(a).cos(),
        Expr::Sqrt(a) => fold(a).sqrt(),
        Expr::Atan2(y, x) => fold(y).atan2(fold(x)),
    }
}

/// Distribute products over sums on both sides.
fn distribute(a: Expr, b: Expr) -> Expr {
    match a {
        Expr::Add(a1, a2) => distribute(*a1, b.clone()) + distribute(*a2, b),
        Expr::Sub(a1, a2) => distribute(*a1, b.clone()) - distribute(*a2, b),
        a => match b {
            Expr::Add(b1, b2) => distribute(a.clone(), *b1) + distribute(a, *b2),
            Expr::Sub(b1, b2) => distribute(a.clone(), *b1) - distribute(a, *b2),
            b => a * b,
        },
    }
}

fn expand_sin(arg: Expr) -> Expr {
    match arg {
        Expr::Add(u, v) => {
            let (su, cu) = (expand_sin(*u.clone()), expand_cos(*u));
            let (sv, cv) = (expand_sin(*v.clone()), expand_cos(*v));
            distribute(su, cv) + distribute(cu, sv)
        }
        Expr::Sub(u, v) => {
            let (su, cu) = (expand_sin(*u.clone()), expand_cos(*u));
            let (sv, cv) = (expand_sin(*v.clone()), expand_cos(*v));
            distribute(su, cv) - distribute(cu, sv)
        }
        arg => arg.sin(),
    }
}

fn expand_cos(arg: Expr) -> Expr {
    match arg {
        Expr::Add(u, v) => {
            let (su, cu) = (expand_sin(*u.clone()), expand_cos(*u));
            let (sv, cv) = (expand_sin(*v.clone()), expand_cos(*v));
            distribute(cu, cv) - distribute(su, sv)
        }
        Expr::Sub(u, v) => {
            let (su, cu) = (expand_sin(*u.clone()), expand_cos(*u));
            let (sv, cv) = (expand_sin(*v.clone()), expand_cos(*v));
            distribute(cu, cv) + distribute(su, sv)
        }
        arg => arg.cos(),
    }
}

/// Expand to a sum of products of non-sum factors.
fn expand(e: &Expr) -> Expr {
    match e {
        Expr::Num(_) | Expr::Sym(_) => e.clone(),
        Expr::Add(a, b) => expand(a) + expand(b),
        Expr::Sub(a, b) => expand(a) - expand(b),
        Expr::Mul(a, b) => distribute(expand(a), expand(b)),
        Expr::Div(a, b) => {
            let den = fold(b);
            match den {
                // Numeric denominator folds into the coefficient.
                Expr::Num(c) if c != 0.0 => distribute(Expr::Num(1.0 / c), expand(a)),
                den => Expr::Div(Box::new(a.simplify()), Box::new(den.simplify())),
            }
        }
        Expr::Pow(a, k) => {
            let base = expand(a);
            match (&base, *k) {
                (Expr::Add(..) | Expr::Sub(..), k) if (2..=6).contains(&k) => {
                    let mut r = base.clone();
                    for _ in 1..k {
                        r = distribute(r, base.clone());
                    }
                    r
                }
                (Expr::Mul(x, y), k) => distribute(
                    expand(&Expr::Pow(x.clone(), k)),
                    expand(&Expr::Pow(y.clone(), k)),
                ),
                _ => base.powi(*k),
            }
        }
        Expr::Sin(a) => expand_sin(expand(a)),
        Expr::Cos(a) => expand_cos(expand(a)),
        Expr::Sqrt(a) => expand(a).sqrt(),
        Expr::Atan2(y, x) => expand(y).atan2(expand(x)),
    }
}

/// Canonicalize a non-polynomial factor so equal atoms compare equal.
fn canon_atom(e: &Expr) -> Expr {
    match e {
        Expr::Sin(a) => a.simplify().sin(),
        Expr::Cos(a) => a.simplify().cos(),
        Expr::Sqrt(a) => a.simplify().sqrt(),
        Expr::Atan2(y, x) => y.simplify().atan2(x.simplify()),
        Expr::Div(a, b) => Expr::Div(Box::new(a.simplify()), Box::new(b.simplify())),
        // A sum can survive as an atom only as the base of an unexpanded
        // power; canonicalize it so equal bases compare equal.
        Expr::Add(..) | Expr::Sub(..) => e.simplify(),
        _ => e.clone(),
    }
}

fn add_factor(factors: &mut Factors, atom: Expr, k: i32) {
    let v = factors.get(&atom).copied().unwrap_or(0) + k;
    if v == 0 {
        factors.remove(&atom);
    } else {
        factors.insert(atom, v);
    }
}

fn add_coeff(terms: &mut Terms, factors: Factors, c: f64) {
    let v = terms.get(&factors).copied().unwrap_or(0.0) + c;
    if v == 0.0 {
        terms.remove(&factors);
    } else {
        terms.insert(factors, v);
    }
}

fn mul_walk(e: &Expr, coeff: &mut f64, factors: &mut Factors) {
    match e {
        Expr::Mul(a, b) => {
            mul_walk(a, coeff, factors);
            mul_walk(b, coeff, factors);
        }
        Expr::Num(v) => *coeff *= v,
        Expr::Pow(a, k) => add_factor(factors, canon_atom(a), *k),
        other => add_factor(factors, canon_atom(other), 1),
    }
}

fn add_terms(e: &Expr, sign: f64, terms: &mut Terms) {
    match e {
        Expr::Add(a, b) => {
            add_terms(a, sign, terms);
            add_terms(b, sign, terms);
        }
        Expr::Sub(a, b) => {
            add_terms(a, sign, terms);
            add_terms(b, -sign, terms);
        }
        other => {
            let mut coeff = 1.0;
            let mut factors = Factors::new();
            mul_walk(other, &mut coeff, &mut factors);
            add_coeff(terms, factors, sign * coeff);
        }
    }
}

/// Collect an expanded expression into coefficient-keyed monomials.
fn collect(e: &Expr) -> Terms {
    let mut terms = Terms::new();
    add_terms(e, 1.0, &mut terms);
    terms
}

/// Locate one a·sin²u·X / a·cos²u·X pair. Returns (sin term, cos term,
/// shared remainder, coefficient).
fn find_pythagoras(terms: &Terms) -> Option<(Factors, Factors, Factors, f64)> {
    for (f1, c1) in terms {
        for (atom, p) in f1 {
            let Expr::Sin(u) = atom else { continue };
            if *p < 2 {
                continue;
            }
            let mut shared = f1.clone();
            add_factor(&mut shared, atom.clone(), -2);
            let mut f2 = shared.clone();
            add_factor(&mut f2, Expr::Cos(u.clone()), 2);
            if terms.get(&f2) == Some(c1) {
                return Some((f1.clone(), f2, shared, *c1));
            }
        }
    }
    None
}

fn reduce(mut terms: Terms) -> Terms {
    while let Some((f_sin, f_cos, shared, c)) = find_pythagoras(&terms) {
        terms.remove(&f_sin);
        terms.remove(&f_cos);
        add_coeff(&mut terms, shared, c);
    }
    terms
}

fn build_term(coeff: f64, factors: &Factors) -> Expr {
    let mut parts: Vec<Expr> = Vec::new();
    if coeff != 1.0 || factors.is_empty() {
        parts.push(Expr::Num(coeff));
    }
    for (atom, k) in factors {
        parts.push(atom.clone().powi(*k));
    }
    let mut it = parts.into_iter();
    let first = it.next().unwrap_or(Expr::Num(1.0));
    it.fold(first, |acc, p| acc * p)
}

fn rebuild(terms: Terms) -> Expr {
    let mut pos = Expr::Num(0.0);
    let mut neg = Expr::Num(0.0);
    for (factors, coeff) in &terms {
        if *coeff >= 0.0 {
            pos = pos + build_term(*coeff, factors);
        } else {
            neg = neg + build_term(-*coeff, factors);
        }
    }
    pos - neg
}
