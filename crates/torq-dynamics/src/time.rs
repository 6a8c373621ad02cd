//! Time-substitution machinery.
//!
//! Joint symbols must play two roles at once: independent variables under
//! the Euler–Lagrange partials, and functions of time under d/dt. A single
//! symbol cannot do both, so `TimeSubs` keeps two families per joint: the
//! static (q, q̇, q̈) the rest of the system sees, and a hidden
//! t-parameterized mirror. Expressions move between the two families. The total
//! time derivative is: rename into the t-family, differentiate with the
//! dependency table {q(t) → q̇(t), q̇(t) → q̈(t)}, rename back.

use std::collections::HashMap;

use torq_expr::{Expr, Sym};

/// Twin-family substitution context for a joint vector q.
#[derive(Debug, Clone)]
pub struct TimeSubs {
    q: Vec<Sym>,
    qd: Vec<Sym>,
    qdd: Vec<Sym>,
    to_t: HashMap<Sym, Expr>,
    to_q: HashMap<Sym, Expr>,
    dt_table: HashMap<Sym, Expr>,
}

impl TimeSubs {
    /// Build the context for the given joint symbols. Velocity and
    /// acceleration symbols are derived by prefixing `d_` / `dd_`.
    pub fn new(q: &[Sym]) -> Self {
        let qd: Vec<Sym> = q.iter().map(|s| Sym::new(&format!("d_{}", s.name()))).collect();
        let qdd: Vec<Sym> = q
            .iter()
            .map(|s| Sym::new(&format!("dd_{}", s.name())))
            .collect();

        let mut to_t = HashMap::new();
        let mut to_q = HashMap::new();
        let mut dt_table = HashMap::new();
        for ((qs, qds), qdds) in q.iter().zip(&qd).zip(&qdd) {
            let qt = Sym::new(&format!("{}__t", qs.name()));
            let qdt = Sym::new(&format!("{}__t", qds.name()));
            let qddt = Sym::new(&format!("{}__t", qdds.name()));

            to_t.insert(qs.clone(), qt.expr());
            to_t.insert(qds.clone(), qdt.expr());
            to_t.insert(qdds.clone(), qddt.expr());

            to_q.insert(qt.clone(), qs.expr());
            to_q.insert(qdt.clone(), qds.expr());
            to_q.insert(qddt.clone(), qdds.expr());

            dt_table.insert(qt, qdt.expr());
            dt_table.insert(qdt, qddt.expr());
        }

        Self {
            q: q.to_vec(),
            qd,
            qdd,
            to_t,
            to_q,
            dt_table,
        }
    }

    pub fn n(&self) -> usize {
        self.q.len()
    }

    pub fn q(&self) -> &[Sym] {
        &self.q
    }

    pub fn qd(&self) -> &[Sym] {
        &self.qd
    }

    pub fn qdd(&self) -> &[Sym] {
        &self.qdd
    }

    /// Replace static symbols by their t-parameterized mirrors.
    pub fn subs_t(&self, e: &Expr) -> Expr {
        e.subs(&self.to_t)
    }

    /// Inverse of [`subs_t`](Self::subs_t).
    pub fn subs_q(&self, e: &Expr) -> Expr {
        e.subs(&self.to_q)
    }

    /// Differentiate a t-parameterized expression with respect to time.
    pub fn diff_in_t(&self, e: &Expr) -> Expr {
        e.diff_table(&self.dt_table)
    }

    /// Total time derivative of a static-family expression.
    pub fn diff_t(&self, e: &Expr) -> Expr {
        self.subs_q(&self.diff_in_t(&self.subs_t(e)))
    }
}
