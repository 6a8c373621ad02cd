//! Compilation of symbolic matrices to numeric callables.
//!
//! Each matrix entry is lowered once to a stack-machine tape; evaluation is
//! then a tight loop over the tape with no tree walking and no allocation
//! beyond the shared value stack. Built for the compile-once / evaluate-many
//! pattern of dynamics callables.

use std::collections::HashMap;

use nalgebra::DMatrix;

use crate::error::{ExprError, Result};
use crate::expr::{Expr, Sym};
use crate::matrix::SymMatrix;

/// A named, ordered group of argument symbols (e.g. `q`, `qd`, `tau`).
#[derive(Debug, Clone)]
pub struct ArgGroup {
    name: String,
    syms: Vec<Sym>,
}

impl ArgGroup {
    pub fn new(name: &str, syms: &[Sym]) -> Self {
        Self {
            name: name.to_string(),
            syms: syms.to_vec(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.syms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.syms.is_empty()
    }
}

/// One stack-machine instruction.
#[derive(Debug, Clone, Copy)]
enum Op {
    /// Push a literal.
    Push(f64),
    /// Push argument `idx` of group `group`.
    Load { group: usize, idx: usize },
    Add,
    Sub,
    Mul,
    Div,
    Powi(i32),
    Sin,
    Cos,
    Sqrt,
    Atan2,
}

/// A compiled numeric callable over named argument groups.
///
/// Evaluation checks group count and per-group lengths, then executes the
/// per-entry tapes and returns a matrix of the original shape. Non-finite
/// values pass through unmasked.
pub struct CompiledFn {
    nrows: usize,
    ncols: usize,
    groups: Vec<(String, usize)>,
    tapes: Vec<Vec<Op>>,
    stack_depth: usize,
}

impl CompiledFn {
    /// Number of rows of the compiled matrix.
    pub fn nrows(&self) -> usize {
        self.nrows
    }

    /// Number of columns of the compiled matrix.
    pub fn ncols(&self) -> usize {
        self.ncols
    }

    /// Evaluate against one numeric slice per argument group.
    pub fn eval(&self, args: &[&[f64]]) -> Result<DMatrix<f64>> {
        if args.len() != self.groups.len() {
            return Err(ExprError::GroupCount {
                expected: self.groups.len(),
                got: args.len(),
            });
        }
        for ((name, len), arg) in self.groups.iter().zip(args) {
            if arg.len() != *len {
                return Err(ExprError::ShapeMismatch {
                    group: name.clone(),
                    expected: *len,
                    got: arg.len(),
                });
            }
        }

        let mut stack: Vec<f64> = Vec::with_capacity(self.stack_depth);
        let mut out = DMatrix::<f64>::zeros(self.nrows, self.ncols);
        for (entry, tape) in out.iter_mut().zip(&self.tapes) {
            stack.clear();
            for op in tape {
                match *op {
                    Op::Push(v) => stack.push(v),
                    Op::Load { group, idx } => stack.push(args[group][idx]),
                    Op::Add => binary(&mut stack, |a, b| a + b),
                    Op::Sub => binary(&mut stack, |a, b| a - b),
                    Op::Mul => binary(&mut stack, |a, b| a * b),
                    Op::Div => binary(&mut stack, |a, b| a / b),
                    Op::Powi(k) => unary(&mut stack, |a| a.powi(k)),
                    Op::Sin => unary(&mut stack, f64::sin),
                    Op::Cos => unary(&mut stack, f64::cos),
                    Op::Sqrt => unary(&mut stack, f64::sqrt),
                    Op::Atan2 => binary(&mut stack, f64::atan2),
                }
            }
            *entry = stack.pop().unwrap_or(0.0);
        }
        Ok(out)
    }

    /// Evaluate a single-column compilation to a flat vector.
    pub fn eval_vec(&self, args: &[&[f64]]) -> Result<Vec<f64>> {
        Ok(self.eval(args)?.as_slice().to_vec())
    }
}

#[inline]
fn binary(stack: &mut Vec<f64>, f: impl Fn(f64, f64) -> f64) {
    let b = stack.pop().unwrap_or(f64::NAN);
    let a = stack.pop().unwrap_or(f64::NAN);
    stack.push(f(a, b));
}

#[inline]
fn unary(stack: &mut Vec<f64>, f: impl Fn(f64) -> f64) {
    let a = stack.pop().unwrap_or(f64::NAN);
    stack.push(f(a));
}

/// Compile a symbolic matrix against the given argument groups.
///
/// Every free symbol of every entry must belong to exactly one group;
/// symbols outside all groups are `UnboundSymbol` errors at compile time.
pub fn compile(m: &SymMatrix, groups: &[ArgGroup]) -> Result<CompiledFn> {
    let mut slots: HashMap<Sym, (usize, usize)> = HashMap::new();
    for (gi, g) in groups.iter().enumerate() {
        for (si, s) in g.syms.iter().enumerate() {
            slots.insert(s.clone(), (gi, si));
        }
    }

    let mut tapes = Vec::with_capacity(m.len());
    let mut stack_depth = 0;
    for entry in m.iter() {
        let mut tape = Vec::new();
        let depth = emit(entry, &slots, &mut tape)?;
        stack_depth = stack_depth.max(depth);
        tapes.push(tape);
    }

    Ok(CompiledFn {
        nrows: m.nrows(),
        ncols: m.ncols(),
        groups: groups.iter().map(|g| (g.name.clone(), g.len())).collect(),
        tapes,
        stack_depth,
    })
}

/// Emit postorder ops for one expression; returns the stack depth needed.
fn emit(e: &Expr, slots: &HashMap<Sym, (usize, usize)>, tape: &mut Vec<Op>) -> Result<usize> {
    Ok(match e {
        Expr::Num(v) => {
            tape.push(Op::Push(*v));
            1
        }
        Expr::Sym(s) => {
            let (group, idx) = *slots
                .get(s)
                .ok_or_else(|| ExprError::UnboundSymbol(s.name().to_string()))?;
            tape.push(Op::Load { group, idx });
            1
        }
        Expr::Add(a, b) => emit_binary(a, b, Op::Add, slots, tape)?,
        Expr::Sub(a, b) => emit_binary(a, b, Op::Sub, slots, tape)?,
        Expr::Mul(a, b) => emit_binary(a, b, Op::Mul, slots, tape)?,
        Expr::Div(a, b) => emit_binary(a, b, Op::Div, slots, tape)?,
        Expr::Atan2(y, x) => emit_binary(y, x, Op::Atan2, slots, tape)?,
        Expr::Pow(a, k) => {
            let d = emit(a, slots, tape)?;
            tape.push(Op::Powi(*k));
            d
        }
        Expr::Sin(a) => {
            let d = emit(a, slots, tape)?;
            tape.push(Op::Sin);
            d
        }
        Expr::Cos(a) => {
            let d = emit(a, slots, tape)?;
            tape.push(Op::Cos);
            d
        }
        Expr::Sqrt(a) => {
            let d = emit(a, slots, tape)?;
            tape.push(Op::Sqrt);
            d
        }
    })
}

fn emit_binary(
    a: &Expr,
    b: &Expr,
    op: Op,
    slots: &HashMap<Sym, (usize, usize)>,
    tape: &mut Vec<Op>,
) -> Result<usize> {
    let da = emit(a, slots, tape)?;
    let db = emit(b, slots, tape)?;
    tape.push(op);
    Ok(da.max(db + 1))
}
