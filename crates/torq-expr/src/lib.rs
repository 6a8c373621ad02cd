//! Symbolic algebra for torq.
//!
//! Provides the scalar expression type, symbolic matrices over nalgebra
//! containers, best-effort simplification, and compilation of symbolic
//! matrices to fast numeric callables.

pub mod compile;
pub mod error;
pub mod expr;
pub mod matrix;
mod simplify;

pub use compile::{ArgGroup, CompiledFn, compile};
pub use error::{ExprError, Result};
pub use expr::{Expr, Sym};
pub use matrix::{
    SymMatrix, SymVector, deskew, diff_matrix, inverse, is_zero_matrix, linear_decompose, skew,
    simplify_matrix, subs_matrix,
};
