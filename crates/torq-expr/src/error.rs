//! Error types for torq-expr.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExprError {
    #[error("unbound symbol `{0}`")]
    UnboundSymbol(String),

    #[error("matrix is singular")]
    Singular,

    #[error("expected a square matrix, got {rows}x{cols}")]
    NonSquare { rows: usize, cols: usize },

    #[error("argument group `{group}` expects {expected} values, got {got}")]
    ShapeMismatch {
        group: String,
        expected: usize,
        got: usize,
    },

    #[error("expected {expected} argument groups, got {got}")]
    GroupCount { expected: usize, got: usize },

    #[error("expected a symbol, got `{0}`")]
    NotASymbol(String),
}

pub type Result<T> = std::result::Result<T, ExprError>;
