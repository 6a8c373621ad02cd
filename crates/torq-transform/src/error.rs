//! Error types for torq-transform.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransformError {
    #[error("no homogeneous-transform interpretation for a {rows}x{cols} input")]
    InvalidShape { rows: usize, cols: usize },

    #[error(transparent)]
    Expr(#[from] torq_expr::ExprError),
}

pub type Result<T> = std::result::Result<T, TransformError>;
