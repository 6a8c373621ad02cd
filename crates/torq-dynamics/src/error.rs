//! Error types for torq-dynamics.

use thiserror::Error;
use torq_expr::ExprError;
use torq_transform::TransformError;

#[derive(Debug, Error)]
pub enum DynError {
    #[error("dynamics not derived yet: call calculate_dynamics first")]
    Uninitialized,

    #[error("unknown frame `{0}`")]
    UnknownFrame(String),

    #[error("{what}: expected length {expected}, got {got}")]
    ShapeMismatch {
        what: String,
        expected: usize,
        got: usize,
    },

    #[error("numeric evaluation unavailable: model has free parameters {0:?}")]
    FreeParameters(Vec<String>),

    #[error(transparent)]
    Expr(#[from] ExprError),

    #[error(transparent)]
    Transform(#[from] TransformError),
}

pub type Result<T> = std::result::Result<T, DynError>;
