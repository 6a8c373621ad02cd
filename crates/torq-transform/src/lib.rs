//! Homogeneous transform engine for torq.
//!
//! Symbolic 4×4 transforms with Euler-angle caching, composition and
//! structural inversion, angular-velocity extraction, and geometric/analytic
//! Jacobians with their Euler-rate coupling.

pub mod error;
pub mod ht;

pub use error::{Result, TransformError};
pub use ht::{Ht, coupling_jacobian, euler_rate_matrix, euler_rate_matrix_inv};
