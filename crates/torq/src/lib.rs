//! torq: symbolic manipulator dynamics.
//!
//! This is the umbrella crate that re-exports the core types from the
//! sub-crates: symbolic expressions and compilation (`torq-expr`),
//! homogeneous transforms (`torq-transform`), the Euler–Lagrange dynamics
//! pipeline (`torq-dynamics`), and the simulation adapter (`torq-sim`).

pub use torq_expr::{
    self, ArgGroup, CompiledFn, Expr, ExprError, Sym, SymMatrix, SymVector, compile, deskew,
    linear_decompose, skew,
};

pub use torq_transform::{
    self, Ht, TransformError, coupling_jacobian, euler_rate_matrix, euler_rate_matrix_inv,
};

pub use torq_dynamics::{
    self, DhChain, DhChainBuilder, DynError, DynamicModel, GRAVITY, InertiaSpec, JointSpace,
    Kinematics, TimeSubs,
};

pub use torq_sim::{
    self, ComputedTorque, Controller, DesiredPoint, Noise, SimHarness, Trajectory, UniformNoise,
    integrate, rk4_step,
};
