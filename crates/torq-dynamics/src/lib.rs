//! Symbolic manipulator dynamics for torq.
//!
//! Derives the closed-form equations of motion
//! M(q)·q̈ + V(q,q̇) + G(q) + b⊙q̇ = τ from mass and inertia attachments on
//! a kinematic chain, and compiles them into numeric callables for forward
//! and inverse dynamics.

pub mod error;
pub mod kinematics;
pub mod model;
pub mod time;

pub use error::{DynError, Result};
pub use kinematics::{DhChain, DhChainBuilder, JointSpace, Kinematics};
pub use model::{DynamicModel, GRAVITY, InertiaBody, InertiaSpec, MassPoint};
pub use time::TimeSubs;
