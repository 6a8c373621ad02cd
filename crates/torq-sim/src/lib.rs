//! Simulation adapter for torq.
//!
//! Wraps a derived [`DynamicModel`](torq_dynamics::DynamicModel), a
//! controller and an optional noise source into an ODE right-hand side,
//! integrates it with fixed-step RK4, and records joint trajectories.

pub mod control;
pub mod harness;
pub mod ode;
pub mod trajectory;

pub use control::{ComputedTorque, Controller, DesiredPoint, Noise, UniformNoise};
pub use harness::SimHarness;
pub use ode::{integrate, rk4_step};
pub use trajectory::Trajectory;
