//! Controllers and torque noise sources.

use std::cell::RefCell;

use nalgebra::DVector;
use rand::{Rng, SeedableRng, rngs::StdRng};

use torq_dynamics::{DynamicModel, Kinematics};

/// A feedback controller: joint torques from (t, q, q̇).
pub trait Controller {
    fn torque(&self, t: f64, q: &DVector<f64>, qd: &DVector<f64>) -> DVector<f64>;
}

impl<F> Controller for F
where
    F: Fn(f64, &DVector<f64>, &DVector<f64>) -> DVector<f64>,
{
    fn torque(&self, t: f64, q: &DVector<f64>, qd: &DVector<f64>) -> DVector<f64> {
        self(t, q, qd)
    }
}

/// One point of a desired joint trajectory.
#[derive(Debug, Clone)]
pub struct DesiredPoint {
    pub q: DVector<f64>,
    pub qd: DVector<f64>,
    pub qdd: DVector<f64>,
}

/// Computed-torque controller.
///
/// Shapes a reference acceleration with PD feedback on the tracking error
/// and feeds it through the model's inverse dynamics:
/// τ = iDyn(q, q̇, q̈_d + Kd(q̇_d − q̇) + Kp(q_d − q)).
pub struct ComputedTorque<'a, K: Kinematics> {
    model: &'a DynamicModel<K>,
    desired: Box<dyn Fn(f64) -> DesiredPoint + 'a>,
    kp: f64,
    kd: f64,
}

impl<'a, K: Kinematics> ComputedTorque<'a, K> {
    pub fn new(
        model: &'a DynamicModel<K>,
        desired: impl Fn(f64) -> DesiredPoint + 'a,
        kp: f64,
        kd: f64,
    ) -> Self {
        Self {
            model,
            desired: Box::new(desired),
            kp,
            kd,
        }
    }
}

impl<K: Kinematics> Controller for ComputedTorque<'_, K> {
    fn torque(&self, t: f64, q: &DVector<f64>, qd: &DVector<f64>) -> DVector<f64> {
        let des = (self.desired)(t);
        let qdd_ref = &des.qdd + (&des.qd - qd) * self.kd + (&des.q - q) * self.kp;
        // The harness validates the model before integration starts; a
        // failure here can only mean non-finite state, which passes through.
        self.model
            .inverse_dyn(q.as_slice(), Some(qd.as_slice()), Some(qdd_ref.as_slice()))
            .unwrap_or_else(|_| DVector::from_element(q.len(), f64::NAN))
    }
}

/// A torque perturbation source.
pub trait Noise {
    fn sample(&self, t: f64, n: usize) -> DVector<f64>;
}

impl<F> Noise for F
where
    F: Fn(f64, usize) -> DVector<f64>,
{
    fn sample(&self, t: f64, n: usize) -> DVector<f64> {
        self(t, n)
    }
}

/// Seeded uniform torque noise in [-amplitude, amplitude].
pub struct UniformNoise {
    amplitude: f64,
    rng: RefCell<StdRng>,
}

impl UniformNoise {
    pub fn new(amplitude: f64, seed: u64) -> Self {
        Self {
            amplitude,
            rng: RefCell::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl Noise for UniformNoise {
    fn sample(&self, _t: f64, n: usize) -> DVector<f64> {
        let mut rng = self.rng.borrow_mut();
        DVector::from_fn(n, |_, _| rng.gen_range(-self.amplitude..=self.amplitude))
    }
}
