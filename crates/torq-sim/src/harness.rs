//! Simulation harness: wraps the model response, a controller and an
//! optional noise source into a state-derivative function and integrates it.

use nalgebra::DVector;

use torq_dynamics::{DynError, DynamicModel, Kinematics, Result};

use crate::control::{Controller, Noise};
use crate::ode::rk4_step;
use crate::trajectory::Trajectory;

/// Closed-loop simulation of a dynamic model under a controller.
pub struct SimHarness<'a, K: Kinematics, C: Controller> {
    model: &'a DynamicModel<K>,
    controller: C,
    noise: Option<Box<dyn Noise + 'a>>,
}

impl<'a, K: Kinematics, C: Controller> SimHarness<'a, K, C> {
    pub fn new(model: &'a DynamicModel<K>, controller: C) -> Self {
        Self {
            model,
            controller,
            noise: None,
        }
    }

    /// Add a torque perturbation source.
    pub fn with_noise(mut self, noise: impl Noise + 'a) -> Self {
        self.noise = Some(Box::new(noise));
        self
    }

    fn applied_torque(&self, t: f64, q: &DVector<f64>, qd: &DVector<f64>) -> DVector<f64> {
        let mut tau = self.controller.torque(t, q, qd);
        if let Some(noise) = &self.noise {
            tau += noise.sample(t, tau.len());
        }
        tau
    }

    /// The state derivative over y = [q; q̇]:
    /// ẏ = [q̇; forward_dyn(q, q̇, τ(t, q, q̇))].
    ///
    /// Suitable for any external fixed- or adaptive-step integrator. The
    /// model must be derived and numeric; construction-time validation in
    /// [`simulate`](Self::simulate) guarantees that, so failures inside the
    /// closure reduce to non-finite propagation.
    pub fn rhs(&self) -> impl FnMut(f64, &DVector<f64>) -> DVector<f64> + '_ {
        let n = self.model.n();
        move |t, y| {
            let q = y.rows(0, n).into_owned();
            let qd = y.rows(n, n).into_owned();
            let tau = self.applied_torque(t, &q, &qd);
            let qdd = self
                .model
                .forward_dyn(q.as_slice(), Some(qd.as_slice()), Some(tau.as_slice()))
                .unwrap_or_else(|_| DVector::from_element(n, f64::NAN));
            let mut dy = DVector::zeros(2 * n);
            dy.rows_mut(0, n).copy_from(&qd);
            dy.rows_mut(n, n).copy_from(&qdd);
            dy
        }
    }

    /// Integrate over `t_span` from (q0, q̇0) with fixed step `dt`,
    /// recording (t, q, q̇, τ) at every step.
    pub fn simulate(
        &self,
        t_span: (f64, f64),
        q0: &[f64],
        qd0: &[f64],
        dt: f64,
    ) -> Result<Trajectory> {
        let n = self.model.n();
        check_len("initial q", n, q0.len())?;
        check_len("initial qd", n, qd0.len())?;
        // Validate derivation and compilation up front.
        self.model.forward_dyn(q0, Some(qd0), None)?;

        let mut y = DVector::zeros(2 * n);
        y.rows_mut(0, n).copy_from_slice(q0);
        y.rows_mut(n, n).copy_from_slice(qd0);

        let mut rhs = self.rhs();
        let (t0, t1) = t_span;
        let mut t = t0;
        let mut traj = Trajectory::new();

        loop {
            let q = y.rows(0, n).into_owned();
            let qd = y.rows(n, n).into_owned();
            let tau = self.applied_torque(t, &q, &qd);
            traj.record(t, q, qd, tau);

            if t >= t1 {
                break;
            }
            let h = dt.min(t1 - t);
            y = rk4_step(&mut rhs, t, &y, h);
            t += h;
        }
        Ok(traj)
    }

    /// Like [`simulate`](Self::simulate), handing the finished trajectory to
    /// an observer (the visualization hook) before returning it.
    pub fn simulate_with(
        &self,
        t_span: (f64, f64),
        q0: &[f64],
        qd0: &[f64],
        dt: f64,
        observer: impl FnOnce(&Trajectory),
    ) -> Result<Trajectory> {
        let traj = self.simulate(t_span, q0, qd0, dt)?;
        observer(&traj);
        Ok(traj)
    }
}

fn check_len(what: &str, expected: usize, got: usize) -> Result<()> {
    if expected != got {
        return Err(DynError::ShapeMismatch {
            what: what.to_string(),
            expected,
            got,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::ComputedTorque;
    use approx::assert_relative_eq;
    use nalgebra::Vector3;
    use torq_dynamics::{GRAVITY, JointSpace};
    use torq_expr::Expr;

    /// Unit point mass sliding on a vertical prismatic axis.
    fn falling_mass() -> DynamicModel<JointSpace> {
        let mut dm = DynamicModel::new(JointSpace::new(1));
        let q1 = dm.time().q()[0].expr();
        dm.add_mass(
            1.0,
            Vector3::new(Expr::Num(0.0), Expr::Num(0.0), q1),
            None,
        )
        .unwrap();
        dm.calculate_dynamics().unwrap();
        dm
    }

    /// Unit point-mass pendulum of length l, gravity -z.
    fn pendulum(length: f64) -> DynamicModel<JointSpace> {
        let mut dm = DynamicModel::new(JointSpace::new(1));
        let q1 = dm.time().q()[0].expr();
        let x = Vector3::new(
            Expr::Num(length) * q1.clone().sin(),
            Expr::Num(0.0),
            Expr::Num(-length) * q1.cos(),
        );
        dm.add_mass(1.0, x, None).unwrap();
        dm.calculate_dynamics().unwrap();
        dm
    }

    fn zero_torque(_t: f64, q: &DVector<f64>, _qd: &DVector<f64>) -> DVector<f64> {
        DVector::zeros(q.len())
    }

    #[test]
    fn test_free_fall_closed_form() {
        let dm = falling_mass();
        let harness = SimHarness::new(&dm, zero_torque);
        let traj = harness.simulate((0.0, 1.0), &[0.0], &[0.0], 1e-3).unwrap();

        // q(t) = -g t² / 2
        let q_end = traj.q.last().unwrap()[0];
        assert_relative_eq!(q_end, -GRAVITY / 2.0, epsilon = 1e-6);
        let qd_end = traj.qd.last().unwrap()[0];
        assert_relative_eq!(qd_end, -GRAVITY, epsilon = 1e-6);
    }

    #[test]
    fn test_pendulum_small_angle_period() {
        let length = 1.0;
        let dm = pendulum(length);
        let harness = SimHarness::new(&dm, zero_torque);

        let dt = 1e-3;
        let traj = harness.simulate((0.0, 10.0), &[0.05], &[0.0], dt).unwrap();

        // Positive-to-negative zero crossings, one per period.
        let mut crossings = Vec::new();
        for i in 1..traj.len() {
            let (prev, cur) = (traj.q[i - 1][0], traj.q[i][0]);
            if prev > 0.0 && cur <= 0.0 {
                let frac = prev / (prev - cur);
                crossings.push(traj.time[i - 1] + frac * dt);
            }
        }
        assert!(crossings.len() >= 2, "need 2 crossings, got {}", crossings.len());

        let measured = (crossings.last().unwrap() - crossings[0]) / (crossings.len() - 1) as f64;
        let expected = 2.0 * std::f64::consts::PI * (length / GRAVITY).sqrt();
        let rel_err = ((measured - expected) / expected).abs();
        assert!(
            rel_err < 0.01,
            "period error {:.4}% (measured={:.6}, expected={:.6})",
            rel_err * 100.0,
            measured,
            expected,
        );
    }

    #[test]
    fn test_computed_torque_tracking() {
        let dm = pendulum(1.0);
        let desired = |t: f64| crate::control::DesiredPoint {
            q: DVector::from_vec(vec![0.5 * t.sin()]),
            qd: DVector::from_vec(vec![0.5 * t.cos()]),
            qdd: DVector::from_vec(vec![-0.5 * t.sin()]),
        };
        let controller = ComputedTorque::new(&dm, desired, 100.0, 20.0);
        let harness = SimHarness::new(&dm, controller);

        // Start on the trajectory; tracking error stays small throughout.
        let traj = harness.simulate((0.0, 3.0), &[0.0], &[0.5], 1e-3).unwrap();
        for (t, q) in traj.time.iter().zip(&traj.q) {
            let err = (q[0] - 0.5 * t.sin()).abs();
            assert!(err < 1e-4, "tracking error {err:.2e} at t = {t:.3}");
        }
    }

    #[test]
    fn test_uninitialized_model_rejected() {
        let dm = DynamicModel::new(JointSpace::new(1));
        let harness = SimHarness::new(&dm, zero_torque);
        assert!(harness.simulate((0.0, 1.0), &[0.0], &[0.0], 1e-3).is_err());
    }

    #[test]
    fn test_shape_mismatch_rejected() {
        let dm = falling_mass();
        let harness = SimHarness::new(&dm, zero_torque);
        assert!(matches!(
            harness.simulate((0.0, 1.0), &[0.0, 0.0], &[0.0], 1e-3),
            Err(DynError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_observer_hook_runs() {
        let dm = falling_mass();
        let harness = SimHarness::new(&dm, zero_torque);
        let mut seen = 0usize;
        harness
            .simulate_with((0.0, 0.1), &[0.0], &[0.0], 1e-2, |traj| {
                seen = traj.len();
            })
            .unwrap();
        assert!(seen > 0);
    }
}
