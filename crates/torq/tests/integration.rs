//! Integration tests across the torq stack: closed-form scenarios and the
//! algebraic invariants of the derived equations of motion. Symbolic
//! comparisons go through simplification, never text.

use std::collections::HashMap;

use approx::assert_relative_eq;
use nalgebra::{DVector, Vector3};
use torq::{
    ComputedTorque, DhChain, DynamicModel, Expr, GRAVITY, JointSpace, Kinematics, SimHarness,
    Sym,
};

fn assert_sym_zero(e: &Expr) {
    let s = e.simplify();
    assert!(
        matches!(s, Expr::Num(v) if v == 0.0),
        "expected zero, got {s}"
    );
}

fn assert_sym_eq(a: &Expr, b: &Expr) {
    assert_sym_zero(&(a.clone() - b.clone()));
}

/// Two-link planar arm with point masses at the link tips, symbolic
/// parameters, gravity along -y.
fn two_link_symbolic() -> (DynamicModel<JointSpace>, [Expr; 4]) {
    let params = Expr::symbols("m1, m2, l1, l2");
    let (m1, m2, l1, l2) = (
        params[0].expr(),
        params[1].expr(),
        params[2].expr(),
        params[3].expr(),
    );

    let mut dm = DynamicModel::new(JointSpace::new(2));
    dm.set_g(Vector3::new(0.0, -GRAVITY, 0.0));
    let q = dm.time().q().to_vec();
    let (q1, q2) = (q[0].expr(), q[1].expr());
    let q12 = q1.clone() + q2.clone();

    let x1 = Vector3::new(
        l1.clone() * q1.clone().cos(),
        l1.clone() * q1.clone().sin(),
        Expr::Num(0.0),
    );
    let x2 = Vector3::new(
        l1.clone() * q1.clone().cos() + l2.clone() * q12.clone().cos(),
        l1.clone() * q1.clone().sin() + l2.clone() * q12.clone().sin(),
        Expr::Num(0.0),
    );
    dm.add_mass(m1.clone(), x1, None).unwrap();
    dm.add_mass(m2.clone(), x2, None).unwrap();
    dm.calculate_dynamics().unwrap();
    (dm, [m1, m2, l1, l2])
}

/// Two-link chain with numeric parameters, built through DH frames.
fn two_link_numeric() -> DynamicModel<DhChain> {
    let chain = DhChain::builder()
        .revolute("link1", 0.0, 1.0, 0.0)
        .revolute("link2", 0.0, 0.8, 0.0)
        .build();
    let mut dm = DynamicModel::new(chain);
    dm.set_g(Vector3::new(0.0, -GRAVITY, 0.0));
    let origin = Vector3::from_element(Expr::Num(0.0));
    dm.add_mass(1.2, origin.clone(), Some("link1")).unwrap();
    dm.add_mass(0.7, origin, Some("link2")).unwrap();
    dm.calculate_dynamics().unwrap();
    dm
}

fn env_for(dm_q: &[Sym], values: &[f64]) -> HashMap<Sym, f64> {
    dm_q.iter().cloned().zip(values.iter().copied()).collect()
}

#[test]
fn pendulum_symbolic_closed_form() {
    // Point mass pendulum: x = (l sin q, 0, -l cos q), gravity -z.
    let params = Expr::symbols("m, l");
    let (m, l) = (params[0].expr(), params[1].expr());

    let mut dm = DynamicModel::new(JointSpace::new(1));
    let q1 = dm.time().q()[0].expr();
    let x = Vector3::new(
        l.clone() * q1.clone().sin(),
        Expr::Num(0.0),
        -(l.clone() * q1.clone().cos()),
    );
    dm.add_mass(m.clone(), x, None).unwrap();
    dm.calculate_dynamics().unwrap();

    // M = [[m l²]]
    assert_sym_eq(
        &dm.m_sym().unwrap()[(0, 0)],
        &(m.clone() * l.clone().powi(2)),
    );
    // V = [0]
    assert_sym_zero(&dm.v_sym().unwrap()[0]);
    // G = [m g l sin q]
    assert_sym_eq(
        &dm.g_sym().unwrap()[0],
        &(m * Expr::Num(GRAVITY) * l * q1.sin()),
    );
}

#[test]
fn two_link_inertia_matrix_matches_textbook() {
    let (dm, [m1, m2, l1, l2]) = two_link_symbolic();
    let q2 = dm.time().q()[1].expr();
    let m = dm.m_sym().unwrap();

    let m11 = (m1.clone() + m2.clone()) * l1.clone().powi(2)
        + m2.clone() * l2.clone().powi(2)
        + Expr::Num(2.0) * m2.clone() * l1.clone() * l2.clone() * q2.clone().cos();
    let m12 = m2.clone() * l2.clone().powi(2)
        + m2.clone() * l1.clone() * l2.clone() * q2.cos();
    let m22 = m2 * l2.powi(2);

    assert_sym_eq(&m[(0, 0)], &m11);
    assert_sym_eq(&m[(0, 1)], &m12);
    assert_sym_eq(&m[(1, 0)], &m12);
    assert_sym_eq(&m[(1, 1)], &m22);
}

#[test]
fn two_link_coriolis_and_gravity_match_textbook() {
    let (dm, [m1, m2, l1, l2]) = two_link_symbolic();
    let q = dm.time().q().to_vec();
    let qd = dm.time().qd().to_vec();
    let (q1, q2) = (q[0].expr(), q[1].expr());
    let (qd1, qd2) = (qd[0].expr(), qd[1].expr());
    let q12 = q1.clone() + q2.clone();

    let v = dm.v_sym().unwrap();
    let v1 = -(m2.clone()
        * l1.clone()
        * l2.clone()
        * q2.clone().sin()
        * (Expr::Num(2.0) * qd1.clone() * qd2.clone() + qd2.clone().powi(2)));
    let v2 = m2.clone() * l1.clone() * l2.clone() * q2.clone().sin() * qd1.powi(2);
    assert_sym_eq(&v[0], &v1);
    assert_sym_eq(&v[1], &v2);

    let g = dm.g_sym().unwrap();
    let g1 = (m1 + m2.clone()) * Expr::Num(GRAVITY) * l1 * q1.cos()
        + m2.clone() * Expr::Num(GRAVITY) * l2.clone() * q12.clone().cos();
    let g2 = m2 * Expr::Num(GRAVITY) * l2 * q12.cos();
    assert_sym_eq(&g[0], &g1);
    assert_sym_eq(&g[1], &g2);
}

#[test]
fn decomposition_rebuilds_euler_lagrange() {
    // M(q)·q̈ + V(q, q̇) + G(q) ≡ E_L
    let (dm, _) = two_link_symbolic();
    let m = dm.m_sym().unwrap();
    let v = dm.v_sym().unwrap();
    let g = dm.g_sym().unwrap();
    let el = dm.euler_lagrange().unwrap();
    let qdd = dm.time().qdd().to_vec();

    for i in 0..2 {
        let mut rebuilt = v[i].clone() + g[i].clone();
        for (j, qdd_j) in qdd.iter().enumerate() {
            rebuilt = rebuilt + m[(i, j)].clone() * qdd_j.expr();
        }
        assert_sym_zero(&(rebuilt - el[i].clone()));
    }
}

#[test]
fn inertia_matrix_is_symmetric() {
    let (dm, _) = two_link_symbolic();
    let m = dm.m_sym().unwrap();
    for i in 0..2 {
        for j in 0..2 {
            assert_sym_zero(&(m[(i, j)].clone() - m[(j, i)].clone()));
        }
    }
}

#[test]
fn spinning_body_symbolic_inertia() {
    // One revolute joint about z with inertia diag(0, 0, Izz):
    // M = [[Izz]], V = 0, G = 0.
    let izz = Expr::symbol("izz");
    let mut dm = DynamicModel::new(JointSpace::new(1));
    let q1 = dm.time().q()[0].expr();
    let rot = torq::Ht::rot_z(q1).rot();
    dm.add_inertia(izz.clone(), rot, None).unwrap();
    dm.calculate_dynamics().unwrap();

    assert_sym_eq(&dm.m_sym().unwrap()[(0, 0)], &izz);
    assert_sym_zero(&dm.v_sym().unwrap()[0]);
    assert_sym_zero(&dm.g_sym().unwrap()[0]);
}

#[test]
fn forward_inverse_roundtrip() {
    let dm = two_link_numeric();
    let states = [
        ([0.0, 0.0], [0.0, 0.0], [0.5, -0.2]),
        ([0.4, -0.9], [1.0, 0.3], [0.0, 0.0]),
        ([1.2, 2.1], [-0.5, 0.8], [2.0, -1.5]),
    ];
    for (q, qd, tau) in states {
        let qdd = dm.forward_dyn(&q, Some(&qd), Some(&tau)).unwrap();
        let tau_back = dm
            .inverse_dyn(&q, Some(&qd), Some(qdd.as_slice()))
            .unwrap();
        for i in 0..2 {
            assert_relative_eq!(tau_back[i], tau[i], epsilon = 1e-9);
        }
    }
}

#[test]
fn forward_inverse_roundtrip_with_damping() {
    let mut dm = two_link_numeric();
    dm.set_damping(&[0.3, 0.15]).unwrap();
    dm.calculate_dynamics().unwrap();

    let (q, qd, tau) = ([0.7, -0.4], [0.9, -1.1], [1.0, 0.5]);
    let qdd = dm.forward_dyn(&q, Some(&qd), Some(&tau)).unwrap();
    let tau_back = dm
        .inverse_dyn(&q, Some(&qd), Some(qdd.as_slice()))
        .unwrap();
    for i in 0..2 {
        assert_relative_eq!(tau_back[i], tau[i], epsilon = 1e-9);
    }
}

#[test]
fn compiled_callables_match_symbolic_forms() {
    let dm = two_link_numeric();
    let q_syms = dm.time().q().to_vec();
    let qd_syms = dm.time().qd().to_vec();

    let (q, qd) = ([0.6, -1.3], [0.4, 0.9]);
    let mut env = env_for(&q_syms, &q);
    env.extend(env_for(&qd_syms, &qd));

    let m_num = dm.m_at(&q).unwrap();
    let m_sym = dm.m_sym().unwrap();
    for i in 0..2 {
        for j in 0..2 {
            assert_relative_eq!(
                m_num[(i, j)],
                m_sym[(i, j)].eval(&env).unwrap(),
                epsilon = 1e-9
            );
        }
    }

    let v_num = dm.v_at(&q, &qd).unwrap();
    let v_sym = dm.v_sym().unwrap();
    for i in 0..2 {
        assert_relative_eq!(v_num[i], v_sym[i].eval(&env).unwrap(), epsilon = 1e-9);
    }
}

#[test]
fn zero_input_law() {
    let mut dm = DynamicModel::new(JointSpace::new(3));
    dm.calculate_dynamics().unwrap();
    let qdd = dm
        .forward_dyn(&[0.1, 0.2, 0.3], Some(&[1.0, 2.0, 3.0]), Some(&[4.0, 5.0, 6.0]))
        .unwrap();
    for i in 0..3 {
        assert_relative_eq!(qdd[i], 0.0, epsilon = 1e-12);
    }
}

#[test]
fn free_swing_conserves_energy() {
    let dm = two_link_numeric();

    fn total_energy(dm: &DynamicModel<DhChain>, q: &DVector<f64>, qd: &DVector<f64>) -> f64 {
        let m = dm.m_at(q.as_slice()).unwrap();
        let kinetic = 0.5 * qd.dot(&(&m * qd));
        let env: HashMap<Sym, f64> = dm
            .time()
            .q()
            .iter()
            .cloned()
            .zip(q.iter().copied())
            .collect();
        let potential = dm.potential_energy().eval(&env).unwrap();
        kinetic + potential
    }

    let zero_torque =
        |_t: f64, q: &DVector<f64>, _qd: &DVector<f64>| DVector::zeros(q.len());
    let harness = SimHarness::new(&dm, zero_torque);
    let traj = harness
        .simulate((0.0, 3.0), &[0.5, 0.3], &[0.0, 0.0], 1e-4)
        .unwrap();

    let e0 = total_energy(&dm, &traj.q[0], &traj.qd[0]);
    let e_end = total_energy(&dm, traj.q.last().unwrap(), traj.qd.last().unwrap());
    assert!(
        (e_end - e0).abs() < 1e-5,
        "energy drift {:.2e} (e0={:.6}, e_end={:.6})",
        (e_end - e0).abs(),
        e0,
        e_end,
    );
}

#[test]
fn computed_torque_tracks_two_link() {
    let dm = two_link_numeric();
    let desired = |t: f64| torq::DesiredPoint {
        q: DVector::from_vec(vec![0.3 * t.sin(), 0.2 * (0.7 * t).cos() - 0.2]),
        qd: DVector::from_vec(vec![0.3 * t.cos(), -0.14 * (0.7 * t).sin()]),
        qdd: DVector::from_vec(vec![-0.3 * t.sin(), -0.098 * (0.7 * t).cos()]),
    };
    let controller = ComputedTorque::new(&dm, desired, 150.0, 25.0);
    let harness = SimHarness::new(&dm, controller);

    let traj = harness
        .simulate((0.0, 2.0), &[0.0, 0.0], &[0.3, 0.0], 1e-3)
        .unwrap();
    let last_q = traj.q.last().unwrap();
    let t_end = *traj.time.last().unwrap();
    assert_relative_eq!(last_q[0], 0.3 * t_end.sin(), epsilon = 1e-3);
    assert_relative_eq!(last_q[1], 0.2 * (0.7 * t_end).cos() - 0.2, epsilon = 1e-3);
}

#[test]
fn chain_tip_transform_inverse_is_identity() {
    // Planar chain: the product simplifies to eye(4) structurally.
    let chain = DhChain::builder()
        .revolute("link1", 0.2, 1.0, 0.0)
        .revolute("link2", 0.0, 0.8, 0.0)
        .build();
    let tip = chain.tip();
    let prod = &tip * &tip.inverse();
    let simplified = prod.matrix().map(|e| e.simplify());
    for i in 0..4 {
        for j in 0..4 {
            let expected = if i == j { 1.0 } else { 0.0 };
            assert_sym_eq(&simplified[(i, j)], &Expr::Num(expected));
        }
    }

    // Twisted chain: verified at sampled joint values.
    let chain = DhChain::builder()
        .revolute("link1", 0.2, 1.0, 0.3)
        .revolute("link2", 0.0, 0.8, -0.4)
        .build();
    let q = chain.joint_symbols().to_vec();
    let tip = chain.tip();
    let prod = &tip * &tip.inverse();
    let env = env_for(&q, &[0.7, -1.1]);
    for i in 0..4 {
        for j in 0..4 {
            let expected = if i == j { 1.0 } else { 0.0 };
            assert_relative_eq!(
                prod.matrix()[(i, j)].eval(&env).unwrap(),
                expected,
                epsilon = 1e-12
            );
        }
    }
}
