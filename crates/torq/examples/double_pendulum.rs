//! Double pendulum: derive the closed-form equations of motion, print the
//! symbolic M/V/G, then swing it open-loop and report the trajectory.

use nalgebra::{DVector, Vector3};
use torq::{DhChain, DynamicModel, Expr, GRAVITY, SimHarness};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Two unit links in the vertical plane, unit tip masses.
    let chain = DhChain::builder()
        .revolute("link1", 0.0, 1.0, 0.0)
        .revolute("link2", 0.0, 1.0, 0.0)
        .build();

    let mut dm = DynamicModel::new(chain);
    dm.set_g(Vector3::new(0.0, -GRAVITY, 0.0));
    let origin = Vector3::from_element(Expr::Num(0.0));
    dm.add_mass(1.0, origin.clone(), Some("link1"))?;
    dm.add_mass(1.0, origin, Some("link2"))?;

    dm.calculate_dynamics()?;

    println!("M(q):");
    let m = dm.m_sym()?;
    for i in 0..2 {
        for j in 0..2 {
            println!("  M[{i}][{j}] = {}", m[(i, j)]);
        }
    }
    println!("V(q, qd):");
    for (i, v) in dm.v_sym()?.iter().enumerate() {
        println!("  V[{i}] = {v}");
    }
    println!("G(q):");
    for (i, g) in dm.g_sym()?.iter().enumerate() {
        println!("  G[{i}] = {g}");
    }

    // Release from a raised position with no torque.
    let zero_torque = |_t: f64, q: &DVector<f64>, _qd: &DVector<f64>| DVector::zeros(q.len());
    let harness = SimHarness::new(&dm, zero_torque);
    let traj = harness.simulate((0.0, 5.0), &[1.2, 0.0], &[0.0, 0.0], 1e-3)?;

    println!(
        "simulated {} steps over {:.1}s; final q = ({:.4}, {:.4})",
        traj.len(),
        traj.duration(),
        traj.q.last().unwrap()[0],
        traj.q.last().unwrap()[1],
    );
    Ok(())
}
