//! Fixed-step RK4 integration over the state y = [q; q̇].

use nalgebra::DVector;

/// One classic 4th-order Runge-Kutta step.
pub fn rk4_step(
    rhs: &mut impl FnMut(f64, &DVector<f64>) -> DVector<f64>,
    t: f64,
    y: &DVector<f64>,
    dt: f64,
) -> DVector<f64> {
    let k1 = rhs(t, y);
    let k2 = rhs(t + dt / 2.0, &(y + &k1 * (dt / 2.0)));
    let k3 = rhs(t + dt / 2.0, &(y + &k2 * (dt / 2.0)));
    let k4 = rhs(t + dt, &(y + &k3 * dt));
    y + (k1 + k2 * 2.0 + k3 * 2.0 + k4) * (dt / 6.0)
}

/// Integrate ẏ = rhs(t, y) over `t_span` with fixed step `dt`.
///
/// Returns the sampled times and states, including both endpoints. The rhs
/// must be a pure function of (t, y); any non-finite values it produces are
/// carried along untouched.
pub fn integrate(
    mut rhs: impl FnMut(f64, &DVector<f64>) -> DVector<f64>,
    t_span: (f64, f64),
    y0: DVector<f64>,
    dt: f64,
) -> (Vec<f64>, Vec<DVector<f64>>) {
    let (t0, t1) = t_span;
    let mut t = t0;
    let mut y = y0;
    let mut times = vec![t];
    let mut states = vec![y.clone()];

    while t < t1 {
        let h = dt.min(t1 - t);
        y = rk4_step(&mut rhs, t, &y, h);
        t += h;
        times.push(t);
        states.push(y.clone());
    }
    (times, states)
}
