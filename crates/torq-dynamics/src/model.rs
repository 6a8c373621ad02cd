//! Symbolic dynamic model.
//!
//! Collects point masses and rotational inertias attached to a kinematic
//! chain, derives the Lagrangian equations of motion per joint, decomposes
//! them into M(q), V(q, q̇), G(q), and compiles numeric callables for
//! forward and inverse dynamics.

use std::collections::{BTreeSet, HashMap};

use nalgebra::{DMatrix, DVector, Matrix3, Vector3};

use torq_expr::{
    ArgGroup, CompiledFn, Expr, ExprError, Sym, SymMatrix, SymVector, compile, is_zero_matrix,
    linear_decompose,
};
use torq_transform::Ht;

use crate::error::{DynError, Result};
use crate::kinematics::Kinematics;
use crate::time::TimeSubs;

/// Standard gravity (m/s²).
pub const GRAVITY: f64 = 9.81;

/// A point mass at a symbolic base-frame position.
#[derive(Debug, Clone)]
pub struct MassPoint {
    pub mass: Expr,
    pub pos: Vector3<Expr>,
}

/// A rotational inertia: tensor in the attachment frame plus the rotation
/// taking attachment-frame vectors to the base frame.
#[derive(Debug, Clone)]
pub struct InertiaBody {
    pub tensor: Matrix3<Expr>,
    pub rot: Matrix3<Expr>,
}

/// Inertia input: a full 3×3 tensor, or a scalar promoted to diag(0, 0, I).
#[derive(Debug, Clone)]
pub enum InertiaSpec {
    Tensor(Matrix3<Expr>),
    Scalar(Expr),
}

impl InertiaSpec {
    fn tensor(self) -> Matrix3<Expr> {
        match self {
            InertiaSpec::Tensor(t) => t,
            InertiaSpec::Scalar(izz) => Matrix3::from_diagonal(&Vector3::new(
                Expr::Num(0.0),
                Expr::Num(0.0),
                izz,
            )),
        }
    }
}

impl From<Matrix3<Expr>> for InertiaSpec {
    fn from(t: Matrix3<Expr>) -> Self {
        InertiaSpec::Tensor(t)
    }
}

impl From<Expr> for InertiaSpec {
    fn from(izz: Expr) -> Self {
        InertiaSpec::Scalar(izz)
    }
}

impl From<f64> for InertiaSpec {
    fn from(izz: f64) -> Self {
        InertiaSpec::Scalar(Expr::Num(izz))
    }
}

struct Compiled {
    func_m: CompiledFn,
    func_v: CompiledFn,
    func_g: CompiledFn,
    func_inv_m: Option<CompiledFn>,
    func_idyn: CompiledFn,
    func_fdyn: Option<CompiledFn>,
}

struct Derived {
    el: SymVector,
    m: SymMatrix,
    v: SymVector,
    g: SymVector,
    inv_m: Option<SymMatrix>,
    free_params: Vec<String>,
    compiled: Option<Compiled>,
}

/// Symbolic manipulator dynamics over a kinematic model.
///
/// Attachments accumulate in insertion order; `calculate_dynamics` derives
/// and caches the symbolic matrices and their compiled forms. Every mutator
/// invalidates the cache.
pub struct DynamicModel<K: Kinematics> {
    kin: K,
    time: TimeSubs,
    tau: Vec<Sym>,
    masses: Vec<MassPoint>,
    inertias: Vec<InertiaBody>,
    g_val: f64,
    g_dir: Vector3<f64>,
    damping: Vec<f64>,
    derived: Option<Derived>,
}

impl<K: Kinematics> DynamicModel<K> {
    pub fn new(kin: K) -> Self {
        let time = TimeSubs::new(kin.joint_symbols());
        let n = time.n();
        Self {
            kin,
            time,
            tau: Expr::symbol_vector("tau", n),
            masses: Vec::new(),
            inertias: Vec::new(),
            g_val: GRAVITY,
            g_dir: Vector3::new(0.0, 0.0, -1.0),
            damping: vec![0.0; n],
            derived: None,
        }
    }

    /// Number of joints.
    pub fn n(&self) -> usize {
        self.time.n()
    }

    /// The kinematic model.
    pub fn kinematics(&self) -> &K {
        &self.kin
    }

    /// The time-substitution context (joint, velocity and acceleration
    /// symbol families).
    pub fn time(&self) -> &TimeSubs {
        &self.time
    }

    /// Attach a point mass. `pos` is in base-frame coordinates, or in
    /// `frame` coordinates when a frame is named.
    pub fn add_mass(
        &mut self,
        mass: impl Into<Expr>,
        pos: Vector3<Expr>,
        frame: Option<&str>,
    ) -> Result<()> {
        let pos = match frame {
            Some(f) => {
                let t = self.kin.base_transform(f)?;
                t.rot() * pos + t.trans()
            }
            None => pos,
        };
        self.masses.push(MassPoint {
            mass: mass.into(),
            pos,
        });
        self.derived = None;
        Ok(())
    }

    /// Attach a rotational inertia. `rot` takes attachment-frame vectors to
    /// the base frame (or to `frame`, when a frame is named).
    pub fn add_inertia(
        &mut self,
        inertia: impl Into<InertiaSpec>,
        rot: Matrix3<Expr>,
        frame: Option<&str>,
    ) -> Result<()> {
        let rot = match frame {
            Some(f) => self.kin.base_transform(f)?.rot() * rot,
            None => rot,
        };
        self.inertias.push(InertiaBody {
            tensor: inertia.into().tensor(),
            rot,
        });
        self.derived = None;
        Ok(())
    }

    /// Decompose a transform into position and rotation and attach both a
    /// mass and an inertia at once; either may be omitted.
    pub fn add(
        &mut self,
        form: &Ht,
        mass: Option<Expr>,
        inertia: Option<InertiaSpec>,
        frame: Option<&str>,
    ) -> Result<()> {
        if let Some(m) = mass {
            self.add_mass(m, form.trans(), frame)?;
        }
        if let Some(i) = inertia {
            self.add_inertia(i, form.rot(), frame)?;
        }
        Ok(())
    }

    pub fn clear_masses(&mut self) {
        self.masses.clear();
        self.derived = None;
    }

    pub fn clear_inertias(&mut self) {
        self.inertias.clear();
        self.derived = None;
    }

    pub fn clear(&mut self) {
        self.masses.clear();
        self.inertias.clear();
        self.derived = None;
    }

    /// Gravity magnitude.
    pub fn g_val(&self) -> f64 {
        self.g_val
    }

    /// Unit gravity direction.
    pub fn g_dir(&self) -> Vector3<f64> {
        self.g_dir
    }

    /// Combined gravity vector g_val · g_dir.
    pub fn g(&self) -> Vector3<f64> {
        self.g_val * self.g_dir
    }

    pub fn set_g_val(&mut self, g_val: f64) {
        self.g_val = g_val;
        self.derived = None;
    }

    pub fn set_g_dir(&mut self, g_dir: Vector3<f64>) {
        self.g_dir = g_dir;
        self.derived = None;
    }

    /// Set the combined gravity vector; magnitude and direction are split
    /// off. A zero vector sets the magnitude to zero and keeps the
    /// direction.
    pub fn set_g(&mut self, g: Vector3<f64>) {
        let norm = g.norm();
        self.g_val = norm;
        if norm > 0.0 {
            self.g_dir = g / norm;
        }
        self.derived = None;
    }

    /// Viscous joint damping b, with τ_damping = b ⊙ q̇.
    pub fn damping(&self) -> &[f64] {
        &self.damping
    }

    pub fn set_damping(&mut self, b: &[f64]) -> Result<()> {
        if b.len() != self.n() {
            return Err(DynError::ShapeMismatch {
                what: "damping vector".to_string(),
                expected: self.n(),
                got: b.len(),
            });
        }
        self.damping = b.to_vec();
        self.derived = None;
        Ok(())
    }

    /// Translational plus rotational kinetic energy, symbolic in (q, q̇).
    pub fn kinetic_energy(&self) -> Expr {
        let mut k = Expr::Num(0.0);
        for mp in &self.masses {
            let v2: Expr = (0..3)
                .map(|i| self.time.diff_t(&mp.pos[i]).powi(2))
                .sum();
            k = k + Expr::Num(0.5) * mp.mass.clone() * v2;
        }
        for ib in &self.inertias {
            let omega = self.body_angular_velocity(ib);
            // Quadratic form over the base-frame tensor Rᵀ I R. The ω here
            // is extracted from the same R that carries the tensor, so the
            // pairing must stay as written.
            let i_base = ib.rot.transpose() * ib.tensor.clone() * ib.rot.clone();
            let iw = i_base * omega.clone();
            let quad: Expr = (0..3).map(|i| omega[i].clone() * iw[i].clone()).sum();
            k = k + Expr::Num(0.5) * quad;
        }
        k
    }

    /// Gravitational potential energy: g_val · Σ mᵢ (xᵢ · (−ĝ)).
    /// Zero when no masses are attached.
    pub fn potential_energy(&self) -> Expr {
        let mut p = Expr::Num(0.0);
        for mp in &self.masses {
            let height: Expr = (0..3)
                .map(|i| mp.pos[i].clone() * Expr::Num(-self.g_dir[i]))
                .sum();
            p = p + Expr::Num(self.g_val) * mp.mass.clone() * height;
        }
        p
    }

    /// Body angular velocity of one inertia attachment: the rotation is
    /// moved to the t-parameterized family, ω̂ = Ṙ Rᵀ is deskewed against
    /// time, and the result moved back.
    fn body_angular_velocity(&self, ib: &InertiaBody) -> Vector3<Expr> {
        let r_t = ib.rot.map(|e| self.time.subs_t(&e));
        let ht = Ht::from_rotation(r_t);
        let w_t = ht.rot_vel_with(|e| self.time.diff_in_t(e));
        w_t.map(|e| self.time.subs_q(&e))
    }

    /// Derive the equations of motion and cache symbolic and compiled forms.
    ///
    /// Runs the Euler–Lagrange operator per joint on L = K − P, splits the
    /// result into G (velocities and accelerations zeroed), V (accelerations
    /// zeroed, gravity removed) and M (the q̈ coefficient matrix, exact
    /// because E_L is affine in q̈), then compiles the numeric callables.
    /// With no attachments at all, M ≡ 0 and M⁻¹ is kept at zero; a nonzero
    /// singular M leaves M⁻¹ (and forward dynamics) unavailable instead.
    pub fn calculate_dynamics(&mut self) -> Result<()> {
        let n = self.n();
        let q = self.time.q().to_vec();
        let qd = self.time.qd().to_vec();
        let qdd = self.time.qdd().to_vec();

        let lagrangian = (self.kinetic_energy() - self.potential_energy()).simplify();

        let mut el = SymVector::from_element(n, Expr::Num(0.0));
        for i in 0..n {
            let dl_dqd = lagrangian.diff(&qd[i]);
            el[i] = (self.time.diff_t(&dl_dqd) - lagrangian.diff(&q[i])).simplify();
        }

        let zero_qd_qdd: HashMap<Sym, Expr> = qd
            .iter()
            .chain(&qdd)
            .map(|s| (s.clone(), Expr::Num(0.0)))
            .collect();
        let zero_qdd: HashMap<Sym, Expr> = qdd
            .iter()
            .map(|s| (s.clone(), Expr::Num(0.0)))
            .collect();

        let g_vec = el.map(|e| e.subs(&zero_qd_qdd).simplify());
        let v_vec = SymVector::from_fn(n, |i, _| {
            (el[i].subs(&zero_qdd) - g_vec[i].clone()).simplify()
        });

        let accel_part = SymVector::from_fn(n, |i, _| {
            (el[i].clone() - v_vec[i].clone() - g_vec[i].clone()).simplify()
        });
        let (m, _) = linear_decompose(&accel_part, &qdd);

        let inv_m = if is_zero_matrix(&m) {
            Some(SymMatrix::zeros(n, n))
        } else {
            match torq_expr::inverse(&m) {
                Ok(inv) => Some(inv),
                Err(ExprError::Singular) => None,
                Err(e) => return Err(e.into()),
            }
        };

        let free_params = self.stray_symbols(&el);
        let compiled = if free_params.is_empty() {
            Some(self.compile_callables(&m, &v_vec, &g_vec, inv_m.as_ref(), &el)?)
        } else {
            None
        };

        self.derived = Some(Derived {
            el,
            m,
            v: v_vec,
            g: g_vec,
            inv_m,
            free_params,
            compiled,
        });
        Ok(())
    }

    /// Free symbols of the equations of motion that are neither joint
    /// variables nor their derivatives: symbolic model parameters, which
    /// block numeric compilation but not the symbolic forms.
    fn stray_symbols(&self, el: &SymVector) -> Vec<String> {
        let mut known: BTreeSet<Sym> = BTreeSet::new();
        known.extend(self.time.q().iter().cloned());
        known.extend(self.time.qd().iter().cloned());
        known.extend(self.time.qdd().iter().cloned());
        known.extend(self.tau.iter().cloned());

        let mut strays = BTreeSet::new();
        for e in el.iter() {
            for s in e.free_symbols() {
                if !known.contains(&s) {
                    strays.insert(s);
                }
            }
        }
        strays.into_iter().map(|s| s.name().to_string()).collect()
    }

    fn compile_callables(
        &self,
        m: &SymMatrix,
        v: &SymVector,
        g: &SymVector,
        inv_m: Option<&SymMatrix>,
        el: &SymVector,
    ) -> Result<Compiled> {
        let n = self.n();
        let gq = ArgGroup::new("q", self.time.q());
        let gqd = ArgGroup::new("qd", self.time.qd());
        let gqdd = ArgGroup::new("qdd", self.time.qdd());
        let gtau = ArgGroup::new("tau", &self.tau);

        let func_m = compile(m, &[gq.clone()])?;
        let func_v = compile(&column(v), &[gq.clone(), gqd.clone()])?;
        let func_g = compile(&column(g), &[gq.clone()])?;
        let func_inv_m = match inv_m {
            Some(inv) => Some(compile(inv, &[gq.clone()])?),
            None => None,
        };

        // Inverse dynamics: τ = E_L + b ⊙ q̇.
        let idyn = SymVector::from_fn(n, |i, _| {
            el[i].clone() + Expr::Num(self.damping[i]) * self.time.qd()[i].expr()
        });
        let func_idyn = compile(&column(&idyn), &[gq.clone(), gqd.clone(), gqdd])?;

        // Forward dynamics: q̈ = M⁻¹ (τ − V − G − b ⊙ q̇).
        let func_fdyn = match inv_m {
            Some(inv) => {
                let rhs = SymVector::from_fn(n, |i, _| {
                    self.tau[i].expr()
                        - v[i].clone()
                        - g[i].clone()
                        - Expr::Num(self.damping[i]) * self.time.qd()[i].expr()
                });
                let qddot = (inv * &rhs).map(|e| e.simplify());
                Some(compile(&column(&qddot), &[gq, gqd, gtau])?)
            }
            None => None,
        };

        Ok(Compiled {
            func_m,
            func_v,
            func_g,
            func_inv_m,
            func_idyn,
            func_fdyn,
        })
    }

    fn derived(&self) -> Result<&Derived> {
        self.derived.as_ref().ok_or(DynError::Uninitialized)
    }

    fn compiled(&self) -> Result<&Compiled> {
        let d = self.derived()?;
        d.compiled
            .as_ref()
            .ok_or_else(|| DynError::FreeParameters(d.free_params.clone()))
    }

    /// Cached symbolic inertia matrix M(q).
    pub fn m_sym(&self) -> Result<&SymMatrix> {
        Ok(&self.derived()?.m)
    }

    /// Cached symbolic Coriolis/centrifugal vector V(q, q̇).
    pub fn v_sym(&self) -> Result<&SymVector> {
        Ok(&self.derived()?.v)
    }

    /// Cached symbolic gravity vector G(q).
    pub fn g_sym(&self) -> Result<&SymVector> {
        Ok(&self.derived()?.g)
    }

    /// Cached symbolic M⁻¹(q); unavailable when M is singular but nonzero.
    pub fn inv_m_sym(&self) -> Result<&SymMatrix> {
        self.derived()?
            .inv_m
            .as_ref()
            .ok_or(DynError::Expr(ExprError::Singular))
    }

    /// Cached symbolic Euler–Lagrange vector E_L(q, q̇, q̈).
    pub fn euler_lagrange(&self) -> Result<&SymVector> {
        Ok(&self.derived()?.el)
    }

    /// Numeric M(q).
    pub fn m_at(&self, q: &[f64]) -> Result<DMatrix<f64>> {
        Ok(self.compiled()?.func_m.eval(&[q])?)
    }

    /// Numeric V(q, q̇).
    pub fn v_at(&self, q: &[f64], qd: &[f64]) -> Result<DVector<f64>> {
        Ok(to_vector(self.compiled()?.func_v.eval(&[q, qd])?))
    }

    /// Numeric G(q).
    pub fn g_at(&self, q: &[f64]) -> Result<DVector<f64>> {
        Ok(to_vector(self.compiled()?.func_g.eval(&[q])?))
    }

    /// Numeric M⁻¹(q).
    pub fn inv_m_at(&self, q: &[f64]) -> Result<DMatrix<f64>> {
        let c = self.compiled()?;
        let f = c
            .func_inv_m
            .as_ref()
            .ok_or(DynError::Expr(ExprError::Singular))?;
        Ok(f.eval(&[q])?)
    }

    /// Inverse dynamics τ = E_L(q, q̇, q̈) + b ⊙ q̇. Missing trailing
    /// arguments are zero-filled.
    pub fn inverse_dyn(
        &self,
        q: &[f64],
        qd: Option<&[f64]>,
        qdd: Option<&[f64]>,
    ) -> Result<DVector<f64>> {
        let n = self.n();
        let zeros = vec![0.0; n];
        let qd = qd.unwrap_or(&zeros);
        let qdd = qdd.unwrap_or(&zeros);
        Ok(to_vector(self.compiled()?.func_idyn.eval(&[q, qd, qdd])?))
    }

    /// Forward dynamics q̈ = M⁻¹ (τ − V − G − b ⊙ q̇). Missing trailing
    /// arguments are zero-filled.
    pub fn forward_dyn(
        &self,
        q: &[f64],
        qd: Option<&[f64]>,
        tau: Option<&[f64]>,
    ) -> Result<DVector<f64>> {
        let n = self.n();
        let zeros = vec![0.0; n];
        let qd = qd.unwrap_or(&zeros);
        let tau = tau.unwrap_or(&zeros);
        let c = self.compiled()?;
        let f = c
            .func_fdyn
            .as_ref()
            .ok_or(DynError::Expr(ExprError::Singular))?;
        Ok(to_vector(f.eval(&[q, qd, tau])?))
    }
}

fn column(v: &SymVector) -> SymMatrix {
    SymMatrix::from_column_slice(v.len(), 1, v.as_slice())
}

fn to_vector(m: DMatrix<f64>) -> DVector<f64> {
    DVector::from_column_slice(m.as_slice())
}
