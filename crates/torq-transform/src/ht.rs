//! Symbolic 4×4 homogeneous transforms.
//!
//! An `Ht` carries the conventional block structure [[R, t], [0, 1]] over
//! symbolic entries, plus an optional cached ZYX-Euler triple. The cache
//! exists because extracting Euler angles from a symbolic rotation yields a
//! mathematically equal but structurally different expression that
//! simplification does not always recover; a transform built from Euler
//! angles therefore remembers them and round-trips exactly. Any operation
//! that rewrites the rotation drops the cache.

use std::collections::HashMap;

use nalgebra::{DMatrix, DVector, Matrix3, Matrix4, Matrix6, Vector3, Vector6};

use torq_expr::{Expr, Sym, deskew};

use crate::error::{Result, TransformError};

/// A symbolic homogeneous transform.
#[derive(Debug, Clone, PartialEq)]
pub struct Ht {
    mat: Matrix4<Expr>,
    euler: Option<Vector3<Expr>>,
}

fn rot3_x(angle: &Expr) -> Matrix3<Expr> {
    let (s, c) = (angle.clone().sin(), angle.clone().cos());
    let (zero, one) = (Expr::Num(0.0), Expr::Num(1.0));
    Matrix3::new(
        one,
        zero.clone(),
        zero.clone(),
        zero.clone(),
        c.clone(),
        -s.clone(),
        zero,
        s,
        c,
    )
}

fn rot3_y(angle: &Expr) -> Matrix3<Expr> {
    let (s, c) = (angle.clone().sin(), angle.clone().cos());
    let (zero, one) = (Expr::Num(0.0), Expr::Num(1.0));
    Matrix3::new(
        c.clone(),
        zero.clone(),
        s.clone(),
        zero.clone(),
        one,
        zero.clone(),
        -s,
        zero,
        c,
    )
}

fn rot3_z(angle: &Expr) -> Matrix3<Expr> {
    let (s, c) = (angle.clone().sin(), angle.clone().cos());
    let (zero, one) = (Expr::Num(0.0), Expr::Num(1.0));
    Matrix3::new(
        c.clone(),
        -s.clone(),
        zero.clone(),
        s,
        c,
        zero.clone(),
        zero.clone(),
        zero,
        one,
    )
}

fn assemble(rot: &Matrix3<Expr>, trans: &Vector3<Expr>) -> Matrix4<Expr> {
    let (zero, one) = (Expr::Num(0.0), Expr::Num(1.0));
    Matrix4::new(
        rot[(0, 0)].clone(),
        rot[(0, 1)].clone(),
        rot[(0, 2)].clone(),
        trans[0].clone(),
        rot[(1, 0)].clone(),
        rot[(1, 1)].clone(),
        rot[(1, 2)].clone(),
        trans[1].clone(),
        rot[(2, 0)].clone(),
        rot[(2, 1)].clone(),
        rot[(2, 2)].clone(),
        trans[2].clone(),
        zero.clone(),
        zero.clone(),
        zero,
        one,
    )
}

impl Ht {
    /// Identity transform.
    pub fn identity() -> Ht {
        Ht {
            mat: Matrix4::identity(),
            euler: None,
        }
    }

    /// Take a 4×4 matrix verbatim.
    pub fn from_matrix(mat: Matrix4<Expr>) -> Ht {
        Ht { mat, euler: None }
    }

    /// Build from rotation and translation blocks.
    pub fn from_parts(rot: Matrix3<Expr>, trans: Vector3<Expr>) -> Ht {
        Ht {
            mat: assemble(&rot, &trans),
            euler: None,
        }
    }

    /// Rotation only, zero translation.
    pub fn from_rotation(rot: Matrix3<Expr>) -> Ht {
        Ht::from_parts(rot, Vector3::from_element(Expr::Num(0.0)))
    }

    /// Translation only, identity rotation.
    pub fn from_translation(trans: Vector3<Expr>) -> Ht {
        Ht::from_parts(Matrix3::identity(), trans)
    }

    /// Build from ZYX-Euler angles φ = (φx, φy, φz):
    /// R = Rz(φz)·Ry(φy)·Rx(φx). The triple is cached for exact round-trip.
    pub fn from_euler(phi: Vector3<Expr>) -> Ht {
        let rot = rot3_z(&phi[2]) * rot3_y(&phi[1]) * rot3_x(&phi[0]);
        Ht {
            mat: assemble(&rot, &Vector3::from_element(Expr::Num(0.0))),
            euler: Some(phi),
        }
    }

    /// Build from a 6-wrench [t; φ] with ZYX-Euler φ.
    pub fn from_wrench(w: Vector6<Expr>) -> Ht {
        let trans = Vector3::new(w[0].clone(), w[1].clone(), w[2].clone());
        let phi = Vector3::new(w[3].clone(), w[4].clone(), w[5].clone());
        Ht::from_euler(phi).with_trans(trans)
    }

    /// Build from a column-major 16-vector.
    pub fn from_column(col: &DVector<Expr>) -> Result<Ht> {
        if col.len() != 16 {
            return Err(TransformError::InvalidShape {
                rows: col.len(),
                cols: 1,
            });
        }
        Ok(Ht::from_matrix(Matrix4::from_iterator(
            col.iter().cloned(),
        )))
    }

    /// Interpret a dynamically shaped input per the accepted-shape table:
    /// 4×4 verbatim, 3×3 rotation, 3×1/1×3 translation, 6×1 wrench,
    /// 16×1 column. Anything else is an invalid shape.
    pub fn from_shaped(m: &DMatrix<Expr>) -> Result<Ht> {
        match (m.nrows(), m.ncols()) {
            (4, 4) => Ok(Ht::from_matrix(Matrix4::from_iterator(m.iter().cloned()))),
            (3, 3) => Ok(Ht::from_rotation(Matrix3::from_iterator(
                m.iter().cloned(),
            ))),
            (3, 1) | (1, 3) => Ok(Ht::from_translation(Vector3::from_iterator(
                m.iter().cloned(),
            ))),
            (6, 1) => Ok(Ht::from_wrench(Vector6::from_iterator(m.iter().cloned()))),
            (16, 1) => Ht::from_column(&DVector::from_iterator(16, m.iter().cloned())),
            (rows, cols) => Err(TransformError::InvalidShape { rows, cols }),
        }
    }

    /// Left-to-right product of shape-dispatched inputs; identity when empty.
    pub fn new(args: &[DMatrix<Expr>]) -> Result<Ht> {
        let mut h = Ht::identity();
        for a in args {
            h = &h * &Ht::from_shaped(a)?;
        }
        Ok(h)
    }

    /// Pure rotation about the X axis.
    pub fn rot_x(angle: Expr) -> Ht {
        Ht::from_rotation(rot3_x(&angle))
    }

    /// Pure rotation about the Y axis.
    pub fn rot_y(angle: Expr) -> Ht {
        Ht::from_rotation(rot3_y(&angle))
    }

    /// Pure rotation about the Z axis.
    pub fn rot_z(angle: Expr) -> Ht {
        Ht::from_rotation(rot3_z(&angle))
    }

    /// One standard Denavit–Hartenberg row (θ, d, a, α).
    pub fn from_dh_row(theta: Expr, d: Expr, a: Expr, alpha: Expr) -> Ht {
        let (st, ct) = (theta.clone().sin(), theta.cos());
        let (sa, ca) = (alpha.clone().sin(), alpha.cos());
        let zero = Expr::Num(0.0);
        let rot = Matrix3::new(
            ct.clone(),
            -st.clone() * ca.clone(),
            st.clone() * sa.clone(),
            st.clone(),
            ct.clone() * ca.clone(),
            -ct.clone() * sa.clone(),
            zero.clone(),
            sa,
            ca,
        );
        let trans = Vector3::new(a.clone() * ct, a * st, d);
        Ht::from_parts(rot, trans)
    }

    /// Compose one transform per DH row, left to right.
    pub fn from_dh(rows: &[[Expr; 4]]) -> Ht {
        let mut h = Ht::identity();
        for [theta, d, a, alpha] in rows {
            h = &h * &Ht::from_dh_row(theta.clone(), d.clone(), a.clone(), alpha.clone());
        }
        h
    }

    /// The underlying 4×4 matrix.
    pub fn matrix(&self) -> &Matrix4<Expr> {
        &self.mat
    }

    /// Translation block.
    pub fn trans(&self) -> Vector3<Expr> {
        Vector3::new(
            self.mat[(0, 3)].clone(),
            self.mat[(1, 3)].clone(),
            self.mat[(2, 3)].clone(),
        )
    }

    /// Rotation block.
    pub fn rot(&self) -> Matrix3<Expr> {
        self.mat.fixed_view::<3, 3>(0, 0).into_owned()
    }

    /// ZYX-Euler angles (φx, φy, φz): the cached triple when the rotation
    /// was set from Euler angles, otherwise extracted from R. Extraction is
    /// singular at φy = ±π/2.
    pub fn euler(&self) -> Vector3<Expr> {
        if let Some(phi) = &self.euler {
            return phi.clone();
        }
        let r = &self.mat;
        let phi_x = r[(2, 1)].clone().atan2(r[(2, 2)].clone());
        let phi_y = (-r[(0, 2)].clone())
            .atan2((r[(2, 1)].clone().powi(2) + r[(2, 2)].clone().powi(2)).sqrt());
        let phi_z = r[(1, 0)].clone().atan2(r[(0, 0)].clone());
        Vector3::new(phi_x, phi_y, phi_z)
    }

    /// 6-wrench [t; φ].
    pub fn wrench(&self) -> Vector6<Expr> {
        let t = self.trans();
        let phi = self.euler();
        Vector6::new(
            t[0].clone(),
            t[1].clone(),
            t[2].clone(),
            phi[0].clone(),
            phi[1].clone(),
            phi[2].clone(),
        )
    }

    /// Column-major 16-vector.
    pub fn column(&self) -> DVector<Expr> {
        DVector::from_iterator(16, self.mat.iter().cloned())
    }

    /// New transform with this translation; the rotation (and any cached
    /// Euler triple) is unchanged.
    pub fn with_trans(&self, trans: Vector3<Expr>) -> Ht {
        Ht {
            mat: assemble(&self.rot(), &trans),
            euler: self.euler.clone(),
        }
    }

    /// New transform with this rotation; drops the Euler cache.
    pub fn with_rot(&self, rot: Matrix3<Expr>) -> Ht {
        Ht {
            mat: assemble(&rot, &self.trans()),
            euler: None,
        }
    }

    /// New transform with R rebuilt from ZYX-Euler angles; caches φ.
    pub fn with_euler(&self, phi: Vector3<Expr>) -> Ht {
        let rot = rot3_z(&phi[2]) * rot3_y(&phi[1]) * rot3_x(&phi[0]);
        Ht {
            mat: assemble(&rot, &self.trans()),
            euler: Some(phi),
        }
    }

    /// Structural inverse: [[Rᵀ, −Rᵀt], [0, 1]].
    pub fn inverse(&self) -> Ht {
        let rt = self.rot().transpose();
        let t = self.trans();
        let new_t = (rt.clone() * t).map(|e| (-e).simplify());
        Ht::from_parts(rt, new_t)
    }

    /// Left division: self⁻¹ · rhs.
    pub fn left_div(&self, rhs: &Ht) -> Ht {
        &self.inverse() * rhs
    }

    /// Right division: rhs · self⁻¹.
    pub fn right_div(&self, rhs: &Ht) -> Ht {
        rhs * &self.inverse()
    }

    /// Body angular velocity against `var`: ω with ω̂ = (dR/dvar)·Rᵀ.
    pub fn rot_vel(&self, var: &Sym) -> Vector3<Expr> {
        self.rot_vel_with(|e| e.diff(var))
    }

    /// Angular velocity against an arbitrary derivative operator.
    ///
    /// `d` supplies the derivative of each rotation entry; this is how the
    /// dynamics layer extracts ω against implicit time.
    pub fn rot_vel_with(&self, d: impl Fn(&Expr) -> Expr) -> Vector3<Expr> {
        let r = self.rot();
        let dr = r.map(|e| d(&e));
        let w = dr * r.transpose();
        deskew(&w).map(|e| e.simplify())
    }

    /// Geometric Jacobian: rows 1–3 are ∂t/∂qⱼ, rows 4–6 the angular
    /// velocity against qⱼ.
    pub fn geometric_jacobian(&self, q: &[Sym]) -> DMatrix<Expr> {
        let t = self.trans();
        let mut jac = DMatrix::from_element(6, q.len(), Expr::Num(0.0));
        for (j, var) in q.iter().enumerate() {
            let dt = t.map(|e| e.diff(var).simplify());
            let w = self.rot_vel(var);
            for i in 0..3 {
                jac[(i, j)] = dt[i].clone();
                jac[(i + 3, j)] = w[i].clone();
            }
        }
        jac
    }

    /// Analytic Jacobian: rows 1–3 are ∂t/∂qⱼ, rows 4–6 the ZYX-Euler
    /// rates ∂φ/∂qⱼ.
    pub fn analytic_jacobian(&self, q: &[Sym]) -> DMatrix<Expr> {
        let t = self.trans();
        let phi = self.euler();
        let mut jac = DMatrix::from_element(6, q.len(), Expr::Num(0.0));
        for (j, var) in q.iter().enumerate() {
            for i in 0..3 {
                jac[(i, j)] = t[i].diff(var).simplify();
                jac[(i + 3, j)] = phi[i].diff(var).simplify();
            }
        }
        jac
    }
}

/// Euler-rate coupling matrix B(φ) with ω = B(φ)·φ̇ for ZYX angles.
///
/// Each column is the angular velocity produced by a unit rate of one Euler
/// angle, computed once over fresh placeholder angles and then substituted.
/// Columns follow the (φx, φy, φz) component order of [`Ht::euler`].
pub fn euler_rate_matrix(phi: &Vector3<Expr>) -> Matrix3<Expr> {
    let ps = [
        Sym::new("__bphi_x"),
        Sym::new("__bphi_y"),
        Sym::new("__bphi_z"),
    ];
    let h = Ht::from_euler(Vector3::new(ps[0].expr(), ps[1].expr(), ps[2].expr()));
    let cols = [h.rot_vel(&ps[0]), h.rot_vel(&ps[1]), h.rot_vel(&ps[2])];
    let map: HashMap<Sym, Expr> = ps
        .iter()
        .cloned()
        .zip(phi.iter().cloned())
        .collect();
    Matrix3::from_columns(&cols).map(|e| e.subs(&map).simplify())
}

/// Symbolic inverse of B(φ). Singular at φy = ±π/2.
pub fn euler_rate_matrix_inv(phi: &Vector3<Expr>) -> Result<Matrix3<Expr>> {
    let b = euler_rate_matrix(phi);
    let bd = DMatrix::from_fn(3, 3, |i, j| b[(i, j)].clone());
    let inv = torq_expr::inverse(&bd)?;
    Ok(Matrix3::from_fn(|i, j| inv[(i, j)].clone()))
}

/// Coupling between geometric and analytic Jacobians:
/// Ba = blockdiag(I₃, B(φ)), with Jg = Ba·Ja.
pub fn coupling_jacobian(phi: &Vector3<Expr>) -> Matrix6<Expr> {
    let b = euler_rate_matrix(phi);
    Matrix6::from_fn(|i, j| match (i, j) {
        (0..=2, 0..=2) if i == j => Expr::Num(1.0),
        (3..=5, 3..=5) => b[(i - 3, j - 3)].clone(),
        _ => Expr::Num(0.0),
    })
}

impl std::ops::Mul for Ht {
    type Output = Ht;
    fn mul(self, rhs: Ht) -> Ht {
        Ht {
            mat: self.mat * rhs.mat,
            euler: None,
        }
    }
}

impl std::ops::Mul<&Ht> for &Ht {
    type Output = Ht;
    fn mul(self, rhs: &Ht) -> Ht {
        Ht {
            mat: &self.mat * &rhs.mat,
            euler: None,
        }
    }
}
