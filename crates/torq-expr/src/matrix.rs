//! Symbolic matrices over nalgebra containers.
//!
//! `Expr` implements the arithmetic traits nalgebra closes matrix algebra
//! over, so products, transposes and views need nothing special. This module
//! adds the operations nalgebra cannot provide for a non-`ComplexField`
//! scalar: element-wise substitution and differentiation, Gauss–Jordan
//! inversion with symbolic pivots, and the linear decomposition E = A·x + c.

use std::collections::HashMap;

use nalgebra::{DMatrix, DVector, Matrix3, Vector3};
use num_traits::Zero;

use crate::error::{ExprError, Result};
use crate::expr::{Expr, Sym};

/// Dynamically sized symbolic matrix.
pub type SymMatrix = DMatrix<Expr>;
/// Dynamically sized symbolic column vector.
pub type SymVector = DVector<Expr>;

/// Cross-product matrix: `skew(v) · w = v × w`.
pub fn skew(v: &Vector3<Expr>) -> Matrix3<Expr> {
    let zero = Expr::Num(0.0);
    Matrix3::new(
        zero.clone(),
        -v[2].clone(),
        v[1].clone(),
        v[2].clone(),
        zero.clone(),
        -v[0].clone(),
        -v[1].clone(),
        v[0].clone(),
        zero,
    )
}

/// Extract (W₃₂, W₁₃, W₂₁) from a skew matrix.
pub fn deskew(w: &Matrix3<Expr>) -> Vector3<Expr> {
    Vector3::new(w[(2, 1)].clone(), w[(0, 2)].clone(), w[(1, 0)].clone())
}

/// Element-wise substitution.
pub fn subs_matrix(m: &SymMatrix, map: &HashMap<Sym, Expr>) -> SymMatrix {
    m.map(|e| e.subs(map))
}

/// Element-wise partial derivative.
pub fn diff_matrix(m: &SymMatrix, var: &Sym) -> SymMatrix {
    m.map(|e| e.diff(var))
}

/// Element-wise simplification.
pub fn simplify_matrix(m: &SymMatrix) -> SymMatrix {
    m.map(|e| e.simplify())
}

/// Whether every entry is structurally zero (after simplification).
pub fn is_zero_matrix(m: &SymMatrix) -> bool {
    m.iter().all(|e| e.simplify().is_zero())
}

/// Symbolic matrix inverse by Gauss–Jordan elimination.
///
/// Pivot selection prefers nonzero numeric entries; a column with no
/// structurally nonzero pivot is reported as `Singular`. Entries are
/// simplified as the elimination proceeds to keep intermediate quotients
/// manageable.
pub fn inverse(m: &SymMatrix) -> Result<SymMatrix> {
    let n = m.nrows();
    if m.ncols() != n {
        return Err(ExprError::NonSquare {
            rows: m.nrows(),
            cols: m.ncols(),
        });
    }

    let mut a = simplify_matrix(m);
    let mut inv = SymMatrix::identity(n, n);

    for col in 0..n {
        let mut pivot = None;
        for r in col..n {
            match &a[(r, col)] {
                Expr::Num(v) if *v != 0.0 => {
                    pivot = Some(r);
                    break;
                }
                e if !e.is_zero() && pivot.is_none() => pivot = Some(r),
                _ => {}
            }
        }
        let pivot = pivot.ok_or(ExprError::Singular)?;
        if pivot != col {
            a.swap_rows(pivot, col);
            inv.swap_rows(pivot, col);
        }

        let p = a[(col, col)].clone();
        for j in 0..n {
            a[(col, j)] = (a[(col, j)].clone() / p.clone()).simplify();
            inv[(col, j)] = (inv[(col, j)].clone() / p.clone()).simplify();
        }

        for r in 0..n {
            if r == col {
                continue;
            }
            let f = a[(r, col)].clone();
            if f.is_zero() {
                continue;
            }
            for j in 0..n {
                a[(r, j)] = (a[(r, j)].clone() - f.clone() * a[(col, j)].clone()).simplify();
                inv[(r, j)] =
                    (inv[(r, j)].clone() - f.clone() * inv[(col, j)].clone()).simplify();
            }
        }
    }

    Ok(inv)
}

/// Decompose a vector expression linear in `vars` as E = A·vars + c.
///
/// Exact when every entry of `E` is affine in `vars`: the coefficient is the
/// partial derivative and the remainder is E with the variables zeroed.
pub fn linear_decompose(exprs: &SymVector, vars: &[Sym]) -> (SymMatrix, SymVector) {
    let zeros: HashMap<Sym, Expr> = vars
        .iter()
        .map(|s| (s.clone(), Expr::Num(0.0)))
        .collect();

    let a = SymMatrix::from_fn(exprs.len(), vars.len(), |i, j| {
        exprs[i].diff(&vars[j]).simplify()
    });
    let c = SymVector::from_fn(exprs.len(), |i, _| exprs[i].subs(&zeros).simplify());
    (a, c)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_skew_deskew_roundtrip() {
        let v = Vector3::new(Expr::symbol("a"), Expr::symbol("b"), Expr::symbol("c"));
        let w = skew(&v);
        assert_eq!(deskew(&w), v);
    }

    #[test]
    fn test_symbolic_matrix_product() {
        // nalgebra matmul closes over Expr
        let q = Sym::new("q");
        let m = Matrix3::new(
            q.expr().cos(),
            -q.expr().sin(),
            Expr::Num(0.0),
            q.expr().sin(),
            q.expr().cos(),
            Expr::Num(0.0),
            Expr::Num(0.0),
            Expr::Num(0.0),
            Expr::Num(1.0),
        );
        let prod = m.clone() * m.transpose();
        let env: HashMap<Sym, f64> = [(q.clone(), 0.4)].into();
        for i in 0..3 {
            for j in 0..3 {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert_relative_eq!(
                    prod[(i, j)].eval(&env).unwrap(),
                    expected,
                    epsilon = 1e-12
                );
            }
        }
    }

    #[test]
    fn test_inverse_numeric() {
        let m = SymMatrix::from_row_slice(
            2,
            2,
            &[
                Expr::Num(4.0),
                Expr::Num(7.0),
                Expr::Num(2.0),
                Expr::Num(6.0),
            ],
        );
        let inv = inverse(&m).unwrap();
        let prod = simplify_matrix(&(&m * &inv));
        let env = HashMap::new();
        for i in 0..2 {
            for j in 0..2 {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert_relative_eq!(
                    prod[(i, j)].eval(&env).unwrap(),
                    expected,
                    epsilon = 1e-12
                );
            }
        }
    }

    #[test]
    fn test_inverse_symbolic_diagonal() {
        let m_sym = Sym::new("m");
        let a = SymMatrix::from_diagonal(&SymVector::from_vec(vec![
            m_sym.expr(),
            Expr::Num(2.0),
        ]));
        let inv = inverse(&a).unwrap();
        let env: HashMap<Sym, f64> = [(m_sym.clone(), 5.0)].into();
        assert_relative_eq!(inv[(0, 0)].eval(&env).unwrap(), 0.2, epsilon = 1e-12);
        assert_relative_eq!(inv[(1, 1)].eval(&env).unwrap(), 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_inverse_singular() {
        let m = SymMatrix::zeros(2, 2);
        assert!(matches!(inverse(&m), Err(ExprError::Singular)));
    }

    #[test]
    fn test_inverse_non_square() {
        let m = SymMatrix::zeros(2, 3);
        assert!(matches!(inverse(&m), Err(ExprError::NonSquare { .. })));
    }

    #[test]
    fn test_linear_decompose() {
        // E = [2x + y + 3, x - 1] over vars (x, y)
        let vars = Expr::symbols("x, y");
        let (x, y) = (vars[0].expr(), vars[1].expr());
        let e = SymVector::from_vec(vec![
            Expr::Num(2.0) * x.clone() + y.clone() + Expr::Num(3.0),
            x.clone() - Expr::Num(1.0),
        ]);
        let (a, c) = linear_decompose(&e, &vars);
        assert_eq!(a[(0, 0)], Expr::Num(2.0));
        assert_eq!(a[(0, 1)], Expr::Num(1.0));
        assert_eq!(a[(1, 0)], Expr::Num(1.0));
        assert!(a[(1, 1)].is_zero());
        assert_eq!(c[0], Expr::Num(3.0));
        assert_eq!(c[1], Expr::Num(-1.0));
    }
}
