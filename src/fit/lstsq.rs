//! Dense least-squares building blocks.
//!
//! Columns are screened for linear dependence before any solve, so the SVD
//! solve only ever sees a full-column-rank matrix. SVD is used instead of the
//! normal equations because overlapping absorption bands make reference
//! columns nearly collinear, and forming `AᵀA` squares the condition number.

use nalgebra::{DMatrix, DVector};

use crate::error::{Result, UnmixError};

/// Outcome of column screening, both lists ascending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnScreen {
    pub independent: Vec<usize>,
    pub dependent: Vec<usize>,
}

/// Greedy Gram–Schmidt over columns in index order.
///
/// A column is dependent when the part of it orthogonal to the columns kept
/// so far has norm ≤ `tolerance * ‖column‖`. The earliest column of any
/// dependent group is always the one kept. All-zero columns are dependent.
pub fn screen_columns(a: &DMatrix<f64>, tolerance: f64) -> ColumnScreen {
    let mut basis: Vec<DVector<f64>> = Vec::with_capacity(a.ncols());
    let mut independent = Vec::new();
    let mut dependent = Vec::new();

    for j in 0..a.ncols() {
        let column = a.column(j).clone_owned();
        let norm = column.norm();
        if norm == 0.0 {
            dependent.push(j);
            continue;
        }

        let mut v = column;
        // Two passes of modified Gram-Schmidt for orthogonality.
        for _ in 0..2 {
            for q in &basis {
                let proj = q.dot(&v);
                v.axpy(-proj, q, 1.0);
            }
        }

        let rest = v.norm();
        if rest <= tolerance * norm {
            dependent.push(j);
        } else {
            basis.push(v / rest);
            independent.push(j);
        }
    }

    ColumnScreen {
        independent,
        dependent,
    }
}

/// Unconstrained `argmin ‖A x - b‖²` via SVD.
///
/// A matrix with no columns yields an empty solution.
pub fn solve_least_squares(a: &DMatrix<f64>, b: &DVector<f64>) -> Result<DVector<f64>> {
    if a.ncols() == 0 {
        return Ok(DVector::zeros(0));
    }

    let svd = a.clone().svd(true, true);
    let largest = svd.singular_values.max();
    let eps = largest * a.nrows().max(a.ncols()) as f64 * f64::EPSILON;

    let x = svd.solve(b, eps).map_err(|_| UnmixError::NonFinite {
        quantity: "least-squares solution",
        id: "design matrix".to_string(),
    })?;

    if x.iter().all(|v| v.is_finite()) {
        Ok(x)
    } else {
        Err(UnmixError::NonFinite {
            quantity: "least-squares solution",
            id: "design matrix".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn solves_overdetermined_line_fit() {
        // y = 2 + 3x on x = 0..3
        let a = DMatrix::from_row_slice(4, 2, &[1.0, 0.0, 1.0, 1.0, 1.0, 2.0, 1.0, 3.0]);
        let b = DVector::from_row_slice(&[2.0, 5.0, 8.0, 11.0]);
        let x = solve_least_squares(&a, &b).unwrap();
        assert_relative_eq!(x[0], 2.0, epsilon = 1e-10);
        assert_relative_eq!(x[1], 3.0, epsilon = 1e-10);
    }

    #[test]
    fn empty_matrix_gives_empty_solution() {
        let a = DMatrix::<f64>::zeros(3, 0);
        let b = DVector::from_row_slice(&[1.0, 2.0, 3.0]);
        assert_eq!(solve_least_squares(&a, &b).unwrap().len(), 0);
    }

    #[test]
    fn screening_keeps_first_of_duplicate_columns() {
        // Columns: a, b, a, 2b + a, zero
        let a = DMatrix::from_row_slice(
            4,
            5,
            &[
                1.0, 0.0, 1.0, 1.0, 0.0, //
                2.0, 1.0, 2.0, 4.0, 0.0, //
                0.0, 3.0, 0.0, 6.0, 0.0, //
                1.0, 1.0, 1.0, 3.0, 0.0,
            ],
        );
        let screen = screen_columns(&a, 1e-8);
        assert_eq!(screen.independent, vec![0, 1]);
        assert_eq!(screen.dependent, vec![2, 3, 4]);
    }

    #[test]
    fn screening_accepts_nearly_collinear_but_distinct_columns() {
        let n = 50;
        let a = DMatrix::from_fn(n, 2, |i, j| {
            let x = i as f64 / n as f64;
            if j == 0 {
                (-(x - 0.50).powi(2) / 0.02).exp()
            } else {
                (-(x - 0.52).powi(2) / 0.02).exp()
            }
        });
        let screen = screen_columns(&a, 1e-8);
        assert_eq!(screen.independent, vec![0, 1]);
    }
}
