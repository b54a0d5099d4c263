//! Non-negative least squares (Lawson & Hanson active-set method).
//!
//! Solves `argmin ‖A x - b‖²` subject to `x ≥ 0`. Variables move from the
//! active (pinned at zero) set into the passive set one at a time, picked by
//! the largest positive gradient component; an inner loop steps back toward
//! feasibility whenever the unconstrained passive solve goes non-positive.

use log::debug;
use nalgebra::{DMatrix, DVector};

use super::lstsq::solve_least_squares;
use crate::error::{Result, UnmixError};

/// Iteration cap used when the caller does not supply one.
pub fn default_max_iterations(columns: usize) -> usize {
    (3 * columns).max(10)
}

pub fn nnls(a: &DMatrix<f64>, b: &DVector<f64>, max_iterations: usize) -> Result<DVector<f64>> {
    let n = a.ncols();
    let mut x = DVector::zeros(n);
    if n == 0 {
        return Ok(x);
    }

    let norm1 = a
        .column_iter()
        .map(|c| c.iter().map(|v| v.abs()).sum::<f64>())
        .fold(0.0, f64::max);
    let tol = 10.0 * f64::EPSILON * norm1 * a.nrows().max(n) as f64;

    let mut passive = vec![false; n];
    let mut iterations = 0usize;

    loop {
        let gradient = a.tr_mul(&(b - a * &x));
        let entering = (0..n)
            .filter(|&j| !passive[j] && gradient[j] > tol)
            .max_by(|&i, &j| gradient[i].total_cmp(&gradient[j]));
        let Some(j) = entering else { break };
        passive[j] = true;

        loop {
            iterations += 1;
            if iterations > max_iterations {
                return Err(UnmixError::NotConverged { iterations: max_iterations });
            }

            let cols: Vec<usize> = (0..n).filter(|&i| passive[i]).collect();
            let z_passive = solve_least_squares(&a.select_columns(&cols), b)?;
            let mut z = DVector::zeros(n);
            for (k, &i) in cols.iter().enumerate() {
                z[i] = z_passive[k];
            }

            if cols.iter().all(|&i| z[i] > 0.0) {
                x = z;
                break;
            }

            // Largest step toward z that keeps every passive variable ≥ 0.
            let alpha = cols
                .iter()
                .filter(|&&i| z[i] <= 0.0)
                .map(|&i| {
                    let denom = x[i] - z[i];
                    if denom > 0.0 {
                        x[i] / denom
                    } else {
                        0.0
                    }
                })
                .fold(f64::INFINITY, f64::min);

            x += (&z - &x) * alpha;
            for &i in &cols {
                if x[i] <= tol {
                    x[i] = 0.0;
                    passive[i] = false;
                }
            }
        }
    }

    debug!("nnls: {n} columns, {iterations} iterations");
    Ok(x)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn matches_unconstrained_solution_when_it_is_positive() {
        let a = DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 0.0, 1.0, 1.0, 1.0]);
        let b = DVector::from_row_slice(&[2.0, 0.5, 2.5]);
        let x = nnls(&a, &b, 10).unwrap();
        assert_relative_eq!(x[0], 2.0, epsilon = 1e-12);
        assert_relative_eq!(x[1], 0.5, epsilon = 1e-12);
    }

    #[test]
    fn pins_negative_components_at_zero() {
        // Unconstrained optimum is (1, -1); the constrained one is the origin.
        let a = DMatrix::from_row_slice(2, 2, &[1.0, 1.0, 1.0, 2.0]);
        let b = DVector::from_row_slice(&[0.0, -1.0]);
        let x = nnls(&a, &b, 10).unwrap();
        assert_eq!(x[0], 0.0);
        assert_eq!(x[1], 0.0);
    }

    #[test]
    fn drops_variable_that_goes_negative_in_the_inner_loop() {
        // Unconstrained optimum is (2, -1); the constrained one is (1.5, 0).
        let a = DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 1.0, 1.0, 0.0, 1.0]);
        let b = DVector::from_row_slice(&[2.0, 1.0, -1.0]);
        let x = nnls(&a, &b, 10).unwrap();
        assert_relative_eq!(x[0], 1.5, epsilon = 1e-12);
        assert_eq!(x[1], 0.0);
    }

    #[test]
    fn recovers_sparse_positive_mixture() {
        let a = DMatrix::from_fn(40, 3, |i, j| {
            let x = i as f64;
            let centre = [10.0, 20.0, 30.0][j];
            (-(x - centre).powi(2) / 8.0).exp()
        });
        let truth = DVector::from_row_slice(&[1.5, 0.0, 0.25]);
        let b = &a * &truth;
        let x = nnls(&a, &b, 10).unwrap();
        for k in 0..3 {
            assert_relative_eq!(x[k], truth[k], epsilon = 1e-9);
        }
    }

    #[test]
    fn iteration_cap_is_reported() {
        // Two disjoint columns need one passive solve each.
        let a = DMatrix::from_row_slice(2, 2, &[1.0, 0.0, 0.0, 1.0]);
        let b = DVector::from_row_slice(&[1.0, 2.0]);
        assert_eq!(nnls(&a, &b, 1).unwrap_err(), UnmixError::NotConverged { iterations: 1 });
        let x = nnls(&a, &b, 2).unwrap();
        assert_relative_eq!(x[0], 1.0, epsilon = 1e-12);
        assert_relative_eq!(x[1], 2.0, epsilon = 1e-12);
    }

    #[test]
    fn all_negative_target_gives_zero_solution() {
        let a = DMatrix::from_row_slice(3, 1, &[1.0, 2.0, 3.0]);
        let b = DVector::from_row_slice(&[-1.0, -2.0, -3.0]);
        let x = nnls(&a, &b, 10).unwrap();
        assert_eq!(x[0], 0.0);
    }
}
