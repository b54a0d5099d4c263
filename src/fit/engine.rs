use log::{debug, warn};
use nalgebra::{DMatrix, DVector};

use super::lstsq::{screen_columns, solve_least_squares};
use super::nnls::{default_max_iterations, nnls};
use super::result::{Constituent, ConstituentStatus, FitResult};
use crate::data::model::{ReferenceSet, SpectrumBuffer, Unit};
use crate::data::select::select_references;
use crate::error::{Result, UnmixError};
use crate::options::{FitOptions, RankPolicy};
use crate::preprocess::resample::resample;

// ---------------------------------------------------------------------------
// FitEngine
// ---------------------------------------------------------------------------

/// Solves `sample ≈ Σ m_i · reference_i` over the sample's grid.
///
/// The engine holds only its (validated) options and can be shared across
/// threads; every call works on its own copies of the data.
#[derive(Debug, Clone)]
pub struct FitEngine {
    options: FitOptions,
}

impl FitEngine {
    pub fn new(options: FitOptions) -> Result<Self> {
        options.validate()?;
        Ok(FitEngine { options })
    }

    pub fn options(&self) -> &FitOptions {
        &self.options
    }

    /// Fit `sample` against the selected references.
    ///
    /// Both sample and references must be in absorbance. References are
    /// resampled onto the sample grid; one design-matrix column per selected
    /// reference, in reference-set order. Fixed multipliers are subtracted
    /// from the sample before the remaining columns are solved for.
    pub fn fit(&self, sample: &SpectrumBuffer, references: &ReferenceSet) -> Result<FitResult> {
        require_absorbance(sample)?;
        let selection = select_references(references, &self.options)?;
        let entries: Vec<(&str, &SpectrumBuffer)> = references.iter().collect();
        let grid = sample.wavenumbers();

        let mut ids = Vec::with_capacity(selection.len());
        let mut columns = Vec::with_capacity(selection.len());
        for &i in &selection.indices {
            let (id, reference) = entries[i];
            require_absorbance(reference)?;
            let aligned = resample(reference, grid, self.options.extrapolation)?;
            ids.push(id.to_string());
            columns.push(aligned.into_parts().1);
        }

        let design = DMatrix::from_fn(grid.len(), columns.len(), |r, c| columns[c][r]);
        let b = DVector::from_column_slice(sample.values());
        debug!(
            "{}: design matrix {}x{}, {} fixed",
            sample.label(),
            design.nrows(),
            design.ncols(),
            selection.fixed.iter().filter(|f| f.is_some()).count()
        );

        let mut multipliers = vec![0.0; ids.len()];
        let mut status = vec![ConstituentStatus::Fitted; ids.len()];

        let mut target = b.clone();
        for (c, fixed) in selection.fixed.iter().enumerate() {
            if let Some(m) = *fixed {
                multipliers[c] = m;
                status[c] = ConstituentStatus::Fixed;
                target.axpy(-m, &design.column(c), 1.0);
            }
        }

        let free = selection.free_columns();
        if !free.is_empty() {
            let screen = screen_columns(&design.select_columns(&free), self.options.rank_tolerance);
            for &d in &screen.dependent {
                let id = &ids[free[d]];
                match self.options.rank_policy {
                    RankPolicy::Fail => {
                        return Err(UnmixError::SingularMatrix { dependent: id.clone() });
                    }
                    RankPolicy::DropDependent => {
                        warn!(
                            "{}: reference '{id}' depends linearly on earlier ones, dropped",
                            sample.label()
                        );
                        status[free[d]] = ConstituentStatus::Dropped;
                    }
                }
            }

            let kept: Vec<usize> = screen.independent.iter().map(|&k| free[k]).collect();
            let a = design.select_columns(&kept);
            let solution = if self.options.enforce_non_negative {
                let cap = self
                    .options
                    .max_iterations
                    .unwrap_or_else(|| default_max_iterations(kept.len()));
                nnls(&a, &target, cap)?
            } else {
                solve_least_squares(&a, &target)?
            };
            for (k, &c) in kept.iter().enumerate() {
                multipliers[c] = solution[k];
            }
        }

        for (id, m) in ids.iter().zip(&multipliers) {
            if !m.is_finite() {
                return Err(UnmixError::NonFinite {
                    quantity: "multiplier",
                    id: id.clone(),
                });
            }
        }

        let model = &design * DVector::from_column_slice(&multipliers);
        let residual: Vec<f64> = b.iter().zip(model.iter()).map(|(s, m)| s - m).collect();
        if residual.iter().any(|r| !r.is_finite()) {
            return Err(UnmixError::NonFinite {
                quantity: "residual",
                id: sample.label().to_string(),
            });
        }

        let ss_res: f64 = residual.iter().map(|r| r * r).sum();
        let mean = b.mean();
        let ss_tot: f64 = b.iter().map(|v| (v - mean).powi(2)).sum();
        // Rounding in `mean` alone leaves up to ~n·eps·|b|max per point.
        let n = b.len() as f64;
        let peak = b.amax();
        let rounding = n * f64::EPSILON * peak;
        let r_squared = if ss_tot > n * rounding * rounding {
            Some(1.0 - ss_res / ss_tot)
        } else {
            warn!("{}: sample has no variance, R² undefined", sample.label());
            None
        };

        let constituents = ids
            .into_iter()
            .zip(columns)
            .zip(multipliers.iter().zip(&status))
            .map(|((id, aligned), (&multiplier, &status))| Constituent {
                id,
                multiplier,
                status,
                aligned,
            })
            .collect();

        Ok(FitResult {
            sample: sample.clone(),
            constituents,
            model: sample
                .with_values(model.iter().copied().collect(), Unit::Absorbance)?
                .with_label(format!("{} (model)", sample.label())),
            residual: sample
                .with_values(residual, Unit::Absorbance)?
                .with_label(format!("{} (residual)", sample.label())),
            ss_res,
            ss_tot,
            r_squared,
        })
    }
}

fn require_absorbance(buffer: &SpectrumBuffer) -> Result<()> {
    if buffer.unit() == Unit::Absorbance {
        Ok(())
    } else {
        Err(UnmixError::domain(
            buffer.label(),
            "fitting requires absorbance; convert transmittance first",
        ))
    }
}
