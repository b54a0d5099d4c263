//! Immutable analysis options.
//!
//! Every preprocessing and fitting call takes its options by reference;
//! nothing is read from process-wide state, so concurrent fits may use
//! different settings. All structs deserialize from JSON with defaults
//! filled in for missing fields.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Result, UnmixError};

// ---------------------------------------------------------------------------
// Preprocessing
// ---------------------------------------------------------------------------

/// Logarithm used for transmittance ↔ absorbance.
///
/// Must match the convention the references were stored with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogBase {
    #[default]
    Ten,
    Natural,
}

/// What to do with transmittance values ≤ 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum NonPositivePolicy {
    /// Replace with `transmittance_floor` and log a warning (lossy).
    #[default]
    Clamp,
    /// Fail with a `Domain` error.
    Reject,
}

/// Where the baseline is sampled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BaselineStrategy {
    /// First and last `max(fraction * n, min_points)` samples of the buffer.
    Edges { fraction: f64, min_points: usize },
    /// Explicit absorption-free wavenumber intervals `(lo, hi)` in cm⁻¹.
    Windows(Vec<(f64, f64)>),
}

impl Default for BaselineStrategy {
    fn default() -> Self {
        BaselineStrategy::Edges {
            fraction: 0.20,
            min_points: 50,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessOptions {
    pub log_base: LogBase,
    pub non_positive: NonPositivePolicy,
    /// Replacement for non-positive transmittance under `Clamp`.
    pub transmittance_floor: f64,
    /// `None` disables baseline correction of the sample.
    pub baseline: Option<BaselineStrategy>,
    /// Set negative absorbance to zero after baseline correction (lossy).
    pub clamp_negative_absorbance: bool,
}

impl Default for PreprocessOptions {
    fn default() -> Self {
        PreprocessOptions {
            log_base: LogBase::Ten,
            non_positive: NonPositivePolicy::Clamp,
            transmittance_floor: 1e-12,
            baseline: Some(BaselineStrategy::default()),
            clamp_negative_absorbance: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Fitting
// ---------------------------------------------------------------------------

/// How linearly dependent references are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RankPolicy {
    /// Keep the earliest column of a dependent group, drop the rest with
    /// multiplier 0.
    #[default]
    DropDependent,
    /// Fail with `SingularMatrix`.
    Fail,
}

/// Value assigned to sample points outside a reference's range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Extrapolation {
    /// Nearest boundary value held flat.
    #[default]
    Hold,
    /// Zero outside the covered range.
    Zero,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FitOptions {
    /// Restrict the fit to these reference ids; `None` uses all of them.
    pub reference_subset: Option<Vec<String>>,
    /// Fixed multipliers; these references are not solved for.
    pub manual_multipliers: BTreeMap<String, f64>,
    pub enforce_non_negative: bool,
    pub rank_policy: RankPolicy,
    /// Relative residual norm below which a column counts as dependent.
    pub rank_tolerance: f64,
    pub extrapolation: Extrapolation,
    /// Iteration cap for the active-set solver; `None` means `max(3 * columns, 10)`.
    pub max_iterations: Option<usize>,
}

impl Default for FitOptions {
    fn default() -> Self {
        FitOptions {
            reference_subset: None,
            manual_multipliers: BTreeMap::new(),
            enforce_non_negative: true,
            rank_policy: RankPolicy::DropDependent,
            rank_tolerance: 1e-8,
            extrapolation: Extrapolation::Hold,
            max_iterations: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AnalysisOptions {
    pub preprocess: PreprocessOptions,
    pub fit: FitOptions,
}

impl PreprocessOptions {
    pub fn validate(&self) -> Result<()> {
        if !(self.transmittance_floor.is_finite() && self.transmittance_floor > 0.0) {
            return Err(UnmixError::config(format!(
                "transmittance_floor must be positive, got {}",
                self.transmittance_floor
            )));
        }
        match &self.baseline {
            Some(BaselineStrategy::Edges { fraction, min_points }) => {
                if !(*fraction > 0.0 && *fraction <= 0.5) {
                    return Err(UnmixError::config(format!(
                        "baseline edge fraction must be in (0, 0.5], got {fraction}"
                    )));
                }
                if *min_points == 0 {
                    return Err(UnmixError::config("baseline min_points must be at least 1"));
                }
            }
            Some(BaselineStrategy::Windows(windows)) => {
                if windows.is_empty() {
                    return Err(UnmixError::config("baseline window list is empty"));
                }
                for &(lo, hi) in windows {
                    if !(lo.is_finite() && hi.is_finite() && lo < hi) {
                        return Err(UnmixError::config(format!(
                            "baseline window ({lo}, {hi}) is not a finite interval with lo < hi"
                        )));
                    }
                }
            }
            None => {}
        }
        Ok(())
    }
}

impl FitOptions {
    pub fn validate(&self) -> Result<()> {
        if !(self.rank_tolerance.is_finite() && self.rank_tolerance > 0.0) {
            return Err(UnmixError::config(format!(
                "rank_tolerance must be positive, got {}",
                self.rank_tolerance
            )));
        }
        for (id, m) in &self.manual_multipliers {
            if !m.is_finite() {
                return Err(UnmixError::config(format!(
                    "manual multiplier for '{id}' is not finite"
                )));
            }
        }
        if self.max_iterations == Some(0) {
            return Err(UnmixError::config("max_iterations must be at least 1"));
        }
        Ok(())
    }
}

impl AnalysisOptions {
    pub fn validate(&self) -> Result<()> {
        self.preprocess.validate()?;
        self.fit.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_behaviour() {
        let opts = AnalysisOptions::default();
        assert_eq!(opts.preprocess.log_base, LogBase::Ten);
        assert_eq!(
            opts.preprocess.baseline,
            Some(BaselineStrategy::Edges { fraction: 0.2, min_points: 50 })
        );
        assert!(opts.fit.enforce_non_negative);
        assert_eq!(opts.fit.rank_policy, RankPolicy::DropDependent);
        assert!(opts.validate().is_ok());
    }

    #[test]
    fn partial_json_fills_defaults() {
        let json = r#"{
            "preprocess": { "baseline": { "windows": [[2500.0, 2600.0], [3800.0, 3900.0]] } },
            "fit": { "manual_multipliers": { "CO2": 0.65 }, "enforce_non_negative": false }
        }"#;
        let opts: AnalysisOptions = serde_json::from_str(json).unwrap();
        assert_eq!(
            opts.preprocess.baseline,
            Some(BaselineStrategy::Windows(vec![(2500.0, 2600.0), (3800.0, 3900.0)]))
        );
        assert_eq!(opts.preprocess.transmittance_floor, 1e-12);
        assert_eq!(opts.fit.manual_multipliers.get("CO2"), Some(&0.65));
        assert!(!opts.fit.enforce_non_negative);
        assert_eq!(opts.fit.rank_tolerance, 1e-8);
    }

    #[test]
    fn inverted_window_is_rejected() {
        let opts = PreprocessOptions {
            baseline: Some(BaselineStrategy::Windows(vec![(3000.0, 2000.0)])),
            ..Default::default()
        };
        assert!(matches!(opts.validate(), Err(UnmixError::Config(_))));
    }

    #[test]
    fn zero_iteration_cap_is_rejected() {
        let fit = FitOptions {
            max_iterations: Some(0),
            ..Default::default()
        };
        assert!(matches!(fit.validate(), Err(UnmixError::Config(_))));
        assert!(FitOptions { max_iterations: Some(1), ..Default::default() }.validate().is_ok());
    }

    #[test]
    fn non_finite_manual_multiplier_is_rejected() {
        let mut fit = FitOptions::default();
        fit.manual_multipliers.insert("CO".into(), f64::NAN);
        assert!(fit.validate().is_err());
    }
}
