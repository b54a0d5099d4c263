//! Full analysis: preprocessing, alignment and fit.
//!
//! Order is fixed: unit conversion, then baseline correction of the sample,
//! then negative clamping, then the fit (which resamples references onto the
//! sample grid). Baseline subtraction is only meaningful on absorbance, so it
//! never runs before conversion.

use log::{debug, info};
use rayon::prelude::*;

use crate::data::model::{ReferenceSet, SpectrumBuffer};
use crate::error::Result;
use crate::fit::engine::FitEngine;
use crate::fit::result::FitResult;
use crate::options::{AnalysisOptions, PreprocessOptions};
use crate::preprocess::{baseline, units};

/// Convert a sample to absorbance and apply the configured baseline
/// correction and clamping.
pub fn prepare_sample(sample: &SpectrumBuffer, opts: &PreprocessOptions) -> Result<SpectrumBuffer> {
    let absorbance = units::to_absorbance(sample, opts)?;
    match &opts.baseline {
        Some(strategy) => baseline::correct(&absorbance, strategy, opts.clamp_negative_absorbance),
        None if opts.clamp_negative_absorbance => baseline::clamp_negative(&absorbance),
        None => Ok(absorbance),
    }
}

/// Convert every reference to absorbance. References are not
/// baseline-corrected.
pub fn prepare_references(
    references: &ReferenceSet,
    opts: &PreprocessOptions,
) -> Result<ReferenceSet> {
    let mut prepared = ReferenceSet::new();
    for (id, spectrum) in references.iter() {
        prepared.insert(id, units::to_absorbance(spectrum, opts)?)?;
    }
    Ok(prepared)
}

// ---------------------------------------------------------------------------
// Analyzer
// ---------------------------------------------------------------------------

/// Runs the whole pipeline with one immutable set of options.
#[derive(Debug, Clone)]
pub struct Analyzer {
    preprocess: PreprocessOptions,
    engine: FitEngine,
}

impl Analyzer {
    pub fn new(options: AnalysisOptions) -> Result<Self> {
        options.preprocess.validate()?;
        Ok(Analyzer {
            preprocess: options.preprocess,
            engine: FitEngine::new(options.fit)?,
        })
    }

    pub fn analyze(&self, sample: &SpectrumBuffer, references: &ReferenceSet) -> Result<FitResult> {
        let references = prepare_references(references, &self.preprocess)?;
        self.fit_prepared(sample, &references)
    }

    /// Analyze independent samples in parallel against one reference set.
    ///
    /// References are converted once and shared read-only. Results come back
    /// in input order; one failing sample does not affect the others.
    pub fn analyze_batch(
        &self,
        samples: &[SpectrumBuffer],
        references: &ReferenceSet,
    ) -> Result<Vec<Result<FitResult>>> {
        let references = prepare_references(references, &self.preprocess)?;
        info!(
            "analyzing {} sample(s) against {} reference(s)",
            samples.len(),
            references.len()
        );
        Ok(samples
            .par_iter()
            .map(|sample| self.fit_prepared(sample, &references))
            .collect())
    }

    fn fit_prepared(
        &self,
        sample: &SpectrumBuffer,
        references: &ReferenceSet,
    ) -> Result<FitResult> {
        let prepared = prepare_sample(sample, &self.preprocess)?;
        let result = self.engine.fit(&prepared, references)?;
        debug!(
            "{}: R² = {:?}, rmse = {:.3e}",
            sample.label(),
            result.r_squared(),
            result.rmse()
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::Unit;
    use crate::options::{BaselineStrategy, LogBase};
    use approx::assert_relative_eq;

    fn wn() -> Vec<f64> {
        (0..300).map(|i| 1000.0 + 10.0 * i as f64).collect()
    }

    fn band(centre: f64) -> Vec<f64> {
        wn().iter().map(|w| 0.8 * (-(w - centre).powi(2) / 5000.0).exp()).collect()
    }

    #[test]
    fn transmittance_sample_with_drift_is_recovered() {
        let a = band(2000.0);
        let b = band(2600.0);
        // Absorbance = 0.7 a + 1.2 b + sloped baseline, stored as transmittance.
        let t: Vec<f64> = wn()
            .iter()
            .enumerate()
            .map(|(i, w)| {
                let absorbance = 0.7 * a[i] + 1.2 * b[i] + 0.05 + 2e-5 * w;
                10f64.powf(-absorbance)
            })
            .collect();
        let sample = SpectrumBuffer::new(wn(), t, Unit::Transmittance).unwrap().with_label("s");
        let refs = ReferenceSet::try_from_pairs([
            ("A", SpectrumBuffer::new(wn(), a, Unit::Absorbance).unwrap()),
            ("B", SpectrumBuffer::new(wn(), b, Unit::Absorbance).unwrap()),
        ])
        .unwrap();

        let mut options = AnalysisOptions::default();
        options.preprocess.baseline =
            Some(BaselineStrategy::Windows(vec![(1000.0, 1300.0), (3700.0, 3990.0)]));
        let result = Analyzer::new(options).unwrap().analyze(&sample, &refs).unwrap();

        assert_relative_eq!(result.multiplier("A").unwrap(), 0.7, epsilon = 1e-6);
        assert_relative_eq!(result.multiplier("B").unwrap(), 1.2, epsilon = 1e-6);
        assert!(result.r_squared().unwrap() > 0.999_999);
    }

    #[test]
    fn transmittance_references_are_converted() {
        let a = band(2000.0);
        let t_ref: Vec<f64> = a.iter().map(|v| (-v).exp()).collect();
        let refs = ReferenceSet::try_from_pairs([(
            "A",
            SpectrumBuffer::new(wn(), t_ref, Unit::Transmittance).unwrap(),
        )])
        .unwrap();
        let sample_values: Vec<f64> = a.iter().map(|v| 0.5 * v).collect();
        let sample = SpectrumBuffer::new(wn(), sample_values, Unit::Absorbance).unwrap();

        let mut options = AnalysisOptions::default();
        options.preprocess.log_base = LogBase::Natural;
        options.preprocess.baseline = None;
        let result = Analyzer::new(options).unwrap().analyze(&sample, &refs).unwrap();
        assert_relative_eq!(result.multiplier("A").unwrap(), 0.5, epsilon = 1e-9);
    }

    #[test]
    fn clamping_without_baseline_still_applies() {
        let opts = PreprocessOptions {
            baseline: None,
            clamp_negative_absorbance: true,
            ..Default::default()
        };
        let sp = SpectrumBuffer::new(vec![1.0, 2.0, 3.0], vec![-0.1, 0.2, -0.3], Unit::Absorbance)
            .unwrap();
        assert_eq!(prepare_sample(&sp, &opts).unwrap().values(), &[0.0, 0.2, 0.0]);
    }

    #[test]
    fn batch_keeps_order_and_isolates_failures() {
        let a = band(2000.0);
        let refs = ReferenceSet::try_from_pairs([(
            "A",
            SpectrumBuffer::new(wn(), a.clone(), Unit::Absorbance).unwrap(),
        )])
        .unwrap();
        let good = |m: f64| {
            SpectrumBuffer::new(wn(), a.iter().map(|v| m * v).collect(), Unit::Absorbance).unwrap()
        };
        let far =
            SpectrumBuffer::new(vec![100.0, 110.0], vec![0.1, 0.2], Unit::Absorbance).unwrap();

        let mut options = AnalysisOptions::default();
        options.preprocess.baseline = None;
        let results = Analyzer::new(options)
            .unwrap()
            .analyze_batch(&[good(0.25), far, good(3.0)], &refs)
            .unwrap();

        assert_eq!(results.len(), 3);
        let multiplier = |i: usize| results[i].as_ref().unwrap().multiplier("A").unwrap();
        assert_relative_eq!(multiplier(0), 0.25, epsilon = 1e-9);
        assert!(results[1].is_err());
        assert_relative_eq!(multiplier(2), 3.0, epsilon = 1e-9);
    }
}
