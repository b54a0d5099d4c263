use log::warn;

use crate::data::model::{SpectrumBuffer, Unit};
use crate::error::{Result, UnmixError};
use crate::options::{LogBase, NonPositivePolicy, PreprocessOptions};

/// Convert to absorbance: `A = -log(T)`.
///
/// Absorbance input is returned as an unchanged copy. Transmittance values
/// ≤ 0 are clamped to `transmittance_floor` or rejected, depending on
/// `non_positive`.
pub fn to_absorbance(buffer: &SpectrumBuffer, opts: &PreprocessOptions) -> Result<SpectrumBuffer> {
    if buffer.unit() == Unit::Absorbance {
        return Ok(buffer.clone());
    }

    let non_positive = buffer.values().iter().filter(|&&t| t <= 0.0).count();
    if non_positive > 0 {
        match opts.non_positive {
            NonPositivePolicy::Reject => {
                return Err(UnmixError::domain(
                    buffer.label(),
                    format!("{non_positive} transmittance value(s) <= 0"),
                ));
            }
            NonPositivePolicy::Clamp => warn!(
                "{}: clamping {non_positive} transmittance value(s) <= 0 to {:e}",
                buffer.label(),
                opts.transmittance_floor
            ),
        }
    }

    let floor = opts.transmittance_floor;
    let absorbance = buffer
        .values()
        .iter()
        .map(|&t| -log(t.max(floor), opts.log_base))
        .collect();
    buffer.with_values(absorbance, Unit::Absorbance)
}

/// Inverse of [`to_absorbance`]: `T = base^(-A)`.
pub fn to_transmittance(buffer: &SpectrumBuffer, log_base: LogBase) -> Result<SpectrumBuffer> {
    if buffer.unit() == Unit::Transmittance {
        return Ok(buffer.clone());
    }
    let transmittance = buffer
        .values()
        .iter()
        .map(|&a| match log_base {
            LogBase::Ten => 10f64.powf(-a),
            LogBase::Natural => (-a).exp(),
        })
        .collect();
    buffer.with_values(transmittance, Unit::Transmittance)
}

fn log(x: f64, base: LogBase) -> f64 {
    match base {
        LogBase::Ten => x.log10(),
        LogBase::Natural => x.ln(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn transmittance(values: Vec<f64>) -> SpectrumBuffer {
        let wn = (0..values.len()).map(|i| 1000.0 + i as f64).collect();
        SpectrumBuffer::new(wn, values, Unit::Transmittance).unwrap().with_label("t")
    }

    #[test]
    fn absorbance_passes_through_unchanged() {
        let sp = SpectrumBuffer::new(vec![1.0, 2.0], vec![0.3, 0.4], Unit::Absorbance).unwrap();
        let out = to_absorbance(&sp, &PreprocessOptions::default()).unwrap();
        assert_eq!(out, sp);
    }

    #[test]
    fn converts_with_base_ten() {
        let out = to_absorbance(&transmittance(vec![1.0, 0.1, 0.01]), &PreprocessOptions::default())
            .unwrap();
        assert_eq!(out.unit(), Unit::Absorbance);
        assert_relative_eq!(out.values()[0], 0.0, epsilon = 1e-12);
        assert_relative_eq!(out.values()[1], 1.0, epsilon = 1e-12);
        assert_relative_eq!(out.values()[2], 2.0, epsilon = 1e-12);
    }

    #[test]
    fn converts_with_natural_log() {
        let opts = PreprocessOptions {
            log_base: LogBase::Natural,
            ..Default::default()
        };
        let out = to_absorbance(&transmittance(vec![1.0, (-0.5f64).exp()]), &opts).unwrap();
        assert_relative_eq!(out.values()[1], 0.5, epsilon = 1e-12);
    }

    #[test]
    fn round_trip_recovers_transmittance() {
        let original = transmittance(vec![0.95, 0.5, 0.12, 0.003, 1.0]);
        for base in [LogBase::Ten, LogBase::Natural] {
            let opts = PreprocessOptions {
                log_base: base,
                ..Default::default()
            };
            let back = to_transmittance(&to_absorbance(&original, &opts).unwrap(), base).unwrap();
            for (a, b) in back.values().iter().zip(original.values()) {
                assert_relative_eq!(a, b, max_relative = 1e-12);
            }
        }
    }

    #[test]
    fn non_positive_values_are_clamped_by_default() {
        let out = to_absorbance(&transmittance(vec![0.0, -0.2, 0.5]), &PreprocessOptions::default())
            .unwrap();
        assert_relative_eq!(out.values()[0], 12.0, epsilon = 1e-9);
        assert_relative_eq!(out.values()[1], 12.0, epsilon = 1e-9);
        assert!(out.values().iter().all(|v| v.is_finite()));
    }

    #[test]
    fn non_positive_values_can_be_rejected() {
        let opts = PreprocessOptions {
            non_positive: NonPositivePolicy::Reject,
            ..Default::default()
        };
        let err = to_absorbance(&transmittance(vec![0.4, 0.0]), &opts).unwrap_err();
        assert!(matches!(err, UnmixError::Domain { .. }));
    }
}
