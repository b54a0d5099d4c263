use log::debug;

use crate::data::model::{Direction, SpectrumBuffer};
use crate::error::{Result, UnmixError};
use crate::options::Extrapolation;

/// Interpolate `reference` onto the `target` wavenumber grid.
///
/// Piecewise-linear between reference knots, exact at the knots. Targets
/// outside the reference's range take the nearest boundary value
/// (`Extrapolation::Hold`) rather than continuing the end segment, which
/// would overshoot; `Extrapolation::Zero` sets them to zero instead.
/// Duplicate reference wavenumbers are averaged first.
///
/// The output follows the target's own ordering. Fails with `Alignment` when
/// the two ranges do not overlap at all.
pub fn resample(
    reference: &SpectrumBuffer,
    target: &[f64],
    extrapolation: Extrapolation,
) -> Result<SpectrumBuffer> {
    let knots = Knots::from_buffer(reference);
    let (ref_lo, ref_hi) = knots.range();

    let (target_lo, target_hi) = target
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &t| (lo.min(t), hi.max(t)));
    if target_hi < ref_lo || target_lo > ref_hi {
        return Err(UnmixError::Alignment {
            reference: reference.label().to_string(),
            ref_lo,
            ref_hi,
            target_lo,
            target_hi,
        });
    }

    let mut outside = 0usize;
    let values: Vec<f64> = target
        .iter()
        .map(|&t| match knots.eval(t) {
            Some(v) => v,
            None => {
                outside += 1;
                match extrapolation {
                    Extrapolation::Zero => 0.0,
                    Extrapolation::Hold if t < ref_lo => knots.ys[0],
                    Extrapolation::Hold => knots.ys[knots.ys.len() - 1],
                }
            }
        })
        .collect();

    if outside > 0 {
        debug!(
            "{}: {outside} of {} target points outside {ref_lo}..{ref_hi} cm-1 ({:?})",
            reference.label(),
            target.len(),
            extrapolation
        );
    }

    let aligned = SpectrumBuffer::new(target.to_vec(), values, reference.unit())?;
    Ok(aligned.with_label(reference.label()))
}

/// Strictly ascending interpolation knots.
struct Knots {
    xs: Vec<f64>,
    ys: Vec<f64>,
}

impl Knots {
    fn from_buffer(buffer: &SpectrumBuffer) -> Self {
        let mut pairs: Vec<(f64, f64)> = buffer
            .wavenumbers()
            .iter()
            .copied()
            .zip(buffer.values().iter().copied())
            .collect();
        if buffer.direction() == Direction::Descending {
            pairs.reverse();
        }

        let mut xs: Vec<f64> = Vec::with_capacity(pairs.len());
        let mut ys: Vec<f64> = Vec::with_capacity(pairs.len());
        let mut i = 0;
        while i < pairs.len() {
            let x = pairs[i].0;
            let mut j = i;
            let mut sum = 0.0;
            while j < pairs.len() && pairs[j].0 == x {
                sum += pairs[j].1;
                j += 1;
            }
            xs.push(x);
            ys.push(sum / (j - i) as f64);
            i = j;
        }
        Knots { xs, ys }
    }

    fn range(&self) -> (f64, f64) {
        (self.xs[0], self.xs[self.xs.len() - 1])
    }

    /// Interpolated value, or `None` outside the knot range.
    fn eval(&self, t: f64) -> Option<f64> {
        let (lo, hi) = self.range();
        if t < lo || t > hi {
            return None;
        }
        // First knot strictly greater than t.
        let i = self.xs.partition_point(|&x| x <= t);
        if i == self.xs.len() {
            return Some(self.ys[i - 1]);
        }
        let (x0, x1) = (self.xs[i - 1], self.xs[i]);
        let (y0, y1) = (self.ys[i - 1], self.ys[i]);
        Some(y0 + (t - x0) * (y1 - y0) / (x1 - x0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::Unit;
    use approx::assert_relative_eq;

    fn reference() -> SpectrumBuffer {
        SpectrumBuffer::new(
            vec![1000.0, 1010.0, 1020.0, 1030.0, 1040.0],
            vec![0.0, 0.4, 1.0, 0.3, 0.1],
            Unit::Absorbance,
        )
        .unwrap()
        .with_label("ref")
    }

    #[test]
    fn exact_at_knots() {
        let r = reference();
        let out = resample(&r, r.wavenumbers(), Extrapolation::Hold).unwrap();
        assert_eq!(out.values(), r.values());
    }

    #[test]
    fn linear_between_knots() {
        let out = resample(&reference(), &[1005.0, 1015.0, 1037.5], Extrapolation::Hold).unwrap();
        assert_relative_eq!(out.values()[0], 0.2, epsilon = 1e-12);
        assert_relative_eq!(out.values()[1], 0.7, epsilon = 1e-12);
        assert_relative_eq!(out.values()[2], 0.15, epsilon = 1e-12);
    }

    #[test]
    fn holds_boundary_values_outside_range() {
        let target = [900.0, 1000.0, 1040.0, 1100.0];
        let out = resample(&reference(), &target, Extrapolation::Hold).unwrap();
        assert_eq!(out.values(), &[0.0, 0.0, 0.1, 0.1]);
    }

    #[test]
    fn zero_extrapolation() {
        let out = resample(&reference(), &[990.0, 1020.0, 1050.0], Extrapolation::Zero).unwrap();
        assert_eq!(out.values(), &[0.0, 1.0, 0.0]);
    }

    #[test]
    fn descending_reference_and_target_keep_target_order() {
        let (wn, v) = reference().into_parts();
        let rev = SpectrumBuffer::new(
            wn.into_iter().rev().collect(),
            v.into_iter().rev().collect(),
            Unit::Absorbance,
        )
        .unwrap();
        let target = [1040.0, 1025.0, 1010.0, 995.0];
        let out = resample(&rev, &target, Extrapolation::Hold).unwrap();
        assert_eq!(out.wavenumbers(), &target);
        assert_eq!(out.direction(), Direction::Descending);
        assert_relative_eq!(out.values()[0], 0.1, epsilon = 1e-12);
        assert_relative_eq!(out.values()[1], 0.65, epsilon = 1e-12);
        assert_relative_eq!(out.values()[2], 0.4, epsilon = 1e-12);
        assert_relative_eq!(out.values()[3], 0.0, epsilon = 1e-12);
    }

    #[test]
    fn duplicate_wavenumbers_are_averaged() {
        let r = SpectrumBuffer::new(
            vec![1.0, 2.0, 2.0, 3.0],
            vec![0.0, 1.0, 3.0, 0.0],
            Unit::Absorbance,
        )
        .unwrap();
        let out = resample(&r, &[1.5, 2.0, 2.5], Extrapolation::Hold).unwrap();
        assert_relative_eq!(out.values()[0], 1.0, epsilon = 1e-12);
        assert_relative_eq!(out.values()[1], 2.0, epsilon = 1e-12);
        assert_relative_eq!(out.values()[2], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn in_range_values_stay_within_reference_bounds() {
        let r = reference();
        let (lo, hi) = r.value_range();
        let target: Vec<f64> = (0..=400).map(|i| 1000.0 + 0.1 * i as f64).collect();
        let out = resample(&r, &target, Extrapolation::Hold).unwrap();
        assert!(out.values().iter().all(|&v| v >= lo && v <= hi));
    }

    #[test]
    fn disjoint_ranges_fail_to_align() {
        let err = resample(&reference(), &[2000.0, 2010.0], Extrapolation::Hold).unwrap_err();
        assert!(matches!(err, UnmixError::Alignment { .. }));
    }
}
