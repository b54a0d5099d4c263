use log::{debug, warn};

use crate::data::model::{SpectrumBuffer, Unit};
use crate::error::{Result, UnmixError};
use crate::options::BaselineStrategy;

/// A straight baseline `offset + slope * wavenumber`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearBaseline {
    pub offset: f64,
    pub slope: f64,
}

impl LinearBaseline {
    pub const ZERO: LinearBaseline = LinearBaseline {
        offset: 0.0,
        slope: 0.0,
    };

    pub fn at(&self, wavenumber: f64) -> f64 {
        self.offset + self.slope * wavenumber
    }
}

/// Estimate the baseline of an absorbance buffer.
///
/// Each usable window contributes one anchor: the mean wavenumber and mean
/// absorbance of the samples inside it. Two or more anchors give a
/// least-squares line; a single anchor gives a constant. Returns `None` when
/// no window contains any sample.
pub fn estimate(buffer: &SpectrumBuffer, strategy: &BaselineStrategy) -> Option<LinearBaseline> {
    let anchors = anchors(buffer, strategy);
    match anchors.len() {
        0 => None,
        1 => {
            warn!(
                "{}: only one usable baseline window, subtracting a constant",
                buffer.label()
            );
            Some(LinearBaseline {
                offset: anchors[0].1,
                slope: 0.0,
            })
        }
        _ => Some(line_through(&anchors)),
    }
}

/// Subtract the estimated baseline from every sample.
///
/// With `clamp_negative` set, values that end up below zero are set to zero.
/// The buffer must already be in absorbance.
pub fn correct(
    buffer: &SpectrumBuffer,
    strategy: &BaselineStrategy,
    clamp_negative: bool,
) -> Result<SpectrumBuffer> {
    if buffer.unit() != Unit::Absorbance {
        return Err(UnmixError::domain(
            buffer.label(),
            "baseline correction requires absorbance; convert first",
        ));
    }

    let baseline = estimate(buffer, strategy).unwrap_or_else(|| {
        warn!("{}: no usable baseline window, baseline left in place", buffer.label());
        LinearBaseline::ZERO
    });
    debug!(
        "{}: baseline offset {:.6e}, slope {:.6e}",
        buffer.label(),
        baseline.offset,
        baseline.slope
    );

    let corrected: Vec<f64> = buffer
        .wavenumbers()
        .iter()
        .zip(buffer.values())
        .map(|(&w, &v)| {
            let c = v - baseline.at(w);
            if clamp_negative {
                c.max(0.0)
            } else {
                c
            }
        })
        .collect();

    buffer.with_values(corrected, Unit::Absorbance)
}

/// Zero every negative absorbance value.
pub fn clamp_negative(buffer: &SpectrumBuffer) -> Result<SpectrumBuffer> {
    let clamped = buffer.values().iter().map(|v| v.max(0.0)).collect();
    buffer.with_values(clamped, buffer.unit())
}

fn anchors(buffer: &SpectrumBuffer, strategy: &BaselineStrategy) -> Vec<(f64, f64)> {
    let wn = buffer.wavenumbers();
    let values = buffer.values();

    match strategy {
        BaselineStrategy::Edges { fraction, min_points } => {
            let n = values.len();
            let points = ((fraction * n as f64) as usize).max(*min_points).clamp(1, n);
            vec![
                mean_point(&wn[..points], &values[..points]),
                mean_point(&wn[n - points..], &values[n - points..]),
            ]
        }
        BaselineStrategy::Windows(windows) => windows
            .iter()
            .filter_map(|&(lo, hi)| {
                let (ws, vs): (Vec<f64>, Vec<f64>) = wn
                    .iter()
                    .zip(values)
                    .filter(|(&w, _)| w >= lo && w <= hi)
                    .map(|(&w, &v)| (w, v))
                    .unzip();
                if ws.is_empty() {
                    warn!(
                        "{}: baseline window {lo}..{hi} cm-1 holds no samples, skipped",
                        buffer.label()
                    );
                    None
                } else {
                    Some(mean_point(&ws, &vs))
                }
            })
            .collect(),
    }
}

fn mean_point(wn: &[f64], values: &[f64]) -> (f64, f64) {
    let n = wn.len() as f64;
    (wn.iter().sum::<f64>() / n, values.iter().sum::<f64>() / n)
}

/// Ordinary least-squares line through `(x, y)` anchors.
/// Falls back to the mean when every anchor shares one x.
fn line_through(points: &[(f64, f64)]) -> LinearBaseline {
    let n = points.len() as f64;
    let mean_x = points.iter().map(|p| p.0).sum::<f64>() / n;
    let mean_y = points.iter().map(|p| p.1).sum::<f64>() / n;

    let sxx: f64 = points.iter().map(|p| (p.0 - mean_x).powi(2)).sum();
    if sxx <= f64::EPSILON * mean_x.abs().max(1.0) {
        return LinearBaseline {
            offset: mean_y,
            slope: 0.0,
        };
    }
    let sxy: f64 = points.iter().map(|p| (p.0 - mean_x) * (p.1 - mean_y)).sum();
    let slope = sxy / sxx;
    LinearBaseline {
        offset: mean_y - slope * mean_x,
        slope,
    }
}
