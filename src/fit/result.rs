use serde::Serialize;

use crate::data::model::SpectrumBuffer;

// ---------------------------------------------------------------------------
// Constituent – one reference's share of the fit
// ---------------------------------------------------------------------------

/// How a constituent's multiplier was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConstituentStatus {
    /// Solved by least squares.
    Fitted,
    /// Taken from the manual multiplier overrides.
    Fixed,
    /// Linearly dependent on an earlier reference; multiplier forced to 0.
    Dropped,
}

/// A reference aligned onto the sample grid together with its multiplier.
#[derive(Debug, Clone, PartialEq)]
pub struct Constituent {
    pub id: String,
    pub multiplier: f64,
    pub status: ConstituentStatus,
    /// Reference values resampled onto the sample grid.
    pub aligned: Vec<f64>,
}

impl Constituent {
    /// `multiplier * aligned`, the curve this reference contributes.
    pub fn contribution(&self) -> Vec<f64> {
        self.aligned.iter().map(|v| v * self.multiplier).collect()
    }
}

// ---------------------------------------------------------------------------
// FitResult
// ---------------------------------------------------------------------------

/// Outcome of one fit. Owns copies of everything it reports.
#[derive(Debug, Clone, PartialEq)]
pub struct FitResult {
    pub(crate) sample: SpectrumBuffer,
    pub(crate) constituents: Vec<Constituent>,
    pub(crate) model: SpectrumBuffer,
    pub(crate) residual: SpectrumBuffer,
    pub(crate) ss_res: f64,
    pub(crate) ss_tot: f64,
    pub(crate) r_squared: Option<f64>,
}

impl FitResult {
    /// The preprocessed sample the fit was computed against.
    pub fn sample(&self) -> &SpectrumBuffer {
        &self.sample
    }

    pub fn wavenumbers(&self) -> &[f64] {
        self.sample.wavenumbers()
    }

    /// Constituents in reference-set order.
    pub fn constituents(&self) -> &[Constituent] {
        &self.constituents
    }

    pub fn constituent(&self, id: &str) -> Option<&Constituent> {
        self.constituents.iter().find(|c| c.id == id)
    }

    /// `(id, multiplier)` pairs in reference-set order.
    pub fn multipliers(&self) -> Vec<(&str, f64)> {
        self.constituents
            .iter()
            .map(|c| (c.id.as_str(), c.multiplier))
            .collect()
    }

    pub fn multiplier(&self, id: &str) -> Option<f64> {
        self.constituent(id).map(|c| c.multiplier)
    }

    /// `Σ m_i r_i` on the sample grid.
    pub fn model(&self) -> &SpectrumBuffer {
        &self.model
    }

    /// `sample - model`.
    pub fn residual(&self) -> &SpectrumBuffer {
        &self.residual
    }

    pub fn ss_res(&self) -> f64 {
        self.ss_res
    }

    pub fn ss_tot(&self) -> f64 {
        self.ss_tot
    }

    /// Coefficient of determination; `None` when the sample has no variance.
    pub fn r_squared(&self) -> Option<f64> {
        self.r_squared
    }

    /// Root mean square of the residual.
    pub fn rmse(&self) -> f64 {
        (self.ss_res / self.residual.len() as f64).sqrt()
    }

    pub fn dropped(&self) -> Vec<&str> {
        self.with_status(ConstituentStatus::Dropped)
    }

    pub fn fixed(&self) -> Vec<&str> {
        self.with_status(ConstituentStatus::Fixed)
    }

    fn with_status(&self, status: ConstituentStatus) -> Vec<&str> {
        self.constituents
            .iter()
            .filter(|c| c.status == status)
            .map(|c| c.id.as_str())
            .collect()
    }
}
