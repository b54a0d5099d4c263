use std::fmt::Write as _;

use serde::Serialize;

use crate::fit::result::{ConstituentStatus, FitResult};

// ---------------------------------------------------------------------------
// Serializable report
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct ConstituentReport {
    pub id: String,
    pub multiplier: f64,
    pub status: ConstituentStatus,
}

/// Every curve a plot of the fit needs, all on the sample grid.
#[derive(Debug, Clone, Serialize)]
pub struct Curves {
    pub wavenumber: Vec<f64>,
    pub sample: Vec<f64>,
    pub model: Vec<f64>,
    pub residual: Vec<f64>,
    /// `(id, m_i * r_i)` per constituent.
    pub constituents: Vec<(String, Vec<f64>)>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FitReport {
    pub sample: String,
    pub r_squared: Option<f64>,
    pub rmse: f64,
    pub ss_res: f64,
    pub ss_tot: f64,
    /// Sorted by multiplier, largest first.
    pub constituents: Vec<ConstituentReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub curves: Option<Curves>,
}

impl FitReport {
    pub fn new(sample: &str, result: &FitResult, with_curves: bool) -> Self {
        let mut constituents: Vec<ConstituentReport> = result
            .constituents()
            .iter()
            .map(|c| ConstituentReport {
                id: c.id.clone(),
                multiplier: c.multiplier,
                status: c.status,
            })
            .collect();
        constituents.sort_by(|a, b| b.multiplier.total_cmp(&a.multiplier));

        let curves = with_curves.then(|| Curves {
            wavenumber: result.wavenumbers().to_vec(),
            sample: result.sample().values().to_vec(),
            model: result.model().values().to_vec(),
            residual: result.residual().values().to_vec(),
            constituents: result
                .constituents()
                .iter()
                .map(|c| (c.id.clone(), c.contribution()))
                .collect(),
        });

        FitReport {
            sample: sample.to_string(),
            r_squared: result.r_squared(),
            rmse: result.rmse(),
            ss_res: result.ss_res(),
            ss_tot: result.ss_tot(),
            constituents,
            curves,
        }
    }

    /// Plain-text summary for the terminal.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Sample: {}", self.sample);
        match self.r_squared {
            Some(r2) => {
                let _ = writeln!(out, "  R²   = {r2:.4}");
            }
            None => {
                let _ = writeln!(out, "  R²   = undefined (sample has no variance)");
            }
        }
        let _ = writeln!(out, "  RMSE = {:.4e}", self.rmse);

        let width = self
            .constituents
            .iter()
            .map(|c| c.id.len())
            .max()
            .unwrap_or(0)
            .max("Reference".len());
        let _ = writeln!(out, "  {:<width$}  {:>12}  Status", "Reference", "Multiplier");
        for c in &self.constituents {
            let status = match c.status {
                ConstituentStatus::Fitted => "fitted",
                ConstituentStatus::Fixed => "fixed",
                ConstituentStatus::Dropped => "dropped (dependent)",
            };
            let _ = writeln!(out, "  {:<width$}  {:>12.4}  {status}", c.id, c.multiplier);
        }
        out
    }
}
