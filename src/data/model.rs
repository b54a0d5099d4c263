use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, UnmixError};

// ---------------------------------------------------------------------------
// Unit – what the value axis holds
// ---------------------------------------------------------------------------

/// Physical quantity on the value axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Unit {
    Absorbance,
    Transmittance,
}

impl Unit {
    /// Map a free-text unit label (JCAMP-DX `##YUNITS`, CLI flags) to a `Unit`.
    pub fn parse_label(label: &str) -> Option<Unit> {
        match label.trim().to_ascii_uppercase().as_str() {
            "ABSORBANCE" | "A" | "ABS" => Some(Unit::Absorbance),
            "TRANSMITTANCE" | "T" | "TRANS" => Some(Unit::Transmittance),
            _ => None,
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Unit::Absorbance => write!(f, "absorbance"),
            Unit::Transmittance => write!(f, "transmittance"),
        }
    }
}

/// Ordering of the wavenumber axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Ascending,
    Descending,
}

// ---------------------------------------------------------------------------
// SpectrumBuffer – one spectrum on its own grid
// ---------------------------------------------------------------------------

/// Index-aligned wavenumber (cm⁻¹) and value arrays.
///
/// Invariants checked at construction:
/// * both arrays have the same length, at least 2;
/// * every entry is finite;
/// * wavenumbers are monotonic (ascending or descending) and span a
///   non-zero range. Repeated wavenumbers are tolerated; the resampler
///   averages them.
///
/// The buffer is immutable. Transformations return new buffers.
#[derive(Debug, Clone, PartialEq)]
pub struct SpectrumBuffer {
    label: String,
    wavenumbers: Vec<f64>,
    values: Vec<f64>,
    unit: Unit,
    direction: Direction,
}

impl SpectrumBuffer {
    pub fn new(wavenumbers: Vec<f64>, values: Vec<f64>, unit: Unit) -> Result<Self> {
        if wavenumbers.len() != values.len() {
            return Err(UnmixError::invalid(format!(
                "{} wavenumbers but {} values",
                wavenumbers.len(),
                values.len()
            )));
        }
        if wavenumbers.len() < 2 {
            return Err(UnmixError::invalid(format!(
                "need at least 2 points, got {}",
                wavenumbers.len()
            )));
        }
        if let Some(i) = wavenumbers.iter().position(|w| !w.is_finite()) {
            return Err(UnmixError::invalid(format!("wavenumber[{i}] is not finite")));
        }
        if let Some(i) = values.iter().position(|v| !v.is_finite()) {
            return Err(UnmixError::invalid(format!("value[{i}] is not finite")));
        }
        let direction = monotonic_direction(&wavenumbers)?;

        Ok(SpectrumBuffer {
            label: String::new(),
            wavenumbers,
            values,
            unit,
            direction,
        })
    }

    /// Attach a human-readable label used in logs and error messages.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// New buffer on the same grid with different values.
    pub fn with_values(&self, values: Vec<f64>, unit: Unit) -> Result<Self> {
        let buffer = SpectrumBuffer::new(self.wavenumbers.clone(), values, unit)?;
        Ok(buffer.with_label(self.label.clone()))
    }

    pub fn label(&self) -> &str {
        if self.label.is_empty() {
            "<unnamed>"
        } else {
            &self.label
        }
    }

    pub fn wavenumbers(&self) -> &[f64] {
        &self.wavenumbers
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn unit(&self) -> Unit {
        self.unit
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Number of points.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Always false for a constructed buffer; present for API symmetry.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// `(lowest, highest)` wavenumber.
    pub fn wavenumber_range(&self) -> (f64, f64) {
        let first = self.wavenumbers[0];
        let last = self.wavenumbers[self.wavenumbers.len() - 1];
        match self.direction {
            Direction::Ascending => (first, last),
            Direction::Descending => (last, first),
        }
    }

    /// `(min, max)` of the value axis.
    pub fn value_range(&self) -> (f64, f64) {
        self.values
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)))
    }

    pub fn into_parts(self) -> (Vec<f64>, Vec<f64>) {
        (self.wavenumbers, self.values)
    }
}

fn monotonic_direction(wavenumbers: &[f64]) -> Result<Direction> {
    let mut rising = false;
    let mut falling = false;
    for pair in wavenumbers.windows(2) {
        if pair[1] > pair[0] {
            rising = true;
        } else if pair[1] < pair[0] {
            falling = true;
        }
    }
    match (rising, falling) {
        (true, false) => Ok(Direction::Ascending),
        (false, true) => Ok(Direction::Descending),
        (true, true) => Err(UnmixError::invalid("wavenumbers are not monotonic")),
        (false, false) => Err(UnmixError::invalid("wavenumbers span a zero-width range")),
    }
}

// ---------------------------------------------------------------------------
// ReferenceSet – named reference spectra in insertion order
// ---------------------------------------------------------------------------

/// Reference spectra keyed by identifier (species name).
///
/// Keys are unique. Iteration follows insertion order so reports and the
/// design-matrix column order are deterministic.
#[derive(Debug, Clone, Default)]
pub struct ReferenceSet {
    entries: Vec<(String, SpectrumBuffer)>,
}

impl ReferenceSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a reference. Fails with `Config` if the id is already present.
    pub fn insert(&mut self, id: impl Into<String>, spectrum: SpectrumBuffer) -> Result<()> {
        let id = id.into();
        if self.contains(&id) {
            return Err(UnmixError::config(format!("duplicate reference id '{id}'")));
        }
        self.entries.push((id, spectrum));
        Ok(())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == id)
    }

    pub fn position(&self, id: &str) -> Option<usize> {
        self.entries.iter().position(|(k, _)| k == id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SpectrumBuffer)> {
        self.entries.iter().map(|(k, s)| (k.as_str(), s))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Build a set from `(id, spectrum)` pairs, rejecting duplicate ids.
    pub fn try_from_pairs<I, S>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, SpectrumBuffer)>,
        S: Into<String>,
    {
        let mut set = ReferenceSet::new();
        for (id, spectrum) in pairs {
            set.insert(id, spectrum)?;
        }
        Ok(set)
    }
}
