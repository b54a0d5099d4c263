use thiserror::Error;

/// Errors raised by the preprocessing and fitting core.
///
/// Recoverable per-window baseline problems never surface here; they are
/// logged and skipped.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum UnmixError {
    /// A transmittance value cannot be log-converted.
    #[error("Domain error in '{spectrum}': {message}")]
    Domain { spectrum: String, message: String },

    /// A reference does not cover any part of the sample grid.
    #[error(
        "Alignment error: reference '{reference}' spans {ref_lo}..{ref_hi} cm-1, \
         sample spans {target_lo}..{target_hi} cm-1"
    )]
    Alignment {
        reference: String,
        ref_lo: f64,
        ref_hi: f64,
        target_lo: f64,
        target_hi: f64,
    },

    /// The design matrix is rank-deficient beyond tolerance.
    #[error("Singular design matrix: '{dependent}' is linearly dependent on earlier references")]
    SingularMatrix { dependent: String },

    /// Options refer to something that is not there, or are out of range.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A `SpectrumBuffer` invariant was violated at construction.
    #[error("Invalid spectrum: {0}")]
    InvalidSpectrum(String),

    /// NaN or infinity in a solved quantity.
    #[error("Non-finite {quantity} for '{id}'")]
    NonFinite { quantity: &'static str, id: String },

    /// The active-set solver hit its iteration cap.
    #[error("Non-negative solve did not converge after {iterations} iterations")]
    NotConverged { iterations: usize },
}

impl UnmixError {
    pub fn config(message: impl Into<String>) -> Self {
        UnmixError::Config(message.into())
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        UnmixError::InvalidSpectrum(message.into())
    }

    pub fn domain(spectrum: impl Into<String>, message: impl Into<String>) -> Self {
        UnmixError::Domain {
            spectrum: spectrum.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, UnmixError>;
