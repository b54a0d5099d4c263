//! Decompose a measured IR absorbance spectrum into a linear combination of
//! reference spectra.
//!
//! The core takes parsed `(wavenumber, value)` buffers and returns per-reference
//! multipliers with fit diagnostics:
//!
//! ```text
//!   raw sample ─┐
//!               ├─ units ─ baseline ─┐
//!   references ─┘                    ├─ resample ─ fit ─▶ FitResult
//!               └─ units ────────────┘
//! ```
//!
//! File decoding (`data::loader`) and text/JSON rendering (`report`) are
//! conveniences for the command-line tools and are not used by the core.

pub mod data;
pub mod error;
pub mod fit;
pub mod options;
pub mod pipeline;
pub mod preprocess;
pub mod report;

pub use data::model::{Direction, ReferenceSet, SpectrumBuffer, Unit};
pub use error::{Result, UnmixError};
pub use fit::engine::FitEngine;
pub use fit::result::{Constituent, ConstituentStatus, FitResult};
pub use options::{
    AnalysisOptions, BaselineStrategy, Extrapolation, FitOptions, LogBase, NonPositivePolicy,
    PreprocessOptions, RankPolicy,
};
pub use pipeline::Analyzer;
