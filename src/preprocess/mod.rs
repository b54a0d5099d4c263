/// Spectral preprocessing: every step maps a buffer to a new buffer.
///
/// Order used by the pipeline:
/// ```text
///   raw buffer (transmittance or absorbance)
///        │
///        ▼
///   ┌──────────┐
///   │  units    │  T → A = -log(T)
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │ baseline  │  subtract linear baseline (sample only), optional clamp
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │ resample  │  references onto the sample grid
///   └──────────┘
/// ```

pub mod baseline;
pub mod resample;
pub mod units;
