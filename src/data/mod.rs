/// Data layer: spectrum types, reference selection, and file decoding.
///
/// Architecture:
/// ```text
///  .csv / .jdx / .json
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  parse file → LoadedSpectrum (label + SpectrumBuffer)
///   └──────────┘
///        │
///        ▼
///   ┌───────────────┐
///   │ ReferenceSet   │  id → SpectrumBuffer, insertion ordered
///   └───────────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  select   │  subset + manual multipliers → selected columns
///   └──────────┘
/// ```
///
/// `loader` is I/O glue for the binaries; the fitting core only sees
/// `model` and `select`.

pub mod loader;
pub mod model;
pub mod select;
