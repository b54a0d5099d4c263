/// Linear-mixture fitting.
///
/// ```text
///   sample (absorbance)     ReferenceSet (absorbance)
///        │                        │
///        │                 select + resample onto sample grid
///        ▼                        ▼
///   ┌─────────────────────────────────┐
///   │ engine   A m ≈ b                 │  fixed columns subtracted from b,
///   │          lstsq (SVD) or nnls     │  dependent columns screened out
///   └─────────────────────────────────┘
///        │
///        ▼
///   FitResult: multipliers, model, residual, R²
/// ```

pub mod engine;
pub mod lstsq;
pub mod nnls;
pub mod result;
