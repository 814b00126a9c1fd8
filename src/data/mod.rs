/// Data layer: measurement types, column loading, and frequency filtering.
///
/// Architecture:
/// ```text
///  *.dat column files
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  parse columns → Measurement, file-name metadata
///   └──────────┘
///        │
///        ▼
///   ┌─────────────┐
///   │ Measurement  │  SpectralColumns | TimeSeries  →  Spectrum
///   └─────────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  filter   │  keep bins inside [f_min, f_max]
///   └──────────┘
/// ```

pub mod filter;
pub mod loader;
pub mod model;
