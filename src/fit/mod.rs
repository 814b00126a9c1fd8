/// Fitting layer: lineshape, seed estimation, and the least-squares solver.
///
/// ```text
///   Spectrum ──► guess ──► seed [f0, A, γ, φ] (+ zero background)
///      │                        │
///      └──── vectorise ────► engine (Levenberg–Marquardt on lorentz model)
///                                │
///                                ▼
///                    FitResult { parameters, covariance }
/// ```

pub mod engine;
pub mod guess;
pub mod lorentz;
