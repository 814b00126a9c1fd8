//! Complex Lorentzian lineshape and its real-vector form.
//!
//! The least-squares solver only handles real residuals, so every complex
//! model is flattened to `[Re(z_0..z_n), Im(z_0..z_n)]` before fitting.

use std::fmt;

use nalgebra::{DMatrix, DVector};
use num_complex::Complex64;
use serde::{Deserialize, Serialize};

/// Parameters of the bare Lorentzian: `[f0, A, γ, φ]`.
pub const LORENTZ_PARAMS: usize = 4;

/// Extra parameters of the linear background: `[a_re, b_re, a_im, b_im]`.
pub const BACKGROUND_PARAMS: usize = 4;

/// A single complex Lorentzian resonance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Lorentzian {
    /// Resonant frequency in Hz.
    pub f0: f64,
    pub amplitude: f64,
    /// Half-width (damping rate) in Hz.
    pub gamma: f64,
    /// Phase in radians.
    pub phase: f64,
}

impl Lorentzian {
    /// Take `[f0, A, γ, φ]` from the front of a parameter slice.
    ///
    /// # Panics
    /// If `params` holds fewer than [`LORENTZ_PARAMS`] values.
    pub fn from_params(params: &[f64]) -> Self {
        Self {
            f0: params[0],
            amplitude: params[1],
            gamma: params[2],
            phase: params[3],
        }
    }

    pub fn to_params(&self) -> [f64; LORENTZ_PARAMS] {
        [self.f0, self.amplitude, self.gamma, self.phase]
    }

    /// `A·e^{iφ}·(γ − i(f−f0)) / (γ² + (f−f0)²)`. Undefined at `f == f0` when `γ == 0`.
    pub fn eval(&self, f: f64) -> Complex64 {
        complex_lorentz(f, self.f0, self.amplitude, self.gamma, self.phase)
    }
}

/// Complex-linear background `(a_re + i·a_im)·f + (b_re + i·b_im)`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LinearBackground {
    pub slope_re: f64,
    pub offset_re: f64,
    pub slope_im: f64,
    pub offset_im: f64,
}

impl LinearBackground {
    /// Take `[a_re, b_re, a_im, b_im]` from a parameter slice.
    ///
    /// # Panics
    /// If `params` holds fewer than [`BACKGROUND_PARAMS`] values.
    pub fn from_params(params: &[f64]) -> Self {
        Self {
            slope_re: params[0],
            offset_re: params[1],
            slope_im: params[2],
            offset_im: params[3],
        }
    }

    pub fn to_params(&self) -> [f64; BACKGROUND_PARAMS] {
        [self.slope_re, self.offset_re, self.slope_im, self.offset_im]
    }

    pub fn eval(&self, f: f64) -> Complex64 {
        Complex64::new(self.slope_re, self.slope_im) * f
            + Complex64::new(self.offset_re, self.offset_im)
    }
}

pub fn complex_lorentz(f: f64, f0: f64, amplitude: f64, gamma: f64, phase: f64) -> Complex64 {
    let detuning = f - f0;
    amplitude * Complex64::from_polar(1.0, phase) * Complex64::new(gamma, -detuning)
        / (gamma * gamma + detuning * detuning)
}

pub fn complex_lorentz_with_background(
    f: f64,
    lorentz: &Lorentzian,
    background: &LinearBackground,
) -> Complex64 {
    lorentz.eval(f) + background.eval(f)
}

/// `[Re(L(f)), Im(L(f))]` over `freq`; length `2·freq.len()`.
pub fn vector_model(freq: &[f64], lorentz: &Lorentzian) -> Vec<f64> {
    flatten(freq.iter().map(|&f| lorentz.eval(f)), freq.len())
}

/// Vector form of [`complex_lorentz_with_background`].
pub fn vector_model_with_background(
    freq: &[f64],
    lorentz: &Lorentzian,
    background: &LinearBackground,
) -> Vec<f64> {
    flatten(
        freq.iter()
            .map(|&f| complex_lorentz_with_background(f, lorentz, background)),
        freq.len(),
    )
}

/// Concatenate real parts then imaginary parts.
pub fn flatten(values: impl Iterator<Item = Complex64>, len: usize) -> Vec<f64> {
    let mut out = vec![0.0; 2 * len];
    for (i, z) in values.take(len).enumerate() {
        out[i] = z.re;
        out[len + i] = z.im;
    }
    out
}

// ---------------------------------------------------------------------------
// ModelVariant – which parameter vector the solver works on
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelVariant {
    /// `[f0, A, γ, φ]`
    #[default]
    Plain,
    /// `[f0, A, γ, φ, a_re, b_re, a_im, b_im]`
    LinearBackground,
}

impl ModelVariant {
    pub fn param_count(self) -> usize {
        match self {
            ModelVariant::Plain => LORENTZ_PARAMS,
            ModelVariant::LinearBackground => LORENTZ_PARAMS + BACKGROUND_PARAMS,
        }
    }

    /// Complex model value at `f`. `params` must hold [`Self::param_count`] values.
    pub fn eval(self, f: f64, params: &[f64]) -> Complex64 {
        let lorentz = Lorentzian::from_params(params);
        match self {
            ModelVariant::Plain => lorentz.eval(f),
            ModelVariant::LinearBackground => {
                let background = LinearBackground::from_params(&params[LORENTZ_PARAMS..]);
                complex_lorentz_with_background(f, &lorentz, &background)
            }
        }
    }

    /// Real-vector model over `freq`.
    pub fn vectorize(self, freq: &[f64], params: &[f64]) -> DVector<f64> {
        DVector::from_vec(flatten(
            freq.iter().map(|&f| self.eval(f, params)),
            freq.len(),
        ))
    }

    /// Analytic Jacobian of [`Self::vectorize`], shape `(2·freq.len(), param_count)`.
    ///
    /// With `D = γ + i(f − f0)` the Lorentzian is `L = A·e^{iφ}/D`, so
    /// `∂L/∂f0 = iL/D`, `∂L/∂A = e^{iφ}/D`, `∂L/∂γ = −L/D` and `∂L/∂φ = iL`.
    pub fn jacobian(self, freq: &[f64], params: &[f64]) -> DMatrix<f64> {
        let n = freq.len();
        let lorentz = Lorentzian::from_params(params);
        let rotation = Complex64::from_polar(1.0, lorentz.phase);
        let i = Complex64::i();
        let mut jac = DMatrix::zeros(2 * n, self.param_count());

        for (row, &f) in freq.iter().enumerate() {
            let denom = Complex64::new(lorentz.gamma, f - lorentz.f0);
            let value = lorentz.amplitude * rotation / denom;
            let partials = [
                i * value / denom,
                rotation / denom,
                -value / denom,
                i * value,
            ];
            for (col, d) in partials.iter().enumerate() {
                jac[(row, col)] = d.re;
                jac[(n + row, col)] = d.im;
            }
            if self == ModelVariant::LinearBackground {
                jac[(row, LORENTZ_PARAMS)] = f;
                jac[(row, LORENTZ_PARAMS + 1)] = 1.0;
                jac[(n + row, LORENTZ_PARAMS + 2)] = f;
                jac[(n + row, LORENTZ_PARAMS + 3)] = 1.0;
            }
        }
        jac
    }
}

impl fmt::Display for ModelVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelVariant::Plain => write!(f, "lorentzian"),
            ModelVariant::LinearBackground => write!(f, "lorentzian + linear background"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn on_resonance_value_is_real_amplitude_over_gamma() {
        let z = complex_lorentz(5.0, 5.0, 50.0, 0.25, 0.0);
        assert_relative_eq!(z.re, 200.0);
        assert_relative_eq!(z.im, 0.0);
    }

    #[test]
    fn phase_rotates_the_response() {
        let plain = complex_lorentz(5.3, 5.0, 2.0, 0.4, 0.0);
        let rotated = complex_lorentz(5.3, 5.0, 2.0, 0.4, 0.7);
        assert_relative_eq!(rotated.norm(), plain.norm(), epsilon = 1e-12);
        assert_relative_eq!(rotated.arg() - plain.arg(), 0.7, epsilon = 1e-12);
    }

    #[test]
    fn vector_model_splits_real_and_imaginary() {
        let lorentz = Lorentzian {
            f0: 1.0,
            amplitude: 3.0,
            gamma: 0.5,
            phase: 0.2,
        };
        let freq = [0.5, 1.0, 1.5];
        let v = vector_model(&freq, &lorentz);
        assert_eq!(v.len(), 6);
        for (k, &f) in freq.iter().enumerate() {
            assert_eq!(v[k], lorentz.eval(f).re);
            assert_eq!(v[3 + k], lorentz.eval(f).im);
        }
    }

    #[test]
    fn background_adds_to_each_half() {
        let lorentz = Lorentzian {
            f0: 2.0,
            amplitude: 1.0,
            gamma: 0.1,
            phase: 0.0,
        };
        let background = LinearBackground {
            slope_re: 0.5,
            offset_re: -1.0,
            slope_im: 2.0,
            offset_im: 3.0,
        };
        let freq = [1.0, 2.5];
        let bare = vector_model(&freq, &lorentz);
        let with = vector_model_with_background(&freq, &lorentz, &background);
        assert_relative_eq!(with[0] - bare[0], 0.5 * 1.0 - 1.0);
        assert_relative_eq!(with[1] - bare[1], 0.5 * 2.5 - 1.0);
        assert_relative_eq!(with[2] - bare[2], 2.0 * 1.0 + 3.0);
        assert_relative_eq!(with[3] - bare[3], 2.0 * 2.5 + 3.0);
    }

    #[test]
    fn analytic_jacobian_matches_finite_differences() {
        let freq: Vec<f64> = (0..9).map(|k| 4.6 + 0.1 * k as f64).collect();
        let params = [5.02, 40.0, 0.17, 0.4, 0.3, -1.2, -0.6, 2.0];
        let variant = ModelVariant::LinearBackground;
        let jac = variant.jacobian(&freq, &params);

        for col in 0..variant.param_count() {
            let h = 1e-6 * params[col].abs().max(1.0);
            let mut up = params;
            let mut down = params;
            up[col] += h;
            down[col] -= h;
            let numeric =
                (variant.vectorize(&freq, &up) - variant.vectorize(&freq, &down)) / (2.0 * h);
            for row in 0..jac.nrows() {
                assert_relative_eq!(
                    jac[(row, col)],
                    numeric[row],
                    epsilon = 1e-4,
                    max_relative = 1e-5
                );
            }
        }
    }
}
