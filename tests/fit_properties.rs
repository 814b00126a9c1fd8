use approx::assert_abs_diff_eq;
use num_complex::Complex64;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};

use resofit::fit::engine::fit;
use resofit::fit::lorentz::{
    complex_lorentz, complex_lorentz_with_background, LinearBackground, Lorentzian,
};
use resofit::{FitOptions, ModelVariant};

fn sweep() -> Vec<f64> {
    (0..400).map(|k| 3.0 + 0.01 * k as f64).collect()
}

fn add_noise(signal: &mut [Complex64], sigma: f64, seed: u64) {
    let mut rng = StdRng::seed_from_u64(seed);
    let normal = Normal::new(0.0, sigma).unwrap();
    for z in signal.iter_mut() {
        *z += Complex64::new(normal.sample(&mut rng), normal.sample(&mut rng));
    }
}

fn relative_error(estimate: f64, truth: f64) -> f64 {
    ((estimate - truth) / truth).abs()
}

#[test]
fn noisy_lorentzian_is_recovered() {
    let (f0, amplitude, gamma, phase) = (5.0, 100.0, 0.2, 0.3);
    let freq = sweep();
    let mut signal: Vec<Complex64> = freq
        .iter()
        .map(|&f| complex_lorentz(f, f0, amplitude, gamma, phase))
        .collect();
    add_noise(&mut signal, 1.0, 7);

    let result = fit(&freq, &signal, None, &FitOptions::new(ModelVariant::Plain)).unwrap();
    let p = &result.parameters;
    assert!(relative_error(p[0], f0) < 0.05, "f0 = {}", p[0]);
    assert!(relative_error(p[1], amplitude) < 0.05, "A = {}", p[1]);
    assert!(relative_error(p[2], gamma) < 0.10, "gamma = {}", p[2]);
    assert!(relative_error(p[3], phase) < 0.05, "phi = {}", p[3]);

    let f0_err = result.standard_error(0).unwrap();
    assert!(f0_err > 0.0 && f0_err < 0.01, "f0 error = {f0_err}");
}

#[test]
fn background_model_beats_plain_model_on_background_data() {
    let background = LinearBackground {
        slope_re: 2.0,
        offset_re: 8.0,
        slope_im: -1.0,
        offset_im: 4.0,
    };
    let lorentz = Lorentzian {
        f0: 5.0,
        amplitude: 100.0,
        gamma: 0.2,
        phase: 0.3,
    };
    let freq = sweep();
    let mut signal: Vec<Complex64> = freq
        .iter()
        .map(|&f| complex_lorentz_with_background(f, &lorentz, &background))
        .collect();
    add_noise(&mut signal, 0.2, 11);

    let with_background =
        fit(&freq, &signal, None, &FitOptions::new(ModelVariant::LinearBackground)).unwrap();
    assert_abs_diff_eq!(with_background.parameters[0], 5.0, epsilon = 1e-3);
    let fitted_bg = with_background.background().unwrap();
    assert_abs_diff_eq!(fitted_bg.offset_re, 8.0, epsilon = 0.5);

    // Start the plain model at the best Lorentzian so only the model differs.
    let seed = with_background.lorentzian().to_params();
    let plain = fit(&freq, &signal, Some(&seed), &FitOptions::new(ModelVariant::Plain)).unwrap();

    assert!(
        plain.residual_sum_squares >= 2.0 * with_background.residual_sum_squares,
        "plain {} vs background {}",
        plain.residual_sum_squares,
        with_background.residual_sum_squares
    );
}

#[test]
fn five_point_exact_scan_without_seed() {
    let freq = [4.8, 4.9, 5.0, 5.1, 5.2];
    let signal: Vec<Complex64> = freq
        .iter()
        .map(|&f| complex_lorentz(f, 5.0, 50.0, 0.15, 0.0))
        .collect();

    let result = fit(&freq, &signal, None, &FitOptions::new(ModelVariant::Plain)).unwrap();
    assert_abs_diff_eq!(result.parameters[0], 5.0, epsilon = 1e-3);
    assert_abs_diff_eq!(result.parameters[2], 0.15, epsilon = 1e-3);
    assert_eq!(result.covariance.shape(), (4, 4));
}
