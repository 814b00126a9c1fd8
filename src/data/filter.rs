use serde::{Deserialize, Serialize};

use super::model::Spectrum;

// ---------------------------------------------------------------------------
// Frequency window: which bins of a spectrum are kept
// ---------------------------------------------------------------------------

/// Inclusive frequency interval in Hz.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrequencyRange {
    pub min: f64,
    pub max: f64,
}

impl FrequencyRange {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, f: f64) -> bool {
        self.min <= f && f <= self.max
    }
}

/// Return indices of bins whose frequency lies in `range` (both ends inclusive).
///
/// Order is preserved, so an ascending axis stays ascending.
pub fn filtered_indices(frequency: &[f64], range: FrequencyRange) -> Vec<usize> {
    frequency
        .iter()
        .enumerate()
        .filter(|(_, f)| range.contains(**f))
        .map(|(i, _)| i)
        .collect()
}

/// Keep only the bins of `spectrum` inside `range`.
pub fn filter_spectrum(spectrum: &Spectrum, range: FrequencyRange) -> Spectrum {
    let keep = filtered_indices(spectrum.frequency(), range);
    let frequency = keep.iter().map(|&i| spectrum.frequency()[i]).collect();
    let signal = keep.iter().map(|&i| spectrum.signal()[i]).collect();
    Spectrum::from_aligned(frequency, signal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_complex::Complex64;

    fn ramp(n: usize) -> Spectrum {
        let frequency = (0..n).map(|i| i as f64 * 0.5).collect();
        let signal = (0..n).map(|i| Complex64::new(i as f64, -(i as f64))).collect();
        Spectrum::new(frequency, signal).unwrap()
    }

    #[test]
    fn bounds_are_inclusive() {
        let idx = filtered_indices(&[0.0, 1.0, 2.0, 3.0], FrequencyRange::new(1.0, 2.0));
        assert_eq!(idx, vec![1, 2]);
    }

    #[test]
    fn filtering_twice_is_idempotent() {
        let range = FrequencyRange::new(1.2, 3.5);
        let once = filter_spectrum(&ramp(20), range);
        let twice = filter_spectrum(&once, range);
        assert_eq!(once, twice);
        assert_eq!(once.frequency(), &[1.5, 2.0, 2.5, 3.0, 3.5]);
    }

    #[test]
    fn empty_range_yields_empty_spectrum() {
        let out = filter_spectrum(&ramp(5), FrequencyRange::new(10.0, 20.0));
        assert!(out.is_empty());
    }
}
