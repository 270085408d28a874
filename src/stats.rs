// Bootstrap comparison of two samples.
use crate::types::BootstrapResult;
use crate::util::{average, cmp_f64, percentile};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub const DEFAULT_ITERATIONS: usize = 3000;

/// Bootstrap the difference of means `mean(a) - mean(b)`.
///
/// Each draw resamples both inputs with replacement. The interval is the
/// empirical 2.5/97.5 percentile range and the p-value is two-sided,
/// `2 * min(P(diff >= 0), P(diff <= 0))`, capped at 1. Returns `None` when
/// either sample is empty.
pub fn bootstrap_diff(a: &[f64], b: &[f64], iterations: usize, seed: Option<u64>) -> Option<BootstrapResult> {
    if a.is_empty() || b.is_empty() || iterations == 0 {
        return None;
    }
    let mut rng = match seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_entropy(),
    };
    let mut diffs: Vec<f64> = (0..iterations)
        .map(|_| resampled_mean(a, &mut rng) - resampled_mean(b, &mut rng))
        .collect();
    let diff_mean = average(&diffs);
    let n = diffs.len() as f64;
    let at_least_zero = diffs.iter().filter(|d| **d >= 0.0).count() as f64 / n;
    let at_most_zero = diffs.iter().filter(|d| **d <= 0.0).count() as f64 / n;
    diffs.sort_by(cmp_f64);
    Some(BootstrapResult {
        diff_mean,
        ci_low: percentile(&diffs, 2.5),
        ci_high: percentile(&diffs, 97.5),
        p_value: (2.0 * at_least_zero.min(at_most_zero)).min(1.0),
    })
}

fn resampled_mean<R: Rng>(sample: &[f64], rng: &mut R) -> f64 {
    let sum: f64 = (0..sample.len())
        .map(|_| sample[rng.gen_range(0..sample.len())])
        .sum();
    sum / sample.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_samples_have_no_difference() {
        let r = bootstrap_diff(&[10.0, 10.0, 10.0], &[10.0, 10.0, 10.0], DEFAULT_ITERATIONS, Some(7))
            .expect("non-empty samples");
        assert!(r.diff_mean.abs() < 1e-12);
        assert!((r.p_value - 1.0).abs() < 1e-12);
        assert_eq!(r.ci_low, 0.0);
        assert_eq!(r.ci_high, 0.0);
    }

    #[test]
    fn separated_samples_are_significant() {
        let a = [50.0, 52.0, 55.0, 51.0, 53.0];
        let b = [10.0, 12.0, 11.0, 9.0, 13.0];
        let r = bootstrap_diff(&a, &b, 1000, Some(42)).unwrap();
        assert!(r.diff_mean > 35.0 && r.diff_mean < 45.0);
        assert!(r.ci_low > 0.0);
        assert!(r.ci_low <= r.ci_high);
        assert_eq!(r.p_value, 0.0);
    }

    #[test]
    fn empty_sample_has_no_result() {
        assert!(bootstrap_diff(&[], &[1.0], 100, Some(1)).is_none());
        assert!(bootstrap_diff(&[1.0], &[], 100, Some(1)).is_none());
    }

    #[test]
    fn seeded_runs_are_reproducible() {
        let a = [1.0, 4.0, 9.0];
        let b = [2.0, 3.0, 5.0];
        assert_eq!(bootstrap_diff(&a, &b, 500, Some(3)), bootstrap_diff(&a, &b, 500, Some(3)));
    }
}
