//! Interpolation Timing Corrector Tests
//!
//! Tests for:
//! - Interpolation factor bounds under heavy timing jitter
//! - Factor stability (sample standard deviation)
//! - Drift absorption when dispatch runs ahead of or behind emit

use rand::rngs::StdRng;
use rand::{RngExt, SeedableRng};

use ember::sync::timing::{interpolation_factor, InterpolationTimingCorrector};

/// Gaussian sample via Box-Muller, enough for jitter simulation.
fn gaussian(rng: &mut StdRng, sigma: f64) -> f64 {
    let u1: f64 = rng.random_range(f64::EPSILON..1.0);
    let u2: f64 = rng.random_range(0.0..1.0);
    (-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos() * sigma
}

#[test]
fn factor_stays_bounded_and_stable_under_jitter() {
    let _ = env_logger::builder().is_test(true).try_init();
    const PERIOD_US: u64 = 50_000;
    const SIGMA_US: f64 = 2_000.0;
    const ITERATIONS: usize = 10_000;

    let mut rng = StdRng::seed_from_u64(0x45_4d_42_52);
    let mut itc = InterpolationTimingCorrector::new();
    let mut factors = Vec::with_capacity(ITERATIONS);

    for i in 0..ITERATIONS as u64 {
        let nominal = (i + 1) * PERIOD_US;
        let emit = (nominal as f64 + gaussian(&mut rng, SIGMA_US)).max(0.0) as u64;
        // Dispatch trails emit by roughly one period, plus its own jitter.
        let dispatch =
            (nominal as f64 + PERIOD_US as f64 + gaussian(&mut rng, SIGMA_US)).max(0.0) as u64;
        let target = itc.correct(emit, dispatch, PERIOD_US);
        let factor = interpolation_factor(target, emit, PERIOD_US);
        assert!((0.0..=1.0).contains(&factor), "factor {factor} out of range");
        factors.push(factor);
    }

    // Skip the warm-up while the smoothing window fills.
    let settled = &factors[200..];
    let mean = settled.iter().sum::<f32>() / settled.len() as f32;
    let variance =
        settled.iter().map(|f| (f - mean).powi(2)).sum::<f32>() / (settled.len() - 1) as f32;
    let stddev = variance.sqrt();
    assert!(
        stddev < 0.15,
        "interpolation factor too noisy: stddev {stddev}"
    );
}

#[test]
fn constant_offset_settles_mid_period() {
    let _ = env_logger::builder().is_test(true).try_init();
    const PERIOD_US: u64 = 50_000;
    let mut itc = InterpolationTimingCorrector::new();
    let mut factor = 0.0;
    for i in 0..500u64 {
        let emit = i * PERIOD_US;
        let dispatch = emit + 30_000;
        let target = itc.correct(emit, dispatch, PERIOD_US);
        factor = interpolation_factor(target, emit, PERIOD_US);
    }
    assert!(
        (factor - 0.5).abs() < 0.02,
        "steady cadence should settle at half a period, got {factor}"
    );
}

#[test]
fn target_never_runs_out_of_history() {
    let _ = env_logger::builder().is_test(true).try_init();
    // Even when dispatch lags far behind, the target never precedes the
    // emit time, so interpolation always has both endpoints.
    let mut itc = InterpolationTimingCorrector::new();
    for i in 0..100u64 {
        let emit = i * 20_000 + 500_000;
        let dispatch = i * 20_000;
        let target = itc.correct(emit, dispatch, 20_000);
        assert!(target >= emit);
    }
}
