//! Interpolation timing correction.
//!
//! The prepare stages interpolate entity transforms between the two most
//! recent emit snapshots. The raw offset between emit timestamps and the
//! dispatch wall clock jitters tick to tick; feeding it straight into the
//! interpolation factor would make motion visibly hitch. The corrector
//! smooths the offset over a window of samples and biases the target half a
//! period forward, which keeps the factor well inside `[0, 1]`.

use crate::utils::SmoothingBuffer;

/// Window size for offset smoothing.
const WINDOW: usize = 100;

/// Computes target interpolation times from emit/dispatch timestamp pairs.
///
/// ```text
/// delta      = emit - dispatch
/// correction = smoothed_average(delta)
/// target     = max(emit, dispatch + correction + period / 2)
/// ```
#[derive(Default)]
pub struct InterpolationTimingCorrector {
    corrections: SmoothingBuffer<WINDOW>,
}

impl InterpolationTimingCorrector {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the target interpolation time for this dispatch tick.
    ///
    /// `emit` is the snapshot timestamp, `dispatch` the current wall-clock
    /// time, `period` the control update period; all in microseconds.
    pub fn correct(&mut self, emit: u64, dispatch: u64, period: u64) -> u64 {
        debug_assert!(period > 0);
        self.corrections.add(emit as i64 - dispatch as i64);
        let correction = self.corrections.smooth();
        let corrected = dispatch as i64 + correction + period as i64 / 2;
        emit.max(corrected.max(0) as u64)
    }
}

/// Saturated linear blend position of `target` between `emit` and
/// `emit + period`.
#[must_use]
pub fn interpolation_factor(target: u64, emit: u64, period: u64) -> f32 {
    if period == 0 {
        return 0.0;
    }
    let offset = target.saturating_sub(emit) as f32;
    (offset / period as f32).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_never_precedes_emit() {
        let mut itc = InterpolationTimingCorrector::new();
        let target = itc.correct(1_000_000, 900_000, 50_000);
        assert!(target >= 1_000_000);
    }

    #[test]
    fn steady_cadence_lands_mid_period() {
        let mut itc = InterpolationTimingCorrector::new();
        let period = 50_000;
        let mut factor = 0.0;
        // Dispatch runs a constant 10 ms behind emit.
        for i in 0..200u64 {
            let emit = i * period;
            let dispatch = emit + 10_000;
            let target = itc.correct(emit, dispatch, period);
            factor = interpolation_factor(target, emit, period);
        }
        assert!((factor - 0.5).abs() < 0.01, "factor {factor} should settle at 0.5");
    }
}
