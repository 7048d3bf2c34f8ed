use crate::config::RATE_HISTORY_LEN;

/// Proportional control loop steering the resampler ratio toward a constant
/// ring fill level.
///
/// The capture and playback devices run on different clocks; left alone, the
/// intermediate ring either drains to underruns or grows without bound. Each
/// producer step measures how far the fill is from the target, clamps the
/// offset so the gain alone bounds the ratio, and averages over a short
/// history window to damp jitter.
pub struct RateController {
    target: i32,
    gain: f64,
    history: [i32; RATE_HISTORY_LEN],
    hist_idx: usize,
    average: f64,
}

impl RateController {
    pub fn new(target_fill: usize, loop_gain: f64) -> Self {
        Self {
            target: target_fill as i32,
            gain: loop_gain,
            history: [0; RATE_HISTORY_LEN],
            hist_idx: 0,
            average: 0.0,
        }
    }

    /// Compute the ratio for the next resampler call from the current ring
    /// fill. Call once per producer step, before pushing the new samples,
    /// with the sink lock held.
    pub fn update(&mut self, fill: usize) -> f64 {
        let offset = (self.target - fill as i32).clamp(-self.target, self.target);

        self.history[self.hist_idx] = offset;
        self.hist_idx = (self.hist_idx + 1) & (RATE_HISTORY_LEN - 1);

        let sum: i64 = self.history.iter().map(|&v| i64::from(v)).sum();
        self.average = sum as f64 / RATE_HISTORY_LEN as f64;

        1.0 + self.gain * self.average
    }

    /// Last computed history average, in samples. Positive means underfilled.
    pub fn average(&self) -> f64 {
        self.average
    }
}
