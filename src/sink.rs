use log::warn;
use rubato::{SincInterpolationParameters, SincInterpolationType, WindowFunction};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;

use crate::config::SinkTuning;
use crate::playback::OutputStream;
use crate::rate_control::RateController;
use crate::ring_buffer::SampleRing;

/// Ratio headroom for the sample-rate converter. The control loop keeps the
/// ratio within a fraction of a percent of unity, far inside this bound.
pub const MAX_RESAMPLE_RATIO_RELATIVE: f64 = 2.0;

/// Best-quality sinc filter configuration, used by both sinks.
pub fn sinc_best_quality() -> SincInterpolationParameters {
    SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    }
}

pub struct SinkState {
    pub ring: SampleRing,
    pub control: RateController,
    run: bool,
}

/// Producer/consumer state shared by the two sinks: the sample ring and its
/// rate controller under one mutex, paired with a condition variable. The
/// producer (the main thread) pushes resampled samples and signals; a
/// dedicated consumer thread pops fixed-size blocks and performs the
/// blocking device writes.
pub struct SinkShared {
    pub state: Mutex<SinkState>,
    pub cond: Condvar,
}

impl SinkShared {
    pub fn new(tuning: &SinkTuning) -> Self {
        Self {
            state: Mutex::new(SinkState {
                ring: SampleRing::new(tuning.ring_capacity, tuning.target_fill),
                control: RateController::new(tuning.target_fill, tuning.loop_gain),
                run: true,
            }),
            cond: Condvar::new(),
        }
    }

    /// Block until `dst.len()` samples are available, then pop them.
    /// Returns false without copying when the sink is shutting down.
    pub fn pop_block(&self, dst: &mut [f32]) -> bool {
        let mut state = self.state.lock().unwrap();

        while state.ring.fill() < dst.len() && state.run {
            state = self.cond.wait(state).unwrap();
        }

        if !state.run {
            return false;
        }

        state.ring.pop_into(dst);
        true
    }

    /// Clear the run flag and wake the consumer. The flag is cleared under
    /// the lock and the wakeup issued before any join, so the consumer
    /// cannot miss it.
    pub fn stop(&self) {
        let mut state = self.state.lock().unwrap();
        state.run = false;
        drop(state);
        self.cond.notify_all();
    }
}

/// Consumer loop body: pop `block_size`-sample blocks and write them to the
/// playback device until the sink stops. Returns the stream for teardown.
pub fn run_output_worker(
    shared: Arc<SinkShared>,
    mut output: Box<dyn OutputStream>,
    block_size: usize,
) -> Box<dyn OutputStream> {
    let mut block = vec![0.0f32; block_size];

    while shared.pop_block(&mut block) {
        if let Err(e) = output.write_block(&block) {
            warn!("Could not write chunk to output stream: {e:#}");
        }
    }

    output
}

/// Synchronous close: stop the consumer, join it, then drop the playback
/// stream it hands back. Samples still queued in the ring are discarded.
pub fn join_output_worker(
    shared: &SinkShared,
    worker: JoinHandle<Box<dyn OutputStream>>,
    label: &str,
) {
    shared.stop();
    match worker.join() {
        Ok(output) => drop(output),
        Err(_) => warn!("{label} output thread panicked"),
    }
}
