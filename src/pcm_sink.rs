use anyhow::{Context, Result};
use log::{debug, info, warn};
use rubato::{Resampler, SincFixedIn};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::config::{INPUT_CHUNK_SIZE, PCM_SINK_TUNING};
use crate::playback::{OutputOpener, OutputStream};
use crate::sink::{
    join_output_worker, run_output_worker, sinc_best_quality, SinkShared,
    MAX_RESAMPLE_RATIO_RELATIVE,
};

/// L/R frames per input chunk.
const FRAMES_PER_CHUNK: usize = INPUT_CHUNK_SIZE / 4;

const CHANNELS: usize = 2;

/// Stereo PCM sink.
///
/// Accepts interleaved s16le left/right chunks, converts them to float,
/// passes them through the sample-rate converter, and queues them for the
/// output thread. The conversion ratio is adjusted continuously to hold the
/// intermediate ring at a constant fill, compensating for the capture and
/// playback devices running in different clock domains.
pub struct PcmSink {
    shared: Arc<SinkShared>,
    worker: JoinHandle<Box<dyn OutputStream>>,
    resampler: SincFixedIn<f32>,
    input_planar: [Vec<f32>; CHANNELS],
    output_planar: [Vec<f32>; CHANNELS],
}

impl PcmSink {
    /// Open the sink: rate converter, playback device, output thread. Any
    /// failure leaves nothing running.
    pub fn open(outputs: &dyn OutputOpener, latency_us: u32) -> Result<Self> {
        let tuning = &PCM_SINK_TUNING;

        let resampler = SincFixedIn::new(
            1.0,
            MAX_RESAMPLE_RATIO_RELATIVE,
            sinc_best_quality(),
            FRAMES_PER_CHUNK,
            CHANNELS,
        )
        .context("Could not create sample rate converter instance")?;

        let max_out = resampler.output_frames_max();
        let output = outputs.open(tuning, latency_us)?;

        let shared = Arc::new(SinkShared::new(tuning));
        let worker = {
            let shared = Arc::clone(&shared);
            let block = tuning.output_block;
            thread::spawn(move || run_output_worker(shared, output, block))
        };

        info!("PCM sink open");

        Ok(Self {
            shared,
            worker,
            resampler,
            input_planar: [
                Vec::with_capacity(FRAMES_PER_CHUNK),
                Vec::with_capacity(FRAMES_PER_CHUNK),
            ],
            output_planar: [vec![0.0; max_out], vec![0.0; max_out]],
        })
    }

    /// Queue one chunk of interleaved left/right s16le samples.
    ///
    /// All input passes through the resampler even if part of it ends up
    /// dropped, so the converter's filter state tracks the stream.
    pub fn process(&mut self, chunk: &[u8; INPUT_CHUNK_SIZE]) {
        self.input_planar[0].clear();
        self.input_planar[1].clear();
        for frame in chunk.chunks_exact(4) {
            let left = i16::from_le_bytes([frame[0], frame[1]]);
            let right = i16::from_le_bytes([frame[2], frame[3]]);
            self.input_planar[0].push(f32::from(left) * (1.0 / 32768.0));
            self.input_planar[1].push(f32::from(right) * (1.0 / 32768.0));
        }

        let frames_gen = match self.resampler.process_into_buffer(
            &self.input_planar[..],
            &mut self.output_planar[..],
            None,
        ) {
            Ok((_, frames_gen)) => frames_gen,
            Err(e) => {
                // Ratio is left untouched; the next chunk proceeds normally.
                warn!("PCM sink rate converter error: {e}");
                return;
            }
        };

        let new_ratio;
        {
            let mut guard = self.shared.state.lock().unwrap();
            let state = &mut *guard;

            let fill = state.ring.fill();
            new_ratio = state.control.update(fill);
            debug!(
                "Buffer: {:4}    Ratio: {:.6}    Avg: {:.1}",
                fill,
                new_ratio,
                state.control.average()
            );

            // The consumer drains in L/R pairs, so only whole pairs may be
            // queued; a lone tail sample would flip left and right on the
            // device from then on. Whatever does not fit is dropped.
            let generated = frames_gen * CHANNELS;
            let will_queue = state.ring.free().min(generated) & !1;

            for i in 0..will_queue / CHANNELS {
                state.ring.push_sample(self.output_planar[0][i]);
                state.ring.push_sample(self.output_planar[1][i]);
            }
        }
        self.shared.cond.notify_all();

        if let Err(e) = self.resampler.set_resample_ratio(new_ratio, true) {
            warn!("PCM sink rate converter error: {e}");
        }
    }

    /// Stop and join the output thread, then tear down the playback stream.
    pub fn close(self) {
        join_output_worker(&self.shared, self.worker, "PCM sink");
        info!("PCM sink closed");
    }
}
