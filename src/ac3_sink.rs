use anyhow::{Context, Result};
use log::{debug, info, warn};
use rubato::{Resampler, SincFixedIn};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::config::AC3_SINK_TUNING;
use crate::decoder::{Ac3Decoder, FfmpegAc3Decoder, SendOutcome};
use crate::playback::{OutputOpener, OutputStream};
use crate::sink::{
    join_output_worker, run_output_worker, sinc_best_quality, SinkShared,
    MAX_RESAMPLE_RATIO_RELATIVE,
};

/// Samples per channel in a decoded AC-3 frame at 48 kHz.
pub const FRAME_SAMPLES: usize = 1536;

const CHANNELS: usize = 6;

/// Decoded AC-3 sink.
///
/// Accepts complete AC-3 frames extracted from the IEC 61937 stream,
/// decodes them to planar 5.1 float, resamples all six channels at one
/// shared ratio, and interleaves them into the ring for the output thread.
/// The same fill-level control loop as the PCM sink steers the ratio.
pub struct Ac3Sink {
    shared: Arc<SinkShared>,
    worker: JoinHandle<Box<dyn OutputStream>>,
    decoder: Box<dyn Ac3Decoder>,
    resampler: SincFixedIn<f32>,
    output_planar: Vec<Vec<f32>>,
}

impl Ac3Sink {
    pub fn open(outputs: &dyn OutputOpener, latency_us: u32) -> Result<Self> {
        Self::open_with_decoder(outputs, latency_us, Box::new(FfmpegAc3Decoder::new()?))
    }

    /// Open with a caller-provided decoder. Any failure leaves nothing
    /// running.
    pub fn open_with_decoder(
        outputs: &dyn OutputOpener,
        latency_us: u32,
        decoder: Box<dyn Ac3Decoder>,
    ) -> Result<Self> {
        let tuning = &AC3_SINK_TUNING;

        // One planar six-channel converter: every channel is resampled by
        // the same instance with the same ratio, so all channels generate
        // the same output count and the interleave below cannot skew.
        let resampler = SincFixedIn::new(
            1.0,
            MAX_RESAMPLE_RATIO_RELATIVE,
            sinc_best_quality(),
            FRAME_SAMPLES,
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

        info!("AC-3 sink open");

        Ok(Self {
            shared,
            worker,
            decoder,
            resampler,
            output_planar: vec![vec![0.0; max_out]; CHANNELS],
        })
    }

    /// Decode and queue one complete AC-3 frame. Every failure in here is
    /// per-frame: the frame is dropped and the stream resynchronizes on the
    /// next burst.
    pub fn process(&mut self, frame: &[u8]) {
        match self.decoder.send(frame) {
            Ok(SendOutcome::Accepted) => {}
            Ok(SendOutcome::Busy) => {
                // Drop pending output until the decoder accepts input again;
                // we pick back up on the next frame.
                warn!("AC-3 decoder not accepting input - discarding frames...");
                while let Ok(Some(_)) = self.decoder.receive() {}
                return;
            }
            Err(e) => {
                warn!("{e:#}");
                return;
            }
        }

        let decoded = match self.decoder.receive() {
            Ok(Some(decoded)) => decoded,
            Ok(None) => {
                warn!("No AC-3 frame was decoded");
                return;
            }
            Err(e) => {
                warn!("{e:#}");
                return;
            }
        };

        if decoded.channels() != CHANNELS {
            // Other layouts would need their own channel mappings.
            warn!(
                "Only 5.1 is supported right now (channels = {})",
                decoded.channels()
            );
            return;
        }
        if decoded.samples != FRAME_SAMPLES {
            warn!("Unexpected AC-3 frame length ({} samples)", decoded.samples);
            return;
        }

        let frames_gen = match self.resampler.process_into_buffer(
            &decoded.planes[..],
            &mut self.output_planar[..],
            None,
        ) {
            Ok((_, frames_gen)) => frames_gen,
            Err(e) => {
                warn!("AC-3 sink rate converter error: {e}");
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

            let needed = frames_gen * CHANNELS;
            if state.ring.free() < needed {
                // Queuing part of a multichannel frame would desynchronize
                // the channel order, so it is all or nothing.
                warn!(
                    "Can't fit entire frame, so dropping entire frame ({} < {})",
                    state.ring.free(),
                    needed
                );
            } else {
                // Interleave FL, FR, FC, LFE, RL, RR.
                for i in 0..frames_gen {
                    for plane in &self.output_planar {
                        state.ring.push_sample(plane[i]);
                    }
                }
            }
        }
        self.shared.cond.notify_all();

        if let Err(e) = self.resampler.set_resample_ratio(new_ratio, true) {
            warn!("AC-3 sink rate converter error: {e}");
        }
    }

    /// Stop and join the output thread, then tear down the playback stream
    /// and the decoder.
    pub fn close(self) {
        join_output_worker(&self.shared, self.worker, "AC-3 sink");
        info!("AC-3 sink closed");
    }
}
