use anyhow::Result;
use log::info;

use crate::ac3_sink::Ac3Sink;
use crate::config::{INPUT_CHUNK_SIZE, IEC_61937_DETECTION_WINDOW};
use crate::iec61937::{Iec61937Fsm, DATA_TYPE_AC3};
use crate::pcm_sink::PcmSink;
use crate::playback::OutputOpener;

enum Mode {
    Unknown,
    Pcm(PcmSink),
    Iec61937(Ac3Sink),
}

/// Current arbiter mode, without the sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeKind {
    Unknown,
    Pcm,
    Iec61937,
}

/// Decides, chunk by chunk, whether the captured IEC 60958 signal currently
/// carries plain PCM or an IEC 61937 bitstream, opens the matching sink,
/// and routes data to it. The mode and its open sink live in one enum, so
/// at most one sink can exist at any moment by construction.
///
/// A single preamble sighting is enough to switch to 61937: the effective
/// 96-bit sync has negligible odds of appearing in PCM content. Leaving
/// 61937 requires a full detection window of silent chunks, because gaps
/// between bursts are common.
pub struct StreamArbiter {
    fsm: Iec61937Fsm,
    mode: Mode,
    non_61937_chunks: usize,
    latency_us: u32,
    outputs: Box<dyn OutputOpener>,
}

impl StreamArbiter {
    pub fn new(latency_us: u32, outputs: Box<dyn OutputOpener>) -> Self {
        Self {
            fsm: Iec61937Fsm::new(),
            mode: Mode::Unknown,
            non_61937_chunks: 0,
            latency_us,
            outputs,
        }
    }

    pub fn mode(&self) -> ModeKind {
        match self.mode {
            Mode::Unknown => ModeKind::Unknown,
            Mode::Pcm(_) => ModeKind::Pcm,
            Mode::Iec61937(_) => ModeKind::Iec61937,
        }
    }

    /// Process one captured chunk of packed s16le samples.
    ///
    /// Sink-open failures are fatal and propagate; everything else is
    /// handled inside the sinks.
    pub fn process(&mut self, chunk: &[u8; INPUT_CHUNK_SIZE]) -> Result<()> {
        match &mut self.mode {
            Mode::Unknown => {
                // Bursts completed during detection are discarded; there is
                // no sink to receive them yet.
                let locked = self.fsm.process_chunk(chunk, |_| {});
                if locked {
                    info!("INIT: Found an IEC 61937 stream");
                    self.non_61937_chunks = 0;
                    self.mode =
                        Mode::Iec61937(Ac3Sink::open(self.outputs.as_ref(), self.latency_us)?);
                } else {
                    self.non_61937_chunks += 1;
                    if self.non_61937_chunks >= IEC_61937_DETECTION_WINDOW {
                        info!(
                            "INIT: Received {IEC_61937_DETECTION_WINDOW} chunks without a single \
                             IEC 61937 data burst; assuming PCM"
                        );
                        self.mode =
                            Mode::Pcm(PcmSink::open(self.outputs.as_ref(), self.latency_us)?);
                    }
                }
            }
            Mode::Pcm(sink) => {
                // Keep watching for a bitstream even while forwarding PCM.
                let locked = self.fsm.process_chunk(chunk, |_| {});
                if locked {
                    info!("Found IEC 61937 stream; switching from PCM");
                    if let Mode::Pcm(pcm) = std::mem::replace(&mut self.mode, Mode::Unknown) {
                        pcm.close();
                    }
                    self.non_61937_chunks = 0;
                    self.mode =
                        Mode::Iec61937(Ac3Sink::open(self.outputs.as_ref(), self.latency_us)?);
                } else {
                    sink.process(chunk);
                }
            }
            Mode::Iec61937(sink) => {
                let locked = self.fsm.process_chunk(chunk, |burst| {
                    // Non-AC-3 bursts, pause bursts included, are discarded.
                    if burst.data_type == DATA_TYPE_AC3 {
                        sink.process(burst.payload);
                    }
                });
                if locked {
                    self.non_61937_chunks = 0;
                } else {
                    self.non_61937_chunks += 1;
                    if self.non_61937_chunks >= IEC_61937_DETECTION_WINDOW {
                        info!(
                            "Received {IEC_61937_DETECTION_WINDOW} chunks without a single \
                             IEC 61937 data burst; switching to PCM"
                        );
                        if let Mode::Iec61937(ac3) =
                            std::mem::replace(&mut self.mode, Mode::Unknown)
                        {
                            ac3.close();
                        }
                        self.mode =
                            Mode::Pcm(PcmSink::open(self.outputs.as_ref(), self.latency_us)?);
                    }
                }
            }
        }

        Ok(())
    }

    /// Close whichever sink is open.
    pub fn shutdown(&mut self) {
        match std::mem::replace(&mut self.mode, Mode::Unknown) {
            Mode::Unknown => {}
            Mode::Pcm(sink) => sink.close(),
            Mode::Iec61937(sink) => sink.close(),
        }
    }
}
