use anyhow::{anyhow, Context, Result};
use log::{info, warn};
use std::io::Write;
use std::process::{Child, ChildStdin, Command, Stdio};

#[cfg(target_os = "linux")]
use std::os::unix::io::AsRawFd;

use crate::config::{SinkTuning, SAMPLE_RATE};
#[cfg(target_os = "linux")]
use crate::pipe::shrink_pipe_buffer;

/// Blocking playback stream accepting float32 interleaved samples at
/// 48 kHz. Owned by a sink's consumer thread; dropped by the close path
/// strictly after that thread has been joined. The sinks only see this
/// capability, so tests can substitute an in-memory or null output.
pub trait OutputStream: Send {
    /// Write one block of interleaved f32 samples. Blocks until the device
    /// has accepted the data.
    fn write_block(&mut self, block: &[f32]) -> Result<()>;
}

/// Capability to open playback streams, handed to the stream arbiter so the
/// sink it opens is substitutable in tests.
pub trait OutputOpener {
    fn open(&self, tuning: &SinkTuning, latency_us: u32) -> Result<Box<dyn OutputStream>>;
}

/// Playback device buffer size, in bytes, for a requested latency.
///
/// Falls back to the sink default when no latency was requested or the
/// derived size is below it.
pub fn device_buffer_bytes(tuning: &SinkTuning, latency_us: u32) -> u32 {
    let latency_seconds = f64::from(latency_us) / 1_000_000.0;
    let latency_samples = latency_seconds * f64::from(SAMPLE_RATE);
    let bytes = (latency_samples * 4.0 * tuning.channels as f64) as u32;

    if latency_us == 0 || bytes < tuning.default_device_buffer {
        info!(
            "Using default sink buffer size of {} bytes",
            tuning.default_device_buffer
        );
        tuning.default_device_buffer
    } else {
        info!("Playback buffer size = {bytes} bytes");
        bytes
    }
}

/// `pacat` subprocess playing to the default sink.
pub struct PulsePlayback {
    child: Child,
    stdin: ChildStdin,
    byte_buf: Vec<u8>,
}

impl PulsePlayback {
    pub fn open(tuning: &SinkTuning, latency_us: u32) -> Result<Self> {
        let buffer_bytes = device_buffer_bytes(tuning, latency_us);

        let rate_arg = format!("--rate={SAMPLE_RATE}");
        let channels_arg = format!("--channels={}", tuning.channels);
        let map_arg = format!("--channel-map={}", tuning.channel_map);
        let latency_arg = format!("--latency={buffer_bytes}");

        let mut command = Command::new("pacat");
        command.args([
            "--playback",
            "--client-name=spdif-loopback",
            "--stream-name=S/PDIF Loopback",
            "--format=float32le",
            rate_arg.as_str(),
            channels_arg.as_str(),
            map_arg.as_str(),
            latency_arg.as_str(),
            "--process-time=8",
            "--raw",
        ]);
        command
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::inherit());

        let mut child = command.spawn().context("Failed to spawn pacat")?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| anyhow!("Failed to open pacat stdin"))?;

        #[cfg(target_os = "linux")]
        shrink_pipe_buffer(stdin.as_raw_fd(), "playback");

        info!(
            "Playback stream open: {} channels ({})",
            tuning.channels, tuning.channel_map
        );

        Ok(Self {
            child,
            stdin,
            byte_buf: Vec::new(),
        })
    }
}

impl OutputStream for PulsePlayback {
    fn write_block(&mut self, block: &[f32]) -> Result<()> {
        self.byte_buf.clear();
        for &sample in block {
            self.byte_buf.extend_from_slice(&sample.to_le_bytes());
        }
        self.stdin
            .write_all(&self.byte_buf)
            .context("Could not write block to output stream")
    }
}

impl Drop for PulsePlayback {
    fn drop(&mut self) {
        // Discard whatever the device still buffers, matching the close
        // contract: data queued at close is not drained.
        if let Err(e) = self.child.kill() {
            warn!("Failed to kill playback subprocess: {e}");
        }
        let _ = self.child.wait();
    }
}

/// Production opener: one `pacat` per sink open.
pub struct PulseOpener;

impl OutputOpener for PulseOpener {
    fn open(&self, tuning: &SinkTuning, latency_us: u32) -> Result<Box<dyn OutputStream>> {
        Ok(Box::new(PulsePlayback::open(tuning, latency_us)?))
    }
}

/// Discards everything. For running the pipeline without a sound server.
pub struct NullOutput;

impl OutputStream for NullOutput {
    fn write_block(&mut self, _block: &[f32]) -> Result<()> {
        Ok(())
    }
}
