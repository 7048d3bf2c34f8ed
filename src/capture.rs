use anyhow::{anyhow, Context, Result};
use log::{info, warn};
use std::io::Read;
use std::process::{Child, ChildStdout, Command, Stdio};

#[cfg(target_os = "linux")]
use std::os::unix::io::AsRawFd;

use crate::config::{INPUT_CHUNK_SIZE, SAMPLE_RATE};
#[cfg(target_os = "linux")]
use crate::pipe::shrink_pipe_buffer;

/// Capture side of the loopback: a blocking byte-oriented reader producing
/// 48 kHz s16le stereo, consumed in fixed 512-byte chunks.
///
/// The stream comes from a `parec` subprocess recording the configured
/// source. The record fragment size is pinned to the chunk size and the
/// kernel pipe between the two processes is shrunk to one page, so a chunk
/// becomes readable as soon as the sound server delivers it.
pub struct CaptureSource {
    child: Child,
    stdout: ChildStdout,
}

impl CaptureSource {
    /// Spawn the capture subprocess for `source_name` (a PulseAudio source
    /// name as listed by `pactl list sources`).
    pub fn open(source_name: &str) -> Result<Self> {
        let device_arg = format!("--device={source_name}");
        let rate_arg = format!("--rate={SAMPLE_RATE}");
        let latency_arg = format!("--latency={INPUT_CHUNK_SIZE}");

        let mut command = Command::new("parec");
        command.args([
            "--client-name=spdif-loopback",
            "--stream-name=S/PDIF Loopback",
            device_arg.as_str(),
            "--format=s16le",
            rate_arg.as_str(),
            "--channels=2",
            "--channel-map=front-left,front-right",
            latency_arg.as_str(),
            "--raw",
        ]);
        command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit());

        let mut child = command
            .spawn()
            .with_context(|| format!("Failed to spawn parec for source '{source_name}'"))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| anyhow!("Failed to open parec stdout"))?;

        #[cfg(target_os = "linux")]
        shrink_pipe_buffer(stdout.as_raw_fd(), "capture");

        info!("Capture stream open on source '{source_name}'");

        Ok(Self { child, stdout })
    }

    /// Blocking read of one input chunk. A short read or closed pipe is
    /// fatal; the capture stream has no meaningful way to continue.
    pub fn read_chunk(&mut self, chunk: &mut [u8; INPUT_CHUNK_SIZE]) -> Result<()> {
        self.stdout
            .read_exact(chunk)
            .context("Could not read sample chunk from capture source")
    }
}

impl Drop for CaptureSource {
    fn drop(&mut self) {
        // parec never exits on its own; kill it and reap.
        if let Err(e) = self.child.kill() {
            warn!("Failed to kill capture subprocess: {e}");
        }
        let _ = self.child.wait();
    }
}
