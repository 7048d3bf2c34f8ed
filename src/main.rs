use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use spdif_loopback::capture::CaptureSource;
use spdif_loopback::config::INPUT_CHUNK_SIZE;
use spdif_loopback::iec60958::StreamArbiter;
use spdif_loopback::playback::PulseOpener;

/// Adaptive S/PDIF loopback bridge.
///
/// Reads from the capture source, automatically determines whether the
/// incoming audio is PCM or an IEC 61937 AC-3 bitstream, and sends it to
/// the appropriate sink for decoding and playback.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Capture source name (list them with: pactl list sources)
    source: String,

    /// Requested playback latency in microseconds. Zero or malformed
    /// values select the per-sink default buffer sizes.
    latency_us: Option<String>,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let _ = e.print();
            // Usage errors exit 1; help and version are not errors.
            std::process::exit(if e.use_stderr() { 1 } else { 0 });
        }
    };

    let latency_us = match args.latency_us.as_deref() {
        Some(raw) => match raw.parse::<u32>() {
            Ok(us) if us > 0 => us,
            _ => {
                info!("Invalid sink latency, using default");
                0
            }
        },
        None => 0,
    };

    info!("Starting spdif-loopback...");
    info!("Capture source: {}", args.source);

    let mut capture = CaptureSource::open(&args.source)?;

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        warn!("Received Ctrl-C, shutting down...");
        r.store(false, Ordering::SeqCst);
    })
    .context("Error setting Ctrl-C handler")?;

    let mut arbiter = StreamArbiter::new(latency_us, Box::new(PulseOpener));
    let mut chunk = [0u8; INPUT_CHUNK_SIZE];

    while running.load(Ordering::SeqCst) {
        // A read error during shutdown just means the capture subprocess
        // went away with us; anything else is fatal.
        if let Err(e) = capture.read_chunk(&mut chunk) {
            if running.load(Ordering::SeqCst) {
                arbiter.shutdown();
                return Err(e);
            }
            break;
        }

        arbiter.process(&chunk)?;
    }

    arbiter.shutdown();
    info!("Exiting.");
    Ok(())
}
