use anyhow::{anyhow, Context as _, Result};
use ffmpeg_next as ffmpeg;

/// One decoded frame: per-channel planes of equal length.
pub struct DecodedFrame {
    pub planes: Vec<Vec<f32>>,
    /// Samples per channel.
    pub samples: usize,
}

impl DecodedFrame {
    pub fn channels(&self) -> usize {
        self.planes.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Accepted,
    /// Input not accepted in the current state; output must be drained
    /// before new input is submitted.
    Busy,
}

/// Push/pull AC-3 frame decoder. The sink drives decoding through this
/// capability so the pipeline can be exercised with a deterministic stub.
pub trait Ac3Decoder: Send {
    /// Submit one complete AC-3 frame.
    fn send(&mut self, packet: &[u8]) -> Result<SendOutcome>;

    /// Pull the next decoded frame, or `None` when the decoder has nothing
    /// pending.
    fn receive(&mut self) -> Result<Option<DecodedFrame>>;
}

/// libavcodec AC-3 decoder: one complete frame in, one planar-f32 5.1
/// frame out, with the send/receive push-back protocol surfaced as
/// [`SendOutcome::Busy`].
pub struct FfmpegAc3Decoder {
    decoder: ffmpeg::decoder::Audio,
    frame: ffmpeg::frame::Audio,
}

impl FfmpegAc3Decoder {
    pub fn new() -> Result<Self> {
        ffmpeg::init().context("Failed to initialize libavcodec")?;

        let codec = ffmpeg::decoder::find(ffmpeg::codec::Id::AC3)
            .ok_or_else(|| anyhow!("No AC-3 decoder available"))?;
        let decoder = ffmpeg::codec::context::Context::new_with_codec(codec)
            .decoder()
            .audio()
            .context("Could not open AC-3 decoder")?;

        Ok(Self {
            decoder,
            frame: ffmpeg::frame::Audio::empty(),
        })
    }
}

impl Ac3Decoder for FfmpegAc3Decoder {
    fn send(&mut self, packet: &[u8]) -> Result<SendOutcome> {
        match self.decoder.send_packet(&ffmpeg::Packet::copy(packet)) {
            Ok(()) => Ok(SendOutcome::Accepted),
            Err(ffmpeg::Error::Other { errno: libc::EAGAIN }) => Ok(SendOutcome::Busy),
            Err(e) => Err(e).context("Error decoding AC-3 frame"),
        }
    }

    fn receive(&mut self) -> Result<Option<DecodedFrame>> {
        match self.decoder.receive_frame(&mut self.frame) {
            Ok(()) => {}
            Err(ffmpeg::Error::Other { errno: libc::EAGAIN }) | Err(ffmpeg::Error::Eof) => {
                return Ok(None)
            }
            Err(e) => return Err(e).context("Error receiving decoded AC-3 frame"),
        }

        let planar_f32 =
            ffmpeg::format::Sample::F32(ffmpeg::format::sample::Type::Planar);
        if self.frame.format() != planar_f32 {
            return Err(anyhow!(
                "Decoder produced unsupported sample format {:?}",
                self.frame.format()
            ));
        }

        let planes = (0..self.frame.planes())
            .map(|i| self.frame.plane::<f32>(i).to_vec())
            .collect();

        Ok(Some(DecodedFrame {
            planes,
            samples: self.frame.samples(),
        }))
    }
}
