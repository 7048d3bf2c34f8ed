/// Input is read from the capture source in chunks of this many bytes
/// (128 stereo frames at s16le, 2.6 ms at 48 kHz).
pub const INPUT_CHUNK_SIZE: usize = 512;

/// The S/PDIF interface is assumed to run at this rate end-to-end.
pub const SAMPLE_RATE: u32 = 48_000;

/// Number of input chunks that must pass without a single IEC 61937 data
/// burst before the input is considered a PCM stream.
pub const IEC_61937_DETECTION_WINDOW: usize = 64;

/// Control-loop history length. Power of two; the averaging window damps the
/// response to transient scheduling jitter.
pub const RATE_HISTORY_LEN: usize = 16;

/// Per-sink tuning knobs.
///
/// The loop gain is kept low enough that the worst-case sampling rate ratio,
/// `1 + loop_gain * target_fill`, stays below an audible pitch change.
/// `target_fill` should be at least twice the expected scheduling jitter in
/// samples, otherwise larger buffer depletions go unmeasured.
#[derive(Debug, Clone, Copy)]
pub struct SinkTuning {
    /// Intermediate ring capacity in samples. Power of two.
    pub ring_capacity: usize,
    /// Samples to aim to keep in the ring right before each push.
    pub target_fill: usize,
    /// Proportional gain converting (target - fill) into (ratio - 1).
    pub loop_gain: f64,
    /// Samples popped and written to the playback device per consumer step.
    pub output_block: usize,
    /// Playback device buffer used when no usable latency was requested.
    pub default_device_buffer: u32,
    /// Output channel count.
    pub channels: usize,
    /// Channel map handed to the playback device.
    pub channel_map: &'static str,
}

/// Stereo PCM sink. Output block of 32 samples is 16 L/R frames; it must be
/// even or the device drifts out of sync w.r.t. left/right.
pub const PCM_SINK_TUNING: SinkTuning = SinkTuning {
    ring_capacity: 2048,
    target_fill: 128,
    loop_gain: 0.000004,
    output_block: 32,
    default_device_buffer: 2048,
    channels: 2,
    channel_map: "front-left,front-right",
};

/// Decoded 5.1 AC-3 sink. Everything is the PCM tuning scaled for six
/// channels: 96-sample blocks are the same 16 frames, and the target fill of
/// 384 is 64 frames (divisible by 6 so the ring stays channel-aligned).
///
/// The surround pair is mapped to rear-left/rear-right rather than the
/// side-* positions AC-3 nominally uses; 4-channel playback setups route
/// rear, not side, and would otherwise lose the surround channels.
pub const AC3_SINK_TUNING: SinkTuning = SinkTuning {
    ring_capacity: 32768,
    target_fill: 384,
    loop_gain: 0.0000013334,
    output_block: 96,
    default_device_buffer: 6144,
    channels: 6,
    channel_map: "front-left,front-right,front-center,lfe,rear-left,rear-right",
};
