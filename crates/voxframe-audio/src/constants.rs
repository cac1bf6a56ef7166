//! Framing constants for the capture pipeline.

/// Capture sample rate the pipeline is specified for (Hz).
/// The device's negotiated rate must match this exactly; there is no
/// resampling stage.
pub const SAMPLE_RATE_HZ: u32 = 8_000;

/// Samples per emitted frame. 80 samples is the conventional
/// narrowband telephony frame: 10 ms at 8 kHz.
pub const FRAME_SIZE_SAMPLES: usize = 80;

/// Only the first input channel is consumed (mono).
pub const CHANNELS_MONO: u16 = 1;

/// Frame duration in milliseconds (derived constant)
pub const FRAME_DURATION_MS: f32 =
    (FRAME_SIZE_SAMPLES as f32 * 1000.0) / SAMPLE_RATE_HZ as f32;

/// Bytes per frame once packed as little-endian PCM16.
pub const FRAME_SIZE_BYTES_PCM16: usize = FRAME_SIZE_SAMPLES * 2;
