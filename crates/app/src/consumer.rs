//! Demo consumer: stands in for the out-of-scope transport layer.
//!
//! Drains the frame channel and packs each frame into its telephony
//! wire form, 160 bytes of little-endian PCM16 per 80-sample frame.

use std::time::{Duration, Instant};

use crossbeam_channel::RecvTimeoutError;
use voxframe_audio::FrameReceiver;

#[derive(Debug, Default)]
pub struct ConsumerSummary {
    pub frames: u64,
    pub bytes: u64,
    pub last_timestamp: f64,
}

/// Receive frames until the window elapses or the producer goes away.
pub fn drain_for(rx: &FrameReceiver, window: Duration) -> ConsumerSummary {
    let deadline = Instant::now() + window;
    let mut summary = ConsumerSummary::default();

    loop {
        let now = Instant::now();
        if now >= deadline {
            break;
        }
        match rx.recv_timeout(deadline - now) {
            Ok(frame) => {
                let pcm = pack_pcm16(frame.samples());
                summary.frames += 1;
                summary.bytes += pcm.len() as u64;
                summary.last_timestamp = frame.timestamp();
                tracing::trace!(
                    timestamp = frame.timestamp(),
                    bytes = pcm.len(),
                    "Frame received"
                );
            }
            Err(RecvTimeoutError::Timeout) => break,
            Err(RecvTimeoutError::Disconnected) => {
                tracing::warn!("Frame channel disconnected before the window elapsed");
                break;
            }
        }
    }

    summary
}

pub fn pack_pcm16(samples: &[f32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(samples.len() * 2);
    for &s in samples {
        let v = (s.clamp(-1.0, 1.0) * 32_767.0).round() as i16;
        out.extend_from_slice(&v.to_le_bytes());
    }
    out
}
