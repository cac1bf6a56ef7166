use std::sync::atomic::AtomicU64;
use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender, TrySendError};

use crate::frame::AudioFrame;

pub type FrameReceiver = Receiver<AudioFrame>;

/// Destination for completed frames.
///
/// Delivery is fire-and-forget: implementations must never block the
/// caller, which runs on the real-time rendering thread.
pub trait FrameSink: Send {
    fn deliver(&mut self, frame: AudioFrame);
}

/// Counters shared across the pipeline threads.
///
/// The framer counts emissions and discarded blocks; the sink counts
/// frames dropped at the channel. One owner per counter, so the same
/// `Arc` can be attached to both sides without double counting.
#[derive(Debug, Default)]
pub struct FramerStats {
    /// Frames emitted by the framer, whether or not delivery succeeded.
    pub frames_emitted: AtomicU64,
    /// Frames dropped because the channel was full or disconnected.
    pub frames_dropped: AtomicU64,
    /// Sample blocks discarded while the gate was inactive.
    pub blocks_discarded: AtomicU64,
}

/// Create the single-producer/single-consumer frame channel.
///
/// The channel is bounded; when the consumer falls behind, new frames
/// are dropped at the sender rather than blocking the render thread.
/// Stale audio has no value in a best-effort real-time stream.
pub fn frame_channel(capacity: usize) -> (Sender<AudioFrame>, FrameReceiver) {
    crossbeam_channel::bounded(capacity)
}

/// Sends frames over the bounded channel without ever blocking.
pub struct ChannelSink {
    tx: Sender<AudioFrame>,
    stats: Option<Arc<FramerStats>>,
}

impl ChannelSink {
    pub fn new(tx: Sender<AudioFrame>) -> Self {
        Self { tx, stats: None }
    }

    pub fn with_stats(mut self, stats: Arc<FramerStats>) -> Self {
        self.stats = Some(stats);
        self
    }
}

impl FrameSink for ChannelSink {
    fn deliver(&mut self, frame: AudioFrame) {
        use std::sync::atomic::Ordering;

        match self.tx.try_send(frame) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                if let Some(stats) = &self.stats {
                    stats.frames_dropped.fetch_add(1, Ordering::Relaxed);
                }
                tracing::trace!("Frame channel full; dropping frame");
            }
            Err(TrySendError::Disconnected(_)) => {
                // No consumer is not an error for us; the emission is a no-op.
                if let Some(stats) = &self.stats {
                    stats.frames_dropped.fetch_add(1, Ordering::Relaxed);
                }
                tracing::trace!("No active consumer for frames");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;

    fn frame(value: f32) -> AudioFrame {
        AudioFrame::from_buffer(&[value; 80], 0.0)
    }

    #[test]
    fn full_channel_drops_instead_of_blocking() {
        let stats = Arc::new(FramerStats::default());
        let (tx, rx) = frame_channel(1);
        let mut sink = ChannelSink::new(tx).with_stats(stats.clone());

        sink.deliver(frame(0.1));
        sink.deliver(frame(0.2));

        assert_eq!(stats.frames_dropped.load(Ordering::Relaxed), 1);

        // Only the first frame made it through.
        let received = rx.try_recv().unwrap();
        assert_eq!(received.samples()[0], 0.1);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn disconnected_channel_is_a_noop() {
        let stats = Arc::new(FramerStats::default());
        let (tx, rx) = frame_channel(4);
        drop(rx);

        let mut sink = ChannelSink::new(tx).with_stats(stats.clone());
        sink.deliver(frame(0.5));

        assert_eq!(stats.frames_dropped.load(Ordering::Relaxed), 1);
    }
}
