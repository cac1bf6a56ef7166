use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::constants::{FRAME_SIZE_SAMPLES, SAMPLE_RATE_HZ};
use crate::emitter::{FrameSink, FramerStats};
use crate::frame::AudioFrame;
use voxframe_foundation::{real_clock, AudioError, SharedClock};

#[derive(Debug, Clone)]
pub struct FramerConfig {
    pub frame_size_samples: usize,
    pub sample_rate_hz: u32,
}

impl Default for FramerConfig {
    fn default() -> Self {
        Self {
            frame_size_samples: FRAME_SIZE_SAMPLES,
            sample_rate_hz: SAMPLE_RATE_HZ,
        }
    }
}

impl FramerConfig {
    pub fn validate(&self) -> Result<(), AudioError> {
        if self.frame_size_samples == 0 {
            return Err(AudioError::InvalidConfig(
                "frame_size_samples must be non-zero".into(),
            ));
        }
        if self.sample_rate_hz == 0 {
            return Err(AudioError::InvalidConfig(
                "sample_rate_hz must be non-zero".into(),
            ));
        }
        Ok(())
    }

    pub fn frame_duration_ms(&self) -> f32 {
        (self.frame_size_samples as f32 * 1000.0) / self.sample_rate_hz as f32
    }
}

/// Cross-thread toggle for the capture gate.
///
/// `enable`/`disable` may be called from any thread; the framer observes
/// the flag once per delivered block, so a toggle takes effect starting
/// with the next block and never mid-block.
#[derive(Clone)]
pub struct ActivationGate {
    active: Arc<AtomicBool>,
}

impl Default for ActivationGate {
    fn default() -> Self {
        Self::new()
    }
}

impl ActivationGate {
    /// A new gate starts inactive.
    pub fn new() -> Self {
        Self {
            active: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn enable(&self) {
        self.active.store(true, Ordering::SeqCst);
    }

    pub fn disable(&self) {
        self.active.store(false, Ordering::SeqCst);
    }

    pub fn is_enabled(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}

/// Mutable capture state, owned exclusively by the thread that drives
/// ingestion. One instance per capture session; the buffer is allocated
/// once here and reused in place.
struct CaptureState {
    buffer: Box<[f32]>,
    write_index: usize,
    is_active: bool,
}

impl CaptureState {
    fn new(frame_size: usize) -> Self {
        Self {
            buffer: vec![0.0; frame_size].into_boxed_slice(),
            write_index: 0,
            is_active: false,
        }
    }

    fn reset(&mut self) {
        self.write_index = 0;
        self.buffer.fill(0.0);
    }
}

/// Re-packages variable-length sample blocks into fixed-size frames.
///
/// `process_block` is the ingestion entry point invoked once per render
/// quantum. It is infallible and non-blocking by construction: a fault
/// such as a missing consumer degrades to "nothing to do" so the host
/// callback can always return its continuation signal.
pub struct Framer<S: FrameSink> {
    cfg: FramerConfig,
    state: CaptureState,
    gate: ActivationGate,
    sink: S,
    clock: SharedClock,
    session_start: Instant,
    stats: Option<Arc<FramerStats>>,
}

impl<S: FrameSink> Framer<S> {
    pub fn new(cfg: FramerConfig, sink: S) -> Result<Self, AudioError> {
        cfg.validate()?;
        let clock = real_clock();
        let session_start = clock.now();
        Ok(Self {
            state: CaptureState::new(cfg.frame_size_samples),
            cfg,
            gate: ActivationGate::new(),
            sink,
            clock,
            session_start,
            stats: None,
        })
    }

    /// Replace the clock. Timestamps restart at zero on the new clock.
    pub fn with_clock(mut self, clock: SharedClock) -> Self {
        self.session_start = clock.now();
        self.clock = clock;
        self
    }

    /// Share an externally created gate so other threads can toggle capture.
    pub fn with_gate(mut self, gate: ActivationGate) -> Self {
        self.gate = gate;
        self
    }

    pub fn with_stats(mut self, stats: Arc<FramerStats>) -> Self {
        self.stats = Some(stats);
        self
    }

    pub fn gate(&self) -> ActivationGate {
        self.gate.clone()
    }

    pub fn config(&self) -> &FramerConfig {
        &self.cfg
    }

    pub fn is_active(&self) -> bool {
        self.state.is_active
    }

    /// Samples currently buffered toward the next frame.
    pub fn buffered_samples(&self) -> usize {
        self.state.write_index
    }

    /// Ingest one sample block; returns the number of frames emitted.
    ///
    /// The block is fully drained before returning, so a single call may
    /// emit zero, one, or several frames depending on how the block
    /// length aligns to the frame size. Work is O(block length).
    pub fn process_block(&mut self, block: &[f32]) -> usize {
        self.sync_gate();

        if !self.state.is_active {
            if !block.is_empty() {
                if let Some(stats) = &self.stats {
                    stats.blocks_discarded.fetch_add(1, Ordering::Relaxed);
                }
            }
            return 0;
        }

        let mut emitted = 0;
        for &sample in block {
            self.state.buffer[self.state.write_index] = sample;
            self.state.write_index += 1;

            if self.state.write_index == self.state.buffer.len() {
                let timestamp = self.elapsed_secs();
                self.sink
                    .deliver(AudioFrame::from_buffer(&self.state.buffer, timestamp));
                self.state.reset();
                emitted += 1;
                if let Some(stats) = &self.stats {
                    stats.frames_emitted.fetch_add(1, Ordering::Relaxed);
                }
            }
        }
        emitted
    }

    /// Apply a pending gate toggle at a block boundary.
    ///
    /// Deactivation flushes the partial buffer: a resumed session never
    /// emits a frame mixing samples captured before and after the pause.
    fn sync_gate(&mut self) {
        let enabled = self.gate.is_enabled();
        if enabled != self.state.is_active {
            if !enabled {
                self.state.reset();
            }
            self.state.is_active = enabled;
        }
    }

    fn elapsed_secs(&self) -> f64 {
        self.clock
            .now()
            .duration_since(self.session_start)
            .as_secs_f64()
    }

    #[cfg(test)]
    fn buffer(&self) -> &[f32] {
        &self.state.buffer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emitter::{frame_channel, ChannelSink, FrameReceiver};
    use std::time::Duration;
    use voxframe_foundation::TestClock;

    fn framer() -> (Framer<ChannelSink>, FrameReceiver, Arc<TestClock>) {
        let (tx, rx) = frame_channel(64);
        let clock = Arc::new(TestClock::new());
        let f = Framer::new(FramerConfig::default(), ChannelSink::new(tx))
            .unwrap()
            .with_clock(clock.clone());
        (f, rx, clock)
    }

    fn ramp(start: usize, len: usize) -> Vec<f32> {
        (start..start + len).map(|i| i as f32 / 100_000.0).collect()
    }

    #[test]
    fn frame_count_law_for_128_sample_blocks() {
        let (mut f, rx, _clock) = framer();
        f.gate().enable();

        // 3 x 128 = 384 samples -> exactly 4 frames, 64 samples carried.
        let mut emitted = 0;
        for i in 0..3 {
            emitted += f.process_block(&ramp(i * 128, 128));
        }
        assert_eq!(emitted, 4);
        assert_eq!(f.buffered_samples(), 64);

        let stream = ramp(0, 384);
        for (n, frame) in rx.try_iter().enumerate() {
            assert_eq!(frame.len(), 80);
            assert_eq!(frame.samples(), &stream[n * 80..(n + 1) * 80]);
        }
    }

    #[test]
    fn one_block_can_emit_multiple_frames() {
        let (mut f, rx, _clock) = framer();
        f.gate().enable();

        // 240 samples against 80-sample frames: 3 frames, no remainder.
        assert_eq!(f.process_block(&ramp(0, 240)), 3);
        assert_eq!(f.buffered_samples(), 0);
        assert_eq!(rx.try_iter().count(), 3);

        // 100 samples: 1 frame and 20 carried into the next block.
        assert_eq!(f.process_block(&ramp(0, 100)), 1);
        assert_eq!(f.buffered_samples(), 20);
    }

    #[test]
    fn gate_starts_inactive_and_discards_blocks() {
        let (mut f, rx, _clock) = framer();

        assert!(!f.is_active());
        assert_eq!(f.process_block(&ramp(0, 128)), 0);
        assert_eq!(f.buffered_samples(), 0);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn empty_block_changes_nothing() {
        let (mut f, rx, _clock) = framer();
        f.gate().enable();
        f.process_block(&ramp(0, 30));

        assert_eq!(f.process_block(&[]), 0);
        assert_eq!(f.buffered_samples(), 30);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn three_distinct_full_blocks_pass_through_unchanged() {
        let (mut f, rx, clock) = framer();
        f.gate().enable();

        let blocks = [ramp(0, 80), ramp(1000, 80), ramp(2000, 80)];
        for block in &blocks {
            assert_eq!(f.process_block(block), 1);
            clock.advance(Duration::from_millis(10));
        }

        let frames: Vec<_> = rx.try_iter().collect();
        assert_eq!(frames.len(), 3);
        for (frame, block) in frames.iter().zip(&blocks) {
            assert_eq!(frame.samples(), &block[..]);
        }
        assert!(frames[0].timestamp() < frames[1].timestamp());
        assert!(frames[1].timestamp() < frames[2].timestamp());
    }

    #[test]
    fn disable_between_blocks_discards_the_paused_block() {
        let (mut f, rx, _clock) = framer();
        let gate = f.gate();
        gate.enable();

        assert_eq!(f.process_block(&ramp(0, 80)), 1);

        gate.disable();
        assert_eq!(f.process_block(&ramp(1000, 80)), 0);

        gate.enable();
        let block3 = ramp(2000, 80);
        assert_eq!(f.process_block(&block3), 1);

        let frames: Vec<_> = rx.try_iter().collect();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[1].samples(), &block3[..]);
    }

    #[test]
    fn disable_flushes_the_partial_buffer() {
        let (mut f, rx, _clock) = framer();
        let gate = f.gate();
        gate.enable();

        f.process_block(&[0.9; 50]);
        assert_eq!(f.buffered_samples(), 50);

        gate.disable();
        f.process_block(&[]);
        assert_eq!(f.buffered_samples(), 0);

        // The next frame after resume holds only post-resume samples.
        gate.enable();
        let resumed = ramp(5000, 80);
        assert_eq!(f.process_block(&resumed), 1);

        let frame = rx.try_recv().unwrap();
        assert_eq!(frame.samples(), &resumed[..]);
    }

    #[test]
    fn emitted_frames_are_isolated_from_later_writes() {
        let (mut f, rx, _clock) = framer();
        f.gate().enable();

        f.process_block(&[0.5; 80]);
        let first = rx.try_recv().unwrap();

        // Keep writing and emitting through the same internal buffer.
        f.process_block(&[-0.5; 80]);
        f.process_block(&[0.25; 40]);

        assert!(first.samples().iter().all(|&s| s == 0.5));
    }

    #[test]
    fn buffer_is_zeroed_after_emission() {
        let (mut f, rx, _clock) = framer();
        f.gate().enable();

        f.process_block(&[1.0; 80]);
        assert_eq!(rx.try_iter().count(), 1);
        assert_eq!(f.buffered_samples(), 0);
        assert!(f.buffer().iter().all(|&s| s == 0.0));
    }

    #[test]
    fn timestamps_never_decrease() {
        let (mut f, rx, clock) = framer();
        f.gate().enable();

        f.process_block(&ramp(0, 160));
        clock.advance(Duration::from_millis(16));
        f.process_block(&ramp(0, 160));

        let timestamps: Vec<f64> = rx.try_iter().map(|fr| fr.timestamp()).collect();
        assert_eq!(timestamps.len(), 4);
        for pair in timestamps.windows(2) {
            assert!(pair[1] >= pair[0]);
        }
    }

    #[test]
    fn missing_consumer_keeps_ingestion_alive() {
        let (tx, rx) = frame_channel(4);
        let mut f = Framer::new(FramerConfig::default(), ChannelSink::new(tx)).unwrap();
        f.gate().enable();
        drop(rx);

        // Emission becomes a no-op; the entry point still drains the block.
        assert_eq!(f.process_block(&ramp(0, 200)), 2);
        assert_eq!(f.buffered_samples(), 40);
    }

    #[test]
    fn framer_stats_count_emissions_without_sink_wiring() {
        let (tx, rx) = frame_channel(64);
        let stats = Arc::new(FramerStats::default());
        let mut f = Framer::new(FramerConfig::default(), ChannelSink::new(tx))
            .unwrap()
            .with_stats(stats.clone());
        let gate = f.gate();

        gate.enable();
        f.process_block(&ramp(0, 160));
        assert_eq!(stats.frames_emitted.load(Ordering::Relaxed), 2);

        gate.disable();
        f.process_block(&ramp(0, 80));
        assert_eq!(stats.frames_emitted.load(Ordering::Relaxed), 2);
        assert_eq!(stats.blocks_discarded.load(Ordering::Relaxed), 1);
        assert_eq!(rx.try_iter().count(), 2);
    }

    #[test]
    fn shared_stats_on_framer_and_sink_do_not_double_count() {
        // Same Arc on both sides: the framer owns the emission count,
        // the sink owns the drop count.
        let (tx, rx) = frame_channel(1);
        let stats = Arc::new(FramerStats::default());
        let mut f = Framer::new(
            FramerConfig::default(),
            ChannelSink::new(tx).with_stats(stats.clone()),
        )
        .unwrap()
        .with_stats(stats.clone());

        f.gate().enable();
        f.process_block(&ramp(0, 240));

        assert_eq!(stats.frames_emitted.load(Ordering::Relaxed), 3);
        assert_eq!(stats.frames_dropped.load(Ordering::Relaxed), 2);
        assert_eq!(rx.try_iter().count(), 1);
    }

    #[test]
    fn zero_frame_size_is_rejected() {
        let (tx, _rx) = frame_channel(4);
        let cfg = FramerConfig {
            frame_size_samples: 0,
            sample_rate_hz: 8_000,
        };
        assert!(Framer::new(cfg, ChannelSink::new(tx)).is_err());
    }
}
