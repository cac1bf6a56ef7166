//! Cross-thread pipeline tests: producer thread drives the framer, the
//! consumer drains the channel on another thread.

use std::sync::Arc;
use std::thread;

use voxframe_audio::{frame_channel, ActivationGate, ChannelSink, Framer, FramerConfig, FramerStats};

#[test]
fn frames_arrive_in_emission_order_across_threads() {
    let (tx, rx) = frame_channel(1024);
    let gate = ActivationGate::new();
    gate.enable();

    let producer_gate = gate.clone();
    let producer = thread::spawn(move || {
        let mut framer = Framer::new(FramerConfig::default(), ChannelSink::new(tx))
            .unwrap()
            .with_gate(producer_gate);

        // 100 blocks of 128 samples, a strictly increasing ramp overall.
        let mut next = 0u32;
        for _ in 0..100 {
            let block: Vec<f32> = (0..128)
                .map(|_| {
                    let v = next as f32 / 1_000_000.0;
                    next += 1;
                    v
                })
                .collect();
            framer.process_block(&block);
        }
        // Dropping the framer drops the sender and ends the stream.
    });

    let frames: Vec<_> = rx.iter().collect();
    producer.join().unwrap();

    // 12800 samples -> exactly 160 frames of 80 samples.
    assert_eq!(frames.len(), 160);

    let mut expected = 0u32;
    for frame in &frames {
        assert_eq!(frame.len(), 80);
        for &sample in frame.samples() {
            assert_eq!(sample, expected as f32 / 1_000_000.0);
            expected += 1;
        }
    }

    for pair in frames.windows(2) {
        assert!(pair[1].timestamp() >= pair[0].timestamp());
    }
}

#[test]
fn gate_toggled_from_another_thread_applies_at_block_boundaries() {
    let (tx, rx) = frame_channel(64);
    let gate = ActivationGate::new();
    let stats = Arc::new(FramerStats::default());

    let mut framer = Framer::new(FramerConfig::default(), ChannelSink::new(tx))
        .unwrap()
        .with_gate(gate.clone())
        .with_stats(stats.clone());

    let toggler = {
        let gate = gate.clone();
        thread::spawn(move || gate.enable())
    };
    toggler.join().unwrap();

    assert_eq!(framer.process_block(&[0.1; 80]), 1);

    let toggler = thread::spawn(move || gate.disable());
    toggler.join().unwrap();

    assert_eq!(framer.process_block(&[0.2; 80]), 0);

    use std::sync::atomic::Ordering;
    assert_eq!(stats.frames_emitted.load(Ordering::Relaxed), 1);
    assert_eq!(stats.blocks_discarded.load(Ordering::Relaxed), 1);
    assert_eq!(rx.try_iter().count(), 1);
}
