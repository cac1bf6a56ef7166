mod consumer;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;

use voxframe_audio::device::DeviceManager;
use voxframe_audio::{
    frame_channel, ActivationGate, CaptureThread, ChannelSink, FramerConfig, FramerStats,
};

#[derive(Parser, Debug)]
#[command(
    name = "voxframe",
    about = "Captures microphone audio and re-packages it into 80-sample telephony frames"
)]
struct Cli {
    /// Input device name; defaults to the host's default input device.
    #[arg(long)]
    device: Option<String>,

    /// How long to capture before shutting down.
    #[arg(long, default_value_t = 10)]
    duration_secs: u64,

    /// Capacity of the frame channel; overflow drops frames.
    #[arg(long, default_value_t = 64)]
    channel_capacity: usize,

    /// List available input devices and exit.
    #[arg(long)]
    list_devices: bool,
}

fn init_logging() {
    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt().with_env_filter(log_level).init();
}

fn main() -> anyhow::Result<()> {
    init_logging();
    let cli = Cli::parse();

    if cli.list_devices {
        let manager = DeviceManager::new().context("Failed to initialize audio host")?;
        for device in manager.enumerate_devices() {
            let marker = if device.is_default { " (default)" } else { "" };
            println!("{}{}", device.name, marker);
        }
        return Ok(());
    }

    let cfg = FramerConfig::default();
    tracing::info!(
        frame_size = cfg.frame_size_samples,
        sample_rate = cfg.sample_rate_hz,
        frame_ms = cfg.frame_duration_ms(),
        "Starting voxframe"
    );

    let stats = Arc::new(FramerStats::default());
    let (tx, rx) = frame_channel(cli.channel_capacity);
    let sink = ChannelSink::new(tx).with_stats(stats.clone());
    let gate = ActivationGate::new();

    let (capture, device_config) = CaptureThread::spawn(
        cfg,
        sink,
        gate.clone(),
        cli.device.clone(),
        Some(stats.clone()),
    )
    .context("Failed to start audio capture")?;
    tracing::info!(
        sample_rate = device_config.sample_rate,
        channels = device_config.channels,
        "Capture stream negotiated"
    );

    gate.enable();
    let summary = consumer::drain_for(&rx, Duration::from_secs(cli.duration_secs));
    gate.disable();

    capture.stop();

    tracing::info!(
        frames = summary.frames,
        bytes = summary.bytes,
        last_timestamp = summary.last_timestamp,
        emitted = stats.frames_emitted.load(Ordering::Relaxed),
        dropped = stats.frames_dropped.load(Ordering::Relaxed),
        discarded_blocks = stats.blocks_discarded.load(Ordering::Relaxed),
        "Capture session finished"
    );

    Ok(())
}
