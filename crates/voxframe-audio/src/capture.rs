use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{Device, SampleFormat, Stream, StreamConfig};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::device::DeviceManager;
use crate::emitter::{FrameSink, FramerStats};
use crate::framer::{ActivationGate, Framer, FramerConfig};
use crate::watchdog::WatchdogTimer;
use voxframe_foundation::AudioError;

/// Negotiated device configuration, reported back to the caller.
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    pub sample_rate: u32,
    pub channels: u16,
}

/// Handle to the dedicated capture thread that owns the cpal stream.
///
/// The stream's render callback is the ingestion entry point: it runs
/// the framer to completion on every delivered block and must never
/// block or panic, so the capture session stays alive regardless of
/// what happens downstream.
pub struct CaptureThread {
    handle: JoinHandle<()>,
    shutdown: Arc<AtomicBool>,
}

impl CaptureThread {
    pub fn spawn<S>(
        cfg: FramerConfig,
        sink: S,
        gate: ActivationGate,
        device_name: Option<String>,
        stats: Option<Arc<FramerStats>>,
    ) -> Result<(Self, DeviceConfig), AudioError>
    where
        S: FrameSink + 'static,
    {
        let running = Arc::new(AtomicBool::new(true));
        let shutdown = running.clone();
        let (startup_tx, startup_rx) =
            crossbeam_channel::bounded::<Result<DeviceConfig, AudioError>>(1);

        let handle = thread::Builder::new()
            .name("audio-capture".to_string())
            .spawn(move || {
                run_capture(cfg, sink, gate, device_name, stats, running, startup_tx);
            })
            .map_err(|e| AudioError::Fatal(format!("Failed to spawn audio thread: {}", e)))?;

        match startup_rx.recv_timeout(Duration::from_secs(5)) {
            Ok(Ok(device_config)) => Ok((Self { handle, shutdown }, device_config)),
            Ok(Err(e)) => {
                let _ = handle.join();
                Err(e)
            }
            Err(_) => {
                shutdown.store(false, Ordering::SeqCst);
                let _ = handle.join();
                Err(AudioError::Fatal(
                    "Timed out waiting for capture stream to start".to_string(),
                ))
            }
        }
    }

    pub fn stop(self) {
        self.shutdown.store(false, Ordering::SeqCst);
        let _ = self.handle.join();
    }
}

fn run_capture<S: FrameSink + 'static>(
    cfg: FramerConfig,
    sink: S,
    gate: ActivationGate,
    device_name: Option<String>,
    stats: Option<Arc<FramerStats>>,
    running: Arc<AtomicBool>,
    startup_tx: crossbeam_channel::Sender<Result<DeviceConfig, AudioError>>,
) {
    let (stream, mut watchdog, device_config) =
        match open_stream(cfg, sink, gate, device_name.as_deref(), stats) {
            Ok(parts) => parts,
            Err(e) => {
                let _ = startup_tx.send(Err(e));
                return;
            }
        };

    if let Err(e) = stream.play() {
        let _ = startup_tx.send(Err(e.into()));
        return;
    }
    watchdog.start(running.clone());

    tracing::info!(
        sample_rate = device_config.sample_rate,
        channels = device_config.channels,
        "Audio capture started"
    );
    let _ = startup_tx.send(Ok(device_config));

    // The cpal stream is not Send, so it lives and dies on this thread.
    while running.load(Ordering::SeqCst) {
        thread::sleep(Duration::from_millis(100));
    }

    drop(stream);
    watchdog.stop();
    tracing::info!("Audio capture thread shutting down");
}

fn open_stream<S: FrameSink + 'static>(
    cfg: FramerConfig,
    sink: S,
    gate: ActivationGate,
    device_name: Option<&str>,
    stats: Option<Arc<FramerStats>>,
) -> Result<(Stream, WatchdogTimer, DeviceConfig), AudioError> {
    let manager = DeviceManager::new()?;
    let device = manager.open_device(device_name)?;
    if let Ok(name) = device.name() {
        tracing::info!(
            "Selected input device: {} (host: {:?})",
            name,
            manager.host_id()
        );
    }

    // Fail fast on a rate mismatch; the frame duration contract is
    // meaningless if the host captures at some other rate.
    let (config, sample_format) = manager.negotiate_config(&device, cfg.sample_rate_hz)?;
    let device_config = DeviceConfig {
        sample_rate: config.sample_rate.0,
        channels: config.channels,
    };

    let mut framer = Framer::new(cfg, sink)?.with_gate(gate);
    if let Some(stats) = stats {
        framer = framer.with_stats(stats);
    }

    let watchdog = WatchdogTimer::new(Duration::from_secs(5));
    let stream = build_stream(&device, &config, sample_format, framer, watchdog.clone())?;
    Ok((stream, watchdog, device_config))
}

fn build_stream<S: FrameSink + 'static>(
    device: &Device,
    config: &StreamConfig,
    sample_format: SampleFormat,
    mut framer: Framer<S>,
    watchdog: WatchdogTimer,
) -> Result<Stream, AudioError> {
    let channels = config.channels as usize;

    let err_fn = |err: cpal::StreamError| {
        tracing::error!("Audio stream error: {}", err);
    };

    // Scratch for first-channel extraction, reused across callbacks so
    // the hot path does not allocate in steady state.
    thread_local! {
        static BLOCK_BUFFER: std::cell::RefCell<Vec<f32>> =
            const { std::cell::RefCell::new(Vec::new()) };
    }

    let mut ingest = move |block: &[f32]| {
        watchdog.feed();
        framer.process_block(block);
    };

    let stream = match sample_format {
        SampleFormat::F32 => device.build_input_stream(
            config,
            move |data: &[f32], _: &_| {
                BLOCK_BUFFER.with(|buf| {
                    let mut block = buf.borrow_mut();
                    first_channel_f32(data, channels, &mut block);
                    ingest(&block);
                });
            },
            err_fn,
            None,
        )?,
        SampleFormat::I16 => device.build_input_stream(
            config,
            move |data: &[i16], _: &_| {
                BLOCK_BUFFER.with(|buf| {
                    let mut block = buf.borrow_mut();
                    first_channel_i16(data, channels, &mut block);
                    ingest(&block);
                });
            },
            err_fn,
            None,
        )?,
        SampleFormat::U16 => device.build_input_stream(
            config,
            move |data: &[u16], _: &_| {
                BLOCK_BUFFER.with(|buf| {
                    let mut block = buf.borrow_mut();
                    first_channel_u16(data, channels, &mut block);
                    ingest(&block);
                });
            },
            err_fn,
            None,
        )?,
        other => {
            return Err(AudioError::FormatNotSupported {
                format: format!("{:?}", other),
            });
        }
    };

    Ok(stream)
}

// This core consumes only the first channel of interleaved input;
// additional channels are a documented limitation, not something to
// silently mix down.

pub(crate) fn first_channel_f32(data: &[f32], channels: usize, out: &mut Vec<f32>) {
    out.clear();
    if channels == 0 {
        return;
    }
    out.reserve(data.len() / channels);
    for frame in data.chunks_exact(channels) {
        out.push(frame[0].clamp(-1.0, 1.0));
    }
}

pub(crate) fn first_channel_i16(data: &[i16], channels: usize, out: &mut Vec<f32>) {
    out.clear();
    if channels == 0 {
        return;
    }
    out.reserve(data.len() / channels);
    for frame in data.chunks_exact(channels) {
        out.push((frame[0] as f32 / 32_768.0).clamp(-1.0, 1.0));
    }
}

pub(crate) fn first_channel_u16(data: &[u16], channels: usize, out: &mut Vec<f32>) {
    out.clear();
    if channels == 0 {
        return;
    }
    out.reserve(data.len() / channels);
    for frame in data.chunks_exact(channels) {
        // Center unsigned [0, 65535] before normalizing.
        let centered = frame[0] as i32 - 32_768;
        out.push((centered as f32 / 32_768.0).clamp(-1.0, 1.0));
    }
}
