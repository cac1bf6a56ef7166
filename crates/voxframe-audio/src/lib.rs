pub mod capture;
pub mod constants;
pub mod device;
pub mod emitter;
pub mod frame;
pub mod framer;
pub mod watchdog;

// Public API
pub use capture::{CaptureThread, DeviceConfig};
pub use device::{DeviceInfo, DeviceManager};
pub use emitter::{frame_channel, ChannelSink, FrameReceiver, FrameSink, FramerStats};
pub use frame::AudioFrame;
pub use framer::{ActivationGate, Framer, FramerConfig};
pub use watchdog::WatchdogTimer;
