use thiserror::Error;

#[derive(Error, Debug)]
pub enum AudioError {
    #[error("Device not found: {name:?}")]
    DeviceNotFound { name: Option<String> },

    #[error("Format not supported: {format}")]
    FormatNotSupported { format: String },

    #[error("Device cannot capture at {required} Hz (device default: {device_default:?} Hz); no resampling stage is present")]
    SampleRateMismatch {
        required: u32,
        device_default: Option<u32>,
    },

    #[error("Invalid framer configuration: {0}")]
    InvalidConfig(String),

    #[error("Device enumeration error: {0}")]
    Devices(#[from] cpal::DevicesError),

    #[error("Build stream error: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("Play stream error: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),

    #[error("Supported stream configs error: {0}")]
    SupportedStreamConfigs(#[from] cpal::SupportedStreamConfigsError),

    #[error("Fatal error, cannot recover: {0}")]
    Fatal(String),
}
