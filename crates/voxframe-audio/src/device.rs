use cpal::traits::{DeviceTrait, HostTrait};
use cpal::{BufferSize, Device, Host, SampleFormat, SampleRate, StreamConfig};

use voxframe_foundation::AudioError;

#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub name: String,
    pub is_default: bool,
}

pub struct DeviceManager {
    host: Host,
}

impl DeviceManager {
    pub fn new() -> Result<Self, AudioError> {
        Ok(Self {
            host: cpal::default_host(),
        })
    }

    pub fn host_id(&self) -> cpal::HostId {
        self.host.id()
    }

    pub fn enumerate_devices(&self) -> Vec<DeviceInfo> {
        let default_name = self.default_input_device_name();

        let mut devices = Vec::new();
        if let Ok(inputs) = self.host.input_devices() {
            for device in inputs {
                if let Ok(name) = device.name() {
                    let is_default = default_name.as_deref() == Some(name.as_str());
                    devices.push(DeviceInfo { name, is_default });
                }
            }
        }
        devices
    }

    pub fn default_input_device_name(&self) -> Option<String> {
        self.host.default_input_device().and_then(|d| d.name().ok())
    }

    /// Open the named input device, or the host default when no name is
    /// given.
    pub fn open_device(&self, name: Option<&str>) -> Result<Device, AudioError> {
        match name {
            Some(wanted) => {
                let inputs = self.host.input_devices()?;
                for device in inputs {
                    if device.name().map(|n| n == wanted).unwrap_or(false) {
                        return Ok(device);
                    }
                }
                Err(AudioError::DeviceNotFound {
                    name: Some(wanted.to_string()),
                })
            }
            None => self
                .host
                .default_input_device()
                .ok_or(AudioError::DeviceNotFound { name: None }),
        }
    }

    /// Negotiate a stream config at exactly `required_rate` Hz.
    ///
    /// There is no resampling stage in this pipeline, so a device that
    /// cannot capture at the configured rate is a hard error rather than
    /// something to paper over silently.
    pub fn negotiate_config(
        &self,
        device: &Device,
        required_rate: u32,
    ) -> Result<(StreamConfig, SampleFormat), AudioError> {
        let mut device_default = None;

        if let Ok(default_config) = device.default_input_config() {
            device_default = Some(default_config.sample_rate().0);
            if default_config.sample_rate().0 == required_rate {
                return Ok((
                    StreamConfig {
                        channels: default_config.channels(),
                        sample_rate: default_config.sample_rate(),
                        buffer_size: BufferSize::Default,
                    },
                    default_config.sample_format(),
                ));
            }
        }

        // The default rate differs; look for any supported range that
        // covers the required rate.
        let ranges = device.supported_input_configs()?;
        for range in ranges {
            if range.min_sample_rate().0 <= required_rate
                && required_rate <= range.max_sample_rate().0
            {
                let config = range.with_sample_rate(SampleRate(required_rate));
                return Ok((
                    StreamConfig {
                        channels: config.channels(),
                        sample_rate: config.sample_rate(),
                        buffer_size: BufferSize::Default,
                    },
                    config.sample_format(),
                ));
            }
        }

        Err(AudioError::SampleRateMismatch {
            required: required_rate,
            device_default,
        })
    }
}
