//! Hardware output through cpal.

use crate::backend::{
    AudioBackend, AudioDevice, BackendStreamConfig, ErrorCallback, OutputCallback, StreamHandle,
};
use crate::{Error, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, Host};

/// Device name through `description()` (cpal 0.17+).
fn device_name(device: &Device) -> std::result::Result<String, cpal::DeviceNameError> {
    device.description().map(|d| d.name().to_string())
}

fn describe_output(device: &Device, name: String) -> AudioDevice {
    AudioDevice {
        name,
        is_output: true,
        is_input: device.default_input_config().is_ok(),
        default_sample_rate: device
            .default_output_config()
            .map(|c| c.sample_rate())
            .unwrap_or(48000),
    }
}

/// cpal output backend on the platform's default host.
pub struct CpalBackend {
    host: Host,
}

impl CpalBackend {
    /// Connect to the default host (ALSA, CoreAudio, WASAPI).
    pub fn new() -> Self {
        let host = cpal::default_host();
        tracing::info!(host = host.id().name(), "cpal backend initialized");
        Self { host }
    }

    fn find_output_device(&self, name: Option<&str>) -> Result<Device> {
        let Some(search) = name else {
            return self.host.default_output_device().ok_or(Error::NoDevice);
        };
        let search_lower = search.to_lowercase();
        let devices = self
            .host
            .output_devices()
            .map_err(|e| Error::Stream(e.to_string()))?;
        for device in devices {
            if let Ok(dev_name) = device_name(&device)
                && dev_name.to_lowercase().contains(search_lower.as_str())
            {
                return Ok(device);
            }
        }
        Err(Error::DeviceNotFound(format!(
            "no output device matching '{}'",
            search
        )))
    }
}

impl Default for CpalBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CpalBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CpalBackend")
            .field("host", &self.host.id().name())
            .finish()
    }
}

impl AudioBackend for CpalBackend {
    fn name(&self) -> &'static str {
        "cpal"
    }

    fn list_devices(&self) -> Result<Vec<AudioDevice>> {
        let mut devices = Vec::new();
        if let Ok(outputs) = self.host.output_devices() {
            for device in outputs {
                if let Ok(name) = device_name(&device) {
                    devices.push(describe_output(&device, name));
                }
            }
        }
        if let Ok(inputs) = self.host.input_devices() {
            for device in inputs {
                let Ok(name) = device_name(&device) else {
                    continue;
                };
                if devices.iter().any(|d| d.name == name) {
                    continue;
                }
                devices.push(AudioDevice {
                    name,
                    is_output: false,
                    is_input: true,
                    default_sample_rate: device
                        .default_input_config()
                        .map(|c| c.sample_rate())
                        .unwrap_or(48000),
                });
            }
        }
        Ok(devices)
    }

    fn default_output_device(&self) -> Result<Option<AudioDevice>> {
        Ok(self
            .host
            .default_output_device()
            .and_then(|d| device_name(&d).ok().map(|name| describe_output(&d, name))))
    }

    fn build_output_stream(
        &self,
        config: &BackendStreamConfig,
        mut callback: OutputCallback,
        mut error_callback: ErrorCallback,
    ) -> Result<StreamHandle> {
        let device = self.find_output_device(config.device_name.as_deref())?;

        let stream_config = cpal::StreamConfig {
            channels: config.channels,
            sample_rate: config.sample_rate,
            buffer_size: cpal::BufferSize::Fixed(config.buffer_size),
        };

        let stream = device
            .build_output_stream(
                &stream_config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    callback(data);
                },
                move |err| {
                    error_callback(&err.to_string());
                },
                None,
            )
            .map_err(|e| Error::DeviceUnavailable(e.to_string()))?;

        stream
            .play()
            .map_err(|e| Error::DeviceUnavailable(e.to_string()))?;
        tracing::info!(
            device = device_name(&device).unwrap_or_default(),
            channels = config.channels,
            sample_rate = config.sample_rate,
            buffer_size = config.buffer_size,
            "output stream started"
        );

        Ok(StreamHandle::new(stream))
    }

    fn actual_sample_rate(&self, config: &BackendStreamConfig) -> u32 {
        let Ok(device) = self.find_output_device(config.device_name.as_deref()) else {
            return config.sample_rate;
        };
        let supported = device.supported_output_configs().is_ok_and(|mut ranges| {
            ranges.any(|r| {
                r.min_sample_rate() <= config.sample_rate && config.sample_rate <= r.max_sample_rate()
            })
        });
        if supported {
            config.sample_rate
        } else {
            device
                .default_output_config()
                .map_or(config.sample_rate, |c| c.sample_rate())
        }
    }
}
