//! CPAL output device discovery.
//!
//! Only compiled with the `cpal_sink` feature. [`BlockRuntime`] uses this to
//! resolve `sink-auto` nodes to a real output; embedders can also enumerate
//! devices themselves and check what sample rates are on offer.
//!
//! [`BlockRuntime`]: crate::BlockRuntime

use cpal::traits::{DeviceTrait, HostTrait};

/// A discovered audio output device.
///
/// Use [`CpalDevice::default_output`] for the system default, or
/// [`CpalDevice::list_outputs`] to enumerate everything available.
pub struct CpalDevice {
    device: cpal::Device,
    name: String,
    sample_rate: u32,
    channels: u16,
}

impl CpalDevice {
    /// The system's default output device, if there is one.
    pub fn default_output() -> Option<Self> {
        let host = cpal::default_host();
        let device = host.default_output_device()?;
        let config = device.default_output_config().ok()?;
        let name = device.name().unwrap_or_else(|_| "Unknown".into());

        Some(Self {
            sample_rate: config.sample_rate().0,
            channels: config.channels(),
            name,
            device,
        })
    }

    /// All available output devices; empty if enumeration fails.
    pub fn list_outputs() -> Vec<Self> {
        let host = cpal::default_host();
        host.output_devices()
            .map(|devices| {
                devices
                    .filter_map(|device| {
                        let config = device.default_output_config().ok()?;
                        let name = device.name().unwrap_or_else(|_| "Unknown".into());
                        Some(Self {
                            sample_rate: config.sample_rate().0,
                            channels: config.channels(),
                            name,
                            device,
                        })
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// The device name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The device's preferred sample rate in Hz.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Number of output channels.
    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub(crate) fn raw_device(&self) -> &cpal::Device {
        &self.device
    }

    /// A stream config for f32 output at the requested sample rate.
    pub(crate) fn stream_config(&self, sample_rate: u32) -> Result<cpal::StreamConfig, String> {
        let supported = self
            .device
            .supported_output_configs()
            .map_err(|err| err.to_string())?
            .filter(|c| c.sample_format() == cpal::SampleFormat::F32)
            .find(|c| {
                c.min_sample_rate().0 <= sample_rate && sample_rate <= c.max_sample_rate().0
            })
            .ok_or_else(|| {
                format!(
                    "device '{}' does not support f32 output at {} Hz",
                    self.name, sample_rate
                )
            })?;
        Ok(supported
            .with_sample_rate(cpal::SampleRate(sample_rate))
            .config())
    }
}
