//! Device enumeration and opening via CPAL.

use cpal::traits::{DeviceTrait, HostTrait};
use cpal::Device;

use crate::{AudioPipeError, DeviceSelection};

/// Details of one audio device, as reported by [`list_devices`].
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    /// Device name, usable with [`DeviceSelection::ByName`].
    pub name: String,
    /// Maximum input channel count, 0 if the device cannot capture.
    pub max_input_channels: u16,
    /// Maximum output channel count, 0 if the device cannot play back.
    pub max_output_channels: u16,
    /// The device's default sample rate in Hz.
    pub default_sample_rate: u32,
    /// Name of the host API providing the device.
    pub host_name: String,
}

/// Lists the audio devices of the default host.
///
/// # Errors
///
/// Returns `BackendError` if the host cannot enumerate its devices.
pub fn list_devices() -> Result<Vec<DeviceInfo>, AudioPipeError> {
    let host = cpal::default_host();
    let host_name = host.id().name().to_string();
    let devices = host
        .devices()
        .map_err(|e| AudioPipeError::BackendError(e.to_string()))?;

    let mut infos = Vec::new();
    for device in devices {
        let Ok(name) = device.name() else { continue };
        infos.push(DeviceInfo {
            name,
            max_input_channels: max_channels(device.supported_input_configs().ok()),
            max_output_channels: max_channels(device.supported_output_configs().ok()),
            default_sample_rate: default_rate(&device),
            host_name: host_name.clone(),
        });
    }
    Ok(infos)
}

fn max_channels<I>(configs: Option<I>) -> u16
where
    I: Iterator<Item = cpal::SupportedStreamConfigRange>,
{
    configs
        .map(|iter| iter.map(|config| config.channels()).max().unwrap_or(0))
        .unwrap_or(0)
}

fn default_rate(device: &Device) -> u32 {
    device
        .default_input_config()
        .or_else(|_| device.default_output_config())
        .map(|config| config.sample_rate().0)
        .unwrap_or(0)
}

/// Returns the names of the host APIs available on this system.
pub fn available_hosts() -> Vec<String> {
    cpal::available_hosts()
        .into_iter()
        .map(|id| id.name().to_string())
        .collect()
}

/// Returns the name of the default input device, if one is configured.
pub fn default_input_device_name() -> Option<String> {
    cpal::default_host().default_input_device()?.name().ok()
}

/// Returns the name of the default output device, if one is configured.
pub fn default_output_device_name() -> Option<String> {
    cpal::default_host().default_output_device()?.name().ok()
}

/// Opens the capture device named by `selection`.
pub(crate) fn open_input_device(selection: &DeviceSelection) -> Result<Device, AudioPipeError> {
    match selection {
        DeviceSelection::SystemDefault => cpal::default_host()
            .default_input_device()
            .ok_or(AudioPipeError::NoDefaultDevice { direction: "input" }),
        DeviceSelection::ByName(name) => find_by_name(name, |host| {
            host.input_devices()
                .map_err(|e| AudioPipeError::BackendError(e.to_string()))
        }),
    }
}

/// Opens the playback device named by `selection`.
pub(crate) fn open_output_device(selection: &DeviceSelection) -> Result<Device, AudioPipeError> {
    match selection {
        DeviceSelection::SystemDefault => {
            cpal::default_host()
                .default_output_device()
                .ok_or(AudioPipeError::NoDefaultDevice {
                    direction: "output",
                })
        }
        DeviceSelection::ByName(name) => find_by_name(name, |host| {
            host.output_devices()
                .map_err(|e| AudioPipeError::BackendError(e.to_string()))
        }),
    }
}

fn find_by_name<I>(
    name: &str,
    devices_of: impl Fn(&cpal::Host) -> Result<I, AudioPipeError>,
) -> Result<Device, AudioPipeError>
where
    I: Iterator<Item = Device>,
{
    let host = cpal::default_host();
    for device in devices_of(&host)? {
        if let Ok(device_name) = device.name() {
            if device_name == name {
                return Ok(device);
            }
        }
    }
    Err(AudioPipeError::DeviceNotFound {
        name: name.to_string(),
    })
}
