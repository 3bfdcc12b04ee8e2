use crate::AudioError;
use cpal::traits::{DeviceTrait, HostTrait};
use cpal::{Device, Host};

fn get_host() -> Host {
    cpal::default_host()
}

/// Finds the input device called `device_name`, or the host default.
pub fn get_or_default_input(device_name: Option<&str>) -> Result<Device, AudioError> {
    let host = get_host();
    tracing::debug!("Host: {:?}", host.id());

    let Some(target) = device_name else {
        return host
            .default_input_device()
            .ok_or(AudioError::NoDefaultDevice("input"));
    };

    host.input_devices()
        .map_err(|e| AudioError::Device(e.to_string()))?
        .find(|device| device.name().is_ok_and(|name| name == target))
        .ok_or_else(|| AudioError::DeviceNotFound(target.to_string()))
}

/// Finds the output device called `device_name`, or the host default.
pub fn get_or_default_output(device_name: Option<&str>) -> Result<Device, AudioError> {
    let host = get_host();

    let Some(target) = device_name else {
        return host
            .default_output_device()
            .ok_or(AudioError::NoDefaultDevice("output"));
    };

    host.output_devices()
        .map_err(|e| AudioError::Device(e.to_string()))?
        .find(|device| device.name().is_ok_and(|name| name == target))
        .ok_or_else(|| AudioError::DeviceNotFound(target.to_string()))
}

/// One line per input device: name, channels and rate, with the default marked.
pub fn get_available_inputs() -> Result<String, AudioError> {
    let host = get_host();
    let default_name = host.default_input_device().and_then(|d| d.name().ok());
    let devices = host
        .input_devices()
        .map_err(|e| AudioError::Device(e.to_string()))?;

    let mut device_names = Vec::new();
    for device in devices {
        let Ok(name) = device.name() else { continue };
        let config = device.default_input_config().ok();
        device_names.push(describe(&name, config.as_ref(), default_name.as_deref()));
    }
    Ok(device_names.join("\n"))
}

/// Same as [`get_available_inputs`] for output devices.
pub fn get_available_outputs() -> Result<String, AudioError> {
    let host = get_host();
    let default_name = host.default_output_device().and_then(|d| d.name().ok());
    let devices = host
        .output_devices()
        .map_err(|e| AudioError::Device(e.to_string()))?;

    let mut device_names = Vec::new();
    for device in devices {
        let Ok(name) = device.name() else { continue };
        let config = device.default_output_config().ok();
        device_names.push(describe(&name, config.as_ref(), default_name.as_deref()));
    }
    Ok(device_names.join("\n"))
}

fn describe(name: &str, config: Option<&cpal::SupportedStreamConfig>, default_name: Option<&str>) -> String {
    let mut line = match config {
        Some(config) => format!(
            " * {}({}ch, {}hz)",
            name,
            config.channels(),
            config.sample_rate().0
        ),
        None => format!(" * {name}(no default config)"),
    };
    if default_name == Some(name) {
        line.push_str(" [default]");
    }
    line
}
