pub mod audio;
pub mod device;
pub mod endpoint;
pub mod playback;
pub mod record;

/// Failures of the local audio layer.
#[derive(Debug, thiserror::Error)]
pub enum AudioError {
    #[error("no default {0} device available")]
    NoDefaultDevice(&'static str),
    #[error("audio device {0:?} not found")]
    DeviceNotFound(String),
    #[error("audio device error: {0}")]
    Device(String),
    #[error("audio stream error: {0}")]
    Stream(String),
    #[error("resampling failed: {0}")]
    Resample(String),
    #[error("wav encoding failed: {0}")]
    Wav(#[from] hound::Error),
}
