//! Microphone recording of single phrases.

use crate::AudioError;
use crate::audio::{SPEECH_SAMPLE_RATE, downmix, resample, rms};
use crate::endpoint::{Endpoint, Endpointer, MIN_ENERGY_THRESHOLD, threshold_for_ambient};
use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{Device, Stream, StreamConfig};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(30);

/// What a call to [`Recorder::record_phrase`] heard.
#[derive(Debug, Clone, PartialEq)]
pub enum Recording {
    /// Mono samples at [`SPEECH_SAMPLE_RATE`].
    Phrase(Vec<f32>),
    NoSpeech,
}

/// Records phrases from one input device. All methods block.
pub struct Recorder {
    device: Device,
    config: StreamConfig,
    threshold: f32,
}

impl Recorder {
    pub fn new(device: Device) -> Result<Self, AudioError> {
        let default_config = device
            .default_input_config()
            .map_err(|e| AudioError::Device(e.to_string()))?;
        let config: StreamConfig = default_config.into();
        tracing::info!(
            device = device.name().unwrap_or_default(),
            sample_rate = config.sample_rate.0,
            channels = config.channels,
            "input device ready"
        );
        Ok(Self {
            device,
            config,
            threshold: MIN_ENERGY_THRESHOLD,
        })
    }

    /// Listens to the room for `duration` and sets the speech threshold from
    /// its background energy.
    pub fn calibrate(&mut self, duration: Duration) -> Result<f32, AudioError> {
        let buffer = Arc::new(Mutex::new(Vec::new()));
        let stream = self.open(Arc::clone(&buffer))?;
        thread::sleep(duration);
        drop(stream);

        let ambient = take(&buffer);
        self.threshold = threshold_for_ambient(rms(&ambient));
        tracing::info!(threshold = self.threshold, samples = ambient.len(), "calibrated for ambient noise");
        Ok(self.threshold)
    }

    /// Waits up to `start_timeout` for speech, then records until a pause or
    /// until `max_phrase` has elapsed.
    pub fn record_phrase(&self, start_timeout: Duration, max_phrase: Duration) -> Result<Recording, AudioError> {
        let sample_rate = self.config.sample_rate.0;
        let mut endpointer = Endpointer::new(sample_rate, self.threshold, start_timeout, max_phrase);
        let deadline = Instant::now() + start_timeout + max_phrase + Duration::from_secs(1);

        let buffer = Arc::new(Mutex::new(Vec::new()));
        let stream = self.open(Arc::clone(&buffer))?;
        let mut captured: Vec<f32> = Vec::new();
        let endpoint = loop {
            thread::sleep(POLL_INTERVAL);
            let fresh = take(&buffer);
            captured.extend_from_slice(&fresh);
            match endpointer.feed(&fresh) {
                Endpoint::Pending if Instant::now() < deadline => continue,
                Endpoint::Pending => break endpointer.finish(),
                endpoint => break endpoint,
            }
        };
        drop(stream);

        match endpoint {
            Endpoint::Phrase { start, end } => {
                let end = end.min(captured.len());
                let phrase = &captured[start.min(end)..end];
                tracing::debug!(samples = phrase.len(), sample_rate, "phrase recorded");
                let phrase = resample(phrase, sample_rate as f64, SPEECH_SAMPLE_RATE as f64)?;
                Ok(Recording::Phrase(phrase))
            }
            Endpoint::NoSpeech | Endpoint::Pending => Ok(Recording::NoSpeech),
        }
    }

    fn open(&self, buffer: Arc<Mutex<Vec<f32>>>) -> Result<Stream, AudioError> {
        let channels = self.config.channels as usize;
        let stream = self
            .device
            .build_input_stream(
                &self.config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    if let Ok(mut buf) = buffer.lock() {
                        buf.extend(downmix(data, channels));
                    }
                },
                move |err| tracing::error!("An error occurred on input stream: {}", err),
                None,
            )
            .map_err(|e| AudioError::Stream(e.to_string()))?;
        stream.play().map_err(|e| AudioError::Stream(e.to_string()))?;
        Ok(stream)
    }
}

fn take(buffer: &Mutex<Vec<f32>>) -> Vec<f32> {
    buffer
        .lock()
        .map(|mut buf| std::mem::take(&mut *buf))
        .unwrap_or_default()
}
