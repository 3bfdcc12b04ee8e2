//! Blocking playback of complete clips.

use crate::AudioError;
use crate::audio::{resample, shared_buffer};
use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{Device, StreamConfig};
use ringbuf::traits::{Consumer, Observer, Producer, Split};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(50);
const DRAIN_GRACE: Duration = Duration::from_millis(500);
const TAIL: Duration = Duration::from_millis(100);

pub struct Player {
    device: Device,
    config: StreamConfig,
}

impl Player {
    pub fn new(device: Device) -> Result<Self, AudioError> {
        let default_config = device
            .default_output_config()
            .map_err(|e| AudioError::Device(e.to_string()))?;
        let config: StreamConfig = default_config.into();
        tracing::info!(
            device = device.name().unwrap_or_default(),
            sample_rate = config.sample_rate.0,
            channels = config.channels,
            "output device ready"
        );
        Ok(Self { device, config })
    }

    /// Plays mono `samples` recorded at `sample_rate` and returns when they
    /// have been played.
    pub fn play_blocking(&self, samples: &[f32], sample_rate: f64) -> Result<(), AudioError> {
        if samples.is_empty() {
            return Ok(());
        }

        let output_rate = self.config.sample_rate.0;
        let samples = resample(samples, sample_rate, output_rate as f64)?;
        let sample_count = samples.len();

        let (mut producer, mut consumer) = shared_buffer(sample_count).split();
        let pushed = producer.push_slice(&samples);
        if pushed < sample_count {
            tracing::warn!(pushed, sample_count, "playback buffer truncated");
        }

        let finished = Arc::new(AtomicBool::new(false));
        let finished_flag = Arc::clone(&finished);
        let channels = self.config.channels as usize;
        let stream = self
            .device
            .build_output_stream(
                &self.config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    for frame in data.chunks_mut(channels) {
                        let sample = consumer.try_pop().unwrap_or(0.0);
                        frame.fill(sample);
                    }
                    if consumer.is_empty() {
                        finished_flag.store(true, Ordering::Release);
                    }
                },
                move |err| tracing::error!("An error occurred on output stream: {}", err),
                None,
            )
            .map_err(|e| AudioError::Stream(e.to_string()))?;
        stream.play().map_err(|e| AudioError::Stream(e.to_string()))?;

        let duration = Duration::from_secs_f64(sample_count as f64 / output_rate as f64);
        let timeout = duration + DRAIN_GRACE;
        let start = Instant::now();
        while !finished.load(Ordering::Acquire) {
            if start.elapsed() > timeout {
                tracing::warn!("playback did not drain before the timeout");
                break;
            }
            thread::sleep(POLL_INTERVAL);
        }
        thread::sleep(TAIL);
        drop(stream);

        tracing::debug!(samples = sample_count, "playback complete");
        Ok(())
    }
}
