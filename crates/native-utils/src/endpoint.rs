//! Energy-based detection of where a spoken phrase starts and ends.
//!
//! Works on sample counts only, so it can be driven by a live stream or by a
//! recorded buffer alike.

use crate::audio::rms;
use std::time::Duration;

/// Signal energy never counts as speech below this level, however quiet the room.
pub const MIN_ENERGY_THRESHOLD: f32 = 300.0 / 32768.0;

/// Ambient energy is multiplied by this to get the speech threshold.
pub const AMBIENT_MULTIPLIER: f32 = 1.5;

const FRAME: Duration = Duration::from_millis(30);
const PAUSE: Duration = Duration::from_millis(800);
const PRE_ROLL: Duration = Duration::from_millis(300);

/// Speech threshold for a room whose background noise measured `ambient_rms`.
pub fn threshold_for_ambient(ambient_rms: f32) -> f32 {
    (ambient_rms * AMBIENT_MULTIPLIER).max(MIN_ENERGY_THRESHOLD)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    /// Keep feeding samples.
    Pending,
    /// Nothing crossed the threshold before the start timeout.
    NoSpeech,
    /// The phrase occupies `start..end` of everything fed so far.
    Phrase { start: usize, end: usize },
}

#[derive(Debug)]
pub struct Endpointer {
    threshold: f32,
    frame_len: usize,
    start_timeout: usize,
    max_phrase: usize,
    pause: usize,
    pre_roll: usize,
    pending: Vec<f32>,
    consumed: usize,
    speech_start: Option<usize>,
    last_voiced: usize,
    done: Option<Endpoint>,
}

impl Endpointer {
    pub fn new(sample_rate: u32, threshold: f32, start_timeout: Duration, max_phrase: Duration) -> Self {
        let samples = |d: Duration| (d.as_secs_f64() * sample_rate as f64).round() as usize;
        Self {
            threshold,
            frame_len: samples(FRAME).max(1),
            start_timeout: samples(start_timeout),
            max_phrase: samples(max_phrase),
            pause: samples(PAUSE),
            pre_roll: samples(PRE_ROLL),
            pending: Vec::new(),
            consumed: 0,
            speech_start: None,
            last_voiced: 0,
            done: None,
        }
    }

    /// Feeds the next block of mono samples. Once a final endpoint is
    /// returned, further input is ignored and the same endpoint is repeated.
    pub fn feed(&mut self, samples: &[f32]) -> Endpoint {
        if let Some(done) = self.done {
            return done;
        }
        self.pending.extend_from_slice(samples);

        let mut offset = 0;
        while self.pending.len() - offset >= self.frame_len {
            let frame = &self.pending[offset..offset + self.frame_len];
            let voiced = rms(frame) >= self.threshold;
            let frame_start = self.consumed;
            self.consumed += self.frame_len;
            offset += self.frame_len;

            if let Some(endpoint) = self.step(frame_start, voiced) {
                self.done = Some(endpoint);
                break;
            }
        }
        self.pending.drain(..offset);

        self.done.unwrap_or(Endpoint::Pending)
    }

    /// Closes the stream: a phrase in progress ends at the last sample fed.
    pub fn finish(&mut self) -> Endpoint {
        if let Some(done) = self.done {
            return done;
        }
        let endpoint = match self.speech_start {
            Some(start) => Endpoint::Phrase {
                start,
                end: self.consumed + self.pending.len(),
            },
            None => Endpoint::NoSpeech,
        };
        self.done = Some(endpoint);
        endpoint
    }

    fn step(&mut self, frame_start: usize, voiced: bool) -> Option<Endpoint> {
        let frame_end = self.consumed;
        match self.speech_start {
            None if voiced => {
                self.speech_start = Some(frame_start.saturating_sub(self.pre_roll));
                self.last_voiced = frame_end;
                None
            }
            None if frame_end >= self.start_timeout => Some(Endpoint::NoSpeech),
            None => None,
            Some(start) => {
                if voiced {
                    self.last_voiced = frame_end;
                }
                if frame_end - self.last_voiced >= self.pause || frame_end - start >= self.max_phrase {
                    Some(Endpoint::Phrase { start, end: frame_end })
                } else {
                    None
                }
            }
        }
    }
}
