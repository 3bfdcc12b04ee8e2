use anyhow::Result;
use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use std::fmt;
use std::time::Duration;

/// What a single listening pass produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HypothesisResult {
    /// Best guess of what the user said.
    Text(String),
    /// Nobody started speaking before the start timeout.
    NoSpeechTimeout,
    /// Speech was heard but could not be transcribed.
    Unintelligible,
    /// The transcription service failed.
    ServiceError(String),
}

/// A listening pass that produced no hypothesis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureFailure {
    NoSpeechTimeout,
    Unintelligible,
    ServiceError(String),
}

impl HypothesisResult {
    /// Splits the result into a hypothesis or the reason there is none.
    pub fn into_hypothesis(self) -> Result<String, CaptureFailure> {
        match self {
            Self::Text(text) => Ok(text),
            Self::NoSpeechTimeout => Err(CaptureFailure::NoSpeechTimeout),
            Self::Unintelligible => Err(CaptureFailure::Unintelligible),
            Self::ServiceError(message) => Err(CaptureFailure::ServiceError(message)),
        }
    }
}

impl fmt::Display for CaptureFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoSpeechTimeout => write!(f, "no speech before the timeout"),
            Self::Unintelligible => write!(f, "speech could not be recognized"),
            Self::ServiceError(message) => write!(f, "recognition service error: {message}"),
        }
    }
}

// The attempt loop only ever talks to speech hardware and services through
// these two traits. Real backends live in the tutor binary; tests substitute
// mocks or scripted fakes so the loop runs without audio devices.

/// Speaks text to the user.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Presenter: Send {
    /// Returns once playback has finished. Errors are reported but never stop
    /// the attempt loop.
    async fn speak(&mut self, text: &str) -> Result<()>;
}

/// Listens to the user and produces a text hypothesis.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Capture: Send {
    /// Waits up to `start_timeout` for speech to begin and records at most
    /// `max_phrase` of it.
    async fn listen(&mut self, start_timeout: Duration, max_phrase: Duration) -> HypothesisResult;
}
