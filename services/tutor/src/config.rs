//! Application Configuration Module
//!
//! Loads settings from the environment (and an optional `.env` file) into a
//! single struct that the binary passes to the pieces it builds.

use pronounce_core::attempt::AttemptPolicy;
use secrecy::SecretString;
use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::Level;

/// Folder under the user's documents directory that holds practice files.
pub const PRACTICE_FOLDER: &str = "VoiceTutor";

/// Where sentences are spoken and heard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Backend {
    /// OpenAI speech synthesis and transcription over the local audio devices.
    #[value(name = "openai")]
    OpenAi,
    /// Sentences are printed and answers typed. No audio or network needed.
    Console,
}

impl FromStr for Backend {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "console" => Ok(Self::Console),
            _ => Err(()),
        }
    }
}

/// Holds all configuration loaded from the environment.
#[derive(Debug)]
pub struct Config {
    pub backend: Backend,
    pub openai_api_key: Option<SecretString>,
    pub tts_model: String,
    pub tts_voice: String,
    pub tts_speed: f32,
    pub stt_model: String,
    pub stt_language: String,
    pub practice_dir: PathBuf,
    pub max_attempts: u32,
    pub listen_timeout: Duration,
    pub phrase_limit: Duration,
    pub ambient_calibration: Duration,
    pub input_device: Option<String>,
    pub output_device: Option<String>,
    pub log_level: Level,
}

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for {var}: {value:?}")]
    InvalidValue { var: String, value: String },
    #[error("Invalid log level provided for RUST_LOG: {0}")]
    InvalidLogLevel(String),
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    // *   `PRONOUNCE_BACKEND`: "openai" (default) or "console".
    // *   `OPENAI_API_KEY`: Required for the openai backend.
    // *   `TTS_MODEL`, `TTS_VOICE`, `TTS_SPEED`: Speech synthesis. Default "tts-1", "alloy", 0.9.
    // *   `STT_MODEL`, `STT_LANGUAGE`: Transcription. Default "whisper-1", "en".
    // *   `PRACTICE_DIR`: Folder with practice files. Default "<Documents>/VoiceTutor".
    // *   `MAX_ATTEMPTS`: Attempts per sentence. Default 5.
    // *   `LISTEN_TIMEOUT_SECS`, `PHRASE_LIMIT_SECS`: Listening budget. Default 10 and 10.
    // *   `AMBIENT_CALIBRATION_SECS`: Microphone calibration at start-up. Default 2.
    // *   `INPUT_DEVICE`, `OUTPUT_DEVICE`: Audio device names. Default to the host defaults.
    // *   `RUST_LOG`: The logging level. Defaults to "WARN".
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file. This is useful for local development and is ignored if not present.
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from any variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let backend = parse_or(&var, "PRONOUNCE_BACKEND", Backend::OpenAi)?;
        let openai_api_key = var("OPENAI_API_KEY").map(SecretString::from);

        let tts_model = var("TTS_MODEL").unwrap_or_else(|| "tts-1".to_string());
        let tts_voice = var("TTS_VOICE").unwrap_or_else(|| "alloy".to_string());
        let tts_speed: f32 = parse_or(&var, "TTS_SPEED", 0.9)?;
        if !(0.25..=4.0).contains(&tts_speed) {
            return Err(invalid("TTS_SPEED", tts_speed));
        }
        let stt_model = var("STT_MODEL").unwrap_or_else(|| "whisper-1".to_string());
        let stt_language = var("STT_LANGUAGE").unwrap_or_else(|| "en".to_string());

        let practice_dir = var("PRACTICE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| default_practice_dir(var("HOME").as_deref()));

        let max_attempts: u32 = parse_or(&var, "MAX_ATTEMPTS", 5)?;
        if max_attempts == 0 {
            return Err(invalid("MAX_ATTEMPTS", max_attempts));
        }
        let listen_timeout = seconds(&var, "LISTEN_TIMEOUT_SECS", 10)?;
        let phrase_limit = seconds(&var, "PHRASE_LIMIT_SECS", 10)?;
        let ambient_calibration = seconds(&var, "AMBIENT_CALIBRATION_SECS", 2)?;

        // Configure logging level from RUST_LOG, with a quiet default so the
        // practice console stays readable.
        let log_level_str = var("RUST_LOG").unwrap_or_else(|| "WARN".to_string());
        let log_level = log_level_str
            .parse::<Level>()
            .map_err(|_| ConfigError::InvalidLogLevel(log_level_str))?;

        Ok(Self {
            backend,
            openai_api_key,
            tts_model,
            tts_voice,
            tts_speed,
            stt_model,
            stt_language,
            practice_dir,
            max_attempts,
            listen_timeout,
            phrase_limit,
            ambient_calibration,
            input_device: var("INPUT_DEVICE"),
            output_device: var("OUTPUT_DEVICE"),
            log_level,
        })
    }

    /// Checks that the selected backend has what it needs.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.backend == Backend::OpenAi && self.openai_api_key.is_none() {
            return Err(ConfigError::MissingVar(
                "OPENAI_API_KEY must be set for the openai backend".to_string(),
            ));
        }
        Ok(())
    }

    pub fn attempt_policy(&self) -> AttemptPolicy {
        AttemptPolicy {
            max_attempts: self.max_attempts,
            start_timeout: self.listen_timeout,
            max_phrase: self.phrase_limit,
            ..AttemptPolicy::default()
        }
    }
}

/// `<Documents>/VoiceTutor`, falling back to `$HOME/Documents/VoiceTutor`.
fn default_practice_dir(home: Option<&str>) -> PathBuf {
    directories::UserDirs::new()
        .and_then(|dirs| dirs.document_dir().map(Path::to_path_buf))
        .or_else(|| home.map(|home| Path::new(home).join("Documents")))
        .unwrap_or_else(|| PathBuf::from("Documents"))
        .join(PRACTICE_FOLDER)
}

fn parse_or<T: FromStr>(
    var: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T, ConfigError> {
    match var(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| invalid(key, raw)),
    }
}

fn seconds(var: &impl Fn(&str) -> Option<String>, key: &str, default: u64) -> Result<Duration, ConfigError> {
    let secs: u64 = parse_or(var, key, default)?;
    if secs == 0 {
        return Err(invalid(key, secs));
    }
    Ok(Duration::from_secs(secs))
}

fn invalid(var: &str, value: impl ToString) -> ConfigError {
    ConfigError::InvalidValue {
        var: var.to_string(),
        value: value.to_string(),
    }
}
