//! Speech over the OpenAI audio endpoints and the local sound devices.

use crate::config::Config;
use crate::speech::hypothesis_from_text;
use anyhow::{Context, Result};
use async_trait::async_trait;
use pronounce_core::speech::{Capture, HypothesisResult, Presenter};
use pronounce_native_utils::audio::{SPEECH_SAMPLE_RATE, TTS_PCM16_SAMPLE_RATE, decode_pcm16_le, samples_to_wav};
use pronounce_native_utils::device::{get_or_default_input, get_or_default_output};
use pronounce_native_utils::playback::Player;
use pronounce_native_utils::record::{Recorder, Recording};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

const SPEECH_URL: &str = "https://api.openai.com/v1/audio/speech";
const TRANSCRIPTION_URL: &str = "https://api.openai.com/v1/audio/transcriptions";

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    text: String,
}

pub struct OpenAiClient {
    client: Client,
    api_key: SecretString,
    tts_model: String,
    tts_voice: String,
    tts_speed: f32,
    stt_model: String,
    stt_language: String,
}

impl OpenAiClient {
    pub fn new(api_key: SecretString, config: &Config) -> Self {
        Self {
            client: Client::new(),
            api_key,
            tts_model: config.tts_model.clone(),
            tts_voice: config.tts_voice.clone(),
            tts_speed: config.tts_speed,
            stt_model: config.stt_model.clone(),
            stt_language: config.stt_language.clone(),
        }
    }

    /// Speaks `text` into mono samples at [`TTS_PCM16_SAMPLE_RATE`].
    pub async fn synthesize(&self, text: &str) -> Result<Vec<f32>> {
        let body = serde_json::json!({
            "model": self.tts_model,
            "input": text,
            "voice": self.tts_voice,
            "speed": self.tts_speed,
            "response_format": "pcm",
        });

        let response = self
            .client
            .post(SPEECH_URL)
            .bearer_auth(self.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .context("Speech request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Speech API error {status}: {body}");
        }

        let pcm = response.bytes().await.context("Failed to read speech audio")?;
        tracing::debug!(bytes = pcm.len(), "speech synthesized");
        Ok(decode_pcm16_le(&pcm))
    }

    /// Transcribes a WAV clip.
    pub async fn transcribe(&self, wav: Vec<u8>) -> Result<String> {
        tracing::debug!(audio_bytes = wav.len(), "starting transcription");

        let form = reqwest::multipart::Form::new()
            .part(
                "file",
                reqwest::multipart::Part::bytes(wav)
                    .file_name("speech.wav")
                    .mime_str("audio/wav")?,
            )
            .text("model", self.stt_model.clone())
            .text("language", self.stt_language.clone());

        let response = self
            .client
            .post(TRANSCRIPTION_URL)
            .bearer_auth(self.api_key.expose_secret())
            .multipart(form)
            .send()
            .await
            .context("Transcription request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Transcription API error {status}: {body}");
        }

        let result: TranscriptionResponse = response
            .json()
            .await
            .context("Failed to parse transcription response")?;
        tracing::info!(transcript = %result.text, "transcription complete");
        Ok(result.text)
    }
}

/// Speaks sentences through the output device.
pub struct OpenAiPresenter {
    client: Arc<OpenAiClient>,
    player: Arc<Player>,
}

#[async_trait]
impl Presenter for OpenAiPresenter {
    async fn speak(&mut self, text: &str) -> Result<()> {
        let samples = self.client.synthesize(text).await?;
        let player = Arc::clone(&self.player);
        tokio::task::spawn_blocking(move || player.play_blocking(&samples, TTS_PCM16_SAMPLE_RATE))
            .await
            .context("Playback task failed")?
            .context("Playback failed")?;
        Ok(())
    }
}

/// Records one phrase from the input device and transcribes it.
pub struct OpenAiCapture {
    client: Arc<OpenAiClient>,
    recorder: Arc<Recorder>,
}

#[async_trait]
impl Capture for OpenAiCapture {
    async fn listen(&mut self, start_timeout: Duration, max_phrase: Duration) -> HypothesisResult {
        let recorder = Arc::clone(&self.recorder);
        let recording = tokio::task::spawn_blocking(move || recorder.record_phrase(start_timeout, max_phrase))
            .await
            .context("Recording task failed")
            .and_then(|recording| recording.context("Recording failed"));

        let samples = match recording {
            Ok(Recording::Phrase(samples)) => samples,
            Ok(Recording::NoSpeech) => return HypothesisResult::NoSpeechTimeout,
            Err(e) => {
                tracing::error!("{:?}", e);
                return HypothesisResult::ServiceError(e.to_string());
            }
        };

        let wav = match samples_to_wav(&samples, SPEECH_SAMPLE_RATE) {
            Ok(wav) => wav,
            Err(e) => {
                tracing::error!(error = %e, "failed to encode recording");
                return HypothesisResult::ServiceError(e.to_string());
            }
        };

        match self.client.transcribe(wav).await {
            Ok(text) => hypothesis_from_text(&text),
            Err(e) => {
                tracing::warn!("{:?}", e);
                HypothesisResult::ServiceError(format!("{e:#}"))
            }
        }
    }
}

/// Opens the audio devices and calibrates the microphone.
pub async fn connect(config: &Config) -> Result<(Box<dyn Presenter>, Box<dyn Capture>)> {
    let api_key = config
        .openai_api_key
        .as_ref()
        .context("OPENAI_API_KEY must be set for the openai backend")?;
    let client = Arc::new(OpenAiClient::new(
        SecretString::from(api_key.expose_secret().to_string()),
        config,
    ));

    let output_device = config.output_device.clone();
    let player = tokio::task::spawn_blocking(move || {
        let device = get_or_default_output(output_device.as_deref())?;
        Player::new(device)
    })
    .await?
    .context("Failed to open audio output device")?;

    println!("Adjusting for ambient microphone noise...");
    let input_device = config.input_device.clone();
    let calibration = config.ambient_calibration;
    let recorder = tokio::task::spawn_blocking(move || {
        let device = get_or_default_input(input_device.as_deref())?;
        let mut recorder = Recorder::new(device)?;
        recorder.calibrate(calibration)?;
        Ok::<_, pronounce_native_utils::AudioError>(recorder)
    })
    .await?
    .context("Failed to prepare audio input device")?;
    println!("Calibration complete!");

    Ok((
        Box::new(OpenAiPresenter {
            client: Arc::clone(&client),
            player: Arc::new(player),
        }),
        Box::new(OpenAiCapture {
            client,
            recorder: Arc::new(recorder),
        }),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    fn live_client() -> OpenAiClient {
        dotenvy::dotenv_override().ok();
        let api_key = env::var("OPENAI_API_KEY").expect("OPENAI_API_KEY not set");
        let config = Config::from_lookup(|key| env::var(key).ok()).expect("valid configuration");
        OpenAiClient::new(SecretString::from(api_key), &config)
    }

    #[tokio::test]
    #[ignore]
    async fn test_synthesize_then_transcribe() {
        let client = live_client();

        let samples = client
            .synthesize("Nice to meet you.")
            .await
            .expect("synthesis should succeed");
        assert!(!samples.is_empty());

        let speech = pronounce_native_utils::audio::resample(
            &samples,
            TTS_PCM16_SAMPLE_RATE,
            SPEECH_SAMPLE_RATE as f64,
        )
        .expect("resampling should succeed");
        let wav = samples_to_wav(&speech, SPEECH_SAMPLE_RATE).expect("wav encoding should succeed");
        let text = client.transcribe(wav).await.expect("transcription should succeed");

        let score = pronounce_core::scorer::score("Nice to meet you", &text);
        assert!(score >= 75.0, "transcript {text:?} scored {score}");
    }

    #[tokio::test]
    #[ignore]
    async fn test_transcribe_silence_is_unintelligible_or_short() {
        let client = live_client();
        let wav = samples_to_wav(&vec![0.0; SPEECH_SAMPLE_RATE as usize], SPEECH_SAMPLE_RATE)
            .expect("wav encoding should succeed");

        let text = client.transcribe(wav).await.expect("transcription should succeed");
        assert!(text.split_whitespace().count() <= 3, "unexpected transcript {text:?}");
    }
}
