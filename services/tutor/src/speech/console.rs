use crate::console::{StdinLines, prompt};
use crate::speech::hypothesis_from_text;
use anyhow::Result;
use async_trait::async_trait;
use pronounce_core::speech::{Capture, HypothesisResult, Presenter};
use std::time::Duration;

/// Leaves presentation to the console reporter, which already shows the
/// sentence text.
pub struct ConsolePresenter;

#[async_trait]
impl Presenter for ConsolePresenter {
    async fn speak(&mut self, text: &str) -> Result<()> {
        tracing::trace!(%text, "presented as text");
        Ok(())
    }
}

/// Takes a typed line as what the user said.
pub struct ConsoleCapture {
    lines: StdinLines,
}

impl ConsoleCapture {
    pub fn new(lines: StdinLines) -> Self {
        Self { lines }
    }
}

#[async_trait]
impl Capture for ConsoleCapture {
    async fn listen(&mut self, start_timeout: Duration, _max_phrase: Duration) -> HypothesisResult {
        prompt("> ");
        match tokio::time::timeout(start_timeout, self.lines.next_line()).await {
            Ok(Some(line)) => hypothesis_from_text(&line),
            Ok(None) => {
                tracing::debug!("stdin closed while listening");
                HypothesisResult::NoSpeechTimeout
            }
            Err(_) => {
                println!();
                HypothesisResult::NoSpeechTimeout
            }
        }
    }
}
