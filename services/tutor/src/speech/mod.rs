//! Speech backends behind the core's [`Presenter`] and [`Capture`] traits.

pub mod console;
pub mod openai;

use crate::config::{Backend, Config};
use crate::console::StdinLines;
use anyhow::Result;
use pronounce_core::speech::{Capture, HypothesisResult, Presenter};

/// Builds the presenter and capture for the configured backend.
pub async fn connect(config: &Config, lines: &StdinLines) -> Result<(Box<dyn Presenter>, Box<dyn Capture>)> {
    match config.backend {
        Backend::Console => Ok((
            Box::new(console::ConsolePresenter),
            Box::new(console::ConsoleCapture::new(lines.clone())),
        )),
        Backend::OpenAi => openai::connect(config).await,
    }
}

/// Lowercased, trimmed hypothesis; nothing left means nothing was understood.
pub fn hypothesis_from_text(text: &str) -> HypothesisResult {
    let text = text.trim().to_lowercase();
    if text.is_empty() {
        HypothesisResult::Unintelligible
    } else {
        HypothesisResult::Text(text)
    }
}
