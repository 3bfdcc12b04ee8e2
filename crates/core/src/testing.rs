//! Scripted collaborators shared by the attempt and session tests.

use crate::SessionEvent;
use crate::attempt::AttemptPolicy;
use crate::ingest::PracticeSentence;
use crate::session::{Decision, SentencePosition, SessionControl};
use crate::speech::{Capture, HypothesisResult, Presenter};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub fn sentence(text: &str) -> PracticeSentence {
    PracticeSentence::new(text)
}

/// Default policy without the pause between attempts.
pub fn quick_policy() -> AttemptPolicy {
    AttemptPolicy {
        retry_pause: Duration::ZERO,
        ..AttemptPolicy::default()
    }
}

/// Returns queued results in order, then reports no speech.
pub struct ScriptedCapture {
    results: VecDeque<HypothesisResult>,
    calls: usize,
}

impl ScriptedCapture {
    pub fn new(results: impl IntoIterator<Item = HypothesisResult>) -> Self {
        Self {
            results: results.into_iter().collect(),
            calls: 0,
        }
    }

    pub fn calls(&self) -> usize {
        self.calls
    }
}

#[async_trait]
impl Capture for ScriptedCapture {
    async fn listen(&mut self, _start_timeout: Duration, _max_phrase: Duration) -> HypothesisResult {
        self.calls += 1;
        self.results
            .pop_front()
            .unwrap_or(HypothesisResult::NoSpeechTimeout)
    }
}

/// Repeats back whatever was last presented, like a perfect student.
///
/// Clones share the same log, so one clone can act as the presenter and
/// another as the capture.
#[derive(Clone, Default)]
pub struct Echo {
    spoken: Arc<Mutex<Vec<String>>>,
}

impl Echo {
    pub fn spoken(&self) -> Vec<String> {
        self.spoken.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Presenter for Echo {
    async fn speak(&mut self, text: &str) -> anyhow::Result<()> {
        if let Ok(mut spoken) = self.spoken.lock() {
            spoken.push(text.to_string());
        }
        Ok(())
    }
}

#[async_trait]
impl Capture for Echo {
    async fn listen(&mut self, _start_timeout: Duration, _max_phrase: Duration) -> HypothesisResult {
        match self.spoken().pop() {
            Some(text) => HypothesisResult::Text(text),
            None => HypothesisResult::NoSpeechTimeout,
        }
    }
}

/// Answers decision prompts from a queue, advancing once it runs dry.
pub struct ScriptedControl {
    decisions: VecDeque<Decision>,
    pub asked: Vec<SentencePosition>,
}

impl ScriptedControl {
    pub fn new(decisions: impl IntoIterator<Item = Decision>) -> Self {
        Self {
            decisions: decisions.into_iter().collect(),
            asked: Vec::new(),
        }
    }
}

#[async_trait]
impl SessionControl for ScriptedControl {
    async fn decide(&mut self, position: &SentencePosition) -> Decision {
        self.asked.push(position.clone());
        self.decisions.pop_front().unwrap_or(Decision::Advance)
    }
}

pub fn practiced(events: &[SessionEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|event| match event {
            SessionEvent::SentenceFinished(outcome) => Some(outcome.sentence.text.clone()),
            _ => None,
        })
        .collect()
}
