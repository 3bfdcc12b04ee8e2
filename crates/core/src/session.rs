//! Sequencing of a practice session: sources in discovery order, sentences in
//! extraction order, with a continue / skip / quit decision before every
//! sentence except the first of each source.

use crate::attempt::{AttemptController, AttemptPolicy, SentenceOutcome};
use crate::ingest::{IngestPolicy, PracticeSentence, PracticeSource, extract_sentences};
use crate::speech::{Capture, Presenter};
use crate::{SessionEvent, SessionReporter};
use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

/// What the user wants to do before the next sentence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Decision {
    #[default]
    Advance,
    Skip,
    Quit,
}

/// Asks the user how to continue between sentences.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SessionControl: Send {
    async fn decide(&mut self, position: &SentencePosition) -> Decision;
}

/// Where a sentence sits in the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentencePosition {
    pub source_index: usize,
    pub source: String,
    /// 1-based.
    pub sentence_number: usize,
    pub sentence_total: usize,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// Every source was worked through.
    Completed,
    /// The user asked to stop.
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub end: SessionEnd,
}

/// The next thing the session needs done.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionStep {
    SourceStarted { name: String, sentences: usize },
    SourceEmpty { name: String },
    /// Ask the user, then pass the answer to [`SessionRunner::decide`].
    AskDecision(SentencePosition),
    /// Run the attempt loop, then pass the outcome to [`SessionRunner::record`].
    Practice(SentencePosition, PracticeSentence),
    Finished(SessionSummary),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    NextSource,
    Sentence { index: usize, decided: bool },
    AwaitingDecision { index: usize },
    Practicing { index: usize },
    Finished,
}

pub struct SessionRunner {
    sources: Vec<PracticeSource>,
    ingest: IngestPolicy,
    attempts: AttemptPolicy,
    source_index: usize,
    sentences: Vec<PracticeSentence>,
    phase: Phase,
    passed: usize,
    failed: usize,
    skipped: usize,
    end: SessionEnd,
}

impl SessionRunner {
    pub fn new(sources: Vec<PracticeSource>, ingest: IngestPolicy, attempts: AttemptPolicy) -> Self {
        Self {
            sources,
            ingest,
            attempts,
            source_index: 0,
            sentences: Vec::new(),
            phase: Phase::NextSource,
            passed: 0,
            failed: 0,
            skipped: 0,
            end: SessionEnd::Completed,
        }
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            passed: self.passed,
            failed: self.failed,
            skipped: self.skipped,
            end: self.end,
        }
    }

    /// Advances to the next step. Calling it again before answering an
    /// [`SessionStep::AskDecision`] or [`SessionStep::Practice`] repeats that step.
    pub fn next_step(&mut self) -> SessionStep {
        loop {
            match self.phase {
                Phase::Finished => return SessionStep::Finished(self.summary()),
                Phase::NextSource => {
                    let Some(source) = self.sources.get(self.source_index) else {
                        self.phase = Phase::Finished;
                        continue;
                    };
                    let name = source.identifier.clone();
                    self.sentences = extract_sentences(&source.raw_text, &self.ingest);
                    if self.sentences.is_empty() {
                        self.source_index += 1;
                        return SessionStep::SourceEmpty { name };
                    }
                    self.phase = Phase::Sentence {
                        index: 0,
                        decided: false,
                    };
                    return SessionStep::SourceStarted {
                        name,
                        sentences: self.sentences.len(),
                    };
                }
                Phase::Sentence { index, decided } => {
                    if index >= self.sentences.len() {
                        self.source_index += 1;
                        self.phase = Phase::NextSource;
                        continue;
                    }
                    if index > 0 && !decided {
                        self.phase = Phase::AwaitingDecision { index };
                        return SessionStep::AskDecision(self.position(index));
                    }
                    self.phase = Phase::Practicing { index };
                    return SessionStep::Practice(self.position(index), self.sentences[index].clone());
                }
                Phase::AwaitingDecision { index } => {
                    return SessionStep::AskDecision(self.position(index));
                }
                Phase::Practicing { index } => {
                    return SessionStep::Practice(self.position(index), self.sentences[index].clone());
                }
            }
        }
    }

    /// Applies the user's answer to a pending [`SessionStep::AskDecision`].
    pub fn decide(&mut self, decision: Decision) {
        let Phase::AwaitingDecision { index } = self.phase else {
            tracing::warn!(?decision, "decision received while none was requested");
            return;
        };
        self.phase = match decision {
            Decision::Advance => Phase::Sentence {
                index,
                decided: true,
            },
            Decision::Skip => {
                self.skipped += 1;
                Phase::Sentence {
                    index: index + 1,
                    decided: false,
                }
            }
            Decision::Quit => {
                self.end = SessionEnd::Quit;
                Phase::Finished
            }
        };
    }

    /// Records the outcome of a pending [`SessionStep::Practice`].
    pub fn record(&mut self, outcome: &SentenceOutcome) {
        let Phase::Practicing { index } = self.phase else {
            tracing::warn!("outcome received while no sentence was being practiced");
            return;
        };
        if outcome.passed {
            self.passed += 1;
        } else {
            self.failed += 1;
        }
        self.phase = Phase::Sentence {
            index: index + 1,
            decided: false,
        };
    }

    /// Runs the whole session. Only an explicit quit ends it early.
    pub async fn run<P, C, D, R>(
        &mut self,
        presenter: &mut P,
        capture: &mut C,
        control: &mut D,
        reporter: &mut R,
    ) -> SessionSummary
    where
        P: Presenter + ?Sized,
        C: Capture + ?Sized,
        D: SessionControl + ?Sized,
        R: SessionReporter + ?Sized,
    {
        loop {
            match self.next_step() {
                SessionStep::SourceStarted { name, sentences } => {
                    tracing::info!(source = %name, sentences, "starting practice source");
                    reporter.report(SessionEvent::SourceStarted { name, sentences });
                }
                SessionStep::SourceEmpty { name } => {
                    tracing::warn!(source = %name, "no valid sentences, skipping source");
                    reporter.report(SessionEvent::SourceEmpty { name });
                }
                SessionStep::AskDecision(position) => {
                    let decision = control.decide(&position).await;
                    tracing::debug!(?decision, sentence = position.sentence_number, "user decision");
                    self.decide(decision);
                    if decision == Decision::Skip {
                        reporter.report(SessionEvent::SentenceSkipped(position));
                    }
                }
                SessionStep::Practice(position, sentence) => {
                    reporter.report(SessionEvent::SentenceStarted(position));
                    let outcome = AttemptController::new(sentence, &self.attempts)
                        .run(presenter, capture, reporter)
                        .await;
                    self.record(&outcome);
                }
                SessionStep::Finished(summary) => {
                    tracing::info!(
                        passed = summary.passed,
                        failed = summary.failed,
                        skipped = summary.skipped,
                        end = ?summary.end,
                        "session finished"
                    );
                    reporter.report(SessionEvent::SessionFinished(summary.clone()));
                    return summary;
                }
            }
        }
    }

    fn position(&self, index: usize) -> SentencePosition {
        SentencePosition {
            source_index: self.source_index,
            source: self
                .sources
                .get(self.source_index)
                .map(|source| source.identifier.clone())
                .unwrap_or_default(),
            sentence_number: index + 1,
            sentence_total: self.sentences.len(),
            text: self.sentences[index].text.clone(),
        }
    }
}
