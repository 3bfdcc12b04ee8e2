//! The bounded present → listen → score loop for a single sentence.
//!
//! [`AttemptController`] is a plain state machine whose transitions advance
//! it one state at a time and never touch audio. [`AttemptController::run`]
//! drives those transitions against a [`Presenter`] and a [`Capture`].

use crate::ingest::PracticeSentence;
use crate::scorer;
use crate::speech::{Capture, CaptureFailure, HypothesisResult, Presenter};
use crate::{SessionEvent, SessionReporter};
use std::time::Duration;

/// Tunables of the attempt loop.
#[derive(Debug, Clone, PartialEq)]
pub struct AttemptPolicy {
    pub max_attempts: u32,
    /// Sentences with at most this many words use the strict threshold.
    pub short_sentence_words: usize,
    pub strict_threshold: f64,
    pub relaxed_threshold: f64,
    /// How long to wait for the user to start speaking.
    pub start_timeout: Duration,
    /// Longest phrase that will be recorded.
    pub max_phrase: Duration,
    /// Pause before re-presenting after a scored attempt missed the threshold.
    pub retry_pause: Duration,
}

impl Default for AttemptPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            short_sentence_words: 3,
            strict_threshold: 85.0,
            relaxed_threshold: 75.0,
            start_timeout: Duration::from_secs(10),
            max_phrase: Duration::from_secs(10),
            retry_pause: Duration::from_secs(1),
        }
    }
}

impl AttemptPolicy {
    /// Short utterances need a closer match: one misheard word moves their
    /// ratio much further.
    pub fn threshold_for(&self, word_count: usize) -> f64 {
        if word_count <= self.short_sentence_words {
            self.strict_threshold
        } else {
            self.relaxed_threshold
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptState {
    Presenting,
    Listening,
    Scoring,
    Success,
    Exhausted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptVerdict {
    Success,
    /// The attempt missed; the sentence will be presented again.
    Retry,
    Exhausted,
}

/// The result of one present → listen → score cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct AttemptResult {
    pub attempt: u32,
    /// Absent when capture failed.
    pub hypothesis: Option<String>,
    /// Absent when there was no hypothesis to score.
    pub score: Option<f64>,
    pub failure: Option<CaptureFailure>,
    pub verdict: AttemptVerdict,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SentenceOutcome {
    pub sentence: PracticeSentence,
    pub passed: bool,
    /// Between 1 and the policy's `max_attempts`.
    pub attempts_used: u32,
}

pub struct AttemptController {
    sentence: PracticeSentence,
    threshold: f64,
    max_attempts: u32,
    start_timeout: Duration,
    max_phrase: Duration,
    retry_pause: Duration,
    attempt: u32,
    state: AttemptState,
    pending: Option<HypothesisResult>,
}

impl AttemptController {
    pub fn new(sentence: PracticeSentence, policy: &AttemptPolicy) -> Self {
        Self {
            threshold: policy.threshold_for(sentence.word_count),
            sentence,
            max_attempts: policy.max_attempts.max(1),
            start_timeout: policy.start_timeout,
            max_phrase: policy.max_phrase,
            retry_pause: policy.retry_pause,
            attempt: 1,
            state: AttemptState::Presenting,
            pending: None,
        }
    }

    pub fn state(&self) -> AttemptState {
        self.state
    }

    /// The attempt currently in progress, starting at 1.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn sentence(&self) -> &PracticeSentence {
        &self.sentence
    }

    /// Presentation finished; start listening. Returns `false`, changing
    /// nothing, unless the controller was presenting.
    pub(crate) fn presented(&mut self) -> bool {
        if self.state != AttemptState::Presenting {
            return false;
        }
        self.state = AttemptState::Listening;
        true
    }

    /// Capture returned; hold the result for scoring. Returns `false`,
    /// changing nothing, unless the controller was listening.
    pub(crate) fn captured(&mut self, result: HypothesisResult) -> bool {
        if self.state != AttemptState::Listening {
            return false;
        }
        self.pending = Some(result);
        self.state = AttemptState::Scoring;
        true
    }

    /// Scores the captured result and moves to the next state, or returns
    /// `None` when there is nothing to score.
    ///
    /// Every cycle consumes exactly one attempt, whether or not capture
    /// produced a hypothesis.
    pub(crate) fn score(&mut self) -> Option<AttemptResult> {
        if self.state != AttemptState::Scoring {
            return None;
        }
        let attempt = self.attempt;
        let captured = self
            .pending
            .take()
            .unwrap_or(HypothesisResult::Unintelligible);

        let (hypothesis, score, failure) = match captured.into_hypothesis() {
            Ok(hypothesis) => {
                let score = scorer::score(&self.sentence.text, &hypothesis);
                (Some(hypothesis), Some(score), None)
            }
            Err(failure) => (None, None, Some(failure)),
        };

        let verdict = if score.is_some_and(|score| score >= self.threshold) {
            self.state = AttemptState::Success;
            AttemptVerdict::Success
        } else if attempt >= self.max_attempts {
            self.state = AttemptState::Exhausted;
            AttemptVerdict::Exhausted
        } else {
            self.attempt += 1;
            self.state = AttemptState::Presenting;
            AttemptVerdict::Retry
        };

        Some(AttemptResult {
            attempt,
            hypothesis,
            score,
            failure,
            verdict,
        })
    }

    /// The final outcome, once the loop has reached a terminal state.
    pub fn outcome(&self) -> Option<SentenceOutcome> {
        let passed = match self.state {
            AttemptState::Success => true,
            AttemptState::Exhausted => false,
            _ => return None,
        };
        Some(SentenceOutcome {
            sentence: self.sentence.clone(),
            passed,
            attempts_used: self.attempt,
        })
    }

    /// Runs the loop to completion. Capture and presentation failures only
    /// ever cost an attempt.
    pub async fn run<P, C, R>(
        mut self,
        presenter: &mut P,
        capture: &mut C,
        reporter: &mut R,
    ) -> SentenceOutcome
    where
        P: Presenter + ?Sized,
        C: Capture + ?Sized,
        R: SessionReporter + ?Sized,
    {
        let outcome = loop {
            if let Some(outcome) = self.outcome() {
                break outcome;
            }
            match self.state {
                AttemptState::Presenting => {
                    reporter.report(SessionEvent::AttemptStarted {
                        attempt: self.attempt,
                        max_attempts: self.max_attempts,
                    });
                    reporter.report(SessionEvent::Presenting(self.sentence.text.clone()));
                    if let Err(e) = presenter.speak(&self.sentence.text).await {
                        tracing::warn!(error = %e, "presentation failed, listening anyway");
                    }
                    self.presented();
                }
                AttemptState::Listening => {
                    reporter.report(SessionEvent::Listening);
                    let result = capture.listen(self.start_timeout, self.max_phrase).await;
                    self.captured(result);
                }
                AttemptState::Scoring => {
                    let Some(result) = self.score() else { continue };
                    self.report_attempt(&result, reporter);
                    if result.verdict == AttemptVerdict::Retry
                        && result.score.is_some()
                        && !self.retry_pause.is_zero()
                    {
                        tokio::time::sleep(self.retry_pause).await;
                    }
                }
                AttemptState::Success | AttemptState::Exhausted => {}
            }
        };

        tracing::info!(
            sentence = %outcome.sentence.text,
            passed = outcome.passed,
            attempts = outcome.attempts_used,
            "sentence finished"
        );
        reporter.report(SessionEvent::SentenceFinished(outcome.clone()));
        outcome
    }

    fn report_attempt<R: SessionReporter + ?Sized>(&self, result: &AttemptResult, reporter: &mut R) {
        match (&result.hypothesis, result.score, &result.failure) {
            (Some(hypothesis), Some(score), _) => {
                tracing::debug!(attempt = result.attempt, %hypothesis, score, threshold = self.threshold, "attempt scored");
                reporter.report(SessionEvent::AttemptScored {
                    attempt: result.attempt,
                    hypothesis: hypothesis.clone(),
                    score,
                    threshold: self.threshold,
                    passed: result.verdict == AttemptVerdict::Success,
                });
            }
            (_, _, Some(failure)) => {
                if let CaptureFailure::ServiceError(message) = failure {
                    tracing::warn!(attempt = result.attempt, %message, "speech capture service failed");
                } else {
                    tracing::debug!(attempt = result.attempt, %failure, "no hypothesis captured");
                }
                reporter.report(SessionEvent::CaptureFailed {
                    attempt: result.attempt,
                    failure: failure.clone(),
                });
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::speech::{MockCapture, MockPresenter};
    use crate::testing::{ScriptedCapture, quick_policy, sentence};

    #[test]
    fn threshold_depends_on_word_count() {
        let policy = AttemptPolicy::default();
        assert_eq!(policy.threshold_for(1), 85.0);
        assert_eq!(policy.threshold_for(3), 85.0);
        assert_eq!(policy.threshold_for(4), 75.0);
        assert_eq!(policy.threshold_for(12), 75.0);

        assert_eq!(AttemptController::new(sentence("Thank you very"), &policy).threshold(), 85.0);
        assert_eq!(AttemptController::new(sentence("Thank you very much"), &policy).threshold(), 75.0);
    }

    #[test]
    fn state_machine_walks_through_each_state() {
        let mut controller = AttemptController::new(sentence("Hello there"), &quick_policy());
        assert_eq!(controller.state(), AttemptState::Presenting);
        assert_eq!(controller.attempt(), 1);

        assert!(controller.presented());
        assert_eq!(controller.state(), AttemptState::Listening);

        assert!(controller.captured(HypothesisResult::Text("hello bear".to_string())));
        assert_eq!(controller.state(), AttemptState::Scoring);

        let result = controller.score().expect("captured result is scored");
        assert_eq!(result.verdict, AttemptVerdict::Retry);
        assert_eq!(result.hypothesis.as_deref(), Some("hello bear"));
        assert!(result.score.is_some_and(|s| s < 85.0));
        assert_eq!(controller.state(), AttemptState::Presenting);
        assert_eq!(controller.attempt(), 2);
        assert!(controller.outcome().is_none());

        controller.presented();
        controller.captured(HypothesisResult::Text("Hello there!".to_string()));
        let result = controller.score().expect("captured result is scored");
        assert_eq!(result.verdict, AttemptVerdict::Success);
        assert_eq!(result.score, Some(100.0));

        let outcome = controller.outcome().expect("terminal state has an outcome");
        assert!(outcome.passed);
        assert_eq!(outcome.attempts_used, 2);
    }

    #[test]
    fn capture_failures_consume_attempts_until_exhausted() {
        let mut controller = AttemptController::new(sentence("Hello there"), &quick_policy());
        let failures = [
            HypothesisResult::NoSpeechTimeout,
            HypothesisResult::Unintelligible,
            HypothesisResult::ServiceError("503".to_string()),
            HypothesisResult::NoSpeechTimeout,
            HypothesisResult::Unintelligible,
        ];

        for (i, failure) in failures.into_iter().enumerate() {
            controller.presented();
            controller.captured(failure);
            let result = controller.score().expect("failure is scored");
            assert_eq!(result.attempt, i as u32 + 1);
            assert!(result.hypothesis.is_none());
            assert!(result.score.is_none());
            assert!(result.failure.is_some());
        }

        assert_eq!(controller.state(), AttemptState::Exhausted);
        let outcome = controller.outcome().expect("exhausted loop has an outcome");
        assert!(!outcome.passed);
        assert_eq!(outcome.attempts_used, 5);
    }

    #[test]
    fn score_equal_to_threshold_passes() {
        let mut policy = quick_policy();
        policy.strict_threshold = scorer::score("Good morning", "good evening");
        let mut controller = AttemptController::new(sentence("Good morning"), &policy);

        controller.presented();
        controller.captured(HypothesisResult::Text("good evening".to_string()));

        assert_eq!(
            controller.score().map(|r| r.verdict),
            Some(AttemptVerdict::Success)
        );
    }

    #[test]
    fn out_of_order_transitions_change_nothing() {
        let mut controller = AttemptController::new(sentence("Hello there"), &quick_policy());
        assert!(controller.score().is_none());
        assert!(!controller.captured(HypothesisResult::Text("hello there".to_string())));
        assert_eq!(controller.state(), AttemptState::Presenting);

        controller.presented();
        assert!(!controller.presented());
        assert!(controller.score().is_none());
        assert_eq!(controller.state(), AttemptState::Listening);

        for _ in 0..5 {
            controller.presented();
            controller.captured(HypothesisResult::NoSpeechTimeout);
            controller.score();
        }
        assert_eq!(controller.state(), AttemptState::Exhausted);

        assert!(controller.score().is_none());
        assert!(!controller.presented());
        assert!(!controller.captured(HypothesisResult::Text("hello there".to_string())));
        assert_eq!(controller.state(), AttemptState::Exhausted);
        assert_eq!(controller.attempt(), 5);
        assert!(controller.outcome().is_some_and(|o| !o.passed && o.attempts_used == 5));
    }

    #[tokio::test]
    async fn test_run_gives_up_after_exactly_five_attempts() {
        let mut presenter = MockPresenter::new();
        presenter
            .expect_speak()
            .withf(|text| text == "Have a great day")
            .times(5)
            .returning(|_| Ok(()));

        let mut capture = MockCapture::new();
        capture
            .expect_listen()
            .times(5)
            .returning(|_, _| HypothesisResult::Text("completely different words".to_string()));

        let mut events = Vec::<SessionEvent>::new();
        let outcome = AttemptController::new(sentence("Have a great day"), &quick_policy())
            .run(&mut presenter, &mut capture, &mut events)
            .await;

        assert!(!outcome.passed);
        assert_eq!(outcome.attempts_used, 5);

        let scored = events
            .iter()
            .filter(|e| matches!(e, SessionEvent::AttemptScored { passed: false, .. }))
            .count();
        assert_eq!(scored, 5);
        assert_eq!(
            events.last(),
            Some(&SessionEvent::SentenceFinished(outcome.clone()))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_pauses_only_after_scored_misses_with_attempts_left() {
        let mut presenter = MockPresenter::new();
        presenter.expect_speak().times(5).returning(|_| Ok(()));

        let miss = || HypothesisResult::Text("completely different words".to_string());
        let mut capture = ScriptedCapture::new([
            miss(),
            HypothesisResult::Unintelligible,
            miss(),
            miss(),
            miss(),
        ]);

        let mut policy = AttemptPolicy::default();
        policy.retry_pause = Duration::from_secs(1);

        let started = tokio::time::Instant::now();
        let outcome = AttemptController::new(sentence("Have a great day"), &policy)
            .run(&mut presenter, &mut capture, &mut Vec::<SessionEvent>::new())
            .await;

        assert!(!outcome.passed);
        assert_eq!(outcome.attempts_used, 5);
        // Attempts 1, 3 and 4 pause; the unintelligible one and the last do not.
        assert_eq!(started.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test]
    async fn test_run_stops_at_first_passing_attempt() {
        let mut presenter = MockPresenter::new();
        presenter.expect_speak().times(3).returning(|_| Ok(()));

        let mut capture = ScriptedCapture::new([
            HypothesisResult::Text("hello bear".to_string()),
            HypothesisResult::Unintelligible,
            HypothesisResult::Text("hello there".to_string()),
            HypothesisResult::Text("never heard".to_string()),
        ]);

        let mut events = Vec::<SessionEvent>::new();
        let outcome = AttemptController::new(sentence("Hello there"), &quick_policy())
            .run(&mut presenter, &mut capture, &mut events)
            .await;

        assert!(outcome.passed);
        assert_eq!(outcome.attempts_used, 3);
        assert_eq!(capture.calls(), 3);
        assert!(events.contains(&SessionEvent::CaptureFailed {
            attempt: 2,
            failure: CaptureFailure::Unintelligible,
        }));
    }

    #[tokio::test]
    async fn test_run_passes_listening_budget_to_capture() {
        let mut presenter = MockPresenter::new();
        presenter.expect_speak().times(1).returning(|_| Ok(()));

        let mut capture = MockCapture::new();
        capture
            .expect_listen()
            .withf(|start, phrase| {
                *start == Duration::from_secs(10) && *phrase == Duration::from_secs(10)
            })
            .times(1)
            .returning(|_, _| HypothesisResult::Text("hello there".to_string()));

        let mut policy = AttemptPolicy::default();
        policy.retry_pause = Duration::ZERO;
        let outcome = AttemptController::new(sentence("Hello there"), &policy)
            .run(&mut presenter, &mut capture, &mut Vec::<SessionEvent>::new())
            .await;

        assert!(outcome.passed);
        assert_eq!(outcome.attempts_used, 1);
    }

    #[tokio::test]
    async fn test_run_keeps_going_when_presentation_fails() {
        let mut presenter = MockPresenter::new();
        presenter
            .expect_speak()
            .times(2)
            .returning(|_| Err(anyhow::anyhow!("no output device")));

        let mut capture = ScriptedCapture::new([
            HypothesisResult::ServiceError("connection reset".to_string()),
            HypothesisResult::Text("thank you very much".to_string()),
        ]);

        let outcome = AttemptController::new(sentence("Thank you very much"), &quick_policy())
            .run(&mut presenter, &mut capture, &mut Vec::<SessionEvent>::new())
            .await;

        assert!(outcome.passed);
        assert_eq!(outcome.attempts_used, 2);
    }
}
