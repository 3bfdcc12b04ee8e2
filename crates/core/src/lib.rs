pub mod attempt;
pub mod ingest;
pub mod scorer;
pub mod session;
pub mod speech;

#[cfg(test)]
mod testing;

use crate::attempt::SentenceOutcome;
use crate::session::{SentencePosition, SessionSummary};
use crate::speech::CaptureFailure;

/// Progress the core reports to the presentation layer while a session runs.
///
/// The attempt loop and the session runner never print anything themselves;
/// every user-visible moment is expressed as one of these events and handed to
/// a [`SessionReporter`], which decides how (or whether) to show it.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// A practice source with at least one sentence is about to be practiced.
    SourceStarted { name: String, sentences: usize },
    /// A practice source produced no valid sentences and is skipped.
    SourceEmpty { name: String },
    /// A sentence is about to be attempted.
    SentenceStarted(SentencePosition),
    /// The user chose to skip a sentence.
    SentenceSkipped(SentencePosition),
    AttemptStarted { attempt: u32, max_attempts: u32 },
    /// The reference sentence is being spoken to the user.
    Presenting(String),
    /// The microphone is open and waiting for the user.
    Listening,
    /// A hypothesis was captured and scored.
    AttemptScored {
        attempt: u32,
        hypothesis: String,
        score: f64,
        threshold: f64,
        passed: bool,
    },
    /// Capture produced no hypothesis; the attempt is consumed.
    CaptureFailed { attempt: u32, failure: CaptureFailure },
    /// The attempt loop for one sentence finished.
    SentenceFinished(SentenceOutcome),
    SessionFinished(SessionSummary),
}

/// Sink for [`SessionEvent`]s.
pub trait SessionReporter {
    fn report(&mut self, event: SessionEvent);
}

/// Collects events in order, handy when the caller wants to inspect a run afterwards.
impl SessionReporter for Vec<SessionEvent> {
    fn report(&mut self, event: SessionEvent) {
        self.push(event);
    }
}
