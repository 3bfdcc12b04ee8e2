//! The practice console: what the user reads on stdout and types on stdin.

use async_trait::async_trait;
use pronounce_core::session::{Decision, SentencePosition, SessionControl, SessionEnd};
use pronounce_core::speech::CaptureFailure;
use pronounce_core::{SessionEvent, SessionReporter};
use std::io::{BufRead, Write};
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};

const RULE_WIDTH: usize = 60;

pub fn rule() -> String {
    "=".repeat(RULE_WIDTH)
}

/// Lines typed on stdin, read on a background thread.
///
/// Clones share the same queue, so the decision prompt and the console
/// capture can both read from it. Lines are consumed in the order they
/// arrived, including ones piped in ahead of the prompt that asks for them.
#[derive(Clone)]
pub struct StdinLines {
    rx: Arc<Mutex<mpsc::UnboundedReceiver<String>>>,
}

impl StdinLines {
    pub fn spawn() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        std::thread::spawn(move || {
            for line in std::io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if tx.send(line).is_err() {
                    break;
                }
            }
            tracing::debug!("stdin closed");
        });
        Self::from_receiver(rx)
    }

    pub fn from_receiver(rx: mpsc::UnboundedReceiver<String>) -> Self {
        Self {
            rx: Arc::new(Mutex::new(rx)),
        }
    }

    /// The next line, or `None` once stdin is closed.
    pub async fn next_line(&self) -> Option<String> {
        self.rx.lock().await.recv().await
    }
}

/// Prints `text` without a newline and flushes so it shows before input.
pub fn prompt(text: &str) {
    let mut stdout = std::io::stdout().lock();
    if let Err(e) = write!(stdout, "{text}").and_then(|_| stdout.flush()) {
        tracing::warn!(error = %e, "failed to write prompt");
    }
}

/// Asks between sentences whether to continue, skip or stop.
pub struct ConsolePrompt {
    lines: StdinLines,
}

impl ConsolePrompt {
    pub fn new(lines: StdinLines) -> Self {
        Self { lines }
    }
}

#[async_trait]
impl SessionControl for ConsolePrompt {
    async fn decide(&mut self, _position: &SentencePosition) -> Decision {
        prompt("\nContinue to the next sentence? (y/n/q=quit): ");
        match self.lines.next_line().await {
            Some(answer) => parse_decision(&answer),
            None => Decision::Quit,
        }
    }
}

/// `q` quits, `n` skips, anything else continues.
pub fn parse_decision(answer: &str) -> Decision {
    match answer.trim().to_lowercase().as_str() {
        "q" => Decision::Quit,
        "n" => Decision::Skip,
        _ => Decision::Advance,
    }
}

/// Prints session progress for the user.
#[derive(Default)]
pub struct ConsoleReporter;

impl SessionReporter for ConsoleReporter {
    fn report(&mut self, event: SessionEvent) {
        if let Some(text) = render(&event) {
            println!("{text}");
        }
    }
}

pub fn render(event: &SessionEvent) -> Option<String> {
    let text = match event {
        SessionEvent::SourceStarted { name, sentences } => {
            format!("\n📄 File: {name}\n📝 Practicing {sentences} sentences.")
        }
        SessionEvent::SourceEmpty { name } => {
            format!("\n📄 File: {name}\nNo valid sentences found.")
        }
        SessionEvent::SentenceStarted(position) => format!(
            "\n🎯 Sentence {}/{}\n\n{}\nPractice: {}\n{}",
            position.sentence_number,
            position.sentence_total,
            rule(),
            position.text,
            rule()
        ),
        SessionEvent::SentenceSkipped(position) => format!("⏭  Skipped: {}", position.text),
        SessionEvent::AttemptStarted {
            attempt,
            max_attempts,
        } => format!("\n--- Attempt {attempt}/{max_attempts} ---"),
        SessionEvent::Presenting(text) => {
            format!("1. Listen to the system pronunciation:\n🔊 System voice: {text}")
        }
        SessionEvent::Listening => {
            "2. Now say it the same way:\nListening to your pronunciation... (start speaking)".to_string()
        }
        SessionEvent::AttemptScored {
            hypothesis,
            score,
            threshold,
            passed,
            ..
        } => {
            let verdict = if *passed {
                "🎉 Excellent pronunciation!".to_string()
            } else {
                format!("Almost there. Target: {threshold:.0}% or higher")
            };
            format!("Recognized speech: {hypothesis}\nPronunciation match: {score:.1}%\n{verdict}")
        }
        SessionEvent::CaptureFailed { failure, .. } => match failure {
            CaptureFailure::NoSpeechTimeout => "Timed out. Please try again.".to_string(),
            CaptureFailure::Unintelligible => {
                "Could not recognize your speech. Please try again.".to_string()
            }
            CaptureFailure::ServiceError(message) => {
                format!("Speech recognition service error: {message}")
            }
        },
        SessionEvent::SentenceFinished(outcome) if !outcome.passed => format!(
            "⏰ All {} attempts used. Moving on to the next sentence.",
            outcome.attempts_used
        ),
        SessionEvent::SentenceFinished(_) => return None,
        SessionEvent::SessionFinished(summary) => {
            let totals = format!(
                "Passed: {}, not passed: {}, skipped: {}",
                summary.passed, summary.failed, summary.skipped
            );
            match summary.end {
                SessionEnd::Completed => format!(
                    "\n🎊 Congratulations! You have finished every pronunciation lesson!\nKeep practicing and you'll become even better!\n{totals}"
                ),
                SessionEnd::Quit => format!("Ending practice.\n{totals}"),
            }
        }
    };
    Some(text)
}
