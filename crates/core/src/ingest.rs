//! Practice text ingestion.
//!
//! Turns practice files into [`PracticeSource`]s and splits their text into
//! [`PracticeSentence`]s: first on line breaks, then on runs of sentence-final
//! punctuation. Fragments that are too short or contain no alphanumeric
//! character are dropped during extraction and never stored.

use regex::Regex;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

/// One or more of `.`, `!`, `?` act as a single sentence delimiter.
static SENTENCE_DELIMITER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[.!?]+").expect("sentence delimiter regex is valid"));

/// File name patterns, in discovery order.
const PRACTICE_EXTENSIONS: [&str; 2] = ["txt", "text"];

pub const SAMPLE_FILE_NAME: &str = "sample_practice.txt";

const SAMPLE_CONTENT: &str = "Hello, I'm Taro.
Nice to meet you.
How are you today?
Thank you very much.
The weather is beautiful.
Have a great day!
";

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// The practice location could not be created or listed.
    #[error("practice location {path} is unavailable: {source}")]
    Unavailable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// A practice text as read from its origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PracticeSource {
    /// File name or label.
    pub identifier: String,
    pub raw_text: String,
}

impl PracticeSource {
    pub fn new(identifier: impl Into<String>, raw_text: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            raw_text: raw_text.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PracticeSentence {
    pub text: String,
    pub word_count: usize,
}

impl PracticeSentence {
    pub fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
            word_count: text.split_whitespace().count(),
        }
    }
}

/// Rules applied while extracting sentences.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestPolicy {
    /// Minimum number of characters in a trimmed fragment.
    pub min_chars: usize,
}

impl Default for IngestPolicy {
    fn default() -> Self {
        Self { min_chars: 3 }
    }
}

impl IngestPolicy {
    fn accepts(&self, fragment: &str) -> bool {
        fragment.chars().count() >= self.min_chars && fragment.chars().any(char::is_alphanumeric)
    }
}

/// Splits `raw_text` into practice sentences, preserving line order and then
/// left-to-right fragment order within each line.
pub fn extract_sentences(raw_text: &str, policy: &IngestPolicy) -> Vec<PracticeSentence> {
    raw_text
        .split('\n')
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .flat_map(|line| SENTENCE_DELIMITER.split(line))
        .map(str::trim)
        .filter(|fragment| policy.accepts(fragment))
        .map(PracticeSentence::new)
        .collect()
}

/// Result of looking for practice sources in a directory.
#[derive(Debug, Default)]
pub struct Discovery {
    pub sources: Vec<PracticeSource>,
    /// Set when the directory did not exist and a sample file was written into it.
    pub seeded: Option<PathBuf>,
}

/// Reads every practice file in `dir`.
///
/// A missing directory is created and seeded with a sample file. Files that
/// cannot be read are logged and skipped, and files with only whitespace are
/// ignored. An empty result is not an error.
pub fn discover(dir: &Path) -> Result<Discovery, IngestError> {
    let unavailable = |source| IngestError::Unavailable {
        path: dir.to_path_buf(),
        source,
    };

    let mut discovery = Discovery::default();
    if !dir.exists() {
        discovery.seeded = Some(seed(dir).map_err(unavailable)?);
    }

    let mut files: Vec<PathBuf> = Vec::new();
    for entry in fs::read_dir(dir).map_err(unavailable)? {
        let path = match entry {
            Ok(entry) => entry.path(),
            Err(e) => {
                tracing::warn!(dir = %dir.display(), error = %e, "skipping unreadable directory entry");
                continue;
            }
        };
        if path.is_file() && extension_rank(&path).is_some() {
            files.push(path);
        }
    }
    files.sort_by(|a, b| {
        extension_rank(a)
            .cmp(&extension_rank(b))
            .then_with(|| a.file_name().cmp(&b.file_name()))
    });

    for path in files {
        let identifier = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        match fs::read_to_string(&path) {
            Ok(content) => {
                let content = content.trim();
                if content.is_empty() {
                    tracing::debug!(file = %identifier, "ignoring empty practice file");
                    continue;
                }
                tracing::info!(file = %identifier, bytes = content.len(), "loaded practice file");
                discovery
                    .sources
                    .push(PracticeSource::new(identifier, content));
            }
            Err(e) => {
                tracing::warn!(file = %identifier, error = %e, "failed to read practice file");
            }
        }
    }

    Ok(discovery)
}

fn extension_rank(path: &Path) -> Option<usize> {
    let extension = path.extension()?.to_str()?;
    PRACTICE_EXTENSIONS.iter().position(|&ext| ext == extension)
}

fn seed(dir: &Path) -> io::Result<PathBuf> {
    fs::create_dir_all(dir)?;
    tracing::info!(dir = %dir.display(), "created practice directory");

    let sample = dir.join(SAMPLE_FILE_NAME);
    fs::write(&sample, SAMPLE_CONTENT)?;
    tracing::info!(file = %sample.display(), "wrote sample practice file");
    Ok(sample)
}
