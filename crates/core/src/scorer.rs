//! Similarity scoring between a reference sentence and a spoken hypothesis.
//!
//! The score blends a character-level and a word-level sequence-matching
//! ratio, weighting whole-word agreement more heavily. Both ratios come from
//! [`SequenceMatcher`], a longest-matching-block comparison that reports
//! `2 * M / T`, where `M` is the total size of the matching blocks and `T` the
//! combined length of both sequences.

use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::hash::Hash;
use std::sync::LazyLock;

/// Anything that is neither a word character nor whitespace.
static PUNCTUATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w\s]").expect("punctuation regex is valid"));

pub const CHAR_WEIGHT: f64 = 0.3;
pub const WORD_WEIGHT: f64 = 0.7;

/// Sequences at least this long have their most frequent elements excluded
/// from block seeding.
const AUTOJUNK_MIN_LEN: usize = 200;

/// Scores `hypothesis` against `reference` on a 0 to 100 scale.
///
/// Case, surrounding whitespace and punctuation are ignored; word order is not.
pub fn score(reference: &str, hypothesis: &str) -> f64 {
    let reference = normalize(reference);
    let hypothesis = normalize(hypothesis);

    let reference_chars: Vec<char> = reference.chars().collect();
    let hypothesis_chars: Vec<char> = hypothesis.chars().collect();
    let char_sim = SequenceMatcher::new(&reference_chars, &hypothesis_chars).ratio();

    let reference_words: Vec<&str> = reference.split_whitespace().collect();
    let hypothesis_words: Vec<&str> = hypothesis.split_whitespace().collect();
    let word_sim = SequenceMatcher::new(&reference_words, &hypothesis_words).ratio();

    let score = (char_sim * CHAR_WEIGHT + word_sim * WORD_WEIGHT) * 100.0;
    tracing::trace!(char_sim, word_sim, score, "scored hypothesis");
    score
}

/// Lowercases, trims, then strips punctuation.
pub fn normalize(text: &str) -> String {
    PUNCTUATION
        .replace_all(text.to_lowercase().trim(), "")
        .into_owned()
}

/// A contiguous run of equal elements: `a[a_start..a_start + size] == b[b_start..b_start + size]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchingBlock {
    pub a_start: usize,
    pub b_start: usize,
    pub size: usize,
}

/// Longest-matching-block comparison of two sequences.
///
/// Finds the longest common contiguous block, then recurses into the pieces
/// to its left and right. For a second sequence of 200 or more elements,
/// elements occurring more than `len / 100 + 1` times are not used to seed
/// blocks, although blocks may still extend across them.
pub struct SequenceMatcher<'a, T> {
    a: &'a [T],
    b: &'a [T],
    b2j: HashMap<&'a T, Vec<usize>>,
}

impl<'a, T: Eq + Hash> SequenceMatcher<'a, T> {
    pub fn new(a: &'a [T], b: &'a [T]) -> Self {
        let mut b2j: HashMap<&'a T, Vec<usize>> = HashMap::new();
        for (j, element) in b.iter().enumerate() {
            b2j.entry(element).or_default().push(j);
        }

        if b.len() >= AUTOJUNK_MIN_LEN {
            let limit = b.len() / 100 + 1;
            let popular: HashSet<&'a T> = b2j
                .iter()
                .filter(|(_, positions)| positions.len() > limit)
                .map(|(&element, _)| element)
                .collect();
            for element in popular {
                b2j.remove(element);
            }
        }

        Self { a, b, b2j }
    }

    /// Longest matching block within `a[alo..ahi]` and `b[blo..bhi]`.
    /// Ties go to the block starting earliest in `a`, then earliest in `b`.
    pub fn find_longest_match(&self, alo: usize, ahi: usize, blo: usize, bhi: usize) -> MatchingBlock {
        let (mut best_i, mut best_j, mut best_size) = (alo, blo, 0);

        // j2len[j] = length of the longest block ending at a[i - 1] and b[j].
        let mut j2len: HashMap<usize, usize> = HashMap::new();
        for i in alo..ahi {
            let mut next_j2len: HashMap<usize, usize> = HashMap::new();
            if let Some(positions) = self.b2j.get(&self.a[i]) {
                for &j in positions {
                    if j < blo {
                        continue;
                    }
                    if j >= bhi {
                        break;
                    }
                    let k = j
                        .checked_sub(1)
                        .and_then(|prev| j2len.get(&prev))
                        .copied()
                        .unwrap_or(0)
                        + 1;
                    next_j2len.insert(j, k);
                    if k > best_size {
                        best_i = i + 1 - k;
                        best_j = j + 1 - k;
                        best_size = k;
                    }
                }
            }
            j2len = next_j2len;
        }

        // Grow the block over elements that were never used as seeds.
        while best_i > alo && best_j > blo && self.a[best_i - 1] == self.b[best_j - 1] {
            best_i -= 1;
            best_j -= 1;
            best_size += 1;
        }
        while best_i + best_size < ahi
            && best_j + best_size < bhi
            && self.a[best_i + best_size] == self.b[best_j + best_size]
        {
            best_size += 1;
        }

        MatchingBlock {
            a_start: best_i,
            b_start: best_j,
            size: best_size,
        }
    }

    /// All matching blocks, ordered by position.
    pub fn matching_blocks(&self) -> Vec<MatchingBlock> {
        let mut blocks = Vec::new();
        let mut pending = vec![(0, self.a.len(), 0, self.b.len())];

        while let Some((alo, ahi, blo, bhi)) = pending.pop() {
            let block = self.find_longest_match(alo, ahi, blo, bhi);
            if block.size == 0 {
                continue;
            }
            let (i, j, k) = (block.a_start, block.b_start, block.size);
            blocks.push(block);
            if alo < i && blo < j {
                pending.push((alo, i, blo, j));
            }
            if i + k < ahi && j + k < bhi {
                pending.push((i + k, ahi, j + k, bhi));
            }
        }

        blocks.sort_by_key(|block| (block.a_start, block.b_start));
        blocks
    }

    /// Similarity in `[0, 1]`. Two empty sequences are identical and score 1.
    pub fn ratio(&self) -> f64 {
        let total = self.a.len() + self.b.len();
        if total == 0 {
            return 1.0;
        }
        let matches: usize = self.matching_blocks().iter().map(|block| block.size).sum();
        2.0 * matches as f64 / total as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {expected}, got {actual}"
        );
    }

    fn chars(text: &str) -> Vec<char> {
        text.chars().collect()
    }

    #[test]
    fn identical_sentences_score_100() {
        for sentence in ["Hello there", "Thank you very much.", "a", "How are you today?"] {
            assert_close(score(sentence, sentence), 100.0);
        }
    }

    #[test]
    fn ignores_case_and_punctuation() {
        assert_close(score("Hello, World!", "hello world"), 100.0);
        assert_close(
            score("Hello, World!", "hello world"),
            score("hello world", "hello world"),
        );
        assert_close(score("  Hello, I'm Taro.  ", "hello im taro"), 100.0);
    }

    #[test]
    fn word_order_matters() {
        let s = score("How are you today", "today how are you");
        assert_close(s, 71.91176470588235);
        assert!(s < 100.0);
    }

    #[test]
    fn partial_matches_blend_char_and_word_similarity() {
        // char 0.75, word 0.5
        assert_close(score("Good morning", "good evening"), 57.5);
        // char 10/11, word 0.5
        assert_close(score("Hello there", "hello their"), 62.272727272727266);
        assert_close(score("Nice to meet you", "nice to meet"), 85.71428571428571);
        assert_close(
            score("The weather is beautiful", "the whether is beautiful"),
            81.24999999999999,
        );
    }

    #[test]
    fn empty_hypothesis_scores_zero_and_empty_pair_scores_100() {
        assert_close(score("abc", ""), 0.0);
        assert_close(score("Hello there", "?!"), 0.0);
        assert_close(score("", ""), 100.0);
        assert_close(score("...", "!!!"), 100.0);
    }

    #[test]
    fn score_stays_in_range() {
        let pairs = [
            ("Have a great day", "have a grape day"),
            ("Thank you very much", "xyz"),
            ("", "something"),
            ("one two three four five", "five four three two one"),
        ];
        for (reference, hypothesis) in pairs {
            let s = score(reference, hypothesis);
            assert!((0.0..=100.0).contains(&s), "{reference:?} vs {hypothesis:?} gave {s}");
        }
    }

    #[test]
    fn normalize_strips_punctuation_after_trimming() {
        assert_eq!(normalize("  Don't STOP!  "), "dont stop");
        assert_eq!(normalize("- hello"), " hello");
        assert_eq!(normalize("snake_case ok"), "snake_case ok");
    }

    #[test]
    fn matching_blocks_recurse_on_both_sides() {
        let a = chars("abxcd");
        let b = chars("abcd");
        let matcher = SequenceMatcher::new(&a, &b);
        assert_eq!(
            matcher.matching_blocks(),
            vec![
                MatchingBlock { a_start: 0, b_start: 0, size: 2 },
                MatchingBlock { a_start: 3, b_start: 2, size: 2 },
            ]
        );
        assert_close(matcher.ratio(), 8.0 / 9.0);
    }

    #[test]
    fn longest_match_prefers_earliest_block() {
        let a = chars(" abcd");
        let b = chars("abcd abcd");
        let matcher = SequenceMatcher::new(&a, &b);
        assert_eq!(
            matcher.find_longest_match(0, 5, 0, 9),
            MatchingBlock { a_start: 0, b_start: 4, size: 5 }
        );
    }

    #[test]
    fn word_sequences_compare_whole_tokens() {
        let a = ["nice", "to", "meet", "you"];
        let b = ["nice", "to", "meat", "you"];
        assert_close(SequenceMatcher::new(&a, &b).ratio(), 0.75);
    }

    #[test]
    fn popular_elements_do_not_seed_blocks_in_long_sequences() {
        let a = chars(&format!("{}{}", "a".repeat(150), "b".repeat(100)));
        let b = chars(&format!("{}{}", "a".repeat(120), "b".repeat(90)));
        // Only the leading run of `a`s is found, by extension from the start.
        assert_close(SequenceMatcher::new(&a, &b).ratio(), 240.0 / 460.0);
    }
}
