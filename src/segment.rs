//! Sentence-aligned text windows.
//!
//! Text is whitespace-normalized, split at terminal punctuation and packed
//! greedily into windows of at most `max_window_chars` characters. Each new
//! window re-opens with the last `overlap_sentences` sentences of the window
//! before it, so context that straddles a boundary is seen twice.

use serde::{Deserialize, Serialize};

use crate::error::{PackError, PackResult};
use crate::types::TextWindow;

const TERMINALS: [char; 3] = ['.', '!', '?'];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentConfig {
    /// Soft character budget per window
    #[serde(default = "default_max_window_chars")]
    pub max_window_chars: usize,
    /// Sentences carried over from the previous window
    #[serde(default = "default_overlap_sentences")]
    pub overlap_sentences: usize,
}

fn default_max_window_chars() -> usize {
    1500
}

fn default_overlap_sentences() -> usize {
    1
}

impl Default for SegmentConfig {
    fn default() -> Self {
        Self {
            max_window_chars: default_max_window_chars(),
            overlap_sentences: default_overlap_sentences(),
        }
    }
}

/// Collapse every whitespace run to a single space and trim.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Split into sentences ending in `.`, `!` or `?`.
///
/// A sentence needs at least one non-terminal character before its
/// terminator, so runs like `?!` contribute nothing beyond the first mark.
/// Trailing text without a terminator is dropped.
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();

    for ch in text.chars() {
        if TERMINALS.contains(&ch) {
            if !current.is_empty() {
                current.push(ch);
                let trimmed = current.trim();
                if trimmed.len() > ch.len_utf8() {
                    sentences.push(trimmed.to_string());
                }
                current.clear();
            }
        } else {
            current.push(ch);
        }
    }

    sentences
}

/// Split `text` into overlapping, sentence-aligned windows.
pub fn segment(text: &str, config: &SegmentConfig) -> PackResult<Vec<TextWindow>> {
    if text.trim().is_empty() {
        return Err(PackError::InvalidInput("text is empty".into()));
    }

    let normalized = normalize_whitespace(text);
    let sentences = split_sentences(&normalized);

    let mut windows = Vec::new();
    let mut current: Vec<String> = Vec::new();
    let mut current_len = 0usize;

    for sentence in sentences {
        let len = sentence.chars().count();
        // the joining space counts toward the window length
        let mut added = len + usize::from(!current.is_empty());

        if !current.is_empty() && current_len + added > config.max_window_chars {
            let carried = overlap_tail(&current, config.overlap_sentences);
            let closed = std::mem::replace(&mut current, carried);
            windows.push(TextWindow::new(windows.len(), closed));
            current_len = joined_len(&current);
            added = len + usize::from(!current.is_empty());
        }

        current.push(sentence);
        current_len += added;
    }

    if !current.is_empty() {
        windows.push(TextWindow::new(windows.len(), current));
    }

    Ok(windows)
}

fn overlap_tail(sentences: &[String], overlap: usize) -> Vec<String> {
    let start = sentences.len().saturating_sub(overlap);
    sentences[start..].to_vec()
}

fn joined_len(sentences: &[String]) -> usize {
    if sentences.is_empty() {
        return 0;
    }
    sentences.iter().map(|s| s.chars().count()).sum::<usize>() + sentences.len() - 1
}
