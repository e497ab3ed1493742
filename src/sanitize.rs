//! Pull a JSON payload out of a chatty completion.
//!
//! Generation services wrap JSON in markdown fences or surround it with
//! prose. The sanitizer looks inside fenced blocks first and then in the raw
//! text, returning the first balanced `{...}` or `[...]` span.

use std::sync::LazyLock;

use regex::Regex;
use serde::de::DeserializeOwned;

use crate::error::{PackError, PackResult};

static FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"```[A-Za-z0-9_+\-]*[ \t]*\r?\n?((?s:.*?))```").expect("fence pattern is valid")
});

/// Upper bound on spans tried by [`parse_json`] before giving up
const MAX_PARSE_CANDIDATES: usize = 32;

/// Return the substring of `raw` most likely to be the structured payload.
pub fn sanitize(raw: &str) -> PackResult<&str> {
    candidates(raw).next().ok_or_else(|| {
        PackError::MalformedResponse(format!(
            "no JSON object or array found in response: {}",
            preview(raw)
        ))
    })
}

/// Balanced spans in preference order: fenced bodies first, then the raw text.
pub fn candidates(raw: &str) -> impl Iterator<Item = &str> {
    FENCE
        .captures_iter(raw)
        .filter_map(|caps| caps.get(1))
        .flat_map(|body| Spans::new(body.as_str()))
        .chain(Spans::new(raw))
}

/// Sanitize and decode. The first candidate span that deserializes into `T`
/// wins; otherwise the decode error of the first candidate is reported.
pub fn parse_json<T: DeserializeOwned>(raw: &str) -> PackResult<T> {
    let mut first_error: Option<String> = None;

    for span in candidates(raw).take(MAX_PARSE_CANDIDATES) {
        match serde_json::from_str::<T>(span) {
            Ok(value) => return Ok(value),
            Err(e) => {
                first_error.get_or_insert_with(|| e.to_string());
            }
        }
    }

    Err(PackError::MalformedResponse(first_error.unwrap_or_else(|| {
        format!("no JSON object or array found in response: {}", preview(raw))
    })))
}

fn preview(raw: &str) -> String {
    let trimmed = raw.trim();
    let mut out: String = trimmed.chars().take(80).collect();
    if trimmed.chars().count() > 80 {
        out.push('…');
    }
    out
}

/// Iterator over balanced bracket spans, by ascending start offset.
struct Spans<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> Spans<'a> {
    fn new(text: &'a str) -> Self {
        Self { text, pos: 0 }
    }
}

impl<'a> Iterator for Spans<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        while self.pos < self.text.len() {
            let rest = &self.text[self.pos..];
            let offset = rest.find(['{', '['])?;
            let start = self.pos + offset;
            self.pos = start + 1;
            if let Some(end) = balanced_end(self.text, start) {
                return Some(&self.text[start..end]);
            }
        }
        None
    }
}

/// Byte offset just past the bracket closing the one at `start`.
fn balanced_end(text: &str, start: usize) -> Option<usize> {
    let mut expected: Vec<char> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }

        match ch {
            '"' => in_string = true,
            '{' => expected.push('}'),
            '[' => expected.push(']'),
            '}' | ']' => {
                if expected.pop() != Some(ch) {
                    return None;
                }
                if expected.is_empty() {
                    return Some(start + offset + ch.len_utf8());
                }
            }
            _ => {}
        }
    }

    None
}
