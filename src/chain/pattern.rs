//! Glob-style path patterns for chain rules.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Path pattern matched segment by segment against a request path.
///
/// `**` spans any number of segments (including none), `*` matches any run
/// of characters within one segment — also mid-segment, so `v*` matches
/// `v1` and `v25` — and `?` matches exactly one character.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PathPattern {
    raw: String,
    segments: Vec<String>,
}

impl PathPattern {
    /// # Errors
    ///
    /// Returns `Error::Config` when the pattern is empty or does not start
    /// with `/`.
    pub fn parse(raw: &str) -> Result<Self, Error> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(Error::Config("path pattern is empty".to_string()));
        }
        if !trimmed.starts_with('/') {
            return Err(Error::Config(format!(
                "path pattern {trimmed:?} must start with '/'"
            )));
        }
        let segments = split_path(trimmed)
            .map(str::to_string)
            .collect();
        Ok(Self {
            raw: trimmed.to_string(),
            segments,
        })
    }

    #[must_use]
    pub fn matches(&self, path: &str) -> bool {
        let path_segments: Vec<&str> = split_path(path).collect();
        match_segments(&self.segments, &path_segments)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl TryFrom<String> for PathPattern {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<PathPattern> for String {
    fn from(value: PathPattern) -> Self {
        value.raw
    }
}

fn split_path(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|segment| !segment.is_empty())
}

fn match_segments(pattern: &[String], path: &[&str]) -> bool {
    let Some((first, rest)) = pattern.split_first() else {
        return path.is_empty();
    };
    if first == "**" {
        // `**` covers zero segments here, or swallows one and tries again.
        if match_segments(rest, path) {
            return true;
        }
        return match path.split_first() {
            Some((_, path_rest)) => match_segments(pattern, path_rest),
            None => false,
        };
    }
    match path.split_first() {
        Some((segment, path_rest)) => {
            match_one_segment(first, segment) && match_segments(rest, path_rest)
        }
        None => false,
    }
}

fn match_one_segment(pattern: &str, segment: &str) -> bool {
    match_chars(
        &pattern.chars().collect::<Vec<_>>(),
        &segment.chars().collect::<Vec<_>>(),
    )
}

fn match_chars(pattern: &[char], text: &[char]) -> bool {
    let Some((&first, rest)) = pattern.split_first() else {
        return text.is_empty();
    };
    match first {
        '*' => {
            // Zero characters, or swallow one and try again.
            if match_chars(rest, text) {
                return true;
            }
            match text.split_first() {
                Some((_, text_rest)) => match_chars(pattern, text_rest),
                None => false,
            }
        }
        '?' => match text.split_first() {
            Some((_, text_rest)) => match_chars(rest, text_rest),
            None => false,
        },
        literal => match text.split_first() {
            Some((&ch, text_rest)) => ch == literal && match_chars(rest, text_rest),
            None => false,
        },
    }
}
