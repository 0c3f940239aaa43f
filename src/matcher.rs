//! Span location: literal substring and regex pattern matchers.

use regex::Regex;
use thiserror::Error;

use crate::cache;

/// A compiled matcher that locates byte spans in the artifact text.
#[derive(Debug, Clone)]
pub enum Matcher {
    /// Exact substring search
    Literal { search: String },
    /// Regex with dot-matches-newline, so wildcards cross line boundaries
    Pattern { regex: Regex },
}

#[derive(Error, Debug)]
pub enum MatcherError {
    #[error("Failed to compile pattern '{pattern}': {source}")]
    BadPattern {
        pattern: String,
        source: regex::Error,
    },
}

impl Matcher {
    /// Build a literal matcher.
    pub fn literal(search: impl Into<String>) -> Self {
        Matcher::Literal {
            search: search.into(),
        }
    }

    /// Build a pattern matcher, compiling through the thread-local cache.
    pub fn pattern(pattern: &str) -> Result<Self, MatcherError> {
        let regex = cache::get_or_compile(pattern).map_err(|source| MatcherError::BadPattern {
            pattern: pattern.to_string(),
            source,
        })?;
        Ok(Matcher::Pattern { regex })
    }

    /// Find the first matching span as (byte_start, byte_end).
    pub fn find(&self, text: &str) -> Option<(usize, usize)> {
        match self {
            Matcher::Literal { search } => text
                .find(search.as_str())
                .map(|start| (start, start + search.len())),
            Matcher::Pattern { regex } => regex.find(text).map(|m| (m.start(), m.end())),
        }
    }

    /// Find all non-overlapping matching spans, left to right.
    pub fn find_all(&self, text: &str) -> Vec<(usize, usize)> {
        match self {
            Matcher::Literal { search } => {
                if search.is_empty() {
                    return Vec::new();
                }
                text.match_indices(search.as_str())
                    .map(|(start, s)| (start, start + s.len()))
                    .collect()
            }
            Matcher::Pattern { regex } => {
                regex.find_iter(text).map(|m| (m.start(), m.end())).collect()
            }
        }
    }

    /// The literal search text, when this is a literal matcher.
    pub fn literal_text(&self) -> Option<&str> {
        match self {
            Matcher::Literal { search } => Some(search),
            Matcher::Pattern { .. } => None,
        }
    }
}
