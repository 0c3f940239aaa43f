use thiserror::Error;
use xxhash_rust::xxh3::xxh3_64;

/// The fundamental edit primitive: byte-span replacement with verification.
///
/// Every rule application compiles down to one or more of these. Intelligence
/// lives in span acquisition (matchers), not in the application logic.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "SpanEdit does nothing until splice() is called"]
pub struct SpanEdit {
    /// Starting byte offset (inclusive)
    pub byte_start: usize,
    /// Ending byte offset (exclusive)
    pub byte_end: usize,
    /// New text to insert at [byte_start, byte_end)
    pub new_text: String,
    /// Verification of what we expect to find before applying
    pub expected_before: SpanVerification,
}

/// Verification strategy for edit safety.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpanVerification {
    /// Exact text match required
    ExactMatch(String),
    /// xxh3 hash of expected text (faster for large spans)
    Hash(u64),
}

impl SpanVerification {
    /// Check if the provided text matches the verification criteria.
    pub fn matches(&self, text: &str) -> bool {
        match self {
            SpanVerification::ExactMatch(expected) => text == expected,
            SpanVerification::Hash(expected_hash) => {
                let actual_hash = xxh3_64(text.as_bytes());
                actual_hash == *expected_hash
            }
        }
    }

    /// Create verification from text, using hash for text over 1KB.
    pub fn from_text(text: &str) -> Self {
        if text.len() > 1024 {
            SpanVerification::Hash(xxh3_64(text.as_bytes()))
        } else {
            SpanVerification::ExactMatch(text.to_string())
        }
    }

    /// Get hash value regardless of variant.
    pub fn hash(&self) -> u64 {
        match self {
            SpanVerification::Hash(h) => *h,
            SpanVerification::ExactMatch(text) => xxh3_64(text.as_bytes()),
        }
    }
}

#[derive(Error, Debug)]
pub enum SpanEditError {
    #[error("Before-text verification failed at byte {byte_start}")]
    BeforeTextMismatch {
        byte_start: usize,
        byte_end: usize,
        expected: String,
        found: String,
    },

    #[error("Invalid byte range: [{byte_start}, {byte_end}) in text of length {text_len}")]
    InvalidByteRange {
        byte_start: usize,
        byte_end: usize,
        text_len: usize,
    },

    #[error("Byte range [{byte_start}, {byte_end}) does not fall on character boundaries")]
    NotCharBoundary { byte_start: usize, byte_end: usize },
}

/// Result of splicing an edit into a buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpliceResult {
    /// Edit was applied; the buffer length changed by `bytes_delta`
    Applied { bytes_delta: isize },
    /// Current span text already equals new_text
    AlreadyApplied,
}

impl SpanEdit {
    /// Create a new edit with automatic verification generation.
    pub fn new(
        byte_start: usize,
        byte_end: usize,
        new_text: impl Into<String>,
        expected_before: impl Into<String>,
    ) -> Self {
        let expected = expected_before.into();
        Self {
            byte_start,
            byte_end,
            new_text: new_text.into(),
            expected_before: SpanVerification::from_text(&expected),
        }
    }

    /// Create an edit with explicit verification strategy.
    pub fn with_verification(
        byte_start: usize,
        byte_end: usize,
        new_text: impl Into<String>,
        verification: SpanVerification,
    ) -> Self {
        Self {
            byte_start,
            byte_end,
            new_text: new_text.into(),
            expected_before: verification,
        }
    }

    /// Validate the edit against the current buffer.
    ///
    /// Returns the current text at [byte_start, byte_end) if validation succeeds.
    pub fn validate<'a>(&self, text: &'a str) -> Result<&'a str, SpanEditError> {
        if self.byte_start > self.byte_end || self.byte_end > text.len() {
            return Err(SpanEditError::InvalidByteRange {
                byte_start: self.byte_start,
                byte_end: self.byte_end,
                text_len: text.len(),
            });
        }

        if !text.is_char_boundary(self.byte_start) || !text.is_char_boundary(self.byte_end) {
            return Err(SpanEditError::NotCharBoundary {
                byte_start: self.byte_start,
                byte_end: self.byte_end,
            });
        }

        let current_text = &text[self.byte_start..self.byte_end];

        // Already applied spans skip verification (idempotency)
        if current_text == self.new_text {
            return Ok(current_text);
        }

        if !self.expected_before.matches(current_text) {
            return Err(SpanEditError::BeforeTextMismatch {
                byte_start: self.byte_start,
                byte_end: self.byte_end,
                expected: format!("{:?}", self.expected_before),
                found: current_text.to_string(),
            });
        }

        Ok(current_text)
    }

    /// Splice this edit into the buffer, returning the new buffer.
    pub fn splice(&self, text: &str) -> Result<(String, SpliceResult), SpanEditError> {
        let current_text = self.validate(text)?;

        if current_text == self.new_text {
            return Ok((text.to_string(), SpliceResult::AlreadyApplied));
        }

        let mut out = String::with_capacity(
            text.len() + self.new_text.len() - (self.byte_end - self.byte_start),
        );
        out.push_str(&text[..self.byte_start]);
        out.push_str(&self.new_text);
        out.push_str(&text[self.byte_end..]);

        let bytes_delta =
            self.new_text.len() as isize - (self.byte_end - self.byte_start) as isize;

        Ok((out, SpliceResult::Applied { bytes_delta }))
    }

    /// Splice multiple edits into the same buffer.
    ///
    /// Edits are sorted by byte_start descending and applied bottom-to-top
    /// to avoid offset invalidation. Overlapping spans are rejected.
    pub fn splice_all(
        text: &str,
        mut edits: Vec<SpanEdit>,
    ) -> Result<(String, Vec<SpliceResult>), SpanEditError> {
        if edits.is_empty() {
            return Ok((text.to_string(), Vec::new()));
        }

        edits.sort_by(|a, b| b.byte_start.cmp(&a.byte_start));

        for edit in &edits {
            edit.validate(text)?;
        }

        // Sorted descending: the later span comes first in the vec
        for window in edits.windows(2) {
            let (later, earlier) = (&window[0], &window[1]);
            if earlier.byte_end > later.byte_start {
                return Err(SpanEditError::InvalidByteRange {
                    byte_start: later.byte_start,
                    byte_end: earlier.byte_end,
                    text_len: text.len(),
                });
            }
        }

        let mut current = text.to_string();
        let mut results = Vec::with_capacity(edits.len());

        for edit in &edits {
            let (next, result) = edit.splice(&current)?;
            current = next;
            results.push(result);
        }

        results.reverse();
        Ok((current, results))
    }
}
