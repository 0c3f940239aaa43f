//! Near-miss diagnostics for skipped rules.
//!
//! When a literal matcher finds nothing, the target has either drifted or
//! the rule was already applied. Scanning for the line closest to the
//! matcher's anchor line lets the report say which.

use std::fmt;

use crate::matcher::Matcher;

/// Minimum anchor length worth fuzzy-matching against. Shorter anchors
/// produce spurious high-similarity hits on unrelated lines.
const MIN_ANCHOR_LEN: usize = 8;

/// Minimum normalized similarity for a candidate to count as a near miss.
const SIMILARITY_THRESHOLD: f64 = 0.6;

const SNIPPET_MAX_LEN: usize = 80;

/// The closest candidate line found for a matcher that failed to match.
#[derive(Debug, Clone, PartialEq)]
pub struct NearMiss {
    /// 1-based line number in the artifact
    pub line: usize,
    /// Normalized Levenshtein similarity against the anchor, in [0, 1]
    pub similarity: f64,
    /// Trimmed candidate line, truncated for display
    pub snippet: String,
}

impl fmt::Display for NearMiss {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "line {} is {:.0}% similar: {}",
            self.line,
            self.similarity * 100.0,
            self.snippet
        )
    }
}

/// Scan artifact lines for the closest candidate to the matcher's anchor.
///
/// Only literal matchers carry a usable anchor (the first non-blank line of
/// the search text). Pattern matchers return no hint.
pub fn near_miss(text: &str, matcher: &Matcher) -> Option<NearMiss> {
    let search = matcher.literal_text()?;
    let anchor = search.lines().map(str::trim).find(|l| !l.is_empty())?;
    if anchor.len() < MIN_ANCHOR_LEN {
        return None;
    }

    let mut best: Option<NearMiss> = None;
    for (idx, line) in text.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let similarity = strsim::normalized_levenshtein(anchor, trimmed);
        if similarity < SIMILARITY_THRESHOLD {
            continue;
        }
        if best.as_ref().is_none_or(|b| similarity > b.similarity) {
            best = Some(NearMiss {
                line: idx + 1,
                similarity,
                snippet: truncate(trimmed),
            });
        }
    }
    best
}

fn truncate(line: &str) -> String {
    if line.len() <= SNIPPET_MAX_LEN {
        return line.to_string();
    }
    let mut end = SNIPPET_MAX_LEN;
    while !line.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &line[..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finds_drifted_line() {
        let text = "const scene = new THREE.Scene();\n  controls.update();\n  composer2.render();\n";
        let matcher = Matcher::literal("  composer.render();\n");
        let hit = near_miss(text, &matcher).unwrap();
        assert_eq!(hit.line, 3);
        assert!(hit.similarity > 0.8);
        assert_eq!(hit.snippet, "composer2.render();");
    }

    #[test]
    fn test_no_hint_for_pattern_matchers() {
        let matcher = Matcher::pattern(r"composer\.render.*").unwrap();
        assert!(near_miss("composer2.render();\n", &matcher).is_none());
    }

    #[test]
    fn test_no_hint_below_threshold() {
        let matcher = Matcher::literal("completely unrelated text here");
        assert!(near_miss("const x = 1;\nlet y = 2;\n", &matcher).is_none());
    }

    #[test]
    fn test_short_anchor_rejected() {
        let matcher = Matcher::literal("x = 1");
        assert!(near_miss("x = 2\n", &matcher).is_none());
    }

    #[test]
    fn test_anchor_skips_blank_leading_lines() {
        let matcher = Matcher::literal("\n\n  renderer.setSize(width, height);\n");
        let text = "  renderer.setSize(w, h);\n";
        let hit = near_miss(text, &matcher).unwrap();
        assert_eq!(hit.line, 1);
    }

    #[test]
    fn test_snippet_truncation() {
        let line = "b".repeat(120);
        let matcher = Matcher::literal("b".repeat(100));
        let hit = near_miss(&line, &matcher).unwrap();
        assert!(hit.snippet.ends_with("..."));
        assert!(hit.snippet.len() <= SNIPPET_MAX_LEN + 3);
    }
}
