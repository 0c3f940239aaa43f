//! The rule applicator: a pure fold of span edits over the artifact text.

use thiserror::Error;

use crate::config::{RuleDefinition, Verify};
use crate::edit::{SpanEdit, SpanEditError, SpanVerification, SpliceResult};
use crate::hint::{near_miss, NearMiss};
use crate::matcher::MatcherError;

/// Outcome of applying a single rule.
#[derive(Debug, Clone, PartialEq)]
pub enum RuleOutcome {
    /// One or more spans were replaced
    Replaced {
        replacements: usize,
        bytes_delta: isize,
    },
    /// The replacement text is already present; nothing was edited
    AlreadyApplied,
    /// The matcher found nothing; the text passed through unchanged
    Skipped { hint: Option<NearMiss> },
}

/// Per-rule report surfaced to callers. Nothing is silent.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleReport {
    pub id: String,
    pub outcome: RuleOutcome,
}

#[derive(Error, Debug)]
pub enum ApplyError {
    #[error("rule '{rule}': {source}")]
    Matcher { rule: String, source: MatcherError },

    #[error("rule '{rule}': {source}")]
    Edit { rule: String, source: SpanEditError },

    #[error("rule '{rule}': expected hash '{value}' is not a hex u64")]
    InvalidHash { rule: String, value: String },
}

/// Apply one rule to the text, returning the (possibly unchanged) text and
/// the outcome.
///
/// A rule whose replacement already appears verbatim in the text reports
/// [`RuleOutcome::AlreadyApplied`] without matching. Several shipped rules
/// embed their matcher inside their replacement, so matching first would
/// re-patch an already patched artifact.
pub fn apply_rule(
    text: &str,
    rule: &RuleDefinition,
) -> Result<(String, RuleOutcome), ApplyError> {
    let replacement = rule.operation.replacement();

    if !replacement.is_empty() && text.contains(replacement) {
        return Ok((text.to_string(), RuleOutcome::AlreadyApplied));
    }

    let matcher = rule
        .matcher
        .to_matcher()
        .map_err(|source| ApplyError::Matcher {
            rule: rule.id.clone(),
            source,
        })?;

    let spans = if rule.matcher.is_global() {
        matcher.find_all(text)
    } else {
        matcher.find(text).into_iter().collect()
    };

    if spans.is_empty() {
        let hint = near_miss(text, &matcher);
        return Ok((text.to_string(), RuleOutcome::Skipped { hint }));
    }

    let mut edits = Vec::with_capacity(spans.len());
    for (start, end) in spans {
        let verification = span_verification(rule, &text[start..end])?;
        edits.push(SpanEdit::with_verification(
            start,
            end,
            replacement,
            verification,
        ));
    }

    let replacements = edits.len();
    let (out, results) = SpanEdit::splice_all(text, edits).map_err(|source| ApplyError::Edit {
        rule: rule.id.clone(),
        source,
    })?;

    let bytes_delta = results
        .iter()
        .map(|r| match r {
            SpliceResult::Applied { bytes_delta } => *bytes_delta,
            SpliceResult::AlreadyApplied => 0,
        })
        .sum();

    Ok((
        out,
        RuleOutcome::Replaced {
            replacements,
            bytes_delta,
        },
    ))
}

/// Fold the full rule sequence over the text. Each rule consumes the output
/// of its predecessor; the buffer is the only state threaded through.
pub fn apply_rules(
    text: &str,
    rules: &[RuleDefinition],
) -> Result<(String, Vec<RuleReport>), ApplyError> {
    let mut current = text.to_string();
    let mut reports = Vec::with_capacity(rules.len());

    for rule in rules {
        let (next, outcome) = apply_rule(&current, rule)?;
        current = next;
        reports.push(RuleReport {
            id: rule.id.clone(),
            outcome,
        });
    }

    Ok((current, reports))
}

fn span_verification(
    rule: &RuleDefinition,
    current_span: &str,
) -> Result<SpanVerification, ApplyError> {
    match &rule.verify {
        Some(Verify::ExactMatch { expected_text }) => {
            Ok(SpanVerification::ExactMatch(expected_text.clone()))
        }
        Some(Verify::Hash { expected, .. }) => {
            let digits = expected.trim().trim_start_matches("0x");
            let hash = u64::from_str_radix(digits, 16).map_err(|_| ApplyError::InvalidHash {
                rule: rule.id.clone(),
                value: expected.clone(),
            })?;
            Ok(SpanVerification::Hash(hash))
        }
        None => Ok(SpanVerification::from_text(current_span)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MatcherSpec, Operation};

    fn literal_rule(id: &str, search: &str, text: &str) -> RuleDefinition {
        RuleDefinition {
            id: id.to_string(),
            matcher: MatcherSpec::Literal {
                search: search.to_string(),
                global: false,
            },
            operation: Operation::Replace {
                text: text.to_string(),
            },
            verify: None,
        }
    }

    fn pattern_rule(id: &str, pattern: &str, text: &str) -> RuleDefinition {
        RuleDefinition {
            id: id.to_string(),
            matcher: MatcherSpec::Pattern {
                pattern: pattern.to_string(),
                global: false,
            },
            operation: Operation::Replace {
                text: text.to_string(),
            },
            verify: None,
        }
    }

    #[test]
    fn test_first_match_only() {
        let rule = literal_rule("r", "aa", "bb");
        let (out, outcome) = apply_rule("aa aa", &rule).unwrap();
        assert_eq!(out, "bb aa");
        assert_eq!(
            outcome,
            RuleOutcome::Replaced {
                replacements: 1,
                bytes_delta: 0
            }
        );
    }

    #[test]
    fn test_global_replaces_all() {
        let mut rule = literal_rule("r", "aa", "b");
        rule.matcher = MatcherSpec::Literal {
            search: "aa".to_string(),
            global: true,
        };
        let (out, outcome) = apply_rule("aa aa aa", &rule).unwrap();
        assert_eq!(out, "b b b");
        assert_eq!(
            outcome,
            RuleOutcome::Replaced {
                replacements: 3,
                bytes_delta: -3
            }
        );
    }

    #[test]
    fn test_no_match_is_identity() {
        let rule = literal_rule("r", "missing", "anything");
        let (out, outcome) = apply_rule("left alone", &rule).unwrap();
        assert_eq!(out, "left alone");
        assert!(matches!(outcome, RuleOutcome::Skipped { .. }));
    }

    #[test]
    fn test_replacement_present_short_circuits() {
        // Matcher still matches, but the replacement block already exists
        let rule = literal_rule("r", "base();", "base();\nextra();");
        let text = "base();\nextra();\n";
        let (out, outcome) = apply_rule(text, &rule).unwrap();
        assert_eq!(out, text);
        assert_eq!(outcome, RuleOutcome::AlreadyApplied);
    }

    #[test]
    fn test_no_recursive_rematch() {
        // Replacement contains the matched text; a single call must not loop
        let rule = literal_rule("r", "x", "xx");
        let (out, _) = apply_rule("x.", &rule).unwrap();
        assert_eq!(out, "xx.");
    }

    #[test]
    fn test_multiline_pattern_span() {
        let rule = pattern_rule("r", r"// begin.*?// end\n", "// replaced\n");
        let text = "keep\n// begin\nold body\n// end\ntail\n";
        let (out, _) = apply_rule(text, &rule).unwrap();
        assert_eq!(out, "keep\n// replaced\ntail\n");
    }

    #[test]
    fn test_skip_carries_near_miss_hint() {
        let rule = literal_rule("r", "  composer.render();\n", "new body");
        let text = "  composer2.render();\n";
        let (_, outcome) = apply_rule(text, &rule).unwrap();
        match outcome {
            RuleOutcome::Skipped { hint: Some(h) } => assert_eq!(h.line, 1),
            other => panic!("expected hinted skip, got {other:?}"),
        }
    }

    #[test]
    fn test_verify_exact_match_mismatch_errors() {
        let mut rule = literal_rule("r", "abc", "xyz");
        rule.verify = Some(Verify::ExactMatch {
            expected_text: "different".to_string(),
        });
        let result = apply_rule("abc", &rule);
        assert!(matches!(result, Err(ApplyError::Edit { .. })));
    }

    #[test]
    fn test_verify_bad_hash_value_errors() {
        let mut rule = literal_rule("r", "abc", "xyz");
        rule.verify = Some(Verify::Hash {
            algorithm: None,
            expected: "not-hex".to_string(),
        });
        let result = apply_rule("abc", &rule);
        assert!(matches!(result, Err(ApplyError::InvalidHash { .. })));
    }

    #[test]
    fn test_fold_threads_output_forward() {
        let rules = vec![
            literal_rule("first", "one", "two"),
            literal_rule("second", "two", "three"),
        ];
        let (out, reports) = apply_rules("one", &rules).unwrap();
        assert_eq!(out, "three");
        assert_eq!(reports.len(), 2);
        assert!(matches!(
            reports[0].outcome,
            RuleOutcome::Replaced { .. }
        ));
    }

    #[test]
    fn test_empty_input_passes_through() {
        let rules = vec![
            literal_rule("a", "foo", "bar"),
            pattern_rule("b", "ba.", "qux"),
        ];
        let (out, reports) = apply_rules("", &rules).unwrap();
        assert_eq!(out, "");
        assert!(reports
            .iter()
            .all(|r| matches!(r.outcome, RuleOutcome::Skipped { .. })));
    }

    #[test]
    fn test_length_delta_exact() {
        let rule = literal_rule("r", "short", "much longer text");
        let before = "prefix short suffix";
        let (out, outcome) = apply_rule(before, &rule).unwrap();
        let expected_delta = "much longer text".len() as isize - "short".len() as isize;
        assert_eq!(
            out.len() as isize - before.len() as isize,
            expected_delta
        );
        assert_eq!(
            outcome,
            RuleOutcome::Replaced {
                replacements: 1,
                bytes_delta: expected_delta
            }
        );
    }
}
