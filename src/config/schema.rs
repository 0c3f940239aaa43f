use serde::Deserialize;
use std::fmt;

use crate::matcher::Matcher;

#[derive(Debug, Deserialize, Default, Clone)]
pub struct RuleSet {
    #[serde(default)]
    pub meta: Metadata,
    #[serde(default)]
    pub rules: Vec<RuleDefinition>,
}

impl RuleSet {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut issues = Vec::new();

        if self.rules.is_empty() {
            issues.push(ValidationIssue::EmptyRuleList);
        }

        if self.meta.artifact.trim().is_empty() {
            issues.push(ValidationIssue::MissingField {
                rule_id: None,
                field: "meta.artifact",
            });
        }

        for rule in &self.rules {
            if rule.id.trim().is_empty() {
                issues.push(ValidationIssue::MissingField {
                    rule_id: None,
                    field: "id",
                });
            }

            match &rule.matcher {
                MatcherSpec::Literal { search, .. } => {
                    if search.trim().is_empty() {
                        issues.push(ValidationIssue::MissingField {
                            rule_id: Some(rule.id.clone()),
                            field: "matcher.search",
                        });
                    }
                }
                MatcherSpec::Pattern { pattern, .. } => {
                    if pattern.trim().is_empty() {
                        issues.push(ValidationIssue::MissingField {
                            rule_id: Some(rule.id.clone()),
                            field: "matcher.pattern",
                        });
                    } else if let Err(e) = Matcher::pattern(pattern) {
                        issues.push(ValidationIssue::Invalid {
                            rule_id: Some(rule.id.clone()),
                            message: e.to_string(),
                        });
                    }
                }
            }

            match &rule.operation {
                Operation::Replace { text } => {
                    if text.trim().is_empty() {
                        issues.push(ValidationIssue::MissingField {
                            rule_id: Some(rule.id.clone()),
                            field: "operation.text",
                        });
                    }
                }
            }

            if let Some(Verify::Hash { expected, .. }) = &rule.verify {
                let digits = expected.trim().trim_start_matches("0x");
                if digits.is_empty() || u64::from_str_radix(digits, 16).is_err() {
                    issues.push(ValidationIssue::Invalid {
                        rule_id: Some(rule.id.clone()),
                        message: format!("expected hash '{expected}' is not a hex u64"),
                    });
                }
            }
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { issues })
        }
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct Metadata {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Workspace-relative path of the file this rule set patches
    #[serde(default)]
    pub artifact: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RuleDefinition {
    pub id: String,
    pub matcher: MatcherSpec,
    pub operation: Operation,
    #[serde(default)]
    pub verify: Option<Verify>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum MatcherSpec {
    /// Exact substring search
    Literal {
        search: String,
        #[serde(default)]
        global: bool,
    },
    /// Regex whose wildcards cross line boundaries
    Pattern {
        pattern: String,
        #[serde(default)]
        global: bool,
    },
}

impl MatcherSpec {
    /// Compile into a runtime matcher.
    pub fn to_matcher(&self) -> Result<Matcher, crate::matcher::MatcherError> {
        match self {
            MatcherSpec::Literal { search, .. } => Ok(Matcher::literal(search.clone())),
            MatcherSpec::Pattern { pattern, .. } => Matcher::pattern(pattern),
        }
    }

    /// Whether the rule replaces all matches instead of the first.
    pub fn is_global(&self) -> bool {
        match self {
            MatcherSpec::Literal { global, .. } | MatcherSpec::Pattern { global, .. } => *global,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Operation {
    /// Replace the matched span with a literal block
    Replace { text: String },
}

impl Operation {
    pub fn replacement(&self) -> &str {
        match self {
            Operation::Replace { text } => text,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum Verify {
    ExactMatch {
        expected_text: String,
    },
    Hash {
        algorithm: Option<HashAlgorithm>,
        expected: String,
    },
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum HashAlgorithm {
    Xxh3,
}

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, issue) in self.issues.iter().enumerate() {
            if idx > 0 {
                writeln!(f)?;
            }
            write!(f, "{issue}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

#[derive(Debug, Clone)]
pub enum ValidationIssue {
    EmptyRuleList,
    MissingField {
        rule_id: Option<String>,
        field: &'static str,
    },
    Invalid {
        rule_id: Option<String>,
        message: String,
    },
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationIssue::EmptyRuleList => write!(f, "rule set contains no rules"),
            ValidationIssue::MissingField { rule_id, field } => match rule_id {
                Some(id) => write!(f, "rule '{id}' missing required field '{field}'"),
                None => write!(f, "rule set missing required field '{field}'"),
            },
            ValidationIssue::Invalid { rule_id, message } => match rule_id {
                Some(id) => write!(f, "rule '{id}' has invalid configuration: {message}"),
                None => write!(f, "invalid rule configuration: {message}"),
            },
        }
    }
}
