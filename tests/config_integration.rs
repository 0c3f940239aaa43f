//! Integration tests for rule-set loading and validation

use hub_patcher::config::{
    load_from_path, load_from_str, HashAlgorithm, MatcherSpec, Operation, Verify,
};
use std::path::PathBuf;

#[test]
fn test_load_rule_set_basic() {
    let toml = r#"
[meta]
name = "test-rules"
description = "Test rule set"
artifact = "shared/3d-hub.js"

[[rules]]
id = "rule-1"

[rules.matcher]
type = "literal"
search = "composer.render();"

[rules.operation]
type = "replace"
text = "composer.render();\nlabelRenderer.render(scene, camera);"
"#;

    let rule_set = load_from_str(toml).expect("Failed to parse rule set");

    assert_eq!(rule_set.meta.name, "test-rules");
    assert_eq!(rule_set.meta.artifact, "shared/3d-hub.js");
    assert_eq!(rule_set.rules.len(), 1);
    assert_eq!(rule_set.rules[0].id, "rule-1");
    assert!(!rule_set.rules[0].matcher.is_global());
}

#[test]
fn test_load_rule_set_pattern_matcher() {
    let toml = r#"
[meta]
name = "pattern-rules"
artifact = "shared/3d-hub.js"

[[rules]]
id = "imports"

[rules.matcher]
type = "pattern"
pattern = '''import \* as THREE.*?UnrealBloomPass\.js';\n'''

[rules.operation]
type = "replace"
text = "replacement import block"
"#;

    let rule_set = load_from_str(toml).expect("Failed to parse rule set");
    assert_eq!(rule_set.rules.len(), 1);
    assert!(matches!(
        rule_set.rules[0].matcher,
        MatcherSpec::Pattern { .. }
    ));
}

#[test]
fn test_load_rule_set_global_flag() {
    let toml = r#"
[meta]
name = "global-rules"
artifact = "hub.js"

[[rules]]
id = "rename-all"

[rules.matcher]
type = "literal"
search = "oldName"
global = true

[rules.operation]
type = "replace"
text = "newName"
"#;

    let rule_set = load_from_str(toml).expect("Failed to parse rule set");
    assert!(rule_set.rules[0].matcher.is_global());
}

#[test]
fn test_load_rule_set_with_verification() {
    let toml = r#"
[meta]
name = "verified-rules"
artifact = "hub.js"

[[rules]]
id = "rule-with-exact-match"

[rules.matcher]
type = "literal"
search = "composer.render();"

[rules.operation]
type = "replace"
text = "composer.render();\nextra();"

[rules.verify]
method = "exact_match"
expected_text = "composer.render();"
"#;

    let rule_set = load_from_str(toml).expect("Failed to parse rule set");
    assert_eq!(rule_set.rules.len(), 1);

    if let Some(Verify::ExactMatch { expected_text }) = &rule_set.rules[0].verify {
        assert!(expected_text.contains("composer"));
    } else {
        panic!("Expected ExactMatch verification");
    }
}

#[test]
fn test_load_rule_set_with_hash() {
    let toml = r#"
[meta]
name = "hash-rules"
artifact = "hub.js"

[[rules]]
id = "rule-with-hash"

[rules.matcher]
type = "literal"
search = "composer.render();"

[rules.operation]
type = "replace"
text = "composer.render(); extra();"

[rules.verify]
method = "hash"
algorithm = "xxh3"
expected = "0x1234567890abcdef"
"#;

    let rule_set = load_from_str(toml).expect("Failed to parse rule set");

    if let Some(Verify::Hash {
        algorithm,
        expected,
    }) = &rule_set.rules[0].verify
    {
        assert_eq!(*algorithm, Some(HashAlgorithm::Xxh3));
        assert_eq!(expected, "0x1234567890abcdef");
    } else {
        panic!("Expected Hash verification");
    }
}

#[test]
fn test_validation_empty_rules() {
    let toml = r#"
[meta]
name = "test"
artifact = "hub.js"
"#;

    let result = load_from_str(toml);
    assert!(result.is_err());
    assert!(result
        .unwrap_err()
        .to_string()
        .contains("rule set contains no rules"));
}

#[test]
fn test_validation_missing_artifact() {
    let toml = r#"
[meta]
name = "test"

[[rules]]
id = "rule-1"

[rules.matcher]
type = "literal"
search = "needle"

[rules.operation]
type = "replace"
text = "replacement"
"#;

    let result = load_from_str(toml);
    assert!(result.is_err());
    assert!(result.unwrap_err().to_string().contains("meta.artifact"));
}

#[test]
fn test_validation_missing_id() {
    let toml = r#"
[meta]
name = "test"
artifact = "hub.js"

[[rules]]

[rules.matcher]
type = "literal"
search = "needle"

[rules.operation]
type = "replace"
text = "replacement"
"#;

    // TOML deserialization fails before validation for missing required field
    let result = load_from_str(toml);
    assert!(result.is_err());
}

#[test]
fn test_validation_blank_search() {
    let toml = r#"
[meta]
name = "test"
artifact = "hub.js"

[[rules]]
id = "blank-search"

[rules.matcher]
type = "literal"
search = "   "

[rules.operation]
type = "replace"
text = "replacement"
"#;

    let result = load_from_str(toml);
    assert!(result.is_err());
    assert!(result.unwrap_err().to_string().contains("matcher.search"));
}

#[test]
fn test_validation_bad_pattern() {
    let toml = r#"
[meta]
name = "test"
artifact = "hub.js"

[[rules]]
id = "bad-pattern"

[rules.matcher]
type = "pattern"
pattern = "(unclosed"

[rules.operation]
type = "replace"
text = "replacement"
"#;

    let result = load_from_str(toml);
    assert!(result.is_err());
    let message = result.unwrap_err().to_string();
    assert!(message.contains("bad-pattern"));
}

#[test]
fn test_validation_bad_hash_value() {
    let toml = r#"
[meta]
name = "test"
artifact = "hub.js"

[[rules]]
id = "bad-hash"

[rules.matcher]
type = "literal"
search = "needle"

[rules.operation]
type = "replace"
text = "replacement"

[rules.verify]
method = "hash"
expected = "not-hex"
"#;

    let result = load_from_str(toml);
    assert!(result.is_err());
    assert!(result.unwrap_err().to_string().contains("not a hex u64"));
}

#[test]
fn test_multiple_rules_preserve_order() {
    let toml = r#"
[meta]
name = "multi-rules"
artifact = "hub.js"

[[rules]]
id = "rule-1"

[rules.matcher]
type = "literal"
search = "one"

[rules.operation]
type = "replace"
text = "two"

[[rules]]
id = "rule-2"

[rules.matcher]
type = "literal"
search = "two"

[rules.operation]
type = "replace"
text = "three"
"#;

    let rule_set = load_from_str(toml).expect("Failed to parse multi-rule set");
    assert_eq!(rule_set.rules.len(), 2);
    assert_eq!(rule_set.rules[0].id, "rule-1");
    assert_eq!(rule_set.rules[1].id, "rule-2");
}

#[test]
fn test_operation_replacement_accessor() {
    let op = Operation::Replace {
        text: "new text".to_string(),
    };
    assert_eq!(op.replacement(), "new text");
}

#[test]
fn test_shipped_rule_set_loads() {
    let root = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    let rule_set =
        load_from_path(root.join("rules/label-overlay.toml")).expect("shipped rule set must load");

    assert_eq!(rule_set.meta.name, "label-overlay");
    assert_eq!(rule_set.meta.artifact, "shared/3d-hub.js");

    let ids: Vec<&str> = rule_set.rules.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(
        ids,
        [
            "imports-css2d",
            "renderer-label-init",
            "node-typography-labels",
            "sequential-anchor-edges",
            "physical-materials",
            "render-loop-labels",
            "resize-labels",
        ]
    );
}
