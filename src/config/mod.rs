pub mod loader;
pub mod schema;

pub use loader::{load_from_path, load_from_str, ConfigError};
pub use schema::{
    HashAlgorithm, MatcherSpec, Metadata, Operation, RuleDefinition, RuleSet, ValidationError,
    ValidationIssue, Verify,
};
