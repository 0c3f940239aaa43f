//! Hub Patcher: fragment-based patching for the 3D hub visualization source
//!
//! A maintenance tool that inserts rendering features (label overlays,
//! material upgrades, edge-drawing logic) into `shared/3d-hub.js` by locating
//! fixed text fragments and replacing them with updated fragments.
//!
//! # Architecture
//!
//! All rule applications compile down to a single primitive: [`SpanEdit`],
//! which represents a verified byte-span replacement in an in-memory buffer.
//! Intelligence lives in span acquisition (literal and regex matchers), not
//! in the application logic. The artifact is read once, every rule in the
//! sequence folds over the buffer, and the result is written back once.
//!
//! # Safety
//!
//! - Edits verify expected before-text before applying
//! - Atomic file writes (tempfile + fsync + rename)
//! - Workspace boundary enforcement
//! - A rule whose matcher finds nothing is a no-op, never an error
//! - The shipped rule sequence is idempotent
//!
//! # Example
//!
//! ```no_run
//! use hub_patcher::{apply_rules, artifact, load_from_path};
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let rule_set = load_from_path("rules/label-overlay.toml")?;
//! let path = Path::new("shared/3d-hub.js");
//!
//! let text = artifact::load(path)?;
//! let (patched, reports) = apply_rules(&text, &rule_set.rules)?;
//! for report in &reports {
//!     println!("{}: {:?}", report.id, report.outcome);
//! }
//! if patched != text {
//!     artifact::save(path, &patched)?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod apply;
pub mod artifact;
pub mod cache;
pub mod config;
pub mod edit;
pub mod hint;
pub mod matcher;
pub mod safety;

// Re-exports
pub use apply::{apply_rule, apply_rules, ApplyError, RuleOutcome, RuleReport};
pub use artifact::ArtifactError;
pub use config::{
    load_from_path, load_from_str, ConfigError, MatcherSpec, Metadata, Operation, RuleDefinition,
    RuleSet, ValidationError, ValidationIssue, Verify,
};
pub use edit::{SpanEdit, SpanEditError, SpanVerification, SpliceResult};
pub use hint::NearMiss;
pub use matcher::{Matcher, MatcherError};
pub use safety::{SafetyError, WorkspaceGuard};
