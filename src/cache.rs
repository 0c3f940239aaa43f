//! Thread-local compilation cache for matcher regexes.
//!
//! Caches compiled regexes to avoid redundant recompilation when the same
//! rule set is evaluated repeatedly (status then apply, or apply then diff).
//! Cache is capped at 256 entries; the cache is cleared when full.

use regex::{Regex, RegexBuilder};
use std::cell::RefCell;
use std::collections::HashMap;

const MAX_CACHE_ENTRIES: usize = 256;

thread_local! {
    static REGEX_CACHE: RefCell<HashMap<String, Regex>> =
        RefCell::new(HashMap::new());
}

/// Get a compiled regex from cache, or compile and cache it.
///
/// All patterns compile with dot-matches-newline enabled so wildcards can
/// cross line boundaries. Compiled regexes are cached thread-locally, capped
/// at 256 entries. When the cap is reached the cache is cleared and rebuilt
/// on demand.
pub fn get_or_compile(pattern: &str) -> Result<Regex, regex::Error> {
    REGEX_CACHE.with(|cache| {
        let mut cache = cache.borrow_mut();

        if let Some(re) = cache.get(pattern) {
            return Ok(re.clone());
        }

        // Evict all if at capacity (simple but effective for batch workloads)
        if cache.len() >= MAX_CACHE_ENTRIES {
            cache.clear();
        }

        let compiled = RegexBuilder::new(pattern)
            .dot_matches_new_line(true)
            .build()?;
        cache.insert(pattern.to_string(), compiled.clone());
        Ok(compiled)
    })
}

/// Clear the regex cache (mainly for testing).
pub fn clear_cache() {
    REGEX_CACHE.with(|cache| {
        cache.borrow_mut().clear();
    });
}

/// Get cache statistics for monitoring.
pub fn cache_size() -> usize {
    REGEX_CACHE.with(|cache| cache.borrow().len())
}
