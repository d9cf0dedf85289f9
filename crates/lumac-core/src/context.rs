/*
 * context.rs
 * Copyright (c) 2025 the lumac authors
 */

//! Shared state of one top-level expansion.
//!
//! A single [`ExpansionContext`] is created per top-level expansion request
//! and shared across all recursive template evaluations it triggers.

use std::collections::{HashMap, HashSet};

/// Cross-evaluation state: the cache of expanded inclusion results, the set
/// of templates already imported along the current expansion, and the
/// counter numbering template script files.
///
/// Paths are kept as the literal strings given by macro code; no
/// canonicalization is attempted, so `./a.tpl` and `a.tpl` are distinct.
#[derive(Debug, Default)]
pub(crate) struct ExpansionContext {
    inserted: HashMap<String, String>,
    imported: HashSet<String>,
    script_numbers: usize,
}

impl ExpansionContext {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Cached expansion result of `path`, if any.
    pub(crate) fn inserted(&self, path: &str) -> Option<&str> {
        self.inserted.get(path).map(String::as_str)
    }

    pub(crate) fn record_inserted(&mut self, path: &str, result: String) {
        self.inserted.insert(path.to_string(), result);
    }

    /// Whether `path` has already been imported during this expansion.
    pub(crate) fn is_imported(&self, path: &str) -> bool {
        self.imported.contains(path)
    }

    pub(crate) fn record_imported(&mut self, path: &str) {
        self.imported.insert(path.to_string());
    }

    /// Next number for a template script file. Nested evaluations hold
    /// their script files in parallel, so each level gets its own number.
    pub(crate) fn next_script_number(&mut self) -> usize {
        let number = self.script_numbers;
        self.script_numbers += 1;
        number
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn script_numbers_are_sequential() {
        let mut context = ExpansionContext::new();
        assert_eq!(context.next_script_number(), 0);
        assert_eq!(context.next_script_number(), 1);
        assert_eq!(context.next_script_number(), 2);
    }

    #[test]
    fn inserted_results_are_cached_by_literal_path() {
        let mut context = ExpansionContext::new();
        assert!(context.inserted("a.tpl").is_none());
        context.record_inserted("a.tpl", "result".to_string());
        assert_eq!(context.inserted("a.tpl"), Some("result"));
        assert!(context.inserted("./a.tpl").is_none());
    }

    #[test]
    fn imports_are_recorded_once() {
        let mut context = ExpansionContext::new();
        assert!(!context.is_imported("defs.tpl"));
        context.record_imported("defs.tpl");
        assert!(context.is_imported("defs.tpl"));
    }
}
