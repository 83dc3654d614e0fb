//! Cross-charset deduplication

use std::sync::Arc;

use super::Charset;

/// Skips candidates that an already exhausted charset of the same length
/// has covered.
///
/// A candidate is skipped when a single completed charset contains all of its
/// bytes. With nested catalogs (each charset a superset of the last) this is
/// the same as asking whether each byte belongs to some completed charset, and
/// it stays correct when charsets are not nested.
#[derive(Debug, Default, Clone)]
pub struct DedupFilter {
    completed: Vec<Arc<Charset>>,
}

impl DedupFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a charset whose cycle for the current length is finished
    pub fn complete(&mut self, charset: Arc<Charset>) {
        if !self.completed.iter().any(|c| **c == *charset) {
            self.completed.push(charset);
        }
    }

    /// Forget completed charsets; call when the length changes
    pub fn reset(&mut self) {
        self.completed.clear();
    }

    pub fn completed(&self) -> &[Arc<Charset>] {
        &self.completed
    }

    pub fn should_skip(&self, candidate: &[u8]) -> bool {
        self.completed.iter().any(|c| c.contains_all(candidate))
    }
}
