//! Which charsets and lengths to try, and in what order

use std::sync::Arc;

use super::Charset;
use crate::error::{Result, SweepError};

/// Default length plan: a common password length first, then ascending.
/// Resume relies on this order staying fixed.
pub const DEFAULT_LENGTHS: &[usize] = &[6, 1, 2, 3, 4, 5, 7, 8];

/// One (length, charset) pass of the search
#[derive(Debug, Clone)]
pub struct Combination {
    pub length: usize,
    /// Position of the charset in the catalog
    pub charset_index: usize,
    pub charset: Arc<Charset>,
}

impl Combination {
    pub fn total(&self) -> u64 {
        self.charset.total_combinations(self.length)
    }
}

/// Ordered charsets (cheapest first) crossed with an ordered length plan
#[derive(Debug, Clone)]
pub struct Catalog {
    charsets: Vec<Arc<Charset>>,
    lengths: Vec<usize>,
}

impl Catalog {
    pub fn new(charsets: Vec<Charset>, lengths: Vec<usize>) -> Result<Self> {
        if charsets.is_empty() || lengths.is_empty() {
            return Err(SweepError::config("catalog needs at least one charset and one length"));
        }
        if charsets.iter().any(Charset::is_empty) {
            return Err(SweepError::config("catalog charsets must not be empty"));
        }
        if lengths.contains(&0) {
            return Err(SweepError::config("candidate lengths must be at least 1"));
        }
        let mut seen = Vec::with_capacity(lengths.len());
        for &len in &lengths {
            if seen.contains(&len) {
                return Err(SweepError::config(format!("length {} listed twice", len)));
            }
            seen.push(len);
        }
        // Positions are u64 counters; a cycle that cannot be counted cannot be walked.
        for charset in &charsets {
            for &len in &lengths {
                if charset.checked_combinations(len).is_none() {
                    return Err(SweepError::config(format!(
                        "length {} over a {}-character set overflows the 64-bit candidate counter",
                        len,
                        charset.len()
                    )));
                }
            }
        }

        Ok(Self {
            charsets: charsets.into_iter().map(Arc::new).collect(),
            lengths,
        })
    }

    /// lower, lower+digits, lower+upper+digits, lower+upper+digits+symbols,
    /// then all printable ASCII, over [`DEFAULT_LENGTHS`]
    pub fn standard() -> Self {
        let lower = Charset::lower();
        let upper = Charset::upper();
        let digits = Charset::digits();
        let symbols = Charset::symbols();

        let charsets = vec![
            lower.clone(),
            Charset::merge(&[&lower, &digits]),
            Charset::merge(&[&lower, &upper, &digits]),
            Charset::merge(&[&lower, &upper, &digits, &symbols]),
            Charset::printable(),
        ];

        Self {
            charsets: charsets.into_iter().map(Arc::new).collect(),
            lengths: DEFAULT_LENGTHS.to_vec(),
        }
    }

    pub fn charsets(&self) -> &[Arc<Charset>] {
        &self.charsets
    }

    pub fn lengths(&self) -> &[usize] {
        &self.lengths
    }

    /// True when each charset contains every charset before it
    pub fn is_nested(&self) -> bool {
        self.charsets
            .windows(2)
            .all(|pair| pair[1].is_superset_of(&pair[0]))
    }

    /// Every combination in search order: lengths outer, charsets inner
    pub fn combinations(&self) -> impl Iterator<Item = Combination> + '_ {
        self.lengths.iter().flat_map(move |&length| {
            self.charsets
                .iter()
                .enumerate()
                .map(move |(charset_index, charset)| Combination {
                    length,
                    charset_index,
                    charset: Arc::clone(charset),
                })
        })
    }

    /// Check that `candidate` will be produced by some combination
    pub fn validate_candidate(&self, candidate: &[u8]) -> Result<()> {
        let shown = super::display_candidate(candidate);
        if !self.lengths.contains(&candidate.len()) {
            return Err(SweepError::resume(
                shown,
                format!("length {} is not in the length plan {:?}", candidate.len(), self.lengths),
            ));
        }
        if !self.charsets.iter().any(|c| c.contains_all(candidate)) {
            return Err(SweepError::resume(shown, "contains characters outside every charset"));
        }
        Ok(())
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::standard()
    }
}
