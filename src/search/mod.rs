//! Candidate search space - charsets, enumeration order and resume state
//!
//! The search walks a [`Catalog`] length by length. For every length it tries
//! each charset from smallest to largest, skipping candidates that a smaller,
//! already exhausted charset has covered.

mod catalog;
mod filter;
mod generator;
mod state;
mod stream;

pub use catalog::{Catalog, Combination};
pub use filter::DedupFilter;
pub use generator::PermutationGenerator;
pub use state::SweepState;
pub use stream::{CandidateStream, StreamEvent};

/// Ordered, deduplicated byte alphabet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Charset {
    bytes: Vec<u8>,
    member: [bool; 256],
}

impl Charset {
    /// Build a charset, keeping the first occurrence of each byte
    pub fn new(bytes: impl AsRef<[u8]>) -> Self {
        let mut member = [false; 256];
        let mut ordered = Vec::new();
        for &b in bytes.as_ref() {
            if !member[b as usize] {
                member[b as usize] = true;
                ordered.push(b);
            }
        }
        Self {
            bytes: ordered,
            member,
        }
    }

    /// Inclusive byte range, e.g. `Charset::range(b'a', b'z')`
    pub fn range(start: u8, end: u8) -> Self {
        Self::new((start..=end).collect::<Vec<u8>>())
    }

    /// Concatenate charsets in order; duplicates keep their first position
    pub fn merge(parts: &[&Charset]) -> Self {
        let all: Vec<u8> = parts.iter().flat_map(|c| c.bytes.iter().copied()).collect();
        Self::new(all)
    }

    pub fn lower() -> Self {
        Self::range(b'a', b'z')
    }

    pub fn upper() -> Self {
        Self::range(b'A', b'Z')
    }

    pub fn digits() -> Self {
        Self::range(b'0', b'9')
    }

    pub fn symbols() -> Self {
        Self::new(b"./-_!?@#$%^&*+=")
    }

    /// Every printable ASCII byte, space through tilde
    pub fn printable() -> Self {
        Self::range(b' ', b'~')
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Byte at a position in insertion order
    pub fn byte_at(&self, index: usize) -> u8 {
        self.bytes[index]
    }

    pub fn contains(&self, byte: u8) -> bool {
        self.member[byte as usize]
    }

    /// True if every byte of `candidate` is in this charset
    pub fn contains_all(&self, candidate: &[u8]) -> bool {
        candidate.iter().all(|&b| self.contains(b))
    }

    /// True if every byte of `other` is in this charset
    pub fn is_superset_of(&self, other: &Charset) -> bool {
        self.contains_all(&other.bytes)
    }

    /// Number of strings of `length` over this charset, saturating at `u64::MAX`
    pub fn total_combinations(&self, length: usize) -> u64 {
        self.checked_combinations(length).unwrap_or(u64::MAX)
    }

    /// Number of strings of `length` over this charset, or `None` if it does
    /// not fit in a u64
    pub fn checked_combinations(&self, length: usize) -> Option<u64> {
        let base = self.bytes.len() as u64;
        (0..length).try_fold(1u64, |acc, _| acc.checked_mul(base))
    }
}

/// Render a candidate for logs and state files
pub fn display_candidate(candidate: &[u8]) -> String {
    String::from_utf8_lossy(candidate).into_owned()
}
