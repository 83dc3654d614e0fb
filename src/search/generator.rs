//! Fixed-length permutation generator over one charset

use std::sync::Arc;

use super::Charset;
use crate::error::{Result, SweepError};

/// Enumerates every string of `charset^length` exactly once.
///
/// The cursor is a mixed-radix odometer: one counter per character slot, the
/// rightmost slot advancing every step and carrying leftward on overflow. When
/// the leftmost slot carries out, all `|charset|^length` strings have been
/// produced and the generator is finished.
#[derive(Debug, Clone)]
pub struct PermutationGenerator {
    charset: Arc<Charset>,
    cursor: Vec<usize>,
    position: u64,
    total: u64,
    finished: bool,
    skip_target: Option<Vec<u8>>,
    suppressed: u64,
}

impl PermutationGenerator {
    /// Create a generator for strings of `length` over `charset`
    pub fn new(charset: Arc<Charset>, length: usize) -> Result<Self> {
        if charset.is_empty() {
            return Err(SweepError::config("cannot enumerate an empty charset"));
        }
        if length == 0 {
            return Err(SweepError::config("candidate length must be at least 1"));
        }
        let total = charset.checked_combinations(length).ok_or_else(|| {
            SweepError::config(format!(
                "length {} over a {}-character set overflows the 64-bit candidate counter",
                length,
                charset.len()
            ))
        })?;
        Ok(Self {
            charset,
            cursor: vec![0; length],
            position: 0,
            total,
            finished: false,
            skip_target: None,
            suppressed: 0,
        })
    }

    pub fn length(&self) -> usize {
        self.cursor.len()
    }

    pub fn charset(&self) -> &Charset {
        &self.charset
    }

    /// Total number of strings in this cycle
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Steps taken so far, emitted or suppressed
    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn is_exhausted(&self) -> bool {
        self.finished
    }

    pub fn remaining(&self) -> u64 {
        self.total.saturating_sub(self.position)
    }

    /// Candidates discarded while skipping ahead
    pub fn suppressed(&self) -> u64 {
        self.suppressed
    }

    /// True while a skip-ahead target has not been reached
    pub fn skip_pending(&self) -> bool {
        self.skip_target.is_some()
    }

    /// Hand back an unreached skip-ahead target
    pub fn take_skip_target(&mut self) -> Option<Vec<u8>> {
        self.skip_target.take()
    }

    /// Suppress output until `target` is produced; `target` itself is the
    /// next candidate yielded.
    ///
    /// The suppressed prefix is skipped arithmetically rather than by
    /// stepping: if the target belongs to this cycle the cursor jumps straight
    /// to it, otherwise the whole remaining cycle is discarded and the target
    /// stays pending for the next generator.
    pub fn skip_to(&mut self, target: Vec<u8>) {
        if self.finished {
            self.skip_target = Some(target);
            return;
        }

        match self.digits_of(&target) {
            Some(digits) => {
                let index = self.index_of_digits(&digits);
                if index < self.position {
                    // Already past it; the target was produced earlier in this cycle.
                    self.skip_target = None;
                    return;
                }
                self.suppressed += index - self.position;
                self.cursor = digits;
                self.position = index;
                self.skip_target = None;
            }
            None => {
                self.suppressed += self.remaining();
                self.position = self.total;
                self.cursor.iter_mut().for_each(|slot| *slot = 0);
                self.finished = true;
                self.skip_target = Some(target);
            }
        }
    }

    /// Candidate at a given position of the cycle
    pub fn candidate_at(&self, index: u64) -> Option<Vec<u8>> {
        if index >= self.total {
            return None;
        }

        let base = self.charset.len() as u64;
        let mut out = vec![0u8; self.cursor.len()];
        let mut n = index;
        for slot in out.iter_mut().rev() {
            *slot = self.charset.byte_at((n % base) as usize);
            n /= base;
        }
        Some(out)
    }

    fn render(&self) -> Vec<u8> {
        self.cursor.iter().map(|&i| self.charset.byte_at(i)).collect()
    }

    /// Advance the odometer one step, carrying leftward
    fn advance(&mut self) {
        self.position += 1;
        let base = self.charset.len();
        for slot in self.cursor.iter_mut().rev() {
            *slot += 1;
            if *slot < base {
                return;
            }
            *slot = 0;
        }
        self.finished = true;
    }

    fn digits_of(&self, target: &[u8]) -> Option<Vec<usize>> {
        if target.len() != self.cursor.len() {
            return None;
        }
        let bytes = self.charset.as_bytes();
        target
            .iter()
            .map(|b| bytes.iter().position(|c| c == b))
            .collect()
    }

    fn index_of_digits(&self, digits: &[usize]) -> u64 {
        let base = self.charset.len() as u64;
        digits
            .iter()
            .fold(0u64, |acc, &d| acc.saturating_mul(base).saturating_add(d as u64))
    }
}

impl Iterator for PermutationGenerator {
    type Item = Vec<u8>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        let candidate = self.render();
        self.advance();
        Some(candidate)
    }
}
