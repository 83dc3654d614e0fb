//! Tracks which emitted candidates are still unchecked, for safe checkpoints

use std::collections::BTreeMap;

use parking_lot::Mutex;

#[derive(Debug, Default)]
struct LedgerInner {
    next_seq: u64,
    pending: BTreeMap<u64, Vec<u8>>,
    last_issued: Option<Vec<u8>>,
}

/// Low watermark over the emission order.
///
/// Every candidate strictly before the watermark has been checked, so a sweep
/// resumed from it never skips an untested password.
#[derive(Debug, Default)]
pub struct ProgressLedger {
    inner: Mutex<LedgerInner>,
}

impl ProgressLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a candidate about to be queued, returning its sequence number
    pub fn issue(&self, candidate: &[u8]) -> u64 {
        let mut inner = self.inner.lock();
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.pending.insert(seq, candidate.to_vec());
        inner.last_issued = Some(candidate.to_vec());
        seq
    }

    /// Mark a candidate as checked
    pub fn finish(&self, seq: u64) {
        self.inner.lock().pending.remove(&seq);
    }

    /// Earliest candidate not yet known to be checked.
    ///
    /// Falls back to the most recently issued candidate when nothing is in
    /// flight; re-testing it on resume is harmless.
    pub fn low_watermark(&self) -> Option<Vec<u8>> {
        let inner = self.inner.lock();
        inner
            .pending
            .values()
            .next()
            .cloned()
            .or_else(|| inner.last_issued.clone())
    }

    pub fn in_flight(&self) -> usize {
        self.inner.lock().pending.len()
    }
}
