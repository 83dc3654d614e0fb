//! Full search sequence across every (length, charset) combination

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::{Catalog, Combination, DedupFilter, PermutationGenerator};
use crate::error::Result;
use crate::types::SweepStats;

/// Item produced by [`CandidateStream`]
#[derive(Debug, Clone)]
pub enum StreamEvent {
    /// A new combination starts; candidates that follow belong to it
    Combination(Combination),
    Candidate(Vec<u8>),
}

/// Walks the catalog in order, feeding each generator through skip-ahead and
/// deduplication.
///
/// Owns the completed-charset bookkeeping: a charset is marked complete when
/// its generator finishes, and the set is cleared whenever the length changes.
/// A skip-ahead target that a combination does not contain carries over to
/// the next one until it is produced.
pub struct CandidateStream {
    passes: VecDeque<(Combination, PermutationGenerator)>,
    current: Option<(Combination, PermutationGenerator)>,
    filter: DedupFilter,
    current_length: Option<usize>,
    skip_target: Option<Vec<u8>>,
    stats: Option<Arc<SweepStats>>,
    halt: Option<Arc<AtomicBool>>,
    total: u64,
}

impl CandidateStream {
    pub fn new(catalog: &Catalog) -> Result<Self> {
        let mut passes = VecDeque::new();
        let mut total = 0u64;
        for combination in catalog.combinations() {
            let generator =
                PermutationGenerator::new(Arc::clone(&combination.charset), combination.length)?;
            total = total.saturating_add(generator.total());
            passes.push_back((combination, generator));
        }

        Ok(Self {
            passes,
            current: None,
            filter: DedupFilter::new(),
            current_length: None,
            skip_target: None,
            stats: None,
            halt: None,
            total,
        })
    }

    /// Resume: suppress everything before `target`
    pub fn with_skip_to(mut self, target: Option<Vec<u8>>) -> Self {
        self.skip_target = target;
        self
    }

    /// Record dedup and skip-ahead counts into shared stats
    pub fn with_stats(mut self, stats: Arc<SweepStats>) -> Self {
        self.stats = Some(stats);
        self
    }

    /// End the stream early once `flag` is raised, even mid-way through a
    /// run of deduplicated candidates
    pub fn with_halt(mut self, flag: Arc<AtomicBool>) -> Self {
        self.halt = Some(flag);
        self
    }

    fn halted(&self) -> bool {
        self.halt
            .as_ref()
            .map_or(false, |flag| flag.load(Ordering::Relaxed))
    }

    /// Sum of every combination's size, before deduplication
    pub fn total_before_dedup(&self) -> u64 {
        self.total
    }

    pub fn skip_pending(&self) -> bool {
        self.skip_target.is_some()
            || self
                .current
                .as_ref()
                .map_or(false, |(_, generator)| generator.skip_pending())
    }

    fn start_next(&mut self) -> Option<Combination> {
        let (combination, mut generator) = self.passes.pop_front()?;

        if self.current_length != Some(combination.length) {
            self.filter.reset();
            self.current_length = Some(combination.length);
        }
        if let Some(target) = self.skip_target.take() {
            generator.skip_to(target);
        }

        let event = combination.clone();
        self.current = Some((combination, generator));
        Some(event)
    }

    fn finish_current(&mut self) {
        if let Some((combination, mut generator)) = self.current.take() {
            if let Some(stats) = &self.stats {
                stats.record_suppressed(generator.suppressed());
            }
            self.skip_target = generator.take_skip_target();
            self.filter.complete(combination.charset);
        }
    }
}

impl Iterator for CandidateStream {
    type Item = StreamEvent;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.halted() {
                return None;
            }
            if self.current.is_none() {
                return self.start_next().map(StreamEvent::Combination);
            }

            let next = self.current.as_mut().and_then(|(_, generator)| generator.next());
            match next {
                Some(candidate) => {
                    if self.filter.should_skip(&candidate) {
                        if let Some(stats) = &self.stats {
                            stats.record_deduplicated();
                        }
                        continue;
                    }
                    return Some(StreamEvent::Candidate(candidate));
                }
                None => self.finish_current(),
            }
        }
    }
}
