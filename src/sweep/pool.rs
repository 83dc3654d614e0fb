//! Long-lived checking workers fed from a bounded queue

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{FuturesUnordered, StreamExt};
use tokio::sync::{mpsc, Mutex};

use super::{ProgressLedger, ResultBroadcaster};
use crate::archive::{CheckerSource, PasswordChecker};
use crate::error::{Result, SweepError};
use crate::search::display_candidate;
use crate::types::{CheckOutcome, SweepConfig, SweepStats};

/// One queued candidate
#[derive(Debug, Clone)]
pub struct Job {
    /// Emission order, used for checkpoint bookkeeping
    pub seq: u64,
    pub candidate: Vec<u8>,
}

/// State shared by the producer and every worker of one sweep
#[derive(Debug, Clone, Default)]
pub struct SweepContext {
    pub broadcaster: Arc<ResultBroadcaster>,
    pub ledger: Arc<ProgressLedger>,
    pub stats: Arc<SweepStats>,
}

impl SweepContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register and count a candidate before it is queued
    pub fn issue(&self, candidate: Vec<u8>) -> Job {
        let seq = self.ledger.issue(&candidate);
        self.stats.record_emitted();
        Job { seq, candidate }
    }
}

/// Fixed-size pool of workers, each owning its own checker.
///
/// Workers pull from a shared queue until it closes or the broadcaster stops
/// the sweep. A resource-exhausted check is retried on the same candidate
/// after a backoff; a fatal check cancels every worker.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    workers: usize,
    backoff: Duration,
    max_retries: Option<u32>,
}

impl WorkerPool {
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
            backoff: Duration::from_millis(100),
            max_retries: None,
        }
    }

    pub fn from_config(config: &SweepConfig) -> Self {
        Self::new(config.workers)
            .with_backoff(config.backoff)
            .with_max_retries(config.max_retries)
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// Give up on a candidate after this many exhausted attempts; `None`
    /// retries forever
    pub fn with_max_retries(mut self, max_retries: Option<u32>) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Run every worker to completion over `queue`.
    ///
    /// Returns the first worker error unless a password was found anyway.
    pub async fn run(
        &self,
        source: Arc<dyn CheckerSource>,
        queue: mpsc::Receiver<Job>,
        ctx: SweepContext,
    ) -> Result<()> {
        // Opening may read the archive from disk.
        let workers = self.workers;
        let checkers = tokio::task::spawn_blocking(move || {
            (0..workers)
                .map(|_| source.open())
                .collect::<Result<Vec<_>>>()
        })
        .await??;

        let queue = Arc::new(Mutex::new(queue));
        let mut tasks = FuturesUnordered::new();
        for (id, checker) in checkers.into_iter().enumerate() {
            let worker = Worker {
                id,
                checker,
                queue: Arc::clone(&queue),
                ctx: ctx.clone(),
                backoff: self.backoff,
                max_retries: self.max_retries,
            };
            tasks.push(tokio::spawn(worker.run()));
        }
        // Workers hold the only receivers now: the producer sees a closed
        // channel as soon as the last one exits.
        drop(queue);

        tracing::debug!(workers = self.workers, "Worker pool started");

        let mut first_error = None;
        while let Some(joined) = tasks.next().await {
            if let Err(e) = joined.map_err(SweepError::from).and_then(|r| r) {
                ctx.broadcaster.cancel();
                tracing::error!(error = %e, "Worker failed");
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) if ctx.broadcaster.winner().is_none() => Err(e),
            _ => Ok(()),
        }
    }

    /// Check an explicit list of candidates in order and return the first
    /// one that opens the archive
    pub async fn search<I>(
        &self,
        source: Arc<dyn CheckerSource>,
        candidates: I,
    ) -> Result<Option<Vec<u8>>>
    where
        I: IntoIterator<Item = Vec<u8>>,
    {
        let ctx = SweepContext::new();
        let (tx, rx) = mpsc::channel(self.workers);

        let producer = {
            let ctx = ctx.clone();
            async move {
                for candidate in candidates {
                    if ctx.broadcaster.is_stopped() {
                        break;
                    }
                    if tx.send(ctx.issue(candidate)).await.is_err() {
                        break;
                    }
                }
            }
        };

        let (_, result) = tokio::join!(producer, self.run(source, rx, ctx.clone()));
        result?;
        Ok(ctx.broadcaster.winner())
    }
}

struct Worker {
    id: usize,
    checker: Box<dyn PasswordChecker>,
    queue: Arc<Mutex<mpsc::Receiver<Job>>>,
    ctx: SweepContext,
    backoff: Duration,
    max_retries: Option<u32>,
}

impl Worker {
    async fn run(self) -> Result<()> {
        loop {
            let job = tokio::select! {
                biased;
                _ = self.ctx.broadcaster.stopped() => return Ok(()),
                job = async { self.queue.lock().await.recv().await } => job,
            };
            let Some(job) = job else {
                return Ok(());
            };
            if !self.process(&job).await? {
                return Ok(());
            }
        }
    }

    /// Check one candidate, retrying while resources are exhausted.
    /// Returns false when the worker should stop.
    async fn process(&self, job: &Job) -> Result<bool> {
        let mut attempts = 0u32;
        loop {
            let outcome = tokio::select! {
                biased;
                _ = self.ctx.broadcaster.stopped() => return Ok(false),
                outcome = self.checker.check(&job.candidate) => outcome,
            };

            match outcome {
                CheckOutcome::Success => {
                    self.finish(job);
                    if self.ctx.broadcaster.publish(&job.candidate) {
                        tracing::info!(
                            worker = self.id,
                            password = %display_candidate(&job.candidate),
                            "Password found"
                        );
                    }
                    return Ok(false);
                }
                CheckOutcome::WrongPassword(kind) => {
                    self.finish(job);
                    tracing::trace!(
                        worker = self.id,
                        candidate = %display_candidate(&job.candidate),
                        kind = ?kind,
                        "Wrong password"
                    );
                    return Ok(true);
                }
                CheckOutcome::ResourceExhausted => {
                    attempts += 1;
                    self.ctx.stats.record_retry();
                    if self.max_retries.map_or(false, |max| attempts > max) {
                        self.ctx.broadcaster.cancel();
                        return Err(SweepError::retries_exhausted(
                            display_candidate(&job.candidate),
                            attempts,
                        ));
                    }
                    tracing::warn!(
                        worker = self.id,
                        candidate = %display_candidate(&job.candidate),
                        attempt = attempts,
                        backoff_ms = self.backoff.as_millis() as u64,
                        "Resources exhausted, backing off"
                    );
                    tokio::select! {
                        biased;
                        _ = self.ctx.broadcaster.stopped() => return Ok(false),
                        _ = tokio::time::sleep(self.backoff) => {}
                    }
                }
                CheckOutcome::Fatal(e) => {
                    self.ctx.broadcaster.cancel();
                    return Err(e);
                }
            }
        }
    }

    fn finish(&self, job: &Job) {
        self.ctx.stats.record_checked();
        self.ctx.ledger.finish(job.seq);
    }
}
