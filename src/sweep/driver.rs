//! Drives a complete sweep: producer, worker pool, checkpoints and report

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::mpsc;

use super::{Job, SweepContext, WorkerPool};
use crate::archive::{checker_source, CheckerSource};
use crate::error::Result;
use crate::search::{display_candidate, CandidateStream, Catalog, StreamEvent, SweepState};
use crate::types::{StatsSnapshot, SweepConfig};

/// How a sweep ended
#[derive(Debug, Clone, PartialEq)]
pub enum SweepReport {
    Found {
        password: Vec<u8>,
        stats: StatsSnapshot,
    },
    /// Every combination was exhausted without a match
    NotFound { stats: StatsSnapshot },
}

impl SweepReport {
    pub fn password(&self) -> Option<&[u8]> {
        match self {
            SweepReport::Found { password, .. } => Some(password),
            SweepReport::NotFound { .. } => None,
        }
    }

    pub fn stats(&self) -> &StatsSnapshot {
        match self {
            SweepReport::Found { stats, .. } | SweepReport::NotFound { stats } => stats,
        }
    }
}

/// Exhaustive password search over one archive
pub struct Sweeper {
    config: SweepConfig,
    archive: PathBuf,
    catalog: Catalog,
    source: Arc<dyn CheckerSource>,
    resume: Option<Vec<u8>>,
}

impl Sweeper {
    /// Create a sweeper using the standard catalog and the configured checker
    pub fn new(config: SweepConfig, archive: impl Into<PathBuf>) -> Result<Self> {
        config.validate()?;
        let archive = archive.into();
        let source = checker_source(&config, &archive)?;
        Ok(Self {
            config,
            archive,
            catalog: Catalog::standard(),
            source,
            resume: None,
        })
    }

    pub fn with_catalog(mut self, catalog: Catalog) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn with_source(mut self, source: Arc<dyn CheckerSource>) -> Self {
        self.source = source;
        self
    }

    /// Skip everything before `candidate`. Takes precedence over a saved
    /// checkpoint.
    pub fn with_resume(mut self, candidate: Option<Vec<u8>>) -> Self {
        self.resume = candidate;
        self
    }

    pub fn archive(&self) -> &Path {
        &self.archive
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Load the checkpoint and decide where the sweep starts
    fn prepare(&self) -> Result<(SweepState, Option<Vec<u8>>)> {
        let saved = match &self.config.state_file {
            Some(path) => SweepState::load_for(path, &self.archive)?.filter(|s| !s.completed),
            None => None,
        };

        let target = self
            .resume
            .clone()
            .or_else(|| saved.as_ref().and_then(SweepState::resume_target));
        if let Some(target) = &target {
            self.catalog.validate_candidate(target)?;
        }

        let state = saved.unwrap_or_else(|| SweepState::new(&self.archive));
        Ok((state, target))
    }

    /// Run until the password is found, the catalog is exhausted, or a
    /// checker fails fatally
    pub async fn run(&self) -> Result<SweepReport> {
        let (state, target) = self.prepare()?;
        let ctx = SweepContext::new();

        let stream = CandidateStream::new(&self.catalog)?
            .with_skip_to(target.clone())
            .with_stats(Arc::clone(&ctx.stats))
            .with_halt(ctx.broadcaster.halt_flag());

        let resume_from = target.as_deref().map(display_candidate);
        tracing::info!(
            archive = %self.archive.display(),
            method = %self.config.method,
            workers = self.config.workers,
            combinations = stream.total_before_dedup(),
            resume_from = resume_from.as_deref().unwrap_or("-"),
            "Starting sweep"
        );

        let (tx, rx) = mpsc::channel(self.config.queue_capacity);
        let producer = Producer {
            tx,
            ctx: ctx.clone(),
            state,
            state_file: self.config.state_file.clone(),
            progress_interval: self.config.progress_interval,
            save_interval: self.config.save_interval,
        };
        let producer = tokio::task::spawn_blocking(move || producer.run(stream));

        let pool = WorkerPool::from_config(&self.config);
        let pool_result = pool.run(Arc::clone(&self.source), rx, ctx.clone()).await;

        // Unblocks the producer if the pool gave up before draining the queue.
        ctx.broadcaster.cancel();
        let mut state = producer.await?;

        let stats = ctx.stats.snapshot();
        let winner = ctx.broadcaster.winner();
        match (&winner, &pool_result) {
            (Some(password), _) => state.mark_completed(Some(display_candidate(password))),
            (None, Ok(())) => state.mark_completed(None),
            (None, Err(_)) => state.update_progress(
                ctx.ledger.low_watermark().map(|c| display_candidate(&c)),
                stats.emitted,
                stats.checked,
            ),
        }
        if let Some(path) = &self.config.state_file {
            save_checkpoint(&state, path);
        }

        if let Some(password) = winner {
            tracing::info!(
                password = %display_candidate(&password),
                checked = stats.checked,
                elapsed_secs = stats.elapsed.as_secs_f64(),
                "Sweep succeeded"
            );
            return Ok(SweepReport::Found { password, stats });
        }

        pool_result?;
        tracing::info!(
            checked = stats.checked,
            deduplicated = stats.deduplicated,
            elapsed_secs = stats.elapsed.as_secs_f64(),
            "Search space exhausted"
        );
        Ok(SweepReport::NotFound { stats })
    }
}

fn save_checkpoint(state: &SweepState, path: &Path) {
    match state.save(path) {
        Ok(()) => tracing::debug!(state = %path.display(), "Checkpoint saved"),
        Err(e) => tracing::warn!(state = %path.display(), error = %e, "Failed to save checkpoint"),
    }
}

/// Feeds the queue from a blocking thread
struct Producer {
    tx: mpsc::Sender<Job>,
    ctx: SweepContext,
    state: SweepState,
    state_file: Option<PathBuf>,
    progress_interval: u64,
    save_interval: u64,
}

impl Producer {
    fn run(mut self, stream: CandidateStream) -> SweepState {
        for event in stream {
            let candidate = match event {
                StreamEvent::Combination(combination) => {
                    tracing::info!(
                        length = combination.length,
                        charset = combination.charset_index,
                        charset_size = combination.charset.len(),
                        total = combination.total(),
                        "Trying {}-symbol charset at length {}",
                        combination.charset.len(),
                        combination.length
                    );
                    continue;
                }
                StreamEvent::Candidate(candidate) => candidate,
            };

            if self.ctx.broadcaster.is_stopped() {
                break;
            }

            let job = self.ctx.issue(candidate);
            let emitted = job.seq + 1;
            if self.progress_interval > 0 && emitted % self.progress_interval == 0 {
                let stats = self.ctx.stats.snapshot();
                tracing::info!(
                    candidate = %display_candidate(&job.candidate),
                    emitted,
                    checked = stats.checked,
                    rate = %format!("{:.0}/s", stats.rate()),
                    "Progress"
                );
            }

            if self.tx.blocking_send(job).is_err() {
                break;
            }

            if self.save_interval > 0 && emitted % self.save_interval == 0 {
                self.checkpoint();
            }
        }
        self.state
    }

    fn checkpoint(&mut self) {
        let Some(path) = self.state_file.clone() else {
            return;
        };
        let stats = self.ctx.stats.snapshot();
        self.state.update_progress(
            self.ctx.ledger.low_watermark().map(|c| display_candidate(&c)),
            stats.emitted,
            stats.checked,
        );
        save_checkpoint(&self.state, &path);
    }
}
