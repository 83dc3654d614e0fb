//! Core types and structures for archive-sweep

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crate::error::{Result, SweepError};

/// Upper bound on concurrent checkers. Past this, the subprocess strategy
/// mostly trades throughput for file-handle exhaustion.
pub const MAX_WORKERS: usize = 500;

/// Password checking strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckMethod {
    /// In-process ZIP verification
    Zip,
    /// One external `7z` invocation per candidate
    SevenZip,
}

impl std::fmt::Display for CheckMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CheckMethod::Zip => write!(f, "zip"),
            CheckMethod::SevenZip => write!(f, "7z"),
        }
    }
}

impl FromStr for CheckMethod {
    type Err = SweepError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "zip" | "builtin" => Ok(CheckMethod::Zip),
            "7z" | "7zip" | "sevenzip" => Ok(CheckMethod::SevenZip),
            other => Err(SweepError::config(format!(
                "unknown check method '{}', expected 'zip' or '7z'",
                other
            ))),
        }
    }
}

/// Why a candidate was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WrongKind {
    /// The cheap password verifier did not match
    Verifier,
    /// The verifier matched but decryption did not authenticate
    Authentication,
    /// The checker only reports a generic wrong-password condition
    Reported,
}

/// Classified result of one password attempt
#[derive(Debug, Clone)]
pub enum CheckOutcome {
    Success,
    WrongPassword(WrongKind),
    /// Transient environment limit (file handles, processes). Retry later.
    ResourceExhausted,
    Fatal(SweepError),
}

impl CheckOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, CheckOutcome::Success)
    }
}

/// Configuration for a sweep
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepConfig {
    /// Concurrent checkers
    pub workers: usize,
    /// Bounded candidate queue capacity
    pub queue_capacity: usize,
    /// Delay before retrying a candidate after resource exhaustion
    pub backoff: Duration,
    /// Retries per candidate before giving up; `None` retries forever
    pub max_retries: Option<u32>,
    /// Log progress every N emitted candidates
    pub progress_interval: u64,
    /// Checking strategy
    pub method: CheckMethod,
    /// `7z` binary for the subprocess strategy
    pub seven_zip: String,
    /// Checkpoint file (for resume)
    pub state_file: Option<PathBuf>,
    /// Save the checkpoint every N emitted candidates
    pub save_interval: u64,
}

impl Default for SweepConfig {
    fn default() -> Self {
        let cpus = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);
        let workers = (cpus * 4).min(MAX_WORKERS);
        Self {
            workers,
            queue_capacity: workers,
            backoff: Duration::from_millis(100),
            max_retries: None,
            progress_interval: 1_000_000,
            method: CheckMethod::Zip,
            seven_zip: "7z".to_string(),
            state_file: None,
            save_interval: 100_000,
        }
    }
}

impl SweepConfig {
    /// Load configuration from `ARCHIVE_SWEEP_*` environment variables,
    /// reading a `.env` file first if one exists.
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(workers) = parse_var::<usize, _>(&lookup, "ARCHIVE_SWEEP_WORKERS")? {
            config.workers = workers;
            config.queue_capacity = workers;
        }
        if let Some(capacity) = parse_var(&lookup, "ARCHIVE_SWEEP_QUEUE")? {
            config.queue_capacity = capacity;
        }
        if let Some(ms) = parse_var(&lookup, "ARCHIVE_SWEEP_BACKOFF_MS")? {
            config.backoff = Duration::from_millis(ms);
        }
        if let Some(retries) = parse_var(&lookup, "ARCHIVE_SWEEP_MAX_RETRIES")? {
            config.max_retries = Some(retries);
        }
        if let Some(every) = parse_var(&lookup, "ARCHIVE_SWEEP_PROGRESS_EVERY")? {
            config.progress_interval = every;
        }
        if let Some(method) = lookup("ARCHIVE_SWEEP_METHOD") {
            config.method = method.parse()?;
        }
        if let Some(binary) = lookup("ARCHIVE_SWEEP_7Z").filter(|s| !s.trim().is_empty()) {
            config.seven_zip = binary;
        }
        if let Some(path) = lookup("ARCHIVE_SWEEP_STATE").filter(|s| !s.trim().is_empty()) {
            config.state_file = Some(PathBuf::from(path));
        }
        if let Some(every) = parse_var(&lookup, "ARCHIVE_SWEEP_SAVE_EVERY")? {
            config.save_interval = every;
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject values the pool cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 || self.workers > MAX_WORKERS {
            return Err(crate::config_error!(
                "worker count must be between 1 and {}, got {}",
                MAX_WORKERS,
                self.workers
            ));
        }
        if self.queue_capacity == 0 {
            return Err(crate::config_error!("queue capacity must be at least 1"));
        }
        if self.progress_interval == 0 || self.save_interval == 0 {
            return Err(crate::config_error!("progress and save intervals must be positive"));
        }
        Ok(())
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| SweepError::config(format!("{}={}: {}", key, raw, e))),
    }
}

/// Live counters for a sweep
#[derive(Debug)]
pub struct SweepStats {
    emitted: AtomicU64,
    deduplicated: AtomicU64,
    suppressed: AtomicU64,
    checked: AtomicU64,
    retries: AtomicU64,
    started: Instant,
}

impl SweepStats {
    pub fn new() -> Self {
        Self {
            emitted: AtomicU64::new(0),
            deduplicated: AtomicU64::new(0),
            suppressed: AtomicU64::new(0),
            checked: AtomicU64::new(0),
            retries: AtomicU64::new(0),
            started: Instant::now(),
        }
    }

    pub fn record_emitted(&self) -> u64 {
        self.emitted.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn record_deduplicated(&self) {
        self.deduplicated.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_suppressed(&self, count: u64) {
        self.suppressed.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_checked(&self) -> u64 {
        self.checked.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn record_retry(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            emitted: self.emitted.load(Ordering::Relaxed),
            deduplicated: self.deduplicated.load(Ordering::Relaxed),
            suppressed: self.suppressed.load(Ordering::Relaxed),
            checked: self.checked.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            elapsed: self.started.elapsed(),
        }
    }
}

impl Default for SweepStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of [`SweepStats`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatsSnapshot {
    /// Candidates handed to the queue
    pub emitted: u64,
    /// Candidates skipped because a smaller charset already covered them
    pub deduplicated: u64,
    /// Candidates discarded while skipping ahead to a resume point
    pub suppressed: u64,
    /// Checks that produced a final verdict
    pub checked: u64,
    /// Resource exhaustion retries
    pub retries: u64,
    pub elapsed: Duration,
}

impl StatsSnapshot {
    /// Checks per second
    pub fn rate(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.checked as f64 / secs
        } else {
            0.0
        }
    }
}
