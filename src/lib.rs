//! Archive Sweep - exhaustive password recovery for encrypted archives
//!
//! Walks a catalog of (length, charset) combinations from cheapest to most
//! expensive, skipping strings an earlier charset already covered, and checks
//! each candidate concurrently until one opens the archive.

pub mod archive;
pub mod error;
pub mod search;
pub mod sweep;
pub mod types;

// Re-export commonly used types
pub use error::{Result, SweepError};
pub use types::{
    CheckMethod, CheckOutcome, StatsSnapshot, SweepConfig, SweepStats, WrongKind,
};

// Re-export main functionality
pub use archive::{CheckerSource, PasswordChecker, ZipSource};
pub use search::{Catalog, CandidateStream, Charset, PermutationGenerator, SweepState};
pub use sweep::{ResultBroadcaster, SweepReport, Sweeper, WorkerPool};

use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Log filter variable, checked before `RUST_LOG`
pub const LOG_ENV: &str = "ARCHIVE_SWEEP_LOG";

/// Initialize the library
pub fn init() -> Result<()> {
    // Load .env file if it exists
    dotenv::dotenv().ok();
    Ok(())
}

/// Install the stderr log subscriber. Call once, early in `main`.
pub fn init_tracing() {
    let _ = tracing_subscriber::registry()
        .with(env_filter(|key| std::env::var(key).ok()))
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .try_init();
}

/// `ARCHIVE_SWEEP_LOG`, then `RUST_LOG`, then `info`. Unparseable
/// directives fall through to the next source.
fn env_filter<F>(lookup: F) -> EnvFilter
where
    F: Fn(&str) -> Option<String>,
{
    [LOG_ENV, "RUST_LOG"]
        .iter()
        .filter_map(|key| lookup(key))
        .find_map(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new("info"))
}
