//! Concurrent sweep over the candidate stream
//!
//! A single producer walks the [`CandidateStream`](crate::search::CandidateStream)
//! and feeds a bounded queue; a [`WorkerPool`] drains it, each worker with its
//! own checker. The first success is latched by the [`ResultBroadcaster`],
//! which also stops every other participant.

mod broadcast;
mod driver;
mod ledger;
mod pool;

pub use broadcast::ResultBroadcaster;
pub use driver::{SweepReport, Sweeper};
pub use ledger::ProgressLedger;
pub use pool::{Job, SweepContext, WorkerPool};
