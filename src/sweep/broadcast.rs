//! Single-winner result latch and stop signal

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;

/// Latches the first successful candidate and tells everyone to stop.
///
/// `publish` succeeds once; later reports are ignored. `cancel` stops the
/// sweep without a winner (fatal errors).
#[derive(Debug)]
pub struct ResultBroadcaster {
    winner: Mutex<Option<Vec<u8>>>,
    halted: Arc<AtomicBool>,
    stop: watch::Sender<bool>,
}

impl ResultBroadcaster {
    pub fn new() -> Self {
        let (stop, _) = watch::channel(false);
        Self {
            winner: Mutex::new(None),
            halted: Arc::new(AtomicBool::new(false)),
            stop,
        }
    }

    /// Report a successful candidate. Returns true only for the first report.
    pub fn publish(&self, candidate: &[u8]) -> bool {
        {
            let mut winner = self.winner.lock();
            if winner.is_some() {
                return false;
            }
            *winner = Some(candidate.to_vec());
        }
        self.halt();
        true
    }

    /// Stop without a winner
    pub fn cancel(&self) {
        self.halt();
    }

    fn halt(&self) {
        self.halted.store(true, Ordering::SeqCst);
        self.stop.send_replace(true);
    }

    pub fn is_stopped(&self) -> bool {
        self.halted.load(Ordering::SeqCst)
    }

    /// Flag for synchronous loops that cannot await the stop signal
    pub fn halt_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.halted)
    }

    pub fn winner(&self) -> Option<Vec<u8>> {
        self.winner.lock().clone()
    }

    /// Resolves once the sweep has been stopped
    pub async fn stopped(&self) {
        let mut rx = self.stop.subscribe();
        loop {
            let stopped = *rx.borrow_and_update();
            if stopped || rx.changed().await.is_err() {
                return;
            }
        }
    }
}

impl Default for ResultBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}
