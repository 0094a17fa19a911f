//! Time source and phase derivation.
//!
//! Phases are never cached: every decision point asks the clock again.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use zkbid_types::{Auction, Phase};

/// Source of "now", in unix seconds.
pub trait Clock: Send + Sync {
    fn now(&self) -> u64;
}

/// Wall-clock time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }
}

/// Settable clock for tests and for following a ledger's own time.
#[derive(Debug, Default)]
pub struct ManualClock(AtomicU64);

impl ManualClock {
    pub fn new(now: u64) -> Self {
        Self(AtomicU64::new(now))
    }

    pub fn set(&self, now: u64) {
        self.0.store(now, Ordering::SeqCst);
    }

    pub fn advance(&self, secs: u64) -> u64 {
        self.0.fetch_add(secs, Ordering::SeqCst) + secs
    }
}

impl Clock for ManualClock {
    fn now(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }
}

/// Derives an auction's phase from the current time.
#[derive(Clone)]
pub struct PhaseClock {
    clock: Arc<dyn Clock>,
}

impl PhaseClock {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    pub fn system() -> Self {
        Self::new(Arc::new(SystemClock))
    }

    pub fn now(&self) -> u64 {
        self.clock.now()
    }

    /// Phase of `auction` right now.
    pub fn phase(&self, auction: &Auction) -> Phase {
        phase_at(auction, self.now())
    }
}

/// Phase of `auction` at `now`.
pub fn phase_at(auction: &Auction, now: u64) -> Phase {
    Phase::at(
        auction.start_time,
        auction.commit_end_time,
        auction.reveal_end_time,
        now,
    )
}
