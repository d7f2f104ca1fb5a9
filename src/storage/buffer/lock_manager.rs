use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use log::{debug, trace};
use parking_lot::{Condvar, Mutex};
use rand::Rng;

use crate::common::types::{PageId, TransactionId};
use crate::storage::buffer::error::TransactionAborted;

/// Lock strength on one page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    Shared,
    Exclusive,
}

/// Lock state of one currently-locked page. An exclusive entry has
/// exactly one holder.
struct LockEntry {
    mode: LockMode,
    holders: HashSet<TransactionId>,
}

#[derive(Default)]
struct LockState {
    /// Per-page lock records. An entry exists only while some transaction
    /// holds the page.
    locks: HashMap<PageId, LockEntry>,
    /// Per-transaction inventory of held pages, the index for bulk
    /// release and commit-time flushing.
    by_txn: HashMap<TransactionId, HashSet<PageId>>,
}

/// Page-granularity lock manager enforcing shared/exclusive semantics
/// with in-place upgrade. All state changes happen under one mutex;
/// blocked acquisitions wait on a condvar signalled by every release.
///
/// Deadlocks are handled probabilistically: each acquisition draws a
/// random timeout budget and aborts once its cumulative wait exceeds it,
/// forcing the caller to roll back and retry.
pub struct LockManager {
    state: Mutex<LockState>,
    released: Condvar,
}

impl Default for LockManager {
    fn default() -> Self {
        Self::new()
    }
}

impl LockManager {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(LockState::default()),
            released: Condvar::new(),
        }
    }

    /// Block until `tid` holds `pid` in (at least) the requested mode.
    ///
    /// The wait budget is drawn uniformly from `[0, max_timeout]` per
    /// call; exceeding it aborts the acquisition with
    /// [`TransactionAborted`]. Re-acquiring an already-held lock and
    /// upgrading a solely-held shared lock both succeed without waiting.
    pub fn acquire(
        &self,
        tid: TransactionId,
        pid: PageId,
        mode: LockMode,
        max_timeout: Duration,
    ) -> Result<(), TransactionAborted> {
        let budget = random_budget(max_timeout);
        let start = Instant::now();

        let mut state = self.state.lock();
        loop {
            if try_grant(&mut state, tid, pid, mode) {
                trace!("{} acquired {:?} on {}", tid, mode, pid);
                return Ok(());
            }

            let remaining = budget.saturating_sub(start.elapsed());
            if remaining.is_zero() {
                debug!("{} aborted waiting for {:?} on {}", tid, mode, pid);
                return Err(TransactionAborted(tid));
            }
            let _ = self.released.wait_for(&mut state, remaining);
        }
    }

    /// Drop `tid`'s hold on `pid`, destroying the lock record when the
    /// holder set empties. No-op if the lock is not held. Waiters are
    /// woken in either case since the page may have become grantable.
    pub fn release(&self, tid: TransactionId, pid: PageId) {
        let mut state = self.state.lock();
        release_locked(&mut state, tid, pid);
        self.released.notify_all();
    }

    /// Release every lock held by `tid`, iterating over a snapshot of its
    /// inventory.
    pub fn release_all(&self, tid: TransactionId) {
        let mut state = self.state.lock();
        let held: Vec<PageId> = state
            .by_txn
            .get(&tid)
            .map(|pages| pages.iter().copied().collect())
            .unwrap_or_default();
        for pid in held {
            release_locked(&mut state, tid, pid);
        }
        self.released.notify_all();
    }

    pub fn holds_lock(&self, tid: TransactionId, pid: PageId) -> bool {
        let state = self.state.lock();
        state
            .by_txn
            .get(&tid)
            .is_some_and(|pages| pages.contains(&pid))
    }

    /// Snapshot of the pages `tid` currently holds locks on.
    pub fn held_pages(&self, tid: TransactionId) -> Vec<PageId> {
        let state = self.state.lock();
        state
            .by_txn
            .get(&tid)
            .map(|pages| pages.iter().copied().collect())
            .unwrap_or_default()
    }
}

fn random_budget(max_timeout: Duration) -> Duration {
    let max_ms = max_timeout.as_millis() as u64;
    Duration::from_millis(rand::thread_rng().gen_range(0..=max_ms))
}

/// One grant attempt under the state mutex. Returns whether `tid` now
/// holds `pid` in a mode at least as strong as requested.
fn try_grant(state: &mut LockState, tid: TransactionId, pid: PageId, mode: LockMode) -> bool {
    let granted = match state.locks.get_mut(&pid) {
        None => {
            state.locks.insert(
                pid,
                LockEntry {
                    mode,
                    holders: HashSet::from([tid]),
                },
            );
            true
        }
        Some(entry) => match (entry.mode, mode) {
            // Shared fan-in; insertion is idempotent for re-acquisition.
            (LockMode::Shared, LockMode::Shared) => {
                entry.holders.insert(tid);
                true
            }
            // Upgrade in place when the requester is the sole holder, so
            // there is no window where the lock is unheld.
            (LockMode::Shared, LockMode::Exclusive) => {
                if entry.holders.len() == 1 && entry.holders.contains(&tid) {
                    entry.mode = LockMode::Exclusive;
                    true
                } else {
                    false
                }
            }
            // An exclusive holder re-enters with either mode.
            (LockMode::Exclusive, _) => entry.holders.contains(&tid),
        },
    };

    if granted {
        state.by_txn.entry(tid).or_default().insert(pid);
    }
    granted
}

fn release_locked(state: &mut LockState, tid: TransactionId, pid: PageId) {
    if let Some(pages) = state.by_txn.get_mut(&tid) {
        pages.remove(&pid);
        if pages.is_empty() {
            state.by_txn.remove(&tid);
        }
    }
    if let Some(entry) = state.locks.get_mut(&pid) {
        entry.holders.remove(&tid);
        if entry.holders.is_empty() {
            state.locks.remove(&pid);
        }
    }
}
