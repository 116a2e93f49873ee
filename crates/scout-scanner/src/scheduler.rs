//! Time-ordered account pool.
//!
//! Accounts at rest sit in a min-heap keyed by the instant they may be used
//! again. [`AuthScheduler::acquire`] removes the earliest eligible account and
//! hands it out as an [`AccountLease`]; while leased, the account is absent from
//! the heap, so no second caller can obtain it. [`AuthScheduler::release`] puts
//! it back with a new eligibility time.

use scout_rpc::AccountSession;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::ops::{Deref, DerefMut};
use std::pin::pin;
use std::time::Duration;
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;
use tracing::debug;

/// Default lookahead beyond which the head account counts as sidelined.
pub const DEFAULT_LOOKAHEAD: Duration = Duration::from_secs(30);

struct Slot {
    ready_at: Instant,
    sequence: u64,
    session: AccountSession,
}

impl PartialEq for Slot {
    fn eq(&self, other: &Self) -> bool {
        self.ready_at == other.ready_at && self.sequence == other.sequence
    }
}

impl Eq for Slot {}

impl PartialOrd for Slot {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Slot {
    fn cmp(&self, other: &Self) -> Ordering {
        // Earliest ready time first, then insertion order
        other
            .ready_at
            .cmp(&self.ready_at)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

#[derive(Default)]
struct Pool {
    heap: BinaryHeap<Slot>,
    generation: u64,
    sequence: u64,
    members: usize,
}

impl Pool {
    fn insert(&mut self, session: AccountSession, ready_at: Instant) {
        self.sequence += 1;
        self.heap.push(Slot {
            ready_at,
            sequence: self.sequence,
            session,
        });
    }
}

/// An account borrowed from the scheduler.
///
/// Must be handed back through [`AuthScheduler::release`]; a lease that is
/// dropped instead removes the account from rotation.
pub struct AccountLease {
    session: AccountSession,
    generation: u64,
}

impl AccountLease {
    /// The leased session.
    #[must_use]
    pub fn session(&self) -> &AccountSession {
        &self.session
    }

    /// The leased session, mutably.
    pub fn session_mut(&mut self) -> &mut AccountSession {
        &mut self.session
    }
}

impl Deref for AccountLease {
    type Target = AccountSession;

    fn deref(&self) -> &Self::Target {
        &self.session
    }
}

impl DerefMut for AccountLease {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.session
    }
}

/// Hands out accounts whose throttle window has elapsed.
pub struct AuthScheduler {
    pool: Mutex<Pool>,
    changed: Notify,
    lookahead: Duration,
}

impl Default for AuthScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_LOOKAHEAD)
    }
}

impl AuthScheduler {
    /// Create an empty scheduler.
    #[must_use]
    pub fn new(lookahead: Duration) -> Self {
        Self {
            pool: Mutex::new(Pool::default()),
            changed: Notify::new(),
            lookahead,
        }
    }

    /// Add accounts, immediately eligible.
    pub async fn add_accounts(&self, sessions: impl IntoIterator<Item = AccountSession>) {
        let now = Instant::now();
        let mut pool = self.pool.lock().await;
        for session in sessions {
            pool.insert(session, now);
            pool.members += 1;
        }
        drop(pool);
        self.changed.notify_waiters();
    }

    /// Swap the whole membership.
    ///
    /// Leases handed out before the swap are discarded when released.
    pub async fn replace_accounts(&self, sessions: impl IntoIterator<Item = AccountSession>) {
        let now = Instant::now();
        let mut pool = self.pool.lock().await;
        pool.generation += 1;
        pool.heap.clear();
        pool.members = 0;
        for session in sessions {
            pool.insert(session, now);
            pool.members += 1;
        }
        debug!(
            accounts = pool.members,
            generation = pool.generation,
            "Replaced scheduler accounts"
        );
        drop(pool);
        self.changed.notify_waiters();
    }

    /// Wait for the next eligible account and take it out of rotation.
    ///
    /// If the earliest account is further out than the lookahead it is treated
    /// as sidelined: the call re-checks after the lookahead instead of
    /// committing to it, so accounts released or added in the meantime win.
    pub async fn acquire(&self) -> AccountLease {
        loop {
            let mut changed = pin!(self.changed.notified());
            changed.as_mut().enable();

            let wait = {
                let mut pool = self.pool.lock().await;
                let now = Instant::now();
                let head = pool.heap.peek().map(|slot| slot.ready_at);
                match head {
                    Some(ready_at) if ready_at <= now => {
                        if let Some(slot) = pool.heap.pop() {
                            return AccountLease {
                                session: slot.session,
                                generation: pool.generation,
                            };
                        }
                        Duration::ZERO
                    }
                    Some(ready_at) => {
                        let until = ready_at - now;
                        if until > self.lookahead {
                            debug!("Next account is sidelined for {:?}", until);
                            self.lookahead
                        } else {
                            until
                        }
                    }
                    None => self.lookahead,
                }
            };

            tokio::select! {
                () = &mut changed => {}
                () = tokio::time::sleep(wait) => {}
            }
        }
    }

    /// Return a lease, eligible again after `delay`.
    pub async fn release(&self, lease: AccountLease, delay: Duration) {
        let mut pool = self.pool.lock().await;
        if lease.generation != pool.generation {
            debug!(
                username = lease.session.username(),
                "Dropping lease from replaced account set"
            );
            return;
        }
        let ready_at = Instant::now() + delay;
        pool.insert(lease.session, ready_at);
        drop(pool);
        self.changed.notify_waiters();
    }

    /// Accounts currently at rest.
    pub async fn available(&self) -> usize {
        self.pool.lock().await.heap.len()
    }

    /// Accounts in the current membership, leased or not.
    pub async fn len(&self) -> usize {
        self.pool.lock().await.members
    }

    /// Whether the membership is empty.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
