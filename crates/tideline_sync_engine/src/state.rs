//! Sync status, outcomes and the delivered-message set.

use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};

/// Synchronization status reported to the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncStatus {
    /// A gap was detected; local state lags the server.
    OutOfSync,
    /// Catch-up is in progress.
    Syncing,
    /// Local state is believed to match the server.
    Synced,
}

/// Result of a [`SyncEngine::sync`](crate::SyncEngine::sync) call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Another sync was already running; nothing was done.
    Busy,
    /// No user is logged in.
    Unauthenticated,
    /// The server had nothing new for us.
    UpToDate,
    /// Local cache was rebuilt from a snapshot.
    Snapshot,
    /// Missing updates were replayed.
    Incremental,
    /// The attempt was aborted; local state was not advanced.
    Failed,
}

/// Message IDs already surfaced to the UI.
///
/// Server echoes of locally sent messages are checked against this set so
/// the UI never sees the same message twice. Entries are never removed.
#[derive(Debug, Default)]
pub struct DeliveredSet {
    ids: Mutex<HashSet<i64>>,
}

impl DeliveredSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `message_id`. Returns false if it was already present.
    pub fn insert(&self, message_id: i64) -> bool {
        self.ids.lock().insert(message_id)
    }

    /// Returns true if `message_id` was delivered.
    pub fn contains(&self, message_id: i64) -> bool {
        self.ids.lock().contains(&message_id)
    }

    /// Number of recorded IDs.
    pub fn len(&self) -> usize {
        self.ids.lock().len()
    }

    /// Returns true if nothing was delivered yet.
    pub fn is_empty(&self) -> bool {
        self.ids.lock().is_empty()
    }
}

/// Non-blocking try-lock over an `AtomicBool`; released on drop.
pub(crate) struct BusyGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> BusyGuard<'a> {
    /// Acquires the flag, or returns `None` if it is already held.
    pub(crate) fn try_acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}
