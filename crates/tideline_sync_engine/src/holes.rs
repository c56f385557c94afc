//! Storage-backed hole manager.
//!
//! Each conversation's [`Timeline`] is loaded from storage before every
//! operation and written back after mutations. Unreadable or corrupt blobs
//! degrade to an empty ("unknown") timeline; reads never fail.

use crate::storage::Storage;
use parking_lot::Mutex;
use std::sync::Arc;
use tideline_protocol::{Bar, Peer, Timeline};
use tracing::{debug, warn};

/// Tracks which message-ID ranges of each conversation are known locally.
pub struct HoleManager {
    storage: Arc<dyn Storage>,
    // serializes load-modify-save cycles
    write_lock: Mutex<()>,
}

impl HoleManager {
    /// Creates a hole manager persisting into `storage`.
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self {
            storage,
            write_lock: Mutex::new(()),
        }
    }

    /// Loads the timeline of `peer`.
    pub fn timeline(&self, peer: Peer) -> Timeline {
        let blob = match self.storage.get_timeline(peer) {
            Ok(Some(blob)) => blob,
            Ok(None) => return Timeline::new(),
            Err(err) => {
                warn!(peer_id = peer.id, error = %err, "failed to read timeline");
                return Timeline::new();
            }
        };
        Timeline::decode(&blob).unwrap_or_else(|err| {
            warn!(peer_id = peer.id, error = %err, "discarding corrupt timeline");
            Timeline::new()
        })
    }

    fn modify<R>(&self, peer: Peer, f: impl FnOnce(&mut Timeline) -> R) -> R {
        let _guard = self.write_lock.lock();
        let mut timeline = self.timeline(peer);
        let result = f(&mut timeline);
        match timeline.encode() {
            Ok(blob) => {
                if let Err(err) = self.storage.save_timeline(peer, &blob) {
                    warn!(peer_id = peer.id, error = %err, "failed to save timeline");
                }
            }
            Err(err) => warn!(peer_id = peer.id, error = %err, "failed to encode timeline"),
        }
        result
    }

    /// Overwrites the bar's range with its kind.
    pub fn paint(&self, peer: Peer, bar: Bar) {
        if bar.is_empty() {
            return;
        }
        debug!(peer_id = peer.id, %bar, "paint");
        self.modify(peer, |timeline| timeline.paint(bar));
    }

    /// Marks `[min, max]` as missing.
    pub fn mark_hole(&self, peer: Peer, min: i64, max: i64) {
        self.paint(peer, Bar::hole(min, max));
    }

    /// Marks `[min, max]` as complete.
    pub fn mark_filled(&self, peer: Peer, min: i64, max: i64) {
        self.paint(peer, Bar::filled(min, max));
    }

    /// Forgets everything known about `peer`.
    pub fn clear(&self, peer: Peer) {
        let _guard = self.write_lock.lock();
        if let Err(err) = self.storage.delete_timeline(peer) {
            warn!(peer_id = peer.id, error = %err, "failed to delete timeline");
        }
    }

    /// Marks `[max_index + 1, message_id]` complete when `message_id` is
    /// beyond the known range.
    pub fn set_upper_filled(&self, peer: Peer, message_id: i64) -> bool {
        self.modify(peer, |timeline| timeline.set_upper_filled(message_id))
    }

    /// Marks everything below the first complete range as complete.
    pub fn set_lower_filled(&self, peer: Peer) {
        self.modify(peer, Timeline::set_lower_filled);
    }

    /// Returns true iff `[min, max]` lies within one complete range.
    pub fn is_range_filled(&self, peer: Peer, min: i64, max: i64) -> bool {
        self.timeline(peer).is_range_filled(min, max)
    }

    /// Returns true unless `point` is known to be complete.
    pub fn is_point_hole(&self, peer: Peer, point: i64) -> bool {
        self.timeline(peer).is_point_hole(point)
    }

    /// Complete range from `point` upwards.
    pub fn upper_filled(&self, peer: Peer, point: i64) -> Option<Bar> {
        self.timeline(peer).upper_filled(point)
    }

    /// Complete range from below up to `point`.
    pub fn lower_filled(&self, peer: Peer, point: i64) -> Option<Bar> {
        self.timeline(peer).lower_filled(point)
    }

    /// Compact description of the timeline, for logs.
    pub fn describe(&self, peer: Peer) -> String {
        self.timeline(peer).to_string()
    }
}
