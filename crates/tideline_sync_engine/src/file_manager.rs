//! File download/upload collaborator.

use crate::error::SyncResult;
use parking_lot::Mutex;
use tideline_protocol::Photo;

/// Chunked file transfers live outside the engine. The engine only asks for
/// best-effort prefetches and drops queued uploads it no longer needs.
pub trait FileManager: Send + Sync {
    /// Starts downloading `photo` owned by `owner_id` (a user, group or
    /// message ID).
    fn prefetch_photo(&self, owner_id: i64, photo: &Photo) -> SyncResult<()>;

    /// Removes the upload queued for a pending message.
    fn remove_from_queue(&self, pending_id: i64);
}

/// A [`FileManager`] that records calls and transfers nothing.
#[derive(Debug, Default)]
pub struct RecordingFileManager {
    prefetched: Mutex<Vec<(i64, i64)>>,
    removed: Mutex<Vec<i64>>,
}

impl RecordingFileManager {
    /// Creates a new recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// `(owner_id, file_id)` pairs passed to `prefetch_photo`.
    pub fn prefetched(&self) -> Vec<(i64, i64)> {
        self.prefetched.lock().clone()
    }

    /// Pending IDs passed to `remove_from_queue`.
    pub fn removed(&self) -> Vec<i64> {
        self.removed.lock().clone()
    }
}

impl FileManager for RecordingFileManager {
    fn prefetch_photo(&self, owner_id: i64, photo: &Photo) -> SyncResult<()> {
        self.prefetched.lock().push((owner_id, photo.file_id));
        Ok(())
    }

    fn remove_from_queue(&self, pending_id: i64) {
        self.removed.lock().push(pending_id);
    }
}
