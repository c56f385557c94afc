//! Shared fixtures for unit tests.

use crate::delegate::{InlineExecutor, RecordingDelegate};
use crate::engine::{Collaborators, SyncEngine};
use crate::file_manager::RecordingFileManager;
use crate::memory::MemoryStorage;
use crate::transport::MockTransport;
use crate::SyncConfig;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tideline_protocol::updates::UpdateNewMessage;
use tideline_protocol::{CborEncode, Peer, UpdateEnvelope, UpdateKind, UserMessage};

/// The logged-in user of every harness.
pub(crate) const ME: i64 = 1;

pub(crate) struct Harness {
    pub engine: Arc<SyncEngine>,
    pub transport: Arc<MockTransport>,
    pub storage: Arc<MemoryStorage>,
    pub files: Arc<RecordingFileManager>,
    pub delegate: Arc<RecordingDelegate>,
}

impl Harness {
    /// Prefetches run on background threads; poll until `count` arrived.
    pub fn wait_for_prefetch(&self, count: usize) {
        let deadline = Instant::now() + Duration::from_secs(2);
        while self.files.prefetched().len() < count && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
    }
}

pub(crate) fn harness() -> Harness {
    harness_with(SyncConfig::new())
}

pub(crate) fn harness_with(config: SyncConfig) -> Harness {
    let transport = Arc::new(MockTransport::new());
    let storage = Arc::new(MemoryStorage::new());
    let files = Arc::new(RecordingFileManager::new());
    let delegate = Arc::new(RecordingDelegate::new());
    let engine = SyncEngine::new(
        config,
        Collaborators {
            transport: transport.clone(),
            storage: storage.clone(),
            files: files.clone(),
            delegate: delegate.clone(),
            executor: Arc::new(InlineExecutor),
        },
    );
    engine.set_user_id(ME);
    Harness {
        engine,
        transport,
        storage,
        files,
        delegate,
    }
}

pub(crate) fn envelope<T: CborEncode>(kind: UpdateKind, payload: &T) -> UpdateEnvelope {
    UpdateEnvelope::new(kind, payload, 0, 1_000).unwrap()
}

pub(crate) fn new_message(peer: Peer, id: i64, sender_id: i64) -> UpdateNewMessage {
    UpdateNewMessage {
        message: UserMessage {
            id,
            peer,
            sender_id,
            created_on: 1_000 + id,
            body: format!("message {id}"),
            ..Default::default()
        },
        sender: None,
        access_hash: 0,
    }
}
