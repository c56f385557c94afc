//! # Tideline Sync Engine
//!
//! Client-side synchronization engine for Tideline messaging clients.
//!
//! This crate provides:
//! - Sync state machine (out of sync → syncing → synced)
//! - Gap detection on live update batches
//! - Incremental catch-up and snapshot rebuilds
//! - Update and response appliers for the local cache
//! - A storage-backed hole manager for history backfill
//! - Transport, storage, file and UI abstractions with in-memory implementations
//!
//! ## Architecture
//!
//! The server keeps an ordered update log. The engine tracks the last
//! applied position (`update_id`) and, for every incoming batch:
//! 1. Ignores batches it already applied
//! 2. Triggers a sync when a batch reveals a gap
//! 3. Otherwise applies the batch and forwards the result to the UI
//!
//! ## Key Invariants
//!
//! - `update_id` never decreases (except an explicit reset on logout)
//! - Replayed batches mutate nothing
//! - At most one sync and one difference loop run at a time
//! - A delivered message is never surfaced twice

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod appliers;
mod config;
mod delegate;
mod engine;
mod error;
mod file_manager;
mod holes;
mod memory;
mod state;
mod storage;
mod transport;

#[cfg(test)]
mod test_support;

pub use config::SyncConfig;
pub use delegate::{InlineExecutor, Job, RecordingDelegate, SerialExecutor, UiDelegate, UiExecutor};
pub use engine::{Collaborators, SyncEngine};
pub use error::{SyncError, SyncResult};
pub use file_manager::{FileManager, RecordingFileManager};
pub use holes::HoleManager;
pub use memory::MemoryStorage;
pub use state::{DeliveredSet, SyncOutcome, SyncStatus};
pub use storage::{Storage, UPDATE_ID_KEY};
pub use transport::{MockTransport, Transport};
