//! The sync engine.
//!
//! The engine owns the client's position in the server update log
//! (`update_id`) and keeps the local cache consistent with it:
//!
//! - live batches are applied in order; replays are ignored and gaps trigger
//!   a [`SyncEngine::sync`];
//! - `sync` compares local and server positions and either replays the
//!   missing slice ([`SyncEngine::get_difference`]) or, when the gap is too
//!   large, rebuilds the cache from a snapshot of dialogs and contacts;
//! - a watchdog re-syncs when no live update arrived for a while.
//!
//! `sync` and `get_difference` are guarded by non-blocking try-locks: a
//! caller that finds one held skips the work instead of waiting.

use crate::config::SyncConfig;
use crate::delegate::{UiDelegate, UiExecutor};
use crate::error::{SyncError, SyncResult};
use crate::file_manager::FileManager;
use crate::holes::HoleManager;
use crate::state::{BusyGuard, DeliveredSet, SyncOutcome, SyncStatus};
use crate::storage::{Storage, UPDATE_ID_KEY};
use crate::transport::Transport;
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tideline_protocol::rpc::{
    ContactsGet, MessagesDialogs, MessagesGetDialogs, ServerError, UpdateDifference,
    UpdateGetDifference, UpdateGetState, UpdateState,
};
use tideline_protocol::{
    CborDecode, CborEncode, Group, MessageEnvelope, Photo, Request, RequestKind, ResponseKind,
    UpdateContainer, UpdateEnvelope, UpdateKind, User, UPDATE_CONTAINER_TAG,
};
use tracing::{debug, info, warn};

/// External collaborators of a [`SyncEngine`].
pub struct Collaborators {
    /// Network transport.
    pub transport: Arc<dyn Transport>,
    /// Local cache.
    pub storage: Arc<dyn Storage>,
    /// File transfers.
    pub files: Arc<dyn FileManager>,
    /// Receiver of UI callbacks.
    pub delegate: Arc<dyn UiDelegate>,
    /// Executor the UI callbacks run on.
    pub executor: Arc<dyn UiExecutor>,
}

struct Shutdown {
    stopped: Mutex<bool>,
    wake: Condvar,
}

impl Shutdown {
    fn new() -> Self {
        Self {
            stopped: Mutex::new(false),
            wake: Condvar::new(),
        }
    }

    /// Sleeps up to `timeout`. Returns true once stop was requested.
    fn wait(&self, timeout: Duration) -> bool {
        let mut stopped = self.stopped.lock();
        if !*stopped {
            self.wake.wait_for(&mut stopped, timeout);
        }
        *stopped
    }

    fn signal(&self) {
        *self.stopped.lock() = true;
        self.wake.notify_all();
    }

    fn reset(&self) {
        *self.stopped.lock() = false;
    }
}

/// Keeps the local cache in step with the server update log.
pub struct SyncEngine {
    pub(crate) config: SyncConfig,
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) storage: Arc<dyn Storage>,
    pub(crate) files: Arc<dyn FileManager>,
    delegate: Arc<dyn UiDelegate>,
    executor: Arc<dyn UiExecutor>,
    pub(crate) holes: HoleManager,
    pub(crate) delivered: DeliveredSet,
    update_id: AtomicI64,
    user_id: AtomicI64,
    status: Mutex<SyncStatus>,
    last_event_at: Mutex<Instant>,
    sync_lock: AtomicBool,
    diff_lock: AtomicBool,
    // held while a batch is applied and `update_id` advanced
    apply_lock: Mutex<()>,
    request_seq: AtomicI64,
    shutdown: Arc<Shutdown>,
    watchdog: Mutex<Option<JoinHandle<()>>>,
    me: Weak<SyncEngine>,
}

impl SyncEngine {
    /// Creates a new engine. Call [`SyncEngine::start`] to load persisted
    /// state and begin background work.
    pub fn new(config: SyncConfig, collaborators: Collaborators) -> Arc<Self> {
        let Collaborators {
            transport,
            storage,
            files,
            delegate,
            executor,
        } = collaborators;
        Arc::new_cyclic(|me| Self {
            config,
            transport,
            holes: HoleManager::new(Arc::clone(&storage)),
            storage,
            files,
            delegate,
            executor,
            delivered: DeliveredSet::new(),
            update_id: AtomicI64::new(0),
            user_id: AtomicI64::new(0),
            status: Mutex::new(SyncStatus::Synced),
            last_event_at: Mutex::new(Instant::now()),
            sync_lock: AtomicBool::new(false),
            diff_lock: AtomicBool::new(false),
            apply_lock: Mutex::new(()),
            request_seq: AtomicI64::new(0),
            shutdown: Arc::new(Shutdown::new()),
            watchdog: Mutex::new(None),
            me: me.clone(),
        })
    }

    /// Returns the configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Returns the hole manager, for history-fetch decisions.
    pub fn holes(&self) -> &HoleManager {
        &self.holes
    }

    /// Loads the persisted update ID and spawns the watchdog and an initial
    /// sync.
    pub fn start(&self) -> SyncResult<()> {
        self.load_update_id()?;
        info!(update_id = self.update_id(), "sync engine started");

        self.shutdown.reset();
        self.spawn_watchdog();
        self.spawn_sync();
        Ok(())
    }

    /// Loads the persisted update ID, initializing it to 0 when absent.
    pub fn load_update_id(&self) -> SyncResult<i64> {
        match self.storage.get_int(UPDATE_ID_KEY)? {
            Some(id) if id < 0 => {
                return Err(SyncError::CorruptState(format!(
                    "persisted update id {id} is negative"
                )));
            }
            Some(id) => {
                self.update_id.fetch_max(id, Ordering::SeqCst);
            }
            None => self.storage.save_int(UPDATE_ID_KEY, 0)?,
        }
        Ok(self.update_id())
    }

    /// Stops the watchdog. In-flight requests finish on their own timeouts.
    pub fn stop(&self) {
        self.shutdown.signal();
        let handle = self.watchdog.lock().take();
        if let Some(handle) = handle {
            if handle.thread().id() != thread::current().id() {
                let _ = handle.join();
            }
        }
        info!("sync engine stopped");
    }

    /// Sets the logged-in user, 0 for none.
    pub fn set_user_id(&self, user_id: i64) {
        self.user_id.store(user_id, Ordering::SeqCst);
    }

    /// Returns the logged-in user, 0 for none.
    pub fn user_id(&self) -> i64 {
        self.user_id.load(Ordering::SeqCst)
    }

    /// Returns the last applied update ID.
    pub fn update_id(&self) -> i64 {
        self.update_id.load(Ordering::SeqCst)
    }

    /// Returns the current status.
    pub fn status(&self) -> SyncStatus {
        *self.status.lock()
    }

    /// Resets the update ID to 0, forcing a snapshot on the next sync.
    ///
    /// Used on logout.
    pub fn clear_update_id(&self) {
        self.update_id.store(0, Ordering::SeqCst);
        self.persist_update_id();
    }

    /// Queues a durable contact list refresh.
    pub fn contact_import(&self) -> SyncResult<()> {
        let request = Request::new(self.next_request_id(), RequestKind::ContactsGet, &ContactsGet {})?;
        self.transport.enqueue(request)
    }

    /// Returns true if `message_id` was already surfaced to the UI.
    pub fn is_delivered(&self, message_id: i64) -> bool {
        self.delivered.contains(message_id)
    }

    /// Brings local state up to the server's update ID.
    ///
    /// Returns [`SyncOutcome::Busy`] immediately if another sync is running.
    /// Blocks until the transport is connected.
    pub fn sync(&self) -> SyncOutcome {
        let Some(_guard) = BusyGuard::try_acquire(&self.sync_lock) else {
            debug!("sync already running, skipping");
            return SyncOutcome::Busy;
        };
        if self.user_id() == 0 {
            debug!("no user, skipping sync");
            return SyncOutcome::Unauthenticated;
        }

        self.transport.wait_for_connection();
        self.set_status(SyncStatus::Syncing);

        let outcome = self.run_sync().unwrap_or_else(|err| {
            warn!(error = %err, "sync aborted");
            SyncOutcome::Failed
        });

        self.set_status(match outcome {
            SyncOutcome::Failed => SyncStatus::OutOfSync,
            _ => SyncStatus::Synced,
        });
        outcome
    }

    fn run_sync(&self) -> SyncResult<SyncOutcome> {
        let server_id = self.fetch_server_update_id()?;
        let local = self.update_id();
        if server_id == local {
            return Ok(SyncOutcome::UpToDate);
        }

        if local == 0 || server_id - local > self.config.snapshot_threshold {
            info!(local, server_id, "rebuilding local cache from snapshot");
            self.snapshot(server_id)?;
            return Ok(SyncOutcome::Snapshot);
        }

        if server_id > local + 1 {
            info!(local, server_id, "replaying missing updates");
            self.get_difference(server_id)?;
            return Ok(SyncOutcome::Incremental);
        }

        Ok(SyncOutcome::UpToDate)
    }

    fn fetch_server_update_id(&self) -> SyncResult<i64> {
        let response = self.request(RequestKind::UpdateGetState, &UpdateGetState {})?;
        let state: UpdateState = expect_response(&response, ResponseKind::UpdateState)?;
        Ok(state.update_id)
    }

    fn snapshot(&self, server_id: i64) -> SyncResult<()> {
        self.storage.drop_all()?;

        match self.request(RequestKind::ContactsGet, &ContactsGet {}) {
            Ok(response) => {
                if let Err(err) = self.apply_response(&response) {
                    warn!(error = %err, "failed to store contacts");
                }
            }
            Err(err) => warn!(error = %err, "failed to fetch contacts"),
        }

        // persisted once every dialog page is stored
        self.update_id.fetch_max(server_id, Ordering::SeqCst);

        let limit = self.config.dialog_page_size;
        let mut offset = 0;
        loop {
            let response = self.request(
                RequestKind::MessagesGetDialogs,
                &MessagesGetDialogs { offset, limit },
            )?;
            let page: MessagesDialogs = expect_response(&response, ResponseKind::MessagesDialogs)?;
            for dialog in self.store_dialog_page(&page)? {
                let top = dialog.top_message_id;
                self.holes.mark_hole(dialog.peer, 0, top - 1);
                self.holes.mark_filled(dialog.peer, top, top);
            }
            debug!(offset, count = page.count, "stored dialog page");

            if page.dialogs.is_empty() || page.count <= offset + limit {
                break;
            }
            offset += limit;
        }

        self.persist_update_id();
        Ok(())
    }

    /// Replays updates from `update_id + 1` up to `server_id`.
    ///
    /// Skips if another difference loop is running. Stops early when the
    /// server makes no progress for `max_idle_difference_rounds` rounds.
    pub fn get_difference(&self, server_id: i64) -> SyncResult<()> {
        let Some(_guard) = BusyGuard::try_acquire(&self.diff_lock) else {
            debug!("difference already running, skipping");
            return Ok(());
        };

        let batch = i64::from(self.config.difference_batch_size.max(1));
        let mut idle_rounds = 0;
        loop {
            let local = self.update_id();
            if local >= server_id {
                return Ok(());
            }

            let limit = batch.min(server_id - local) as i32;
            let response = self.request(
                RequestKind::UpdateGetDifference,
                &UpdateGetDifference {
                    from: local + 1,
                    limit,
                },
            )?;
            let difference: UpdateDifference =
                expect_response(&response, ResponseKind::UpdateDifference)?;

            if difference.updates.is_empty() || difference.max_update_id <= local {
                idle_rounds += 1;
                if idle_rounds >= self.config.max_idle_difference_rounds {
                    warn!(local, server_id, "server made no progress, giving up");
                    return Ok(());
                }
                continue;
            }
            idle_rounds = 0;

            let _apply = self.apply_lock.lock();
            let local = self.update_id();
            let fresh: Vec<UpdateEnvelope> = difference
                .updates
                .into_iter()
                .filter(|update| update.update_id == 0 || update.update_id > local)
                .collect();

            self.save_users_and_groups(&difference.users, &difference.groups);
            let mut outgoing =
                UpdateContainer::new(difference.min_update_id, difference.max_update_id);
            outgoing.updates = self.apply_updates(&fresh);
            outgoing.users = difference.users;
            outgoing.groups = difference.groups;

            self.advance_update_id(difference.max_update_id);
            debug!(
                min = outgoing.min_update_id,
                max = outgoing.max_update_id,
                count = outgoing.len(),
                "applied difference"
            );
            self.forward(outgoing);
        }
    }

    /// Applies a batch of live updates pushed by the server.
    ///
    /// Returns false if the batch was skipped, either as a replay or because
    /// it revealed a gap (which triggers a synchronous sync).
    pub fn handle_live_batch(&self, batch: UpdateContainer) -> bool {
        *self.last_event_at.lock() = Instant::now();

        // the running sync replays whatever this batch carries
        if self.sync_lock.load(Ordering::SeqCst) || self.diff_lock.load(Ordering::SeqCst) {
            debug!(min = batch.min_update_id, "sync in progress, dropping live batch");
            return false;
        }

        let apply = self.apply_lock.lock();
        let local = self.update_id();
        if batch.min_update_id != 0 && local >= batch.min_update_id {
            debug!(local, min = batch.min_update_id, "batch already applied");
            return false;
        }
        if local < batch.min_update_id - 1 {
            drop(apply);
            warn!(local, min = batch.min_update_id, "gap detected");
            self.set_status(SyncStatus::OutOfSync);
            self.sync();
            return false;
        }

        self.prefetch_stale_photos(&batch.users, &batch.groups);
        self.save_users_and_groups(&batch.users, &batch.groups);

        let UpdateContainer {
            updates,
            min_update_id,
            max_update_id,
            users,
            groups,
        } = batch;
        let mut outgoing = UpdateContainer::new(min_update_id, max_update_id);
        outgoing.updates = self.apply_updates(&updates);
        outgoing.users = users;
        outgoing.groups = groups;

        self.advance_update_id(max_update_id);
        self.forward(outgoing);
        true
    }

    /// Applies server responses in order.
    pub fn handle_messages(&self, responses: &[MessageEnvelope]) {
        for response in responses {
            if let Err(err) = self.apply_response(response) {
                warn!(
                    tag = response.type_tag,
                    request_id = response.request_id,
                    error = %err,
                    "failed to apply response"
                );
            }
        }
    }

    // ---- helpers shared with appliers ----

    pub(crate) fn next_request_id(&self) -> i64 {
        self.request_seq.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn request<T: CborEncode>(&self, kind: RequestKind, payload: &T) -> SyncResult<MessageEnvelope> {
        let request = Request::new(self.next_request_id(), kind, payload)?;
        self.transport
            .send_realtime(request, self.config.request_timeout)
    }

    pub(crate) fn advance_update_id(&self, update_id: i64) {
        let previous = self.update_id.fetch_max(update_id, Ordering::SeqCst);
        if update_id > previous {
            self.persist_update_id();
        }
    }

    fn persist_update_id(&self) {
        let update_id = self.update_id();
        if let Err(err) = self.storage.save_int(UPDATE_ID_KEY, update_id) {
            warn!(update_id, error = %err, "failed to persist update id");
        }
    }

    fn set_status(&self, status: SyncStatus) {
        {
            let mut current = self.status.lock();
            if *current == status {
                return;
            }
            debug!(from = ?*current, to = ?status, "sync status changed");
            *current = status;
        }
        let delegate = Arc::clone(&self.delegate);
        self.executor
            .execute(Box::new(move || delegate.on_sync_status_changed(status)));
    }

    /// Sends a container to the UI.
    pub(crate) fn forward(&self, container: UpdateContainer) {
        if container.is_empty() {
            return;
        }
        match container.encode_cbor() {
            Ok(bytes) => {
                let delegate = Arc::clone(&self.delegate);
                self.executor
                    .execute(Box::new(move || delegate.on_update(UPDATE_CONTAINER_TAG, bytes)));
            }
            Err(err) => warn!(error = %err, "failed to encode update container"),
        }
    }

    /// Sends a single client-side update to the UI.
    pub(crate) fn notify<T: CborEncode>(&self, kind: UpdateKind, payload: &T) {
        match payload.encode_cbor() {
            Ok(bytes) => {
                let delegate = Arc::clone(&self.delegate);
                let tag = kind.tag();
                self.executor
                    .execute(Box::new(move || delegate.on_update(tag, bytes)));
            }
            Err(err) => warn!(?kind, error = %err, "failed to encode update"),
        }
    }

    pub(crate) fn save_users_and_groups(&self, users: &[User], groups: &[Group]) {
        if !users.is_empty() {
            if let Err(err) = self.storage.save_users(users) {
                warn!(error = %err, "failed to save users");
            }
        }
        if !groups.is_empty() {
            if let Err(err) = self.storage.save_groups(groups) {
                warn!(error = %err, "failed to save groups");
            }
        }
    }

    fn prefetch_stale_photos(&self, users: &[User], groups: &[Group]) {
        let known_user_photo = |id| {
            self.storage
                .get_user(id)
                .ok()
                .flatten()
                .and_then(|user| user.photo)
        };
        let known_group_photo = |id| {
            self.storage
                .get_group(id)
                .ok()
                .flatten()
                .and_then(|group| group.photo)
        };

        let mut stale: Vec<(i64, Photo)> = Vec::new();
        for user in users {
            if let Some(photo) = &user.photo {
                if known_user_photo(user.id).as_ref() != Some(photo) {
                    stale.push((user.id, photo.clone()));
                }
            }
        }
        for group in groups {
            if let Some(photo) = &group.photo {
                if known_group_photo(group.id).as_ref() != Some(photo) {
                    stale.push((group.id, photo.clone()));
                }
            }
        }
        self.prefetch_in_background(stale);
    }

    pub(crate) fn prefetch_in_background(&self, photos: Vec<(i64, Photo)>) {
        if photos.is_empty() {
            return;
        }
        let files = Arc::clone(&self.files);
        let spawned = thread::Builder::new()
            .name("tideline-prefetch".into())
            .spawn(move || {
                for (owner_id, photo) in photos {
                    if let Err(err) = files.prefetch_photo(owner_id, &photo) {
                        debug!(owner_id, error = %err, "photo prefetch failed");
                    }
                }
            });
        if let Err(err) = spawned {
            warn!(error = %err, "failed to spawn prefetch thread");
        }
    }

    /// Runs [`SyncEngine::sync`] on a background thread.
    pub(crate) fn spawn_sync(&self) {
        let me = self.me.clone();
        let spawned = thread::Builder::new()
            .name("tideline-sync".into())
            .spawn(move || {
                if let Some(engine) = me.upgrade() {
                    engine.sync();
                }
            });
        if let Err(err) = spawned {
            warn!(error = %err, "failed to spawn sync thread");
        }
    }

    fn spawn_watchdog(&self) {
        let mut slot = self.watchdog.lock();
        if slot.is_some() {
            return;
        }
        let me = self.me.clone();
        let shutdown = Arc::clone(&self.shutdown);
        let interval = self.config.watchdog_interval;
        let spawned = thread::Builder::new()
            .name("tideline-watchdog".into())
            .spawn(move || loop {
                if shutdown.wait(interval) {
                    return;
                }
                match me.upgrade() {
                    Some(engine) => engine.watchdog_tick(),
                    None => return,
                }
            });
        match spawned {
            Ok(handle) => *slot = Some(handle),
            Err(err) => warn!(error = %err, "failed to spawn watchdog thread"),
        }
    }

    fn watchdog_tick(&self) {
        if !self.transport.is_connected() {
            debug!("watchdog: not connected");
            return;
        }
        let idle = self.last_event_at.lock().elapsed();
        if idle >= self.config.watchdog_interval {
            debug!(?idle, "watchdog: no live updates, syncing");
            self.sync();
        }
    }
}

impl Drop for SyncEngine {
    fn drop(&mut self) {
        self.shutdown.signal();
    }
}

/// Decodes `response` as `kind`, mapping server errors and unexpected
/// constructors to [`SyncError`].
pub(crate) fn expect_response<T: CborDecode>(
    response: &MessageEnvelope,
    kind: ResponseKind,
) -> SyncResult<T> {
    match response.kind() {
        Some(actual) if actual == kind => Ok(response.decode()?),
        Some(ResponseKind::Error) => {
            let error: ServerError = response.decode()?;
            Err(SyncError::Server {
                code: error.code,
                items: error.items,
            })
        }
        _ => Err(SyncError::UnexpectedResponse(response.type_tag)),
    }
}
