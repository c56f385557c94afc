//! Integration tests for the sync engine against a scripted server.

use parking_lot::Mutex;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tideline_protocol::rpc::{
    ContactsMany, MessagesDialogs, MessagesGetDialogs, MessagesSent, UpdateDifference,
    UpdateGetDifference, UpdateState,
};
use tideline_protocol::updates::{UpdateMessageId, UpdateNewMessage};
use tideline_protocol::{
    CborDecode, Dialog, MessageEnvelope, PendingMessage, Peer, Request, RequestKind,
    ResponseKind, UpdateContainer, UpdateEnvelope, UpdateKind, User, UserMessage,
    UPDATE_CONTAINER_TAG,
};
use tideline_sync_engine::{
    Collaborators, MemoryStorage, RecordingDelegate, RecordingFileManager, SerialExecutor,
    Storage, SyncConfig, SyncEngine, SyncError, SyncOutcome, SyncResult, SyncStatus, Transport,
    UPDATE_ID_KEY,
};
use tracing_subscriber::EnvFilter;

const ME: i64 = 1;

#[derive(Default)]
struct ServerState {
    log: Vec<UpdateEnvelope>,
    head: i64,
    dialogs: Vec<(Dialog, UserMessage)>,
    contacts: Vec<User>,
    requests: Vec<RequestKind>,
}

type Hook = Box<dyn FnOnce() + Send>;

/// A transport answering from an in-process update log.
#[derive(Default)]
struct ScriptedServer {
    state: Mutex<ServerState>,
    on_difference: Mutex<Option<Hook>>,
}

impl ScriptedServer {
    fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Appends a new message to the log and returns its update ID.
    fn post_message(&self, peer: Peer, message_id: i64) -> i64 {
        let mut state = self.state.lock();
        state.head += 1;
        let update_id = state.head;
        let payload = UpdateNewMessage {
            message: UserMessage {
                id: message_id,
                peer,
                sender_id: peer.id,
                created_on: 1_000 + message_id,
                body: format!("hello {message_id}"),
                ..Default::default()
            },
            sender: None,
            access_hash: 0,
        };
        let update =
            UpdateEnvelope::new(UpdateKind::NewMessage, &payload, update_id, 1_000).unwrap();
        state.log.push(update);
        update_id
    }

    /// Moves the head without keeping the log, as after compaction.
    fn set_head(&self, head: i64) {
        self.state.lock().head = head;
    }

    fn add_dialog(&self, peer: Peer, top_message_id: i64) {
        let message = UserMessage {
            id: top_message_id,
            peer,
            sender_id: peer.id,
            ..Default::default()
        };
        self.state
            .lock()
            .dialogs
            .push((Dialog::new(peer, top_message_id), message));
    }

    fn add_contact(&self, id: i64) {
        self.state.lock().contacts.push(User {
            id,
            first_name: format!("contact{id}"),
            ..Default::default()
        });
    }

    /// The live batch the server would push for `[min, max]`.
    fn batch(&self, min: i64, max: i64) -> UpdateContainer {
        let mut container = UpdateContainer::new(min, max);
        container.updates = self.updates_between(min, max);
        container
    }

    fn updates_between(&self, min: i64, max: i64) -> Vec<UpdateEnvelope> {
        self.state
            .lock()
            .log
            .iter()
            .filter(|u| u.update_id >= min && u.update_id <= max)
            .cloned()
            .collect()
    }

    /// Runs `hook` once, while the next difference request is in flight.
    fn during_next_difference(&self, hook: impl FnOnce() + Send + 'static) {
        *self.on_difference.lock() = Some(Box::new(hook));
    }

    fn requests(&self) -> Vec<RequestKind> {
        self.state.lock().requests.clone()
    }

    fn count(&self, kind: RequestKind) -> usize {
        self.requests().into_iter().filter(|k| *k == kind).count()
    }

    fn respond(&self, request: &Request) -> SyncResult<MessageEnvelope> {
        let id = request.request_id;
        let response = match request.kind {
            RequestKind::UpdateGetState => {
                let update_id = self.state.lock().head;
                MessageEnvelope::new(ResponseKind::UpdateState, id, &UpdateState { update_id })?
            }
            RequestKind::UpdateGetDifference => {
                let asked: UpdateGetDifference = request.decode()?;
                let max = asked.from + i64::from(asked.limit) - 1;
                let updates = self.updates_between(asked.from, max);
                let difference = UpdateDifference {
                    min_update_id: updates.first().map_or(0, |u| u.update_id),
                    max_update_id: updates.last().map_or(0, |u| u.update_id),
                    updates,
                    users: vec![],
                    groups: vec![],
                };
                MessageEnvelope::new(ResponseKind::UpdateDifference, id, &difference)?
            }
            RequestKind::MessagesGetDialogs => {
                let asked: MessagesGetDialogs = request.decode()?;
                let state = self.state.lock();
                let page: Vec<_> = state
                    .dialogs
                    .iter()
                    .skip(asked.offset as usize)
                    .take(asked.limit as usize)
                    .cloned()
                    .collect();
                let dialogs = MessagesDialogs {
                    dialogs: page.iter().map(|(d, _)| d.clone()).collect(),
                    messages: page.into_iter().map(|(_, m)| m).collect(),
                    users: vec![],
                    groups: vec![],
                    count: state.dialogs.len() as i32,
                };
                MessageEnvelope::new(ResponseKind::MessagesDialogs, id, &dialogs)?
            }
            RequestKind::ContactsGet => {
                let users = self.state.lock().contacts.clone();
                MessageEnvelope::new(ResponseKind::ContactsMany, id, &ContactsMany { users })?
            }
            _ => return Err(SyncError::Timeout),
        };
        Ok(response)
    }
}

impl Transport for ScriptedServer {
    fn send_realtime(&self, request: Request, _timeout: Duration) -> SyncResult<MessageEnvelope> {
        self.state.lock().requests.push(request.kind);
        if request.kind == RequestKind::UpdateGetDifference {
            let hook = self.on_difference.lock().take();
            if let Some(hook) = hook {
                hook();
            }
        }
        self.respond(&request)
    }

    fn enqueue(&self, request: Request) -> SyncResult<()> {
        self.state.lock().requests.push(request.kind);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        true
    }

    fn wait_for_connection(&self) {}
}

struct Client {
    engine: Arc<SyncEngine>,
    storage: Arc<MemoryStorage>,
    delegate: Arc<RecordingDelegate>,
    executor: Arc<SerialExecutor>,
}

impl Client {
    fn containers(&self) -> Vec<UpdateContainer> {
        self.executor.flush();
        self.delegate
            .updates()
            .into_iter()
            .filter(|(tag, _)| *tag == UPDATE_CONTAINER_TAG)
            .map(|(_, bytes)| UpdateContainer::decode_cbor(&bytes).unwrap())
            .collect()
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn client(server: &Arc<ScriptedServer>, storage: Arc<MemoryStorage>, config: SyncConfig) -> Client {
    init_tracing();
    let delegate = Arc::new(RecordingDelegate::new());
    let executor = Arc::new(SerialExecutor::new());
    let engine = SyncEngine::new(
        config,
        Collaborators {
            transport: server.clone(),
            storage: storage.clone(),
            files: Arc::new(RecordingFileManager::new()),
            delegate: delegate.clone(),
            executor: executor.clone(),
        },
    );
    engine.set_user_id(ME);
    Client {
        engine,
        storage,
        delegate,
        executor,
    }
}

fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(3);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    condition()
}

#[test]
fn gap_in_live_stream_replays_missing_updates() {
    let server = ScriptedServer::new();
    let peer = Peer::user(7);
    for id in 1..=210 {
        server.post_message(peer, id);
    }
    let storage = Arc::new(MemoryStorage::new());
    storage.save_int(UPDATE_ID_KEY, 150).unwrap();
    let client = client(&server, storage, SyncConfig::new());
    assert_eq!(client.engine.load_update_id().unwrap(), 150);

    // update 200 arrives while 151..199 are missing
    assert!(!client.engine.handle_live_batch(server.batch(200, 200)));

    assert_eq!(client.engine.update_id(), 210);
    assert_eq!(client.storage.get_int(UPDATE_ID_KEY).unwrap(), Some(210));
    assert_eq!(client.storage.messages(peer).len(), 60);
    assert_eq!(
        server.requests(),
        vec![RequestKind::UpdateGetState, RequestKind::UpdateGetDifference]
    );

    let containers = client.containers();
    assert_eq!(containers.len(), 1);
    assert_eq!(containers[0].min_update_id, 151);
    assert_eq!(containers[0].max_update_id, 210);
    assert_eq!(containers[0].len(), 60);

    // the conversation is known from 151 upwards only
    assert!(client.engine.holes().is_range_filled(peer, 151, 210));
    assert!(client.engine.holes().is_point_hole(peer, 150));
}

#[test]
fn difference_is_fetched_in_batches() {
    let server = ScriptedServer::new();
    let peer = Peer::group(4);
    for id in 1..=25 {
        server.post_message(peer, id);
    }
    let storage = Arc::new(MemoryStorage::new());
    storage.save_int(UPDATE_ID_KEY, 1).unwrap();
    let client = client(
        &server,
        storage,
        SyncConfig::new().with_difference_batch_size(10),
    );
    client.engine.load_update_id().unwrap();

    assert_eq!(client.engine.sync(), SyncOutcome::Incremental);
    assert_eq!(client.engine.update_id(), 25);
    assert_eq!(server.count(RequestKind::UpdateGetDifference), 3);

    let maxima: Vec<i64> = client
        .containers()
        .iter()
        .map(|c| c.max_update_id)
        .collect();
    assert_eq!(maxima, vec![11, 21, 25]);
}

#[test]
fn live_batch_during_difference_is_applied_once() {
    let server = ScriptedServer::new();
    let peer = Peer::user(6);
    for id in 1..=102 {
        server.post_message(peer, id);
    }
    let storage = Arc::new(MemoryStorage::new());
    storage.save_int(UPDATE_ID_KEY, 100).unwrap();
    let client = client(&server, storage, SyncConfig::new());
    client.engine.load_update_id().unwrap();

    let applied = Arc::new(Mutex::new(None));
    let engine = Arc::downgrade(&client.engine);
    let live = server.batch(101, 101);
    let seen = Arc::clone(&applied);
    server.during_next_difference(move || {
        if let Some(engine) = engine.upgrade() {
            *seen.lock() = Some(engine.handle_live_batch(live));
        }
    });

    assert_eq!(client.engine.sync(), SyncOutcome::Incremental);
    assert_eq!(*applied.lock(), Some(false));
    assert_eq!(client.engine.update_id(), 102);

    let forwarded_101 = client
        .containers()
        .iter()
        .flat_map(|c| c.updates.iter())
        .filter(|u| u.update_id == 101)
        .count();
    assert_eq!(forwarded_101, 1);
    assert_eq!(client.storage.messages(peer).len(), 2);
}

#[test]
fn echo_and_id_assignment_in_one_batch() {
    let server = ScriptedServer::new();
    let peer = Peer::user(8);
    let client = client(&server, Arc::new(MemoryStorage::new()), SyncConfig::new());
    client
        .storage
        .save_pending(&PendingMessage {
            id: -2,
            request_id: 31,
            peer,
            sender_id: ME,
            created_on: 100,
            body: "hi".into(),
            reply_to: 0,
            entities: vec![],
            media: None,
        })
        .unwrap();

    // the echo is logged before the ID assignment
    let echo = server.post_message(peer, 11);
    let assigned = UpdateEnvelope::new(
        UpdateKind::MessageId,
        &UpdateMessageId {
            message_id: 11,
            random_id: 31,
        },
        echo + 1,
        1_000,
    )
    .unwrap();
    let mut batch = server.batch(echo, echo);
    batch.updates.push(assigned);
    batch.max_update_id = echo + 1;

    assert!(client.engine.handle_live_batch(batch));

    let new_messages = client
        .containers()
        .iter()
        .flat_map(|c| c.updates.iter())
        .filter(|u| u.kind() == Some(UpdateKind::NewMessage))
        .count();
    assert_eq!(new_messages, 0);
    assert!(client.engine.is_delivered(11));
    assert!(client.storage.get_pending_by_request_id(31).unwrap().is_none());
}

#[test]
fn replayed_batch_is_idempotent() {
    let server = ScriptedServer::new();
    let peer = Peer::user(3);
    for id in 1..=5 {
        server.post_message(peer, id);
    }
    let client = client(&server, Arc::new(MemoryStorage::new()), SyncConfig::new());

    assert!(client.engine.handle_live_batch(server.batch(1, 5)));
    let messages = client.storage.messages(peer);
    let dialog = client.storage.get_dialog(peer).unwrap();
    let forwarded = client.containers().len();

    assert!(!client.engine.handle_live_batch(server.batch(1, 5)));
    assert!(!client.engine.handle_live_batch(server.batch(3, 5)));

    assert_eq!(client.engine.update_id(), 5);
    assert_eq!(client.storage.messages(peer), messages);
    assert_eq!(client.storage.get_dialog(peer).unwrap(), dialog);
    assert_eq!(client.containers().len(), forwarded);
    assert!(server.requests().is_empty());
}

#[test]
fn live_batches_reach_ui_in_order() {
    let server = ScriptedServer::new();
    for id in 1..=20 {
        server.post_message(Peer::user(id % 3 + 2), id);
    }
    let client = client(&server, Arc::new(MemoryStorage::new()), SyncConfig::new());

    for id in 1..=20 {
        assert!(client.engine.handle_live_batch(server.batch(id, id)));
    }

    let maxima: Vec<i64> = client
        .containers()
        .iter()
        .map(|c| c.max_update_id)
        .collect();
    assert_eq!(maxima, (1..=20).collect::<Vec<_>>());
}

#[test]
fn large_gap_rebuilds_from_snapshot() {
    let server = ScriptedServer::new();
    server.set_head(50_000);
    server.add_dialog(Peer::user(10), 300);
    server.add_dialog(Peer::user(11), 12);
    server.add_dialog(Peer::group(5), 7);
    server.add_contact(10);
    server.add_contact(11);

    let client = client(
        &server,
        Arc::new(MemoryStorage::new()),
        SyncConfig::new().with_dialog_page_size(2),
    );
    client.engine.load_update_id().unwrap();

    assert_eq!(client.engine.sync(), SyncOutcome::Snapshot);
    assert_eq!(client.engine.update_id(), 50_000);
    assert_eq!(server.count(RequestKind::MessagesGetDialogs), 2);
    assert_eq!(client.storage.dialogs().len(), 3);
    assert!(client.storage.is_contact(10));
    assert!(client.storage.is_contact(11));
    assert_eq!(
        client.engine.holes().describe(Peer::user(10)),
        "[H: 0 - 299][F: 300 - 300]"
    );
    assert_eq!(client.engine.status(), SyncStatus::Synced);

    client.executor.flush();
    assert_eq!(
        client.delegate.statuses(),
        vec![SyncStatus::Syncing, SyncStatus::Synced]
    );
}

#[test]
fn gap_beyond_threshold_uses_snapshot() {
    let server = ScriptedServer::new();
    server.set_head(500);
    server.add_dialog(Peer::user(9), 1);
    let storage = Arc::new(MemoryStorage::new());
    storage.save_int(UPDATE_ID_KEY, 100).unwrap();
    let client = client(
        &server,
        storage,
        SyncConfig::new().with_snapshot_threshold(300),
    );
    client.engine.load_update_id().unwrap();

    assert_eq!(client.engine.sync(), SyncOutcome::Snapshot);
    assert_eq!(client.engine.update_id(), 500);
    assert_eq!(server.count(RequestKind::UpdateGetDifference), 0);
}

#[test]
fn delivered_message_echo_is_not_forwarded() {
    let server = ScriptedServer::new();
    let peer = Peer::user(8);
    let client = client(&server, Arc::new(MemoryStorage::new()), SyncConfig::new());
    client
        .storage
        .save_pending(&PendingMessage {
            id: -1,
            request_id: 9,
            peer,
            sender_id: ME,
            created_on: 100,
            body: "hi".into(),
            reply_to: 0,
            entities: vec![],
            media: None,
        })
        .unwrap();

    let sent = MessageEnvelope::new(
        ResponseKind::MessagesSent,
        9,
        &MessagesSent {
            message_id: 6,
            random_id: 9,
            created_on: 101,
        },
    )
    .unwrap();
    client.engine.handle_messages(&[sent]);
    assert!(client.engine.is_delivered(6));

    // the server echoes the sent message back through the update stream
    let update_id = server.post_message(peer, 6);
    assert!(client
        .engine
        .handle_live_batch(server.batch(update_id, update_id)));

    assert_eq!(client.engine.update_id(), update_id);
    assert!(client.containers().is_empty());
    let tags: Vec<i64> = client.delegate.updates().iter().map(|(t, _)| *t).collect();
    assert_eq!(tags, vec![UpdateKind::ClientPendingMessageDelivery.tag()]);
    assert!(client.storage.get_message(peer, 6).unwrap().is_some());
}

#[test]
fn update_id_survives_restart() {
    let server = ScriptedServer::new();
    for id in 1..=3 {
        server.post_message(Peer::user(2), id);
    }
    let storage = Arc::new(MemoryStorage::new());
    {
        let client = client(&server, storage.clone(), SyncConfig::new());
        client.engine.load_update_id().unwrap();
        assert!(client.engine.handle_live_batch(server.batch(1, 3)));
    }

    let client = client(&server, storage, SyncConfig::new());
    assert_eq!(client.engine.load_update_id().unwrap(), 3);
}

#[test]
fn watchdog_resyncs_idle_client() {
    let server = ScriptedServer::new();
    let config = SyncConfig::new().with_watchdog_interval(Duration::from_millis(50));
    let client = client(&server, Arc::new(MemoryStorage::new()), config);

    client.engine.start().unwrap();
    assert!(wait_until(|| server.count(RequestKind::UpdateGetState) >= 1));

    // no live update announces these
    for id in 1..=3 {
        server.post_message(Peer::user(5), id);
    }
    assert!(wait_until(|| client.engine.update_id() == 3));
    assert!(server.count(RequestKind::UpdateGetState) >= 2);

    client.engine.stop();
    let requests = server.requests().len();
    thread::sleep(Duration::from_millis(200));
    assert_eq!(server.requests().len(), requests);
}

#[test]
fn sync_without_login_does_nothing() {
    let server = ScriptedServer::new();
    server.set_head(10);
    let client = client(&server, Arc::new(MemoryStorage::new()), SyncConfig::new());
    client.engine.set_user_id(0);

    assert_eq!(client.engine.sync(), SyncOutcome::Unauthenticated);
    assert!(server.requests().is_empty());
    assert_eq!(client.engine.update_id(), 0);
}
