//! Transport layer abstraction for sync operations.

use crate::error::{SyncError, SyncResult};
use parking_lot::{Condvar, Mutex};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tideline_protocol::{MessageEnvelope, Request, RequestKind};

/// A transport handles network communication with the server.
///
/// Framing, encryption and reconnects are the transport's business; the
/// engine only sends tagged requests and receives tagged responses.
pub trait Transport: Send + Sync {
    /// Sends a request and blocks until its response arrives or `timeout`
    /// elapses.
    fn send_realtime(&self, request: Request, timeout: Duration) -> SyncResult<MessageEnvelope>;

    /// Queues a request for durable, at-least-once delivery.
    fn enqueue(&self, request: Request) -> SyncResult<()>;

    /// Checks if the transport is connected.
    fn is_connected(&self) -> bool;

    /// Blocks until the transport is connected.
    fn wait_for_connection(&self);
}

type Reply = SyncResult<MessageEnvelope>;

/// A mock transport for testing.
///
/// Responses are scripted per request kind and consumed in FIFO order.
#[derive(Debug, Default)]
pub struct MockTransport {
    connected: AtomicBool,
    connected_changed: Condvar,
    connection: Mutex<()>,
    replies: Mutex<HashMap<RequestKind, VecDeque<Reply>>>,
    sent: Mutex<Vec<Request>>,
    enqueued: Mutex<Vec<Request>>,
}

impl MockTransport {
    /// Creates a new, connected mock transport.
    pub fn new() -> Self {
        Self {
            connected: AtomicBool::new(true),
            ..Default::default()
        }
    }

    /// Queues a response for the next request of `kind`.
    pub fn push_response(&self, kind: RequestKind, response: MessageEnvelope) {
        self.replies
            .lock()
            .entry(kind)
            .or_default()
            .push_back(Ok(response));
    }

    /// Queues an error for the next request of `kind`.
    pub fn push_error(&self, kind: RequestKind, error: SyncError) {
        self.replies
            .lock()
            .entry(kind)
            .or_default()
            .push_back(Err(error));
    }

    /// Sets the connected state.
    pub fn set_connected(&self, connected: bool) {
        let _lock = self.connection.lock();
        self.connected.store(connected, Ordering::SeqCst);
        self.connected_changed.notify_all();
    }

    /// Requests sent through `send_realtime`, in order.
    pub fn sent(&self) -> Vec<Request> {
        self.sent.lock().clone()
    }

    /// Requests passed to `enqueue`, in order.
    pub fn enqueued(&self) -> Vec<Request> {
        self.enqueued.lock().clone()
    }
}

impl Transport for MockTransport {
    fn send_realtime(&self, request: Request, _timeout: Duration) -> SyncResult<MessageEnvelope> {
        if !self.is_connected() {
            return Err(SyncError::NotConnected);
        }
        let kind = request.kind;
        self.sent.lock().push(request);
        self.replies
            .lock()
            .get_mut(&kind)
            .and_then(VecDeque::pop_front)
            .unwrap_or(Err(SyncError::Timeout))
    }

    fn enqueue(&self, request: Request) -> SyncResult<()> {
        self.enqueued.lock().push(request);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn wait_for_connection(&self) {
        let mut lock = self.connection.lock();
        while !self.connected.load(Ordering::SeqCst) {
            self.connected_changed.wait(&mut lock);
        }
    }
}
