//! Envelopes carrying tagged payloads between server, engine and UI.

use crate::codec::{CborDecode, CborEncode};
use crate::error::ProtocolResult;
use crate::model::{Group, User};
use crate::tags::{RequestKind, ResponseKind, UpdateKind};
use serde::{Deserialize, Serialize};

/// A single update from the server's event log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateEnvelope {
    /// Constructor tag of the payload.
    pub type_tag: i64,
    /// Encoded payload.
    pub payload: Vec<u8>,
    /// Position in the update log, 0 for updates outside the log.
    pub update_id: i64,
    /// Server timestamp (unix seconds).
    pub timestamp: i64,
}

impl UpdateEnvelope {
    /// Wraps an encodable payload.
    pub fn new<T: CborEncode>(
        kind: UpdateKind,
        payload: &T,
        update_id: i64,
        timestamp: i64,
    ) -> ProtocolResult<Self> {
        Ok(Self {
            type_tag: kind.tag(),
            payload: payload.encode_cbor()?,
            update_id,
            timestamp,
        })
    }

    /// Returns the update kind, if known.
    pub fn kind(&self) -> Option<UpdateKind> {
        UpdateKind::from_tag(self.type_tag)
    }

    /// Decodes the payload.
    pub fn decode<T: CborDecode>(&self) -> ProtocolResult<T> {
        T::decode_cbor(&self.payload)
    }
}

/// A batch of updates pushed by the server or produced by the engine.
///
/// `min_update_id` is the update ID of the first entry (0 when unknown),
/// `max_update_id` the last.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateContainer {
    /// Updates in log order.
    pub updates: Vec<UpdateEnvelope>,
    /// First update ID covered by the batch.
    pub min_update_id: i64,
    /// Last update ID covered by the batch.
    pub max_update_id: i64,
    /// Users referenced by the updates.
    pub users: Vec<User>,
    /// Groups referenced by the updates.
    pub groups: Vec<Group>,
}

impl UpdateContainer {
    /// Creates an empty container spanning `[min_update_id, max_update_id]`.
    pub fn new(min_update_id: i64, max_update_id: i64) -> Self {
        Self {
            min_update_id,
            max_update_id,
            ..Default::default()
        }
    }

    /// Number of updates.
    pub fn len(&self) -> usize {
        self.updates.len()
    }

    /// Returns true if the container has no updates.
    pub fn is_empty(&self) -> bool {
        self.updates.is_empty()
    }
}

/// A server response to a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageEnvelope {
    /// Constructor tag of the payload.
    pub type_tag: i64,
    /// Request this response answers.
    pub request_id: i64,
    /// Encoded payload.
    pub payload: Vec<u8>,
}

impl MessageEnvelope {
    /// Wraps an encodable response payload.
    pub fn new<T: CborEncode>(
        kind: ResponseKind,
        request_id: i64,
        payload: &T,
    ) -> ProtocolResult<Self> {
        Ok(Self {
            type_tag: kind.tag(),
            request_id,
            payload: payload.encode_cbor()?,
        })
    }

    /// Returns the response kind, if known.
    pub fn kind(&self) -> Option<ResponseKind> {
        ResponseKind::from_tag(self.type_tag)
    }

    /// Decodes the payload.
    pub fn decode<T: CborDecode>(&self) -> ProtocolResult<T> {
        T::decode_cbor(&self.payload)
    }
}

/// An outgoing request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// Client-unique request ID.
    pub request_id: i64,
    /// Request kind.
    pub kind: RequestKind,
    /// Encoded payload.
    pub payload: Vec<u8>,
}

impl Request {
    /// Wraps an encodable request payload.
    pub fn new<T: CborEncode>(
        request_id: i64,
        kind: RequestKind,
        payload: &T,
    ) -> ProtocolResult<Self> {
        Ok(Self {
            request_id,
            kind,
            payload: payload.encode_cbor()?,
        })
    }

    /// Returns the wire tag.
    pub fn type_tag(&self) -> i64 {
        self.kind.tag()
    }

    /// Decodes the payload.
    pub fn decode<T: CborDecode>(&self) -> ProtocolResult<T> {
        T::decode_cbor(&self.payload)
    }
}
