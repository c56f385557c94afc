//! # Tideline Protocol
//!
//! Protocol types and CBOR codecs for the Tideline sync engine.
//!
//! This crate provides:
//! - Type tags for updates, responses and requests
//! - Envelopes (`UpdateEnvelope`, `UpdateContainer`, `MessageEnvelope`, `Request`)
//! - Domain records (peers, users, groups, messages, dialogs)
//! - Update and request/response payloads
//! - The per-conversation hole/filled `Timeline`
//! - CBOR encoding/decoding
//!
//! This is a pure protocol crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod codec;
mod envelope;
mod error;
mod model;
pub mod rpc;
mod tags;
mod timeline;
pub mod updates;

pub use codec::{CborDecode, CborEncode};
pub use envelope::{MessageEnvelope, Request, UpdateContainer, UpdateEnvelope};
pub use error::{ProtocolError, ProtocolResult};
pub use model::{
    Dialog, EntityKind, Group, GroupParticipant, MessageAction, MessageEntity, MessageMedia,
    NotifySettings, PendingMessage, Peer, PeerKind, Photo, SendMedia, User, UserMessage,
};
pub use tags::{RequestKind, ResponseKind, UpdateKind, UPDATE_CONTAINER_TAG, UPDATE_ENVELOPE_TAG};
pub use timeline::{Bar, BarKind, Timeline};
