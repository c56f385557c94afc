//! Type tags used to dispatch updates, responses and requests.
//!
//! Tags are stable on the wire. Update tags live in `0x1000..`, server
//! responses in `0x2000..`, client requests in `0x3000..` and client-side
//! synthetic updates in `0x4000..`.

use crate::error::{ProtocolError, ProtocolResult};

/// Tag of an encoded [`UpdateContainer`](crate::UpdateContainer) handed to the UI.
pub const UPDATE_CONTAINER_TAG: i64 = 0x0001;

/// Tag of a single encoded [`UpdateEnvelope`](crate::UpdateEnvelope) handed to the UI.
pub const UPDATE_ENVELOPE_TAG: i64 = 0x0002;

/// Kinds of update carried by an `UpdateEnvelope`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpdateKind {
    /// A new message was posted to a conversation.
    NewMessage,
    /// The server assigned an ID to a locally sent message.
    MessageId,
    /// The local user read incoming messages up to an ID.
    ReadHistoryInbox,
    /// The peer read outgoing messages up to an ID.
    ReadHistoryOutbox,
    /// A message body was edited.
    MessageEdited,
    /// Notification settings of a peer changed.
    NotifySettings,
    /// A user changed profile fields.
    Username,
    /// Messages were deleted.
    MessagesDeleted,
    /// A group member was promoted or demoted.
    GroupParticipantAdmin,
    /// Message contents (voice, video) were consumed.
    ReadMessagesContents,
    /// A user changed photo.
    UserPhoto,
    /// A group changed photo.
    GroupPhoto,
    /// A dialog was pinned or unpinned.
    DialogPinned,
    /// The server dropped buffered updates for this client.
    TooLong,
    /// Typing indicator; never persisted.
    UserTyping,
    /// Synthetic: local messages were deleted.
    ClientMessagesDeleted,
    /// Synthetic: a pending message reached the server.
    ClientPendingMessageDelivery,
}

impl UpdateKind {
    /// Returns the wire tag.
    pub const fn tag(self) -> i64 {
        match self {
            UpdateKind::NewMessage => 0x1001,
            UpdateKind::MessageId => 0x1002,
            UpdateKind::ReadHistoryInbox => 0x1003,
            UpdateKind::ReadHistoryOutbox => 0x1004,
            UpdateKind::MessageEdited => 0x1005,
            UpdateKind::NotifySettings => 0x1006,
            UpdateKind::Username => 0x1007,
            UpdateKind::MessagesDeleted => 0x1008,
            UpdateKind::GroupParticipantAdmin => 0x1009,
            UpdateKind::ReadMessagesContents => 0x100a,
            UpdateKind::UserPhoto => 0x100b,
            UpdateKind::GroupPhoto => 0x100c,
            UpdateKind::DialogPinned => 0x100d,
            UpdateKind::TooLong => 0x100e,
            UpdateKind::UserTyping => 0x100f,
            UpdateKind::ClientMessagesDeleted => 0x4001,
            UpdateKind::ClientPendingMessageDelivery => 0x4002,
        }
    }

    /// Resolves a wire tag.
    pub fn from_tag(tag: i64) -> Option<Self> {
        let kind = match tag {
            0x1001 => UpdateKind::NewMessage,
            0x1002 => UpdateKind::MessageId,
            0x1003 => UpdateKind::ReadHistoryInbox,
            0x1004 => UpdateKind::ReadHistoryOutbox,
            0x1005 => UpdateKind::MessageEdited,
            0x1006 => UpdateKind::NotifySettings,
            0x1007 => UpdateKind::Username,
            0x1008 => UpdateKind::MessagesDeleted,
            0x1009 => UpdateKind::GroupParticipantAdmin,
            0x100a => UpdateKind::ReadMessagesContents,
            0x100b => UpdateKind::UserPhoto,
            0x100c => UpdateKind::GroupPhoto,
            0x100d => UpdateKind::DialogPinned,
            0x100e => UpdateKind::TooLong,
            0x100f => UpdateKind::UserTyping,
            0x4001 => UpdateKind::ClientMessagesDeleted,
            0x4002 => UpdateKind::ClientPendingMessageDelivery,
            _ => return None,
        };
        Some(kind)
    }

    /// Resolves a wire tag, failing on unknown values.
    pub fn try_from_tag(tag: i64) -> ProtocolResult<Self> {
        Self::from_tag(tag).ok_or(ProtocolError::UnknownTag(tag))
    }
}

/// Kinds of server response carried by a `MessageEnvelope`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResponseKind {
    /// Server-side error.
    Error,
    /// Current server update state.
    UpdateState,
    /// A slice of the update log.
    UpdateDifference,
    /// A page of dialogs.
    MessagesDialogs,
    /// A sent message was accepted.
    MessagesSent,
    /// The contact list.
    ContactsMany,
    /// Result of importing contacts.
    ContactsImported,
    /// Successful login.
    AuthAuthorization,
    /// A list of users.
    UsersMany,
    /// A page of conversation history.
    MessagesMany,
    /// Full group information.
    GroupFull,
}

impl ResponseKind {
    /// Returns the wire tag.
    pub const fn tag(self) -> i64 {
        match self {
            ResponseKind::Error => 0x2000,
            ResponseKind::UpdateState => 0x2001,
            ResponseKind::UpdateDifference => 0x2002,
            ResponseKind::MessagesDialogs => 0x2003,
            ResponseKind::MessagesSent => 0x2004,
            ResponseKind::ContactsMany => 0x2005,
            ResponseKind::ContactsImported => 0x2006,
            ResponseKind::AuthAuthorization => 0x2007,
            ResponseKind::UsersMany => 0x2008,
            ResponseKind::MessagesMany => 0x2009,
            ResponseKind::GroupFull => 0x200a,
        }
    }

    /// Resolves a wire tag.
    pub fn from_tag(tag: i64) -> Option<Self> {
        let kind = match tag {
            0x2000 => ResponseKind::Error,
            0x2001 => ResponseKind::UpdateState,
            0x2002 => ResponseKind::UpdateDifference,
            0x2003 => ResponseKind::MessagesDialogs,
            0x2004 => ResponseKind::MessagesSent,
            0x2005 => ResponseKind::ContactsMany,
            0x2006 => ResponseKind::ContactsImported,
            0x2007 => ResponseKind::AuthAuthorization,
            0x2008 => ResponseKind::UsersMany,
            0x2009 => ResponseKind::MessagesMany,
            0x200a => ResponseKind::GroupFull,
            _ => return None,
        };
        Some(kind)
    }
}

/// Kinds of request the engine sends to the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
    /// Ask for the current update ID.
    UpdateGetState,
    /// Ask for a slice of the update log.
    UpdateGetDifference,
    /// Ask for a page of dialogs.
    MessagesGetDialogs,
    /// Ask for the contact list.
    ContactsGet,
}

impl RequestKind {
    /// Returns the wire tag.
    pub const fn tag(self) -> i64 {
        match self {
            RequestKind::UpdateGetState => 0x3001,
            RequestKind::UpdateGetDifference => 0x3002,
            RequestKind::MessagesGetDialogs => 0x3003,
            RequestKind::ContactsGet => 0x3004,
        }
    }

    /// Resolves a wire tag.
    pub fn from_tag(tag: i64) -> Option<Self> {
        match tag {
            0x3001 => Some(RequestKind::UpdateGetState),
            0x3002 => Some(RequestKind::UpdateGetDifference),
            0x3003 => Some(RequestKind::MessagesGetDialogs),
            0x3004 => Some(RequestKind::ContactsGet),
            _ => None,
        }
    }
}
