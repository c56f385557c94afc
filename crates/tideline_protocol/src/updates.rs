//! Update payloads, one struct per [`UpdateKind`](crate::UpdateKind).

use crate::model::{NotifySettings, PendingMessage, Peer, Photo, User, UserMessage};
use serde::{Deserialize, Serialize};

/// Payload of `UpdateKind::NewMessage`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateNewMessage {
    /// The new message.
    pub message: UserMessage,
    /// Sender profile, when the server includes it.
    pub sender: Option<User>,
    /// Access hash of the peer, 0 when not provided.
    pub access_hash: u64,
}

/// Payload of `UpdateKind::MessageId`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateMessageId {
    /// Server-assigned message ID.
    pub message_id: i64,
    /// Random ID the client attached to the send request.
    pub random_id: i64,
}

/// Payload of `UpdateKind::ReadHistoryInbox`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateReadHistoryInbox {
    /// Conversation.
    pub peer: Peer,
    /// Highest read incoming message ID.
    pub max_id: i64,
}

/// Payload of `UpdateKind::ReadHistoryOutbox`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateReadHistoryOutbox {
    /// Conversation.
    pub peer: Peer,
    /// Highest outgoing message ID read by the peer.
    pub max_id: i64,
}

/// Payload of `UpdateKind::MessageEdited`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateMessageEdited {
    /// The message after the edit.
    pub message: UserMessage,
}

/// Payload of `UpdateKind::NotifySettings`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateNotifySettings {
    /// Conversation.
    pub peer: Peer,
    /// New settings.
    pub settings: NotifySettings,
}

/// Payload of `UpdateKind::Username`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateUsername {
    /// User whose profile changed.
    pub user_id: i64,
    /// First name.
    pub first_name: String,
    /// Last name.
    pub last_name: String,
    /// Username.
    pub username: String,
    /// Bio.
    pub bio: String,
}

/// Payload of `UpdateKind::MessagesDeleted`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateMessagesDeleted {
    /// Conversation.
    pub peer: Peer,
    /// Deleted message IDs.
    pub message_ids: Vec<i64>,
}

/// Payload of `UpdateKind::GroupParticipantAdmin`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateGroupParticipantAdmin {
    /// Group.
    pub group_id: i64,
    /// Member.
    pub user_id: i64,
    /// New admin flag.
    pub is_admin: bool,
}

/// Payload of `UpdateKind::ReadMessagesContents`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateReadMessagesContents {
    /// Conversation.
    pub peer: Peer,
    /// Messages whose contents were consumed.
    pub message_ids: Vec<i64>,
}

/// Payload of `UpdateKind::UserPhoto`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateUserPhoto {
    /// User.
    pub user_id: i64,
    /// New photo, `None` when removed.
    pub photo: Option<Photo>,
}

/// Payload of `UpdateKind::GroupPhoto`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateGroupPhoto {
    /// Group.
    pub group_id: i64,
    /// New photo, `None` when removed.
    pub photo: Option<Photo>,
}

/// Payload of `UpdateKind::DialogPinned`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateDialogPinned {
    /// Conversation.
    pub peer: Peer,
    /// New pinned flag.
    pub pinned: bool,
}

/// Payload of `UpdateKind::TooLong`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateTooLong {}

/// Payload of `UpdateKind::UserTyping`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateUserTyping {
    /// Conversation.
    pub peer: Peer,
    /// Typing user.
    pub user_id: i64,
}

/// Payload of `UpdateKind::ClientMessagesDeleted`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientMessagesDeleted {
    /// Conversation.
    pub peer: Peer,
    /// Deleted message IDs.
    pub message_ids: Vec<i64>,
    /// Unread count of the dialog after the deletion.
    pub unread_count: i32,
}

/// Payload of `UpdateKind::ClientPendingMessageDelivery`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientPendingMessageDelivery {
    /// The stored message.
    pub message: UserMessage,
    /// The pending record it replaced.
    pub pending: PendingMessage,
    /// Whether delivery succeeded.
    pub success: bool,
}
