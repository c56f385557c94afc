//! Domain records exchanged with the server and kept in local storage.

use serde::{Deserialize, Serialize};

/// Kind of conversation peer.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum PeerKind {
    /// One-to-one conversation.
    #[default]
    User,
    /// Group conversation.
    Group,
}

/// A conversation key: `(peer_id, peer_kind)`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct Peer {
    /// Peer ID.
    pub id: i64,
    /// Peer kind.
    pub kind: PeerKind,
}

impl Peer {
    /// Creates a user peer.
    pub const fn user(id: i64) -> Self {
        Self {
            id,
            kind: PeerKind::User,
        }
    }

    /// Creates a group peer.
    pub const fn group(id: i64) -> Self {
        Self {
            id,
            kind: PeerKind::Group,
        }
    }

    /// Returns true for group conversations.
    pub fn is_group(&self) -> bool {
        self.kind == PeerKind::Group
    }
}

/// Remote photo descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Photo {
    /// File ID on the file servers.
    pub file_id: i64,
    /// Access hash needed to download the file.
    pub access_hash: u64,
    /// Storage cluster holding the file.
    pub cluster_id: i32,
}

/// A user profile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// User ID.
    pub id: i64,
    /// First name.
    pub first_name: String,
    /// Last name.
    pub last_name: String,
    /// Public username.
    pub username: String,
    /// Profile bio.
    pub bio: String,
    /// Access hash used when addressing this user.
    pub access_hash: u64,
    /// Current avatar.
    pub photo: Option<Photo>,
}

/// A group profile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    /// Group ID.
    pub id: i64,
    /// Title.
    pub title: String,
    /// Current avatar.
    pub photo: Option<Photo>,
}

/// A member of a group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupParticipant {
    /// Member user ID.
    pub user_id: i64,
    /// Whether the member is an admin.
    pub is_admin: bool,
}

/// Kind of rich-text entity inside a message body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntityKind {
    /// Bold text.
    Bold,
    /// Mention of a user.
    Mention,
    /// Hyperlink.
    Url,
}

/// A rich-text entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageEntity {
    /// Entity kind.
    pub kind: EntityKind,
    /// Offset into the body, in chars.
    pub offset: u32,
    /// Length, in chars.
    pub length: u32,
    /// Mentioned user, for `Mention` entities.
    pub user_id: i64,
}

/// Service action attached to a message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageAction {
    /// Regular message.
    #[default]
    None,
    /// A contact joined the service.
    ContactRegistered,
    /// A group was created.
    GroupCreated {
        /// Group title.
        title: String,
    },
    /// Users were added to a group.
    GroupAddUser {
        /// Added users.
        user_ids: Vec<i64>,
    },
    /// Users were removed from a group.
    GroupDeleteUser {
        /// Removed users.
        user_ids: Vec<i64>,
    },
    /// The group title changed.
    GroupTitleChanged {
        /// New title.
        title: String,
    },
    /// History was cleared up to `max_id`.
    ClearHistory {
        /// Highest cleared message ID.
        max_id: i64,
        /// Whether the dialog itself was deleted too.
        delete: bool,
    },
}

/// Media attached to a stored message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageMedia {
    /// Document ID on the file servers.
    pub document_id: i64,
    /// Size in bytes.
    pub file_size: i64,
    /// Preview thumbnail.
    pub thumbnail: Option<Photo>,
}

/// A server-confirmed message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserMessage {
    /// Message ID, unique and increasing within a conversation.
    pub id: i64,
    /// Conversation peer.
    pub peer: Peer,
    /// Sender user ID.
    pub sender_id: i64,
    /// Creation time (unix seconds).
    pub created_on: i64,
    /// Text body.
    pub body: String,
    /// Replied message ID, 0 for none.
    pub reply_to: i64,
    /// Rich-text entities.
    pub entities: Vec<MessageEntity>,
    /// Service action.
    pub action: MessageAction,
    /// Attached media.
    pub media: Option<MessageMedia>,
    /// Whether media contents were consumed.
    pub content_read: bool,
}

impl UserMessage {
    /// Returns true if the message mentions `user_id`.
    pub fn mentions(&self, user_id: i64) -> bool {
        self.entities
            .iter()
            .any(|e| e.kind == EntityKind::Mention && e.user_id == user_id)
    }
}

/// Per-peer notification settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotifySettings {
    /// Muted until (unix seconds), 0 for not muted.
    pub mute_until: i64,
    /// Notification sound name.
    pub sound: String,
}

/// A conversation summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dialog {
    /// Conversation peer.
    pub peer: Peer,
    /// Latest message ID.
    pub top_message_id: i64,
    /// Unread incoming messages.
    pub unread_count: i32,
    /// Unread mentions of the local user.
    pub mention_count: i32,
    /// Highest incoming message ID read locally.
    pub read_inbox_max_id: i64,
    /// Highest outgoing message ID read by the peer.
    pub read_outbox_max_id: i64,
    /// Access hash used when addressing the peer.
    pub access_hash: u64,
    /// Notification settings.
    pub notify_settings: NotifySettings,
    /// Whether the dialog is pinned.
    pub pinned: bool,
    /// Creation time of the top message.
    pub last_update: i64,
}

impl Dialog {
    /// Creates a dialog anchored at `top_message_id`.
    pub fn new(peer: Peer, top_message_id: i64) -> Self {
        Self {
            peer,
            top_message_id,
            unread_count: 0,
            mention_count: 0,
            read_inbox_max_id: 0,
            read_outbox_max_id: 0,
            access_hash: 0,
            notify_settings: NotifySettings::default(),
            pinned: false,
            last_update: 0,
        }
    }
}

/// Media queued with a pending message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SendMedia {
    /// A document uploaded from a local file.
    UploadedDocument {
        /// Local path of the uploaded file.
        file_path: String,
        /// Client-assigned file ID.
        file_id: i64,
        /// Original file name.
        file_name: String,
    },
    /// A reference to media already on the server.
    Existing {
        /// Document ID.
        document_id: i64,
    },
}

/// A locally created message not yet confirmed by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingMessage {
    /// Local (negative) ID.
    pub id: i64,
    /// Request ID of the send request; also the random ID echoed by the server.
    pub request_id: i64,
    /// Conversation peer.
    pub peer: Peer,
    /// Sender (the local user).
    pub sender_id: i64,
    /// Creation time (unix seconds).
    pub created_on: i64,
    /// Text body.
    pub body: String,
    /// Replied message ID.
    pub reply_to: i64,
    /// Rich-text entities.
    pub entities: Vec<MessageEntity>,
    /// Queued media.
    pub media: Option<SendMedia>,
}

impl PendingMessage {
    /// Promotes the pending record to a stored message with server-assigned fields.
    pub fn promote(&self, message_id: i64, created_on: i64) -> UserMessage {
        UserMessage {
            id: message_id,
            peer: self.peer,
            sender_id: self.sender_id,
            created_on,
            body: self.body.clone(),
            reply_to: self.reply_to,
            entities: self.entities.clone(),
            action: MessageAction::None,
            media: None,
            content_read: false,
        }
    }

    /// Returns true if the message carried a freshly uploaded file.
    pub fn has_uploaded_file(&self) -> bool {
        matches!(self.media, Some(SendMedia::UploadedDocument { .. }))
    }
}
