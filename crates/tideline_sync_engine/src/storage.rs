//! Local storage abstraction.

use crate::error::SyncResult;
use tideline_protocol::{
    Dialog, Group, GroupParticipant, NotifySettings, PendingMessage, Peer, Photo, User,
    UserMessage,
};

/// Key under which the last applied update ID is persisted.
pub const UPDATE_ID_KEY: &str = "sync.update_id";

/// Local cache the engine reads and writes.
///
/// Storage owns indexing and query semantics. The engine only needs the
/// record-level operations below.
///
/// # Invariants
///
/// - Messages are keyed by `(peer, id)`
/// - `save_*` operations are upserts
/// - `delete_*` operations on missing records succeed
/// - Timeline blobs are opaque to storage
///
/// # Implementors
///
/// - [`super::MemoryStorage`] - In-process storage for tests and ephemeral sessions
pub trait Storage: Send + Sync {
    // ---- key-value ----

    /// Reads an integer value.
    fn get_int(&self, key: &str) -> SyncResult<Option<i64>>;

    /// Persists an integer value.
    fn save_int(&self, key: &str, value: i64) -> SyncResult<()>;

    // ---- timelines ----

    /// Reads the timeline blob of a conversation.
    fn get_timeline(&self, peer: Peer) -> SyncResult<Option<Vec<u8>>>;

    /// Persists the timeline blob of a conversation.
    fn save_timeline(&self, peer: Peer, blob: &[u8]) -> SyncResult<()>;

    /// Removes the timeline blob of a conversation.
    fn delete_timeline(&self, peer: Peer) -> SyncResult<()>;

    // ---- dialogs ----

    /// Reads a dialog.
    fn get_dialog(&self, peer: Peer) -> SyncResult<Option<Dialog>>;

    /// Upserts a dialog.
    fn save_dialog(&self, dialog: &Dialog) -> SyncResult<()>;

    /// Removes a dialog.
    fn delete_dialog(&self, peer: Peer) -> SyncResult<()>;

    /// Moves the dialog's top message forward to `message_id`.
    ///
    /// Lower IDs than the current top are ignored.
    fn update_top_message(&self, peer: Peer, message_id: i64, created_on: i64) -> SyncResult<()>;

    /// Records that incoming messages up to `max_id` were read and recomputes
    /// the unread counters against `local_user_id`.
    fn update_read_inbox(&self, peer: Peer, max_id: i64, local_user_id: i64) -> SyncResult<()>;

    /// Records that the peer read outgoing messages up to `max_id`.
    fn update_read_outbox(&self, peer: Peer, max_id: i64) -> SyncResult<()>;

    /// Sets the dialog's access hash.
    fn update_access_hash(&self, peer: Peer, access_hash: u64) -> SyncResult<()>;

    /// Sets the dialog's notification settings.
    fn update_notify_settings(&self, peer: Peer, settings: &NotifySettings) -> SyncResult<()>;

    /// Sets the dialog's pinned flag.
    fn update_pinned(&self, peer: Peer, pinned: bool) -> SyncResult<()>;

    /// Recounts unread incoming messages of a dialog, stores and returns it.
    fn recount_unread(&self, peer: Peer, local_user_id: i64) -> SyncResult<i32>;

    // ---- messages ----

    /// Reads a message.
    fn get_message(&self, peer: Peer, message_id: i64) -> SyncResult<Option<UserMessage>>;

    /// Upserts a message without touching dialog counters.
    fn save_message(&self, message: &UserMessage) -> SyncResult<()>;

    /// Stores a freshly received message and bumps the dialog's top message,
    /// unread counter and, when the message mentions `local_user_id`, the
    /// mention counter. Counters only move for messages not sent by
    /// `local_user_id`.
    fn save_new_message(&self, message: &UserMessage, local_user_id: i64) -> SyncResult<()>;

    /// Removes messages by ID.
    fn delete_messages(&self, peer: Peer, message_ids: &[i64]) -> SyncResult<()>;

    /// Removes every message with ID `<= max_id`.
    fn delete_messages_up_to(&self, peer: Peer, max_id: i64) -> SyncResult<()>;

    /// Drops every cached message, dialog and timeline.
    fn drop_all(&self) -> SyncResult<()>;

    /// Marks message contents as consumed.
    fn set_content_read(&self, peer: Peer, message_ids: &[i64]) -> SyncResult<()>;

    // ---- pending messages ----

    /// Upserts a pending message.
    fn save_pending(&self, pending: &PendingMessage) -> SyncResult<()>;

    /// Finds a pending message by the request ID it was sent with.
    fn get_pending_by_request_id(&self, request_id: i64) -> SyncResult<Option<PendingMessage>>;

    /// Removes a pending message.
    fn delete_pending(&self, pending_id: i64) -> SyncResult<()>;

    /// Removes every pending message of a conversation and returns their IDs.
    fn delete_pending_for_peer(&self, peer: Peer) -> SyncResult<Vec<i64>>;

    // ---- users and groups ----

    /// Reads a user.
    fn get_user(&self, user_id: i64) -> SyncResult<Option<User>>;

    /// Upserts users.
    fn save_users(&self, users: &[User]) -> SyncResult<()>;

    /// Upserts users and marks them as contacts.
    fn save_contacts(&self, users: &[User]) -> SyncResult<()>;

    /// Persists the profile of the logged-in account.
    fn save_account(&self, user: &User) -> SyncResult<()>;

    /// Updates a user's name fields.
    fn update_username(
        &self,
        user_id: i64,
        first_name: &str,
        last_name: &str,
        username: &str,
        bio: &str,
    ) -> SyncResult<()>;

    /// Updates a user's photo.
    fn update_user_photo(&self, user_id: i64, photo: Option<&Photo>) -> SyncResult<()>;

    /// Reads a group.
    fn get_group(&self, group_id: i64) -> SyncResult<Option<Group>>;

    /// Upserts groups.
    fn save_groups(&self, groups: &[Group]) -> SyncResult<()>;

    /// Removes a group and its members.
    fn delete_group(&self, group_id: i64) -> SyncResult<()>;

    /// Updates a group's photo.
    fn update_group_photo(&self, group_id: i64, photo: Option<&Photo>) -> SyncResult<()>;

    /// Upserts group members.
    fn save_group_members(&self, group_id: i64, members: &[GroupParticipant]) -> SyncResult<()>;

    /// Removes group members.
    fn delete_group_members(&self, group_id: i64, user_ids: &[i64]) -> SyncResult<()>;

    /// Lists group members.
    fn group_members(&self, group_id: i64) -> SyncResult<Vec<GroupParticipant>>;

    /// Sets a member's admin flag.
    fn update_member_admin(&self, group_id: i64, user_id: i64, is_admin: bool) -> SyncResult<()>;

    // ---- files ----

    /// Binds an uploaded local file to the stored message that now owns it.
    fn finish_upload(&self, file_id: i64, message_id: i64) -> SyncResult<()>;

    /// Clears the pending-upload status of a pending message.
    fn delete_pending_upload(&self, pending_id: i64) -> SyncResult<()>;
}
