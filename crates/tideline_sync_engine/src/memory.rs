//! In-memory storage for testing and ephemeral sessions.

use crate::error::{SyncError, SyncResult};
use crate::storage::Storage;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use tideline_protocol::{
    Dialog, Group, GroupParticipant, NotifySettings, PendingMessage, Peer, Photo, User,
    UserMessage,
};

#[derive(Debug, Default)]
struct Tables {
    ints: HashMap<String, i64>,
    timelines: HashMap<Peer, Vec<u8>>,
    dialogs: HashMap<Peer, Dialog>,
    messages: HashMap<Peer, BTreeMap<i64, UserMessage>>,
    pending: BTreeMap<i64, PendingMessage>,
    users: HashMap<i64, User>,
    contacts: HashSet<i64>,
    account: Option<User>,
    groups: HashMap<i64, Group>,
    members: HashMap<i64, BTreeMap<i64, GroupParticipant>>,
    uploads: HashMap<i64, i64>,
    pending_uploads: HashSet<i64>,
}

impl Tables {
    fn recount(&mut self, peer: Peer, local_user_id: i64) -> i32 {
        let Some(dialog) = self.dialogs.get_mut(&peer) else {
            return 0;
        };
        let read_up_to = dialog.read_inbox_max_id;
        let (unread, mentions) = self
            .messages
            .get(&peer)
            .map(|messages| {
                messages
                    .range(read_up_to + 1..)
                    .map(|(_, m)| m)
                    .filter(|m| m.sender_id != local_user_id)
                    .fold((0, 0), |(unread, mentions), m| {
                        (unread + 1, mentions + i32::from(m.mentions(local_user_id)))
                    })
            })
            .unwrap_or((0, 0));
        dialog.unread_count = unread;
        dialog.mention_count = mentions;
        unread
    }
}

/// A [`Storage`] kept entirely in memory.
///
/// # Example
///
/// ```rust
/// use tideline_sync_engine::{MemoryStorage, Storage};
///
/// let storage = MemoryStorage::new();
/// storage.save_int("answer", 42).unwrap();
/// assert_eq!(storage.get_int("answer").unwrap(), Some(42));
/// ```
#[derive(Debug, Default)]
pub struct MemoryStorage {
    tables: RwLock<Tables>,
    fail_int_writes: AtomicBool,
}

impl MemoryStorage {
    /// Creates empty storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `save_int` fail, for exercising error paths.
    pub fn set_fail_int_writes(&self, fail: bool) {
        self.fail_int_writes.store(fail, Ordering::SeqCst);
    }

    /// Returns the messages of a conversation in ID order.
    pub fn messages(&self, peer: Peer) -> Vec<UserMessage> {
        self.tables
            .read()
            .messages
            .get(&peer)
            .map(|m| m.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Returns every stored dialog.
    pub fn dialogs(&self) -> Vec<Dialog> {
        self.tables.read().dialogs.values().cloned().collect()
    }

    /// Returns the saved account profile.
    pub fn account(&self) -> Option<User> {
        self.tables.read().account.clone()
    }

    /// Returns true if `user_id` is a contact.
    pub fn is_contact(&self, user_id: i64) -> bool {
        self.tables.read().contacts.contains(&user_id)
    }

    /// Returns the message an uploaded file was bound to.
    pub fn upload_owner(&self, file_id: i64) -> Option<i64> {
        self.tables.read().uploads.get(&file_id).copied()
    }

    /// Registers a pending upload for a pending message.
    pub fn add_pending_upload(&self, pending_id: i64) {
        self.tables.write().pending_uploads.insert(pending_id);
    }

    /// Returns true if the pending message still has an upload in flight.
    pub fn has_pending_upload(&self, pending_id: i64) -> bool {
        self.tables.read().pending_uploads.contains(&pending_id)
    }

    fn with_dialog(&self, peer: Peer, f: impl FnOnce(&mut Dialog)) -> SyncResult<()> {
        if let Some(dialog) = self.tables.write().dialogs.get_mut(&peer) {
            f(dialog);
        }
        Ok(())
    }
}

impl Storage for MemoryStorage {
    fn get_int(&self, key: &str) -> SyncResult<Option<i64>> {
        Ok(self.tables.read().ints.get(key).copied())
    }

    fn save_int(&self, key: &str, value: i64) -> SyncResult<()> {
        if self.fail_int_writes.load(Ordering::SeqCst) {
            return Err(SyncError::storage(format!("write of {key} rejected")));
        }
        self.tables.write().ints.insert(key.to_string(), value);
        Ok(())
    }

    fn get_timeline(&self, peer: Peer) -> SyncResult<Option<Vec<u8>>> {
        Ok(self.tables.read().timelines.get(&peer).cloned())
    }

    fn save_timeline(&self, peer: Peer, blob: &[u8]) -> SyncResult<()> {
        self.tables.write().timelines.insert(peer, blob.to_vec());
        Ok(())
    }

    fn delete_timeline(&self, peer: Peer) -> SyncResult<()> {
        self.tables.write().timelines.remove(&peer);
        Ok(())
    }

    fn get_dialog(&self, peer: Peer) -> SyncResult<Option<Dialog>> {
        Ok(self.tables.read().dialogs.get(&peer).cloned())
    }

    fn save_dialog(&self, dialog: &Dialog) -> SyncResult<()> {
        self.tables.write().dialogs.insert(dialog.peer, dialog.clone());
        Ok(())
    }

    fn delete_dialog(&self, peer: Peer) -> SyncResult<()> {
        self.tables.write().dialogs.remove(&peer);
        Ok(())
    }

    fn update_top_message(&self, peer: Peer, message_id: i64, created_on: i64) -> SyncResult<()> {
        self.with_dialog(peer, |dialog| {
            if message_id > dialog.top_message_id {
                dialog.top_message_id = message_id;
                dialog.last_update = created_on;
            }
        })
    }

    fn update_read_inbox(&self, peer: Peer, max_id: i64, local_user_id: i64) -> SyncResult<()> {
        let mut tables = self.tables.write();
        if let Some(dialog) = tables.dialogs.get_mut(&peer) {
            dialog.read_inbox_max_id = dialog.read_inbox_max_id.max(max_id);
        }
        tables.recount(peer, local_user_id);
        Ok(())
    }

    fn update_read_outbox(&self, peer: Peer, max_id: i64) -> SyncResult<()> {
        self.with_dialog(peer, |dialog| {
            dialog.read_outbox_max_id = dialog.read_outbox_max_id.max(max_id);
        })
    }

    fn update_access_hash(&self, peer: Peer, access_hash: u64) -> SyncResult<()> {
        self.with_dialog(peer, |dialog| dialog.access_hash = access_hash)
    }

    fn update_notify_settings(&self, peer: Peer, settings: &NotifySettings) -> SyncResult<()> {
        self.with_dialog(peer, |dialog| dialog.notify_settings = settings.clone())
    }

    fn update_pinned(&self, peer: Peer, pinned: bool) -> SyncResult<()> {
        self.with_dialog(peer, |dialog| dialog.pinned = pinned)
    }

    fn recount_unread(&self, peer: Peer, local_user_id: i64) -> SyncResult<i32> {
        Ok(self.tables.write().recount(peer, local_user_id))
    }

    fn get_message(&self, peer: Peer, message_id: i64) -> SyncResult<Option<UserMessage>> {
        Ok(self
            .tables
            .read()
            .messages
            .get(&peer)
            .and_then(|m| m.get(&message_id))
            .cloned())
    }

    fn save_message(&self, message: &UserMessage) -> SyncResult<()> {
        self.tables
            .write()
            .messages
            .entry(message.peer)
            .or_default()
            .insert(message.id, message.clone());
        Ok(())
    }

    fn save_new_message(&self, message: &UserMessage, local_user_id: i64) -> SyncResult<()> {
        let mut tables = self.tables.write();
        let existed = tables
            .messages
            .entry(message.peer)
            .or_default()
            .insert(message.id, message.clone())
            .is_some();
        if let Some(dialog) = tables.dialogs.get_mut(&message.peer) {
            if message.id > dialog.top_message_id {
                dialog.top_message_id = message.id;
                dialog.last_update = message.created_on;
            }
            if !existed && message.sender_id != local_user_id {
                dialog.unread_count += 1;
                if message.mentions(local_user_id) {
                    dialog.mention_count += 1;
                }
            }
        }
        Ok(())
    }

    fn delete_messages(&self, peer: Peer, message_ids: &[i64]) -> SyncResult<()> {
        if let Some(messages) = self.tables.write().messages.get_mut(&peer) {
            for id in message_ids {
                messages.remove(id);
            }
        }
        Ok(())
    }

    fn delete_messages_up_to(&self, peer: Peer, max_id: i64) -> SyncResult<()> {
        if let Some(messages) = self.tables.write().messages.get_mut(&peer) {
            match max_id.checked_add(1) {
                Some(bound) => *messages = messages.split_off(&bound),
                None => messages.clear(),
            }
        }
        Ok(())
    }

    fn drop_all(&self) -> SyncResult<()> {
        let mut tables = self.tables.write();
        tables.messages.clear();
        tables.dialogs.clear();
        tables.timelines.clear();
        Ok(())
    }

    fn set_content_read(&self, peer: Peer, message_ids: &[i64]) -> SyncResult<()> {
        if let Some(messages) = self.tables.write().messages.get_mut(&peer) {
            for id in message_ids {
                if let Some(message) = messages.get_mut(id) {
                    message.content_read = true;
                }
            }
        }
        Ok(())
    }

    fn save_pending(&self, pending: &PendingMessage) -> SyncResult<()> {
        self.tables.write().pending.insert(pending.id, pending.clone());
        Ok(())
    }

    fn get_pending_by_request_id(&self, request_id: i64) -> SyncResult<Option<PendingMessage>> {
        Ok(self
            .tables
            .read()
            .pending
            .values()
            .find(|p| p.request_id == request_id)
            .cloned())
    }

    fn delete_pending(&self, pending_id: i64) -> SyncResult<()> {
        self.tables.write().pending.remove(&pending_id);
        Ok(())
    }

    fn delete_pending_for_peer(&self, peer: Peer) -> SyncResult<Vec<i64>> {
        let mut tables = self.tables.write();
        let ids: Vec<i64> = tables
            .pending
            .values()
            .filter(|p| p.peer == peer)
            .map(|p| p.id)
            .collect();
        for id in &ids {
            tables.pending.remove(id);
        }
        Ok(ids)
    }

    fn get_user(&self, user_id: i64) -> SyncResult<Option<User>> {
        Ok(self.tables.read().users.get(&user_id).cloned())
    }

    fn save_users(&self, users: &[User]) -> SyncResult<()> {
        let mut tables = self.tables.write();
        for user in users {
            tables.users.insert(user.id, user.clone());
        }
        Ok(())
    }

    fn save_contacts(&self, users: &[User]) -> SyncResult<()> {
        let mut tables = self.tables.write();
        for user in users {
            tables.users.insert(user.id, user.clone());
            tables.contacts.insert(user.id);
        }
        Ok(())
    }

    fn save_account(&self, user: &User) -> SyncResult<()> {
        self.tables.write().account = Some(user.clone());
        Ok(())
    }

    fn update_username(
        &self,
        user_id: i64,
        first_name: &str,
        last_name: &str,
        username: &str,
        bio: &str,
    ) -> SyncResult<()> {
        let mut tables = self.tables.write();
        let user = tables.users.entry(user_id).or_insert_with(|| User {
            id: user_id,
            ..Default::default()
        });
        user.first_name = first_name.to_string();
        user.last_name = last_name.to_string();
        user.username = username.to_string();
        user.bio = bio.to_string();
        Ok(())
    }

    fn update_user_photo(&self, user_id: i64, photo: Option<&Photo>) -> SyncResult<()> {
        if let Some(user) = self.tables.write().users.get_mut(&user_id) {
            user.photo = photo.cloned();
        }
        Ok(())
    }

    fn get_group(&self, group_id: i64) -> SyncResult<Option<Group>> {
        Ok(self.tables.read().groups.get(&group_id).cloned())
    }

    fn save_groups(&self, groups: &[Group]) -> SyncResult<()> {
        let mut tables = self.tables.write();
        for group in groups {
            tables.groups.insert(group.id, group.clone());
        }
        Ok(())
    }

    fn delete_group(&self, group_id: i64) -> SyncResult<()> {
        let mut tables = self.tables.write();
        tables.groups.remove(&group_id);
        tables.members.remove(&group_id);
        Ok(())
    }

    fn update_group_photo(&self, group_id: i64, photo: Option<&Photo>) -> SyncResult<()> {
        if let Some(group) = self.tables.write().groups.get_mut(&group_id) {
            group.photo = photo.cloned();
        }
        Ok(())
    }

    fn save_group_members(&self, group_id: i64, members: &[GroupParticipant]) -> SyncResult<()> {
        let mut tables = self.tables.write();
        let group = tables.members.entry(group_id).or_default();
        for member in members {
            group.insert(member.user_id, member.clone());
        }
        Ok(())
    }

    fn delete_group_members(&self, group_id: i64, user_ids: &[i64]) -> SyncResult<()> {
        if let Some(group) = self.tables.write().members.get_mut(&group_id) {
            for user_id in user_ids {
                group.remove(user_id);
            }
        }
        Ok(())
    }

    fn group_members(&self, group_id: i64) -> SyncResult<Vec<GroupParticipant>> {
        Ok(self
            .tables
            .read()
            .members
            .get(&group_id)
            .map(|g| g.values().cloned().collect())
            .unwrap_or_default())
    }

    fn update_member_admin(&self, group_id: i64, user_id: i64, is_admin: bool) -> SyncResult<()> {
        if let Some(member) = self
            .tables
            .write()
            .members
            .get_mut(&group_id)
            .and_then(|g| g.get_mut(&user_id))
        {
            member.is_admin = is_admin;
        }
        Ok(())
    }

    fn finish_upload(&self, file_id: i64, message_id: i64) -> SyncResult<()> {
        self.tables.write().uploads.insert(file_id, message_id);
        Ok(())
    }

    fn delete_pending_upload(&self, pending_id: i64) -> SyncResult<()> {
        self.tables.write().pending_uploads.remove(&pending_id);
        Ok(())
    }
}
