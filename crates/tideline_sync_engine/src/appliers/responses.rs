use crate::engine::SyncEngine;
use crate::error::{SyncError, SyncResult};
use std::collections::{BTreeMap, HashSet};
use std::slice;
use tideline_protocol::rpc::{
    AuthAuthorization, ContactsImported, ContactsMany, GroupFull, MessagesDialogs, MessagesMany,
    MessagesSent, ServerError, UsersMany,
};
use tideline_protocol::updates::ClientPendingMessageDelivery;
use tideline_protocol::{Dialog, MessageEnvelope, Peer, SendMedia, UpdateKind};
use tracing::{debug, info, warn};

impl SyncEngine {
    pub(super) fn apply_auth_authorization(&self, response: &MessageEnvelope) -> SyncResult<()> {
        let auth: AuthAuthorization = response.decode()?;
        info!(user_id = auth.user.id, "logged in");
        self.set_user_id(auth.user.id);
        self.storage.save_users(slice::from_ref(&auth.user))?;
        self.storage.save_account(&auth.user)?;
        self.spawn_sync();
        Ok(())
    }

    pub(super) fn apply_contacts_many(&self, response: &MessageEnvelope) -> SyncResult<()> {
        let contacts: ContactsMany = response.decode()?;
        debug!(count = contacts.users.len(), "storing contacts");
        self.storage.save_contacts(&contacts.users)
    }

    pub(super) fn apply_contacts_imported(&self, response: &MessageEnvelope) -> SyncResult<()> {
        let imported: ContactsImported = response.decode()?;
        self.storage.save_contacts(&imported.users)
    }

    pub(super) fn apply_messages_dialogs(&self, response: &MessageEnvelope) -> SyncResult<()> {
        let page: MessagesDialogs = response.decode()?;
        self.store_dialog_page(&page)?;
        Ok(())
    }

    /// Stores users, groups and messages of a dialog page, plus every dialog
    /// whose top message is part of the page. Returns the stored dialogs.
    pub(crate) fn store_dialog_page<'a>(
        &self,
        page: &'a MessagesDialogs,
    ) -> SyncResult<Vec<&'a Dialog>> {
        self.storage.save_users(&page.users)?;
        self.storage.save_groups(&page.groups)?;
        for message in &page.messages {
            self.storage.save_message(message)?;
        }

        let tops: HashSet<(Peer, i64)> = page
            .messages
            .iter()
            .map(|message| (message.peer, message.id))
            .collect();
        let mut stored = Vec::with_capacity(page.dialogs.len());
        for dialog in &page.dialogs {
            if tops.contains(&(dialog.peer, dialog.top_message_id)) {
                self.storage.save_dialog(dialog)?;
                stored.push(dialog);
            } else {
                debug!(peer_id = dialog.peer.id, "top message missing, skipping dialog");
            }
        }
        Ok(stored)
    }

    pub(super) fn apply_users_many(&self, response: &MessageEnvelope) -> SyncResult<()> {
        let users: UsersMany = response.decode()?;
        self.storage.save_users(&users.users)
    }

    /// A history page fills its `[min, max]` range in each conversation.
    pub(super) fn apply_messages_many(&self, response: &MessageEnvelope) -> SyncResult<()> {
        let history: MessagesMany = response.decode()?;
        self.storage.save_users(&history.users)?;

        let mut ranges: BTreeMap<Peer, (i64, i64)> = BTreeMap::new();
        for message in &history.messages {
            self.storage.save_message(message)?;
            ranges
                .entry(message.peer)
                .and_modify(|(min, max)| {
                    *min = (*min).min(message.id);
                    *max = (*max).max(message.id);
                })
                .or_insert((message.id, message.id));
        }
        for (peer, (min, max)) in ranges {
            self.holes.mark_filled(peer, min, max);
        }
        Ok(())
    }

    pub(super) fn apply_group_full(&self, response: &MessageEnvelope) -> SyncResult<()> {
        let full: GroupFull = response.decode()?;
        let group_id = full.group.id;
        self.storage.save_groups(slice::from_ref(&full.group))?;
        self.storage.save_users(&full.users)?;
        self.storage
            .save_group_members(group_id, &full.participants)?;
        self.storage
            .update_notify_settings(Peer::group(group_id), &full.notify_settings)
    }

    /// Promotes the pending message a send request created.
    ///
    /// Reached both from a direct `MessagesSent` response and from an
    /// `UpdateMessageId` that arrives first.
    pub(crate) fn apply_messages_sent(&self, response: &MessageEnvelope) -> SyncResult<()> {
        let sent: MessagesSent = response.decode()?;
        self.delivered.insert(sent.message_id);

        let pending = self
            .storage
            .get_pending_by_request_id(response.request_id)?
            .ok_or_else(|| {
                SyncError::not_found(format!("pending message for request {}", response.request_id))
            })?;

        let message = pending.promote(sent.message_id, sent.created_on);
        self.storage.save_message(&message)?;
        self.storage.delete_pending(pending.id)?;

        if let Some(SendMedia::UploadedDocument { file_id, .. }) = &pending.media {
            self.storage.finish_upload(*file_id, message.id)?;
            self.storage.delete_pending_upload(pending.id)?;
            self.files.remove_from_queue(pending.id);
        }

        self.storage
            .update_top_message(message.peer, message.id, message.created_on)?;

        debug!(
            pending_id = pending.id,
            message_id = message.id,
            "pending message delivered"
        );
        self.notify(
            UpdateKind::ClientPendingMessageDelivery,
            &ClientPendingMessageDelivery {
                message,
                pending,
                success: true,
            },
        );
        Ok(())
    }

    pub(super) fn log_server_error(&self, response: &MessageEnvelope) -> SyncResult<()> {
        let error: ServerError = response.decode()?;
        warn!(
            request_id = response.request_id,
            code = %error.code,
            items = %error.items,
            "server returned an error"
        );
        Ok(())
    }
}
