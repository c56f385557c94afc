use crate::engine::SyncEngine;
use crate::error::SyncResult;
use std::slice;
use tideline_protocol::rpc::{ContactsGet, MessagesSent};
use tideline_protocol::updates::{
    ClientMessagesDeleted, UpdateDialogPinned, UpdateGroupParticipantAdmin, UpdateGroupPhoto,
    UpdateMessageEdited, UpdateMessageId, UpdateMessagesDeleted, UpdateNewMessage,
    UpdateNotifySettings, UpdateReadHistoryInbox, UpdateReadHistoryOutbox,
    UpdateReadMessagesContents, UpdateUserPhoto, UpdateUsername,
};
use tideline_protocol::{
    Dialog, GroupParticipant, MessageAction, MessageEnvelope, Request, RequestKind, ResponseKind,
    UpdateEnvelope, UpdateKind, UserMessage,
};
use tracing::{debug, info, warn};

type Forward = SyncResult<Vec<UpdateEnvelope>>;

impl SyncEngine {
    pub(super) fn apply_new_message(&self, update: &UpdateEnvelope) -> Forward {
        let payload: UpdateNewMessage = update.decode()?;
        let message = &payload.message;
        let peer = message.peer;

        // the leading hole must exist before the dialog does
        if self.storage.get_dialog(peer)?.is_none() {
            self.holes.mark_hole(peer, 0, message.id - 1);
            let mut dialog = Dialog::new(peer, message.id);
            dialog.access_hash = payload.access_hash;
            dialog.last_update = message.created_on;
            self.storage.save_dialog(&dialog)?;
        }

        if let Some(sender) = &payload.sender {
            self.storage.save_users(slice::from_ref(sender))?;
        }
        self.storage.save_new_message(message, self.user_id())?;
        if payload.access_hash != 0 {
            self.storage.update_access_hash(peer, payload.access_hash)?;
        }
        self.holes.mark_filled(peer, message.id, message.id);

        if let Some(thumbnail) = message.media.as_ref().and_then(|m| m.thumbnail.clone()) {
            self.prefetch_in_background(vec![(message.id, thumbnail)]);
        }

        let mut forward = Vec::new();
        if self.delivered.contains(message.id) {
            debug!(message_id = message.id, "suppressing echo of delivered message");
        } else {
            forward.push(update.clone());
        }
        self.apply_message_action(message, update, &mut forward)?;
        Ok(forward)
    }

    fn apply_message_action(
        &self,
        message: &UserMessage,
        update: &UpdateEnvelope,
        forward: &mut Vec<UpdateEnvelope>,
    ) -> SyncResult<()> {
        let peer = message.peer;
        match &message.action {
            MessageAction::ContactRegistered => {
                let request =
                    Request::new(self.next_request_id(), RequestKind::ContactsGet, &ContactsGet {})?;
                self.transport.enqueue(request)?;
            }
            MessageAction::GroupAddUser { user_ids } => {
                let members: Vec<GroupParticipant> = user_ids
                    .iter()
                    .map(|&user_id| GroupParticipant {
                        user_id,
                        is_admin: false,
                    })
                    .collect();
                self.storage.save_group_members(peer.id, &members)?;
            }
            MessageAction::GroupDeleteUser { user_ids } => {
                self.storage.delete_group_members(peer.id, user_ids)?;
                if user_ids.contains(&self.user_id()) {
                    info!(group_id = peer.id, "removed from group, dropping pending messages");
                    let message_ids = self.storage.delete_pending_for_peer(peer)?;
                    let unread_count = self
                        .storage
                        .get_dialog(peer)?
                        .map_or(0, |dialog| dialog.unread_count);
                    forward.push(UpdateEnvelope::new(
                        UpdateKind::ClientMessagesDeleted,
                        &ClientMessagesDeleted {
                            peer,
                            message_ids,
                            unread_count,
                        },
                        0,
                        update.timestamp,
                    )?);
                }
            }
            MessageAction::ClearHistory { max_id, delete } => {
                self.storage.delete_messages_up_to(peer, *max_id)?;
                self.holes.clear(peer);
                if *delete {
                    self.storage.delete_dialog(peer)?;
                    if peer.is_group() {
                        self.storage.delete_group(peer.id)?;
                    }
                } else if let Some(dialog) = self.storage.get_dialog(peer)? {
                    self.holes.mark_hole(peer, 0, dialog.top_message_id - 1);
                }
            }
            MessageAction::None
            | MessageAction::GroupCreated { .. }
            | MessageAction::GroupTitleChanged { .. } => {}
        }
        Ok(())
    }

    pub(super) fn apply_message_id(&self, update: &UpdateEnvelope) -> Forward {
        let payload: UpdateMessageId = update.decode()?;
        if self.delivered.contains(payload.message_id) {
            return Ok(Vec::new());
        }

        let sent = MessageEnvelope::new(
            ResponseKind::MessagesSent,
            payload.random_id,
            &MessagesSent {
                message_id: payload.message_id,
                random_id: payload.random_id,
                created_on: update.timestamp,
            },
        )?;
        if let Err(err) = self.apply_messages_sent(&sent) {
            warn!(
                message_id = payload.message_id,
                random_id = payload.random_id,
                error = %err,
                "failed to confirm pending message"
            );
        }
        Ok(vec![update.clone()])
    }

    pub(super) fn apply_read_history_inbox(&self, update: &UpdateEnvelope) -> Forward {
        let payload: UpdateReadHistoryInbox = update.decode()?;
        if self.storage.get_dialog(payload.peer)?.is_none() {
            debug!(peer_id = payload.peer.id, "read inbox for unknown dialog");
            return Ok(Vec::new());
        }
        self.storage
            .update_read_inbox(payload.peer, payload.max_id, self.user_id())?;
        Ok(vec![update.clone()])
    }

    pub(super) fn apply_read_history_outbox(&self, update: &UpdateEnvelope) -> Forward {
        let payload: UpdateReadHistoryOutbox = update.decode()?;
        self.storage.update_read_outbox(payload.peer, payload.max_id)?;
        Ok(vec![update.clone()])
    }

    pub(super) fn apply_message_edited(&self, update: &UpdateEnvelope) -> Forward {
        let payload: UpdateMessageEdited = update.decode()?;
        self.storage.save_message(&payload.message)?;
        Ok(vec![update.clone()])
    }

    pub(super) fn apply_notify_settings(&self, update: &UpdateEnvelope) -> Forward {
        let payload: UpdateNotifySettings = update.decode()?;
        self.storage
            .update_notify_settings(payload.peer, &payload.settings)?;
        Ok(vec![update.clone()])
    }

    pub(super) fn apply_username(&self, update: &UpdateEnvelope) -> Forward {
        let payload: UpdateUsername = update.decode()?;
        self.storage.update_username(
            payload.user_id,
            &payload.first_name,
            &payload.last_name,
            &payload.username,
            &payload.bio,
        )?;
        if payload.user_id == self.user_id() {
            if let Some(user) = self.storage.get_user(payload.user_id)? {
                self.storage.save_account(&user)?;
            }
        }
        Ok(vec![update.clone()])
    }

    pub(super) fn apply_messages_deleted(&self, update: &UpdateEnvelope) -> Forward {
        let payload: UpdateMessagesDeleted = update.decode()?;
        self.storage
            .delete_messages(payload.peer, &payload.message_ids)?;
        let unread_count = self.storage.recount_unread(payload.peer, self.user_id())?;
        let client = UpdateEnvelope::new(
            UpdateKind::ClientMessagesDeleted,
            &ClientMessagesDeleted {
                peer: payload.peer,
                message_ids: payload.message_ids,
                unread_count,
            },
            0,
            update.timestamp,
        )?;
        Ok(vec![update.clone(), client])
    }

    pub(super) fn apply_group_participant_admin(&self, update: &UpdateEnvelope) -> Forward {
        let payload: UpdateGroupParticipantAdmin = update.decode()?;
        self.storage
            .update_member_admin(payload.group_id, payload.user_id, payload.is_admin)?;
        Ok(vec![update.clone()])
    }

    pub(super) fn apply_read_messages_contents(&self, update: &UpdateEnvelope) -> Forward {
        let payload: UpdateReadMessagesContents = update.decode()?;
        self.storage
            .set_content_read(payload.peer, &payload.message_ids)?;
        Ok(vec![update.clone()])
    }

    pub(super) fn apply_user_photo(&self, update: &UpdateEnvelope) -> Forward {
        let payload: UpdateUserPhoto = update.decode()?;
        self.storage
            .update_user_photo(payload.user_id, payload.photo.as_ref())?;
        if let Some(photo) = payload.photo {
            self.prefetch_in_background(vec![(payload.user_id, photo)]);
        }
        Ok(vec![update.clone()])
    }

    pub(super) fn apply_group_photo(&self, update: &UpdateEnvelope) -> Forward {
        let payload: UpdateGroupPhoto = update.decode()?;
        self.storage
            .update_group_photo(payload.group_id, payload.photo.as_ref())?;
        if let Some(photo) = payload.photo {
            self.prefetch_in_background(vec![(payload.group_id, photo)]);
        }
        Ok(vec![update.clone()])
    }

    pub(super) fn apply_dialog_pinned(&self, update: &UpdateEnvelope) -> Forward {
        let payload: UpdateDialogPinned = update.decode()?;
        self.storage.update_pinned(payload.peer, payload.pinned)?;
        Ok(vec![update.clone()])
    }

    pub(super) fn apply_too_long(&self, _update: &UpdateEnvelope) -> Forward {
        info!("server dropped buffered updates, scheduling sync");
        self.spawn_sync();
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use crate::test_support::{envelope, harness, new_message, ME};
    use crate::Storage;
    use tideline_protocol::updates::{
        ClientMessagesDeleted, UpdateMessageId, UpdateMessagesDeleted, UpdateReadHistoryInbox,
        UpdateUsername,
    };
    use tideline_protocol::{
        MessageAction, MessageMedia, PendingMessage, Peer, Photo, RequestKind, UpdateEnvelope,
        UpdateKind, User,
    };

    #[test]
    fn new_message_declares_leading_hole_for_new_dialog() {
        let h = harness();
        let peer = Peer::user(7);
        let out = h
            .engine
            .apply_update(&envelope(UpdateKind::NewMessage, &new_message(peer, 50, 7)));

        assert_eq!(out.len(), 1);
        assert_eq!(h.engine.holes.describe(peer), "[H: 0 - 49][F: 50 - 50]");
        let dialog = h.storage.get_dialog(peer).unwrap().unwrap();
        assert_eq!(dialog.top_message_id, 50);
        assert_eq!(dialog.unread_count, 1);
    }

    #[test]
    fn new_message_in_known_dialog_extends_filled_range() {
        let h = harness();
        let peer = Peer::user(7);
        for id in [10, 11, 12] {
            h.engine
                .apply_update(&envelope(UpdateKind::NewMessage, &new_message(peer, id, 7)));
        }
        assert!(h.engine.holes.is_range_filled(peer, 10, 12));
        assert!(h.engine.holes.is_point_hole(peer, 9));
        assert_eq!(h.storage.get_dialog(peer).unwrap().unwrap().unread_count, 3);
    }

    #[test]
    fn own_messages_do_not_count_as_unread() {
        let h = harness();
        let peer = Peer::group(3);
        h.engine
            .apply_update(&envelope(UpdateKind::NewMessage, &new_message(peer, 5, ME)));
        assert_eq!(h.storage.get_dialog(peer).unwrap().unwrap().unread_count, 0);
    }

    #[test]
    fn delivered_message_echo_is_suppressed() {
        let h = harness();
        let peer = Peer::user(7);
        h.engine.delivered.insert(77);
        let out = h
            .engine
            .apply_update(&envelope(UpdateKind::NewMessage, &new_message(peer, 77, ME)));
        assert!(out.is_empty());
        // still stored
        assert!(h.storage.get_message(peer, 77).unwrap().is_some());
    }

    #[test]
    fn media_thumbnail_is_prefetched() {
        let h = harness();
        let peer = Peer::user(7);
        let mut payload = new_message(peer, 3, 7);
        payload.message.media = Some(MessageMedia {
            document_id: 900,
            file_size: 1024,
            thumbnail: Some(Photo {
                file_id: 901,
                access_hash: 1,
                cluster_id: 1,
            }),
        });
        h.engine
            .apply_update(&envelope(UpdateKind::NewMessage, &payload));
        h.wait_for_prefetch(1);
        assert_eq!(h.files.prefetched(), vec![(3, 901)]);
    }

    #[test]
    fn contact_registered_enqueues_contacts_refresh() {
        let h = harness();
        let mut payload = new_message(Peer::user(12), 1, 12);
        payload.message.action = MessageAction::ContactRegistered;
        h.engine
            .apply_update(&envelope(UpdateKind::NewMessage, &payload));
        let enqueued = h.transport.enqueued();
        assert_eq!(enqueued.len(), 1);
        assert_eq!(enqueued[0].kind, RequestKind::ContactsGet);
    }

    #[test]
    fn removal_from_group_drops_pending_messages() {
        let h = harness();
        let peer = Peer::group(40);
        h.storage
            .save_pending(&PendingMessage {
                id: -5,
                request_id: 1234,
                peer,
                sender_id: ME,
                created_on: 0,
                body: "queued".into(),
                reply_to: 0,
                entities: vec![],
                media: None,
            })
            .unwrap();

        let mut payload = new_message(peer, 20, 99);
        payload.message.action = MessageAction::GroupDeleteUser {
            user_ids: vec![ME],
        };
        let out = h
            .engine
            .apply_update(&envelope(UpdateKind::NewMessage, &payload));

        assert_eq!(out.len(), 2);
        assert_eq!(out[1].kind(), Some(UpdateKind::ClientMessagesDeleted));
        let deleted: ClientMessagesDeleted = out[1].decode().unwrap();
        assert_eq!(deleted.message_ids, vec![-5]);
        assert!(h.storage.get_pending_by_request_id(1234).unwrap().is_none());
    }

    #[test]
    fn clear_history_redeclares_hole_below_top() {
        let h = harness();
        let peer = Peer::user(7);
        for id in 1..=5 {
            h.engine
                .apply_update(&envelope(UpdateKind::NewMessage, &new_message(peer, id, 7)));
        }
        let mut payload = new_message(peer, 6, 7);
        payload.message.action = MessageAction::ClearHistory {
            max_id: 5,
            delete: false,
        };
        h.engine
            .apply_update(&envelope(UpdateKind::NewMessage, &payload));

        let remaining: Vec<i64> = h.storage.messages(peer).iter().map(|m| m.id).collect();
        assert_eq!(remaining, vec![6]);
        assert_eq!(h.engine.holes.describe(peer), "[H: 0 - 5]");
        assert!(h.storage.get_dialog(peer).unwrap().is_some());
    }

    #[test]
    fn clear_history_with_delete_removes_dialog() {
        let h = harness();
        let peer = Peer::group(8);
        h.engine
            .apply_update(&envelope(UpdateKind::NewMessage, &new_message(peer, 1, 7)));
        let mut payload = new_message(peer, 2, 7);
        payload.message.action = MessageAction::ClearHistory {
            max_id: 2,
            delete: true,
        };
        h.engine
            .apply_update(&envelope(UpdateKind::NewMessage, &payload));

        assert!(h.storage.get_dialog(peer).unwrap().is_none());
        assert!(h.storage.messages(peer).is_empty());
        assert_eq!(h.engine.holes.describe(peer), "");
    }

    #[test]
    fn message_id_confirms_pending_message_once() {
        let h = harness();
        let peer = Peer::user(7);
        h.storage
            .save_pending(&PendingMessage {
                id: -1,
                request_id: 555,
                peer,
                sender_id: ME,
                created_on: 10,
                body: "hello".into(),
                reply_to: 0,
                entities: vec![],
                media: None,
            })
            .unwrap();

        let update = envelope(
            UpdateKind::MessageId,
            &UpdateMessageId {
                message_id: 900,
                random_id: 555,
            },
        );
        assert_eq!(h.engine.apply_update(&update).len(), 1);
        assert!(h.engine.is_delivered(900));
        assert_eq!(h.storage.get_message(peer, 900).unwrap().unwrap().body, "hello");

        // the second confirmation is a no-op
        assert!(h.engine.apply_update(&update).is_empty());

        // and the server echo of the message itself is not forwarded
        let echo = envelope(UpdateKind::NewMessage, &new_message(peer, 900, ME));
        assert!(h.engine.apply_update(&echo).is_empty());
    }

    #[test]
    fn read_inbox_for_unknown_dialog_is_dropped() {
        let h = harness();
        let update = envelope(
            UpdateKind::ReadHistoryInbox,
            &UpdateReadHistoryInbox {
                peer: Peer::user(404),
                max_id: 10,
            },
        );
        assert!(h.engine.apply_update(&update).is_empty());
    }

    #[test]
    fn messages_deleted_reports_recounted_unread() {
        let h = harness();
        let peer = Peer::user(7);
        for id in 1..=3 {
            h.engine
                .apply_update(&envelope(UpdateKind::NewMessage, &new_message(peer, id, 7)));
        }
        let out = h.engine.apply_update(&envelope(
            UpdateKind::MessagesDeleted,
            &UpdateMessagesDeleted {
                peer,
                message_ids: vec![2, 3],
            },
        ));
        assert_eq!(out.len(), 2);
        let client: ClientMessagesDeleted = out[1].decode().unwrap();
        assert_eq!(client.unread_count, 1);
        assert_eq!(client.message_ids, vec![2, 3]);
    }

    #[test]
    fn username_of_local_user_refreshes_account() {
        let h = harness();
        h.storage
            .save_users(&[User {
                id: ME,
                first_name: "Old".into(),
                ..Default::default()
            }])
            .unwrap();
        h.engine.apply_update(&envelope(
            UpdateKind::Username,
            &UpdateUsername {
                user_id: ME,
                first_name: "New".into(),
                last_name: "Name".into(),
                username: "newname".into(),
                bio: String::new(),
            },
        ));
        assert_eq!(h.storage.account().unwrap().first_name, "New");
    }

    #[test]
    fn unknown_update_passes_through() {
        let h = harness();
        let update = UpdateEnvelope {
            type_tag: 0x7abc,
            payload: vec![1, 2, 3],
            update_id: 4,
            timestamp: 0,
        };
        assert_eq!(h.engine.apply_update(&update), vec![update]);
    }

    #[test]
    fn undecodable_update_contributes_nothing() {
        let h = harness();
        let update = UpdateEnvelope {
            type_tag: UpdateKind::NewMessage.tag(),
            payload: vec![0xff],
            update_id: 4,
            timestamp: 0,
        };
        assert!(h.engine.apply_update(&update).is_empty());
    }
}
