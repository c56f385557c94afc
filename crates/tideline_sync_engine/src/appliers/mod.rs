//! Appliers translate updates and responses into storage mutations.
//!
//! Update appliers return the updates to forward to the UI, which may be
//! none, the input itself, or the input plus synthesized client-side
//! updates. Response appliers only mutate local state.
//!
//! Dispatch is keyed on the type tag. Unknown update tags pass through
//! unchanged; unknown response tags are ignored.

mod responses;
mod updates;

use crate::engine::SyncEngine;
use crate::error::SyncResult;
use tideline_protocol::{MessageEnvelope, ResponseKind, UpdateEnvelope, UpdateKind};
use tracing::{debug, warn};

impl SyncEngine {
    /// Applies a batch and returns what should reach the UI.
    ///
    /// Message ID assignments run first so that echoes of local sends later
    /// in the batch are recognized as delivered.
    pub(crate) fn apply_updates(&self, updates: &[UpdateEnvelope]) -> Vec<UpdateEnvelope> {
        let (assignments, rest): (Vec<&UpdateEnvelope>, Vec<&UpdateEnvelope>) = updates
            .iter()
            .partition(|update| update.kind() == Some(UpdateKind::MessageId));

        let mut outgoing = Vec::with_capacity(updates.len());
        for update in assignments.into_iter().chain(rest) {
            outgoing.extend(self.apply_update(update));
        }
        outgoing
    }

    /// Applies one update and returns what should reach the UI.
    ///
    /// Applier failures are logged and the update contributes nothing.
    pub(crate) fn apply_update(&self, update: &UpdateEnvelope) -> Vec<UpdateEnvelope> {
        let Some(kind) = update.kind() else {
            debug!(tag = update.type_tag, "passing through unknown update");
            return vec![update.clone()];
        };

        let result = match kind {
            UpdateKind::NewMessage => self.apply_new_message(update),
            UpdateKind::MessageId => self.apply_message_id(update),
            UpdateKind::ReadHistoryInbox => self.apply_read_history_inbox(update),
            UpdateKind::ReadHistoryOutbox => self.apply_read_history_outbox(update),
            UpdateKind::MessageEdited => self.apply_message_edited(update),
            UpdateKind::NotifySettings => self.apply_notify_settings(update),
            UpdateKind::Username => self.apply_username(update),
            UpdateKind::MessagesDeleted => self.apply_messages_deleted(update),
            UpdateKind::GroupParticipantAdmin => self.apply_group_participant_admin(update),
            UpdateKind::ReadMessagesContents => self.apply_read_messages_contents(update),
            UpdateKind::UserPhoto => self.apply_user_photo(update),
            UpdateKind::GroupPhoto => self.apply_group_photo(update),
            UpdateKind::DialogPinned => self.apply_dialog_pinned(update),
            UpdateKind::TooLong => self.apply_too_long(update),
            UpdateKind::UserTyping
            | UpdateKind::ClientMessagesDeleted
            | UpdateKind::ClientPendingMessageDelivery => Ok(vec![update.clone()]),
        };

        result.unwrap_or_else(|err| {
            warn!(?kind, update_id = update.update_id, error = %err, "update applier failed");
            Vec::new()
        })
    }

    /// Applies one server response.
    pub(crate) fn apply_response(&self, response: &MessageEnvelope) -> SyncResult<()> {
        let Some(kind) = response.kind() else {
            debug!(tag = response.type_tag, "ignoring unknown response");
            return Ok(());
        };

        match kind {
            ResponseKind::AuthAuthorization => self.apply_auth_authorization(response),
            ResponseKind::ContactsMany => self.apply_contacts_many(response),
            ResponseKind::ContactsImported => self.apply_contacts_imported(response),
            ResponseKind::MessagesDialogs => self.apply_messages_dialogs(response),
            ResponseKind::UsersMany => self.apply_users_many(response),
            ResponseKind::MessagesMany => self.apply_messages_many(response),
            ResponseKind::GroupFull => self.apply_group_full(response),
            ResponseKind::MessagesSent => self.apply_messages_sent(response),
            ResponseKind::Error => self.log_server_error(response),
            ResponseKind::UpdateState | ResponseKind::UpdateDifference => {
                debug!(?kind, "response handled by the sync loop");
                Ok(())
            }
        }
    }
}
