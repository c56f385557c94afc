//! Request and response payloads.
//!
//! Requests are named after the call (`UpdateGetState`), responses after the
//! returned object (`UpdateState`).

use crate::envelope::UpdateEnvelope;
use crate::model::{Dialog, Group, GroupParticipant, NotifySettings, User, UserMessage};
use serde::{Deserialize, Serialize};

/// Request for the current server update ID.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateGetState {}

/// Response carrying the server update ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateState {
    /// Latest update ID on the server.
    pub update_id: i64,
}

/// Request for a slice of the update log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateGetDifference {
    /// First update ID to return.
    pub from: i64,
    /// Maximum number of updates.
    pub limit: i32,
}

/// A slice of the update log.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateDifference {
    /// Updates in log order.
    pub updates: Vec<UpdateEnvelope>,
    /// Users referenced by the updates.
    pub users: Vec<User>,
    /// Groups referenced by the updates.
    pub groups: Vec<Group>,
    /// First update ID in the slice.
    pub min_update_id: i64,
    /// Last update ID in the slice.
    pub max_update_id: i64,
}

/// Request for a page of dialogs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessagesGetDialogs {
    /// Offset of the page.
    pub offset: i32,
    /// Page size.
    pub limit: i32,
}

/// A page of dialogs with their top messages.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessagesDialogs {
    /// Dialogs in the page.
    pub dialogs: Vec<Dialog>,
    /// Top messages of the dialogs.
    pub messages: Vec<UserMessage>,
    /// Users referenced by the page.
    pub users: Vec<User>,
    /// Groups referenced by the page.
    pub groups: Vec<Group>,
    /// Total number of dialogs on the server.
    pub count: i32,
}

/// Request for the contact list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactsGet {}

/// The contact list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactsMany {
    /// Contacts.
    pub users: Vec<User>,
}

/// Result of a contact import.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactsImported {
    /// Imported contacts that have accounts.
    pub users: Vec<User>,
}

/// A sent message was accepted by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessagesSent {
    /// Server-assigned message ID.
    pub message_id: i64,
    /// Random ID of the send request.
    pub random_id: i64,
    /// Server creation time.
    pub created_on: i64,
}

/// Successful login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthAuthorization {
    /// The logged-in user.
    pub user: User,
}

/// A list of users.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsersMany {
    /// Users.
    pub users: Vec<User>,
}

/// A page of conversation history.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessagesMany {
    /// Messages, any order.
    pub messages: Vec<UserMessage>,
    /// Users referenced by the messages.
    pub users: Vec<User>,
}

/// Full information about a group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupFull {
    /// Group profile.
    pub group: Group,
    /// Members.
    pub participants: Vec<GroupParticipant>,
    /// Member profiles.
    pub users: Vec<User>,
    /// Notification settings of the group dialog.
    pub notify_settings: NotifySettings,
}

/// Server-side error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerError {
    /// Error code.
    pub code: String,
    /// Offending items.
    pub items: String,
}
