//! Typed wire records.
//!
//! Every struct here mirrors a subtree of the record store with its exact
//! wire keys, so field names mix snake_case and camelCase as the wire does.
//! Decoding is strict: a missing required field is a loud validation error,
//! never a silently substituted default. Fields with genuine domain defaults
//! (empty bio, empty collections, the everyone messaging policy) are the
//! only ones marked `#[serde(default)]`.

mod chat;
mod message;
mod user;

pub use chat::{ChatRecord, ChatType, GroupInfo, GroupRoles, GroupSettings, PendingMember};
pub use message::{MessageRecord, MessageType};
pub use user::{
    FriendRequests, Gender, MessagingPolicy, PresenceStatus, ReceivedRequest, RequestStatus,
    SentRequest, UserRecord, UserStatus,
};

use messenger_common::{AppError, AppResult};
use serde::de::DeserializeOwned;
use serde_json::Value;

pub(crate) fn decode<T: DeserializeOwned>(what: &str, value: Value) -> AppResult<T> {
    serde_json::from_value(value)
        .map_err(|e| AppError::Validation(format!("{what} record decode failed: {e}")))
}

pub(crate) fn encode<T: serde::Serialize>(what: &str, record: &T) -> AppResult<Value> {
    serde_json::to_value(record)
        .map_err(|e| AppError::Internal(format!("{what} record encode failed: {e}")))
}
