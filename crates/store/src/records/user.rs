//! User directory records (`users/{userId}`).

use crate::records::{decode, encode};
use crate::time;
use chrono::NaiveDate;
use messenger_common::AppResult;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Gender code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gender {
    /// `type_01`
    #[serde(rename = "type_01")]
    Male,
    /// `type_02`
    #[serde(rename = "type_02")]
    Female,
}

/// Who may open an unsolicited private chat with this user.
///
/// Note the code overlap: `type_05` also names the private *chat type* in
/// `chats/{chatId}/type_id`. The overload is a pre-existing wire fact,
/// preserved rather than fixed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessagingPolicy {
    /// `type_03`: anyone may message.
    #[default]
    #[serde(rename = "type_03")]
    Everyone,
    /// `type_04`: friends only.
    #[serde(rename = "type_04")]
    Friends,
    /// `type_05`: nobody may open a chat.
    #[serde(rename = "type_05")]
    Private,
}

/// Presence code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PresenceStatus {
    /// `status_01`
    #[serde(rename = "status_01")]
    Online,
    /// `status_02`
    #[serde(rename = "status_02")]
    Offline,
}

/// Friend request state. Requests only ever persist as pending; acceptance
/// and decline remove the entries instead of writing a terminal state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestStatus {
    /// `pending`
    #[default]
    #[serde(rename = "pending")]
    Pending,
}

/// Presence subtree (`users/{userId}/status`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UserStatus {
    /// Online/offline code.
    #[serde(rename = "status_id")]
    pub status: PresenceStatus,
    /// Last seen, milliseconds since the epoch.
    #[serde(rename = "last_seen")]
    pub last_seen_millis: i64,
}

impl UserStatus {
    /// An online status stamped now.
    #[must_use]
    pub fn online_now() -> Self {
        Self {
            status: PresenceStatus::Online,
            last_seen_millis: time::now_millis(),
        }
    }

    /// An offline status stamped now.
    #[must_use]
    pub fn offline_now() -> Self {
        Self {
            status: PresenceStatus::Offline,
            last_seen_millis: time::now_millis(),
        }
    }
}

/// One half of a request mirror, on the sender's record.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SentRequest {
    /// Shared send time, float seconds.
    #[serde(rename = "sent_at")]
    pub sent_at: f64,
    /// Always pending while the entry exists.
    #[serde(rename = "status_id", default)]
    pub status: RequestStatus,
}

/// The other half of a request mirror, on the recipient's record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceivedRequest {
    /// The sender's user id (also the map key; duplicated on the wire).
    #[serde(rename = "sent_by")]
    pub sent_by: String,
    /// Shared send time, float seconds.
    #[serde(rename = "sent_at")]
    pub sent_at: f64,
    /// Always pending while the entry exists.
    #[serde(rename = "status_id", default)]
    pub status: RequestStatus,
}

/// Request mirrors subtree (`users/{userId}/friendRequests`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FriendRequests {
    /// Requests this user sent, keyed by target user id.
    #[serde(rename = "sentRequests", default)]
    pub sent: BTreeMap<String, SentRequest>,
    /// Requests this user received, keyed by sender user id.
    #[serde(rename = "receivedRequests", default)]
    pub received: BTreeMap<String, ReceivedRequest>,
}

/// A user directory record.
///
/// The id is the record's key under `users/`, injected when decoding; it is
/// never duplicated inside the record value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    /// Stable provider-issued identifier (the tree key).
    #[serde(skip)]
    pub user_id: String,
    /// Display name.
    #[serde(rename = "user_name")]
    pub user_name: String,
    /// Registration email.
    pub email: String,
    /// Avatar URL, empty when unset.
    #[serde(rename = "avatarUrl", default)]
    pub avatar_url: String,
    /// Free-form bio, empty when unset.
    #[serde(default)]
    pub bio: String,
    /// Gender code.
    #[serde(rename = "gender_id")]
    pub gender: Gender,
    /// Date of birth, ISO-8601 date.
    pub dob: NaiveDate,
    /// Chats this user belongs to, as a key set.
    #[serde(rename = "chat_ids", default)]
    pub chat_ids: BTreeMap<String, bool>,
    /// Mutual friend edges, as a key set.
    #[serde(default)]
    pub friends: BTreeMap<String, bool>,
    /// Declared but consulted by no service.
    #[serde(rename = "blockedUsers", default)]
    pub blocked_users: BTreeMap<String, bool>,
    /// Unsolicited-chat policy.
    #[serde(rename = "allowMessagesFrom", default)]
    pub allow_messages_from: MessagingPolicy,
    /// Presence subtree.
    pub status: UserStatus,
    /// Friend request mirrors.
    #[serde(rename = "friendRequests", default)]
    pub friend_requests: FriendRequests,
}

impl UserRecord {
    /// A freshly registered user: empty collections, everyone-policy,
    /// online as of now.
    #[must_use]
    pub fn new(
        user_id: impl Into<String>,
        user_name: impl Into<String>,
        email: impl Into<String>,
        gender: Gender,
        dob: NaiveDate,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            user_name: user_name.into(),
            email: email.into(),
            avatar_url: String::new(),
            bio: String::new(),
            gender,
            dob,
            chat_ids: BTreeMap::new(),
            friends: BTreeMap::new(),
            blocked_users: BTreeMap::new(),
            allow_messages_from: MessagingPolicy::Everyone,
            status: UserStatus::online_now(),
            friend_requests: FriendRequests::default(),
        }
    }

    /// Decode a `users/{userId}` snapshot, injecting the key as the id.
    pub fn from_value(user_id: impl Into<String>, value: Value) -> AppResult<Self> {
        let mut record: Self = decode("user", value)?;
        record.user_id = user_id.into();
        Ok(record)
    }

    /// Encode for writing at `users/{userId}`.
    pub fn to_value(&self) -> AppResult<Value> {
        encode("user", self)
    }

    /// Whether `other_id` is a mutual friend.
    #[must_use]
    pub fn is_friend(&self, other_id: &str) -> bool {
        self.friends.contains_key(other_id)
    }

    /// Whether a request to `other_id` is pending.
    #[must_use]
    pub fn has_sent_request_to(&self, other_id: &str) -> bool {
        self.friend_requests.sent.contains_key(other_id)
    }

    /// Whether a request from `other_id` is pending.
    #[must_use]
    pub fn has_received_request_from(&self, other_id: &str) -> bool {
        self.friend_requests.received.contains_key(other_id)
    }

    /// Ids of the chats this user belongs to.
    #[must_use]
    pub fn chat_ids(&self) -> Vec<String> {
        self.chat_ids.keys().cloned().collect()
    }

    /// Ids of this user's friends.
    #[must_use]
    pub fn friend_ids(&self) -> Vec<String> {
        self.friends.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn wire_user() -> Value {
        json!({
            "user_name": "Alice",
            "email": "a@x.com",
            "avatarUrl": "",
            "bio": "",
            "gender_id": "type_02",
            "dob": "2000-04-02",
            "allowMessagesFrom": "type_03",
            "friends": {"u2": true},
            "chat_ids": {"c1": true},
            "status": {"status_id": "status_01", "last_seen": 1700000000000_i64},
            "friendRequests": {
                "sentRequests": {"u3": {"sent_at": 1700000100.5, "status_id": "pending"}},
                "receivedRequests": {
                    "u4": {"sent_by": "u4", "sent_at": 1700000200.5, "status_id": "pending"}
                }
            }
        })
    }

    #[test]
    fn test_decodes_wire_keys() {
        let user = UserRecord::from_value("u1", wire_user()).unwrap();
        assert_eq!(user.user_id, "u1");
        assert_eq!(user.user_name, "Alice");
        assert_eq!(user.gender, Gender::Female);
        assert_eq!(user.dob, NaiveDate::from_ymd_opt(2000, 4, 2).unwrap());
        assert!(user.is_friend("u2"));
        assert!(user.has_sent_request_to("u3"));
        assert!(user.has_received_request_from("u4"));
        assert_eq!(user.status.status, PresenceStatus::Online);
        assert_eq!(user.friend_requests.sent["u3"].sent_at, 1700000100.5);
    }

    #[test]
    fn test_missing_required_field_fails_loudly() {
        let mut tree = wire_user();
        tree.as_object_mut().unwrap().remove("email");
        let err = UserRecord::from_value("u1", tree).unwrap_err();
        assert_eq!(err.error_code(), "VALIDATION_ERROR");
    }

    #[test]
    fn test_domain_defaults_apply_when_absent() {
        let tree = json!({
            "user_name": "Bob",
            "email": "b@x.com",
            "gender_id": "type_01",
            "dob": "1999-12-31",
            "status": {"status_id": "status_02", "last_seen": 0}
        });
        let user = UserRecord::from_value("u1", tree).unwrap();
        assert_eq!(user.bio, "");
        assert!(user.friends.is_empty());
        assert_eq!(user.allow_messages_from, MessagingPolicy::Everyone);
    }

    #[test]
    fn test_unknown_type_code_is_rejected() {
        let mut tree = wire_user();
        tree["gender_id"] = json!("type_99");
        assert!(UserRecord::from_value("u1", tree).is_err());
    }

    #[test]
    fn test_encodes_exact_wire_keys() {
        let user = UserRecord::new(
            "u1",
            "Alice",
            "a@x.com",
            Gender::Female,
            NaiveDate::from_ymd_opt(2000, 4, 2).unwrap(),
        );
        let value = user.to_value().unwrap();
        let object = value.as_object().unwrap();
        assert_eq!(object["user_name"], json!("Alice"));
        assert_eq!(object["gender_id"], json!("type_02"));
        assert_eq!(object["allowMessagesFrom"], json!("type_03"));
        assert_eq!(object["dob"], json!("2000-04-02"));
        assert_eq!(object["status"]["status_id"], json!("status_01"));
        assert!(object["status"]["last_seen"].is_i64());
        // The id is the tree key, never a field of the value.
        assert!(!object.contains_key("user_id"));
        assert!(!object.contains_key("userId"));
    }
}
