//! Message records (`messages/{chatId}/{messageId}`).

use crate::records::{decode, encode};
use messenger_common::AppResult;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Message type code. `type_07` (plain text) is the only code the product
/// writes; media is carried by the separate `mediaUrl` field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageType {
    /// `type_07`
    #[default]
    #[serde(rename = "type_07")]
    Text,
}

/// A single immutable message, scoped under its owning chat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageRecord {
    /// Generated message identifier (the tree key, unique per chat).
    #[serde(skip)]
    pub message_id: String,
    /// The member who sent it.
    #[serde(rename = "sender_id")]
    pub sender_id: String,
    /// Message body.
    pub text: String,
    /// Type code.
    #[serde(rename = "type_message", default)]
    pub message_type: MessageType,
    /// Optional media reference; absent from the wire for text messages.
    #[serde(rename = "mediaUrl", default, skip_serializing_if = "Option::is_none")]
    pub media_url: Option<String>,
    /// In-chat sort key, float seconds.
    #[serde(rename = "createdAt")]
    pub created_at: f64,
}

impl MessageRecord {
    /// Decode a `messages/{chatId}/{messageId}` snapshot, injecting the key
    /// as the id.
    pub fn from_value(message_id: impl Into<String>, value: Value) -> AppResult<Self> {
        let mut record: Self = decode("message", value)?;
        record.message_id = message_id.into();
        Ok(record)
    }

    /// Encode for writing at `messages/{chatId}/{messageId}`.
    pub fn to_value(&self) -> AppResult<Value> {
        encode("message", self)
    }
}
