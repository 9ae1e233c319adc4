//! Tree paths into the record store.

use messenger_common::{AppError, AppResult};
use std::fmt;

/// Characters that may not appear in a path segment.
const FORBIDDEN: &[char] = &['.', '$', '#', '[', ']', '/'];

/// A validated path into the record tree.
///
/// Paths are non-empty sequences of segments; each segment is a non-empty
/// string free of the store's forbidden key characters. The path namespace
/// itself lives in [`paths`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TreePath {
    segments: Vec<String>,
}

impl TreePath {
    /// Build a path from segments, validating each one.
    pub fn new<I, S>(segments: I) -> AppResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let segments: Vec<String> = segments.into_iter().map(Into::into).collect();
        if segments.is_empty() {
            return Err(AppError::Validation("empty tree path".to_string()));
        }
        for segment in &segments {
            validate_segment(segment)?;
        }
        Ok(Self { segments })
    }

    /// Parse a `/`-separated path string. Leading and trailing slashes are
    /// tolerated, interior empty segments are not.
    pub fn parse(path: &str) -> AppResult<Self> {
        Self::new(path.trim_matches('/').split('/'))
    }

    /// Extend this path by one child segment.
    pub fn child(&self, segment: &str) -> AppResult<Self> {
        validate_segment(segment)?;
        let mut segments = self.segments.clone();
        segments.push(segment.to_string());
        Ok(Self { segments })
    }

    /// The path segments, in order from the root.
    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// The final segment, i.e. the record key this path addresses.
    #[must_use]
    pub fn key(&self) -> &str {
        // Constructors guarantee at least one segment.
        self.segments.last().map_or("", String::as_str)
    }

    /// The parent path, or `None` for a top-level namespace.
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        if self.segments.len() < 2 {
            return None;
        }
        Some(Self {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    /// Whether `prefix` is this path or an ancestor of it.
    #[must_use]
    pub fn starts_with(&self, prefix: &Self) -> bool {
        self.segments.len() >= prefix.segments.len()
            && self.segments[..prefix.segments.len()] == prefix.segments[..]
    }

    pub(crate) fn from_validated(segments: Vec<String>) -> Self {
        Self { segments }
    }
}

impl fmt::Display for TreePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("/"))
    }
}

fn validate_segment(segment: &str) -> AppResult<()> {
    if segment.is_empty() {
        return Err(AppError::Validation("empty path segment".to_string()));
    }
    if segment.contains(FORBIDDEN) {
        return Err(AppError::Validation(format!(
            "path segment contains a forbidden character: {segment:?}"
        )));
    }
    Ok(())
}

/// The tree namespaces and the well-known paths inside them.
///
/// All record locations are built here so the layout of the tree is defined
/// in exactly one place: `users/{userId}`, `chats/{chatId}`,
/// `messages/{chatId}/{messageId}`, and the `emails/{emailKey}` lookup index.
pub mod paths {
    use super::{AppResult, TreePath};

    /// User directory namespace.
    pub const USERS: &str = "users";
    /// Chat record namespace.
    pub const CHATS: &str = "chats";
    /// Message log namespace.
    pub const MESSAGES: &str = "messages";
    /// Email lookup index namespace.
    pub const EMAILS: &str = "emails";

    /// The whole user directory.
    #[must_use]
    pub fn users_root() -> TreePath {
        TreePath::from_validated(vec![USERS.to_string()])
    }

    /// `users/{userId}`
    pub fn user(user_id: &str) -> AppResult<TreePath> {
        TreePath::new([USERS, user_id])
    }

    /// `users/{userId}/status`
    pub fn user_status(user_id: &str) -> AppResult<TreePath> {
        TreePath::new([USERS, user_id, "status"])
    }

    /// `users/{userId}/chat_ids`
    pub fn user_chat_ids(user_id: &str) -> AppResult<TreePath> {
        TreePath::new([USERS, user_id, "chat_ids"])
    }

    /// `users/{userId}/chat_ids/{chatId}`
    pub fn user_chat_id(user_id: &str, chat_id: &str) -> AppResult<TreePath> {
        TreePath::new([USERS, user_id, "chat_ids", chat_id])
    }

    /// `users/{userId}/friends/{friendId}`
    pub fn user_friend(user_id: &str, friend_id: &str) -> AppResult<TreePath> {
        TreePath::new([USERS, user_id, "friends", friend_id])
    }

    /// `users/{userId}/friendRequests/sentRequests/{targetId}`
    pub fn sent_request(user_id: &str, target_id: &str) -> AppResult<TreePath> {
        TreePath::new([USERS, user_id, "friendRequests", "sentRequests", target_id])
    }

    /// `users/{userId}/friendRequests/receivedRequests/{senderId}`
    pub fn received_request(user_id: &str, sender_id: &str) -> AppResult<TreePath> {
        TreePath::new([
            USERS,
            user_id,
            "friendRequests",
            "receivedRequests",
            sender_id,
        ])
    }

    /// `chats/{chatId}`
    pub fn chat(chat_id: &str) -> AppResult<TreePath> {
        TreePath::new([CHATS, chat_id])
    }

    /// A named field of `chats/{chatId}`.
    pub fn chat_field(chat_id: &str, field: &str) -> AppResult<TreePath> {
        TreePath::new([CHATS, chat_id, field])
    }

    /// `messages/{chatId}`
    pub fn chat_messages(chat_id: &str) -> AppResult<TreePath> {
        TreePath::new([MESSAGES, chat_id])
    }

    /// `messages/{chatId}/{messageId}`
    pub fn message(chat_id: &str, message_id: &str) -> AppResult<TreePath> {
        TreePath::new([MESSAGES, chat_id, message_id])
    }

    /// `emails/{emailKey}`, the registration-time lookup index.
    ///
    /// The key is the hex-encoded lowercase email, which sidesteps the
    /// forbidden key characters (`.`, `#`, …) that raw emails contain.
    #[must_use]
    pub fn email_index(email: &str) -> TreePath {
        let key = hex::encode(email.trim().to_lowercase());
        TreePath::from_validated(vec![EMAILS.to_string(), key])
    }
}
