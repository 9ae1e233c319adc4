//! Error types for messenger-rs.

use thiserror::Error;

/// Application result type.
pub type AppResult<T> = Result<T, AppError>;

/// Application error type.
///
/// Every service operation returns one of these; the variant is the
/// user-distinguishable kind, the payload is for logging. Raw store error
/// strings only ever appear inside the [`AppError::Store`] payload and are
/// never a user-facing code.
#[derive(Debug, Error)]
pub enum AppError {
    // === Authentication / identity ===
    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Identity error: {0}")]
    Identity(String),

    // === Input ===
    #[error("Validation error: {0}")]
    Validation(String),

    // === Policy ===
    #[error("Messaging not allowed: {0}")]
    MessagingNotAllowed(String),

    #[error("Already friends with user {0}")]
    AlreadyFriends(String),

    #[error("A friend request is already pending between {0} and {1}")]
    DuplicateRequest(String, String),

    #[error("No pending friend request from {0}")]
    NoSuchRequest(String),

    #[error("A private chat with user {0} already exists")]
    ChatExists(String),

    // === Lookup ===
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("Chat not found: {0}")]
    ChatNotFound(String),

    // === Infrastructure ===
    #[error("Store error: {0}")]
    Store(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Returns the stable error code for this error.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::Auth(_) => "AUTH_ERROR",
            Self::Identity(_) => "IDENTITY_ERROR",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::MessagingNotAllowed(_) => "MESSAGING_NOT_ALLOWED",
            Self::AlreadyFriends(_) => "ALREADY_FRIENDS",
            Self::DuplicateRequest(_, _) => "DUPLICATE_REQUEST",
            Self::NoSuchRequest(_) => "NO_SUCH_REQUEST",
            Self::ChatExists(_) => "CHAT_EXISTS",
            Self::NotFound(_) => "NOT_FOUND",
            Self::UserNotFound(_) => "USER_NOT_FOUND",
            Self::ChatNotFound(_) => "CHAT_NOT_FOUND",
            Self::Store(_) => "STORE_ERROR",
            Self::Config(_) => "CONFIG_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Returns whether the caller may retry the failed operation verbatim.
    ///
    /// Only store I/O failures are retryable; no automatic retry is built
    /// into the services.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Store(_))
    }

    /// Returns whether this error should be logged at error level.
    #[must_use]
    pub const fn is_server_error(&self) -> bool {
        matches!(self, Self::Store(_) | Self::Config(_) | Self::Internal(_))
    }
}

// === From implementations ===

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        Self::Validation(err.to_string())
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::Validation(format!("record decode failed: {err}"))
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}
