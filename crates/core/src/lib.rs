//! Core business logic for messenger-rs.
//!
//! Four services over the record store (user directory, friend graph,
//! chats, messages) plus the identity provider contract they authenticate
//! against. Services are plain constructed objects holding an injected
//! store handle; there is no ambient global state.

pub mod identity;
pub mod services;

pub use identity::{IdentityProvider, MemoryIdentityProvider};
pub use services::chats::{ChatListSubscription, ChatService, CreateGroupInput};
pub use services::directory::{DirectoryService, RegisterInput, UpdateProfileInput};
pub use services::friends::{FriendGraphService, PendingFriendRequest};
pub use services::messages::{MessageService, MessageSubscription};
