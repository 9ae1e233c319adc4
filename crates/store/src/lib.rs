//! Record store layer for messenger-rs.
//!
//! The record store is the single source of truth: a hierarchical key-value
//! tree holding every user, chat, and message record, addressed by
//! [`TreePath`] and observed through path-scoped subscriptions. This crate
//! defines the store contract ([`RecordStore`]), the path namespace
//! ([`paths`]), the typed wire records ([`records`]), and an in-memory
//! reference implementation ([`MemoryStore`]).

pub mod event;
pub mod memory;
pub mod path;
pub mod records;
pub mod store;
pub mod time;

pub use event::{EventKind, StoreEvent, Subscription, SubscriptionId};
pub use memory::MemoryStore;
pub use path::{TreePath, paths};
pub use records::{
    ChatRecord, ChatType, FriendRequests, Gender, GroupInfo, GroupRoles, GroupSettings,
    MessageRecord, MessageType, MessagingPolicy, PendingMember, PresenceStatus, ReceivedRequest,
    RequestStatus, SentRequest, UserRecord, UserStatus,
};
pub use store::RecordStore;
