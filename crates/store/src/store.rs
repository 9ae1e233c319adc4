//! The record store contract.

use crate::event::{EventKind, Subscription, SubscriptionId};
use crate::path::TreePath;
use async_trait::async_trait;
use messenger_common::AppResult;
use serde_json::{Map, Value};

/// The hierarchical key-value store every service is built on.
///
/// Semantics follow the hosted document-tree databases this models:
///
/// - Values are JSON trees; interior nodes are objects keyed by segment.
/// - Writing `Value::Null` anywhere (via [`set`](Self::set), an
///   [`update`](Self::update) field, or a [`multi_update`](Self::multi_update)
///   entry) deletes that location. Emptied interior nodes cease to exist.
/// - [`multi_update`](Self::multi_update) applies all of its absolute-path
///   writes together: a concurrent reader observes either none or all of
///   them.
/// - Single-shot reads are not cancellable once issued; callers discard the
///   result instead.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Read the subtree at `path`, if present.
    async fn get(&self, path: &TreePath) -> AppResult<Option<Value>>;

    /// Replace the subtree at `path` with `value`.
    async fn set(&self, path: &TreePath, value: Value) -> AppResult<()>;

    /// Merge named children into the node at `path`, leaving siblings
    /// untouched. A `Value::Null` field deletes that child.
    async fn update(&self, path: &TreePath, fields: Map<String, Value>) -> AppResult<()>;

    /// Apply a map of absolute paths to values atomically.
    async fn multi_update(&self, updates: Vec<(TreePath, Value)>) -> AppResult<()>;

    /// Delete the subtree at `path`.
    async fn remove(&self, path: &TreePath) -> AppResult<()>;

    /// Allocate a generated key: globally unique and lexicographically
    /// roughly time-ordered, suitable as a chat or message identifier.
    fn push_id(&self) -> String;

    /// Open a continuous subscription at `path`.
    ///
    /// `ValueChanged` subscriptions receive an initial snapshot event;
    /// `ChildAdded` subscriptions receive only children added after the
    /// subscription was opened.
    async fn subscribe(&self, path: &TreePath, kind: EventKind) -> AppResult<Subscription>;

    /// Stop delivery for a subscription handle. Unknown handles are a no-op.
    async fn unsubscribe(&self, id: SubscriptionId) -> AppResult<()>;
}
