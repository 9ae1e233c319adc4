//! Subscription events delivered by the record store.

use crate::path::TreePath;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

/// Identifier of an open subscription, used to unsubscribe.
pub type SubscriptionId = u64;

/// The kind of change a subscription observes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// Snapshot of the subscribed subtree, delivered once on subscribe and
    /// again after every write that intersects it.
    ValueChanged,
    /// One event per new direct child of the subscribed path, in insertion
    /// order. Children that existed before the subscription are not replayed.
    ChildAdded,
}

/// A change notification.
#[derive(Debug, Clone)]
pub enum StoreEvent {
    /// The subtree at `path` now has this value (`None` once deleted).
    ValueChanged {
        /// The subscribed path.
        path: TreePath,
        /// Snapshot of the subtree, if it exists.
        value: Option<Value>,
    },
    /// A new child appeared directly under `path`.
    ChildAdded {
        /// The subscribed path.
        path: TreePath,
        /// The new child's key.
        key: String,
        /// The new child's value.
        value: Value,
    },
}

/// An open subscription: a handle plus the receiving end of its event
/// channel.
///
/// Dropping the subscription discards buffered events but does not detach it
/// from the store; call [`crate::RecordStore::unsubscribe`] with
/// [`Subscription::id`] to stop delivery.
#[derive(Debug)]
pub struct Subscription {
    id: SubscriptionId,
    path: TreePath,
    kind: EventKind,
    rx: mpsc::Receiver<StoreEvent>,
}

impl Subscription {
    pub(crate) const fn new(
        id: SubscriptionId,
        path: TreePath,
        kind: EventKind,
        rx: mpsc::Receiver<StoreEvent>,
    ) -> Self {
        Self { id, path, kind, rx }
    }

    /// The handle to pass to `unsubscribe`.
    #[must_use]
    pub const fn id(&self) -> SubscriptionId {
        self.id
    }

    /// The subscribed path.
    #[must_use]
    pub const fn path(&self) -> &TreePath {
        &self.path
    }

    /// The subscribed event kind.
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        self.kind
    }

    /// Receive the next event. Returns `None` once the subscription has been
    /// closed by `unsubscribe` or by slow-consumer eviction.
    pub async fn recv(&mut self) -> Option<StoreEvent> {
        self.rx.recv().await
    }

    /// Adapt the subscription into a [`tokio_stream::Stream`] of events.
    #[must_use]
    pub fn into_stream(self) -> ReceiverStream<StoreEvent> {
        ReceiverStream::new(self.rx)
    }
}
