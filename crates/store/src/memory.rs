//! In-memory reference implementation of the record store.

use crate::event::{EventKind, StoreEvent, Subscription, SubscriptionId};
use crate::path::TreePath;
use crate::store::RecordStore;
use async_trait::async_trait;
use messenger_common::config::StoreConfig;
use messenger_common::{AppResult, IdGenerator};
use serde_json::{Map, Value};
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{RwLock, mpsc};

/// A [`RecordStore`] holding the whole tree in process memory.
///
/// All writes (including multi-path updates) are applied under one write
/// lock, so atomicity is strict: concurrent readers observe either none or
/// all paths of an update. Matching the hosted stores this mirrors, empty
/// objects do not exist: writing `{}` (or deleting the last child of a node)
/// removes the node itself.
pub struct MemoryStore {
    state: RwLock<State>,
    id_gen: IdGenerator,
    event_capacity: usize,
    next_sub_id: AtomicU64,
}

#[derive(Default)]
struct State {
    tree: Map<String, Value>,
    subscribers: HashMap<SubscriptionId, Subscriber>,
}

struct Subscriber {
    path: TreePath,
    kind: EventKind,
    tx: mpsc::Sender<StoreEvent>,
    seen_children: BTreeSet<String>,
}

impl MemoryStore {
    /// Create a store with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(&StoreConfig::default())
    }

    /// Create a store with the given settings.
    #[must_use]
    pub fn with_config(config: &StoreConfig) -> Self {
        Self {
            state: RwLock::new(State::default()),
            id_gen: IdGenerator::new(),
            event_capacity: config.event_capacity.max(1),
            next_sub_id: AtomicU64::new(1),
        }
    }

    async fn apply(&self, updates: Vec<(TreePath, Value)>) -> AppResult<()> {
        let mut state = self.state.write().await;
        let State { tree, subscribers } = &mut *state;

        for (path, value) in &updates {
            match normalized(value.clone()) {
                Some(value) => write_at(tree, path.segments(), value),
                None => remove_at(tree, path.segments()),
            }
        }

        let mut dead = Vec::new();
        for (id, sub) in subscribers.iter_mut() {
            let relevant = updates
                .iter()
                .any(|(p, _)| p.starts_with(&sub.path) || sub.path.starts_with(p));
            if !relevant {
                continue;
            }
            for event in sub.collect_events(tree) {
                match sub.tx.try_send(event) {
                    Ok(()) => {}
                    Err(TrySendError::Full(_)) => {
                        tracing::warn!(
                            subscription = *id,
                            path = %sub.path,
                            "subscriber buffer full, dropping subscription"
                        );
                        dead.push(*id);
                        break;
                    }
                    Err(TrySendError::Closed(_)) => {
                        dead.push(*id);
                        break;
                    }
                }
            }
        }
        for id in dead {
            subscribers.remove(&id);
        }
        Ok(())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Subscriber {
    fn collect_events(&mut self, tree: &Map<String, Value>) -> Vec<StoreEvent> {
        match self.kind {
            EventKind::ValueChanged => vec![StoreEvent::ValueChanged {
                path: self.path.clone(),
                value: node_at(tree, self.path.segments()).cloned(),
            }],
            EventKind::ChildAdded => {
                let children = child_map(tree, &self.path);
                let current: BTreeSet<String> = children.keys().cloned().collect();
                let events = current
                    .difference(&self.seen_children)
                    .filter_map(|key| {
                        children.get(key).map(|value| StoreEvent::ChildAdded {
                            path: self.path.clone(),
                            key: key.clone(),
                            value: value.clone(),
                        })
                    })
                    .collect();
                self.seen_children = current;
                events
            }
        }
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn get(&self, path: &TreePath) -> AppResult<Option<Value>> {
        let state = self.state.read().await;
        Ok(node_at(&state.tree, path.segments()).cloned())
    }

    async fn set(&self, path: &TreePath, value: Value) -> AppResult<()> {
        self.apply(vec![(path.clone(), value)]).await
    }

    async fn update(&self, path: &TreePath, fields: Map<String, Value>) -> AppResult<()> {
        let mut updates = Vec::with_capacity(fields.len());
        for (key, value) in fields {
            updates.push((path.child(&key)?, value));
        }
        self.apply(updates).await
    }

    async fn multi_update(&self, updates: Vec<(TreePath, Value)>) -> AppResult<()> {
        self.apply(updates).await
    }

    async fn remove(&self, path: &TreePath) -> AppResult<()> {
        self.apply(vec![(path.clone(), Value::Null)]).await
    }

    fn push_id(&self) -> String {
        self.id_gen.generate()
    }

    async fn subscribe(&self, path: &TreePath, kind: EventKind) -> AppResult<Subscription> {
        let mut state = self.state.write().await;
        let id = self.next_sub_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(self.event_capacity);

        let seen_children = match kind {
            EventKind::ValueChanged => {
                // Initial snapshot; the channel is empty so this cannot fail.
                let _ = tx.try_send(StoreEvent::ValueChanged {
                    path: path.clone(),
                    value: node_at(&state.tree, path.segments()).cloned(),
                });
                BTreeSet::new()
            }
            // Children present at subscribe time are never replayed.
            EventKind::ChildAdded => child_map(&state.tree, path).keys().cloned().collect(),
        };

        state.subscribers.insert(
            id,
            Subscriber {
                path: path.clone(),
                kind,
                tx,
                seen_children,
            },
        );
        tracing::debug!(subscription = id, path = %path, ?kind, "subscription opened");
        Ok(Subscription::new(id, path.clone(), kind, rx))
    }

    async fn unsubscribe(&self, id: SubscriptionId) -> AppResult<()> {
        let mut state = self.state.write().await;
        if state.subscribers.remove(&id).is_some() {
            tracing::debug!(subscription = id, "subscription closed");
        }
        Ok(())
    }
}

// === Tree navigation ===

fn node_at<'a>(root: &'a Map<String, Value>, segments: &[String]) -> Option<&'a Value> {
    let (first, rest) = segments.split_first()?;
    let mut current = root.get(first)?;
    for segment in rest {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

fn child_map(root: &Map<String, Value>, path: &TreePath) -> Map<String, Value> {
    node_at(root, path.segments())
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default()
}

/// Strip nulls and empty objects; `None` means "this location is deleted".
fn normalized(value: Value) -> Option<Value> {
    match value {
        Value::Null => None,
        Value::Object(map) => {
            let cleaned: Map<String, Value> = map
                .into_iter()
                .filter_map(|(key, value)| normalized(value).map(|value| (key, value)))
                .collect();
            if cleaned.is_empty() {
                None
            } else {
                Some(Value::Object(cleaned))
            }
        }
        other => Some(other),
    }
}

fn write_at(node: &mut Map<String, Value>, segments: &[String], value: Value) {
    let Some((head, rest)) = segments.split_first() else {
        return;
    };
    if rest.is_empty() {
        node.insert(head.clone(), value);
        return;
    }
    let child = node
        .entry(head.clone())
        .or_insert_with(|| Value::Object(Map::new()));
    if !child.is_object() {
        *child = Value::Object(Map::new());
    }
    if let Some(object) = child.as_object_mut() {
        write_at(object, rest, value);
    }
}

fn remove_at(node: &mut Map<String, Value>, segments: &[String]) {
    let Some((head, rest)) = segments.split_first() else {
        return;
    };
    if rest.is_empty() {
        node.remove(head);
        return;
    }
    let now_empty = match node.get_mut(head).and_then(Value::as_object_mut) {
        Some(child) => {
            remove_at(child, rest);
            child.is_empty()
        }
        None => false,
    };
    if now_empty {
        node.remove(head);
    }
}
