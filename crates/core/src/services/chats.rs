//! Chat service.

use crate::services::{fetch_chat, fetch_user};
use futures::future::try_join_all;
use messenger_common::{AppError, AppResult};
use messenger_store::{
    ChatRecord, ChatType, EventKind, MessagingPolicy, RecordStore, StoreEvent, Subscription,
    UserRecord, paths, time,
};
use serde::Deserialize;
use serde_json::{Value, json};
use std::collections::BTreeSet;
use std::sync::Arc;
use validator::Validate;

/// Input for creating a group chat.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateGroupInput {
    /// Display name of the group.
    #[validate(length(min = 1, max = 128))]
    pub group_name: String,
    /// Members besides the owner; at least two distinct ids.
    pub member_ids: Vec<String>,
}

/// Chat service: private and group chat records plus each member's chat
/// index.
#[derive(Clone)]
pub struct ChatService {
    store: Arc<dyn RecordStore>,
}

impl ChatService {
    /// Create a new chat service.
    #[must_use]
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Create a private chat between two users.
    ///
    /// The recipient's `allowMessagesFrom` policy is enforced before any
    /// write, and an existing private chat between the exact pair is
    /// refused. The chat record and both membership index entries are one
    /// atomic update. The first message is not appended here: the caller
    /// follows up with the message service, and until it does the chat
    /// summary alone carries the text.
    pub async fn create_private_chat(
        &self,
        user_a: &str,
        user_b: &str,
        first_message_text: &str,
    ) -> AppResult<String> {
        if user_a == user_b {
            return Err(AppError::Validation(
                "cannot open a private chat with yourself".to_string(),
            ));
        }
        if first_message_text.trim().is_empty() {
            return Err(AppError::Validation(
                "first message must not be empty".to_string(),
            ));
        }

        let (creator, recipient) = tokio::try_join!(
            fetch_user(self.store.as_ref(), user_a),
            fetch_user(self.store.as_ref(), user_b)
        )?;

        match recipient.allow_messages_from {
            MessagingPolicy::Private => {
                return Err(AppError::MessagingNotAllowed(format!(
                    "user {user_b} does not accept new chats"
                )));
            }
            MessagingPolicy::Friends if !recipient.is_friend(user_a) => {
                return Err(AppError::MessagingNotAllowed(format!(
                    "user {user_b} only accepts chats from friends"
                )));
            }
            MessagingPolicy::Everyone | MessagingPolicy::Friends => {}
        }

        if self.find_private_chat(&creator, user_b).await?.is_some() {
            return Err(AppError::ChatExists(user_b.to_string()));
        }

        let chat_id = self.store.push_id();
        let record = ChatRecord::new_private(
            &chat_id,
            user_a,
            user_b,
            first_message_text,
            time::now_seconds(),
        );

        self.store
            .multi_update(vec![
                (paths::chat(&chat_id)?, record.to_value()?),
                (paths::user_chat_id(user_a, &chat_id)?, json!(true)),
                (paths::user_chat_id(user_b, &chat_id)?, json!(true)),
            ])
            .await?;

        tracing::info!(%chat_id, user_a, user_b, "private chat created");
        Ok(chat_id)
    }

    /// Create a group chat: the owner plus at least two further members.
    /// Every member's chat index entry is written in the same atomic update
    /// as the chat record.
    pub async fn create_group_chat(
        &self,
        owner_id: &str,
        input: CreateGroupInput,
    ) -> AppResult<String> {
        input.validate()?;

        let others: BTreeSet<String> = input
            .member_ids
            .iter()
            .filter(|id| id.as_str() != owner_id)
            .cloned()
            .collect();
        if others.len() < 2 {
            return Err(AppError::Validation(
                "a group needs at least two members besides the owner".to_string(),
            ));
        }

        // Every participant must exist before anything is written.
        let mut ids: Vec<&str> = others.iter().map(String::as_str).collect();
        ids.push(owner_id);
        try_join_all(ids.iter().map(|id| fetch_user(self.store.as_ref(), id))).await?;

        let chat_id = self.store.push_id();
        let member_ids: Vec<String> = others.into_iter().collect();
        let record = ChatRecord::new_group(
            &chat_id,
            owner_id,
            input.group_name.trim(),
            &member_ids,
            time::now_seconds(),
        );

        let mut updates = vec![(paths::chat(&chat_id)?, record.to_value()?)];
        for member_id in record.member_ids() {
            updates.push((paths::user_chat_id(&member_id, &chat_id)?, json!(true)));
        }
        self.store.multi_update(updates).await?;

        tracing::info!(%chat_id, owner_id, members = member_ids.len() + 1, "group chat created");
        Ok(chat_id)
    }

    /// Resolve a user's chats, optionally filtered by type, sorted by
    /// `updatedAt` descending (ties broken by id descending). The ordering
    /// is a presentation contract: the most recently active chat comes
    /// first.
    pub async fn list_chats(
        &self,
        user_id: &str,
        filter: Option<ChatType>,
    ) -> AppResult<Vec<ChatRecord>> {
        let record = fetch_user(self.store.as_ref(), user_id).await?;
        let ids = record.chat_ids();
        let chats =
            try_join_all(ids.iter().map(|id| fetch_chat(self.store.as_ref(), id))).await?;

        let mut chats: Vec<ChatRecord> = chats
            .into_iter()
            .filter(|chat| filter.is_none_or(|wanted| chat.chat_type == wanted))
            .collect();
        chats.sort_by(|a, b| {
            b.updated_at
                .total_cmp(&a.updated_at)
                .then_with(|| b.chat_id.cmp(&a.chat_id))
        });
        Ok(chats)
    }

    /// Fetch a single chat record.
    pub async fn get_chat(&self, chat_id: &str) -> AppResult<ChatRecord> {
        fetch_chat(self.store.as_ref(), chat_id).await
    }

    /// The existing private chat between the exact pair, if any. Callers
    /// use this to reuse a thread instead of opening a duplicate.
    pub async fn chat_between(
        &self,
        user_a: &str,
        user_b: &str,
    ) -> AppResult<Option<ChatRecord>> {
        let record = fetch_user(self.store.as_ref(), user_a).await?;
        self.find_private_chat(&record, user_b).await
    }

    /// Observe a user's chat index: an event per change (and one initial
    /// snapshot) carrying the current set of chat ids.
    pub async fn subscribe_chat_list(&self, user_id: &str) -> AppResult<ChatListSubscription> {
        let subscription = self
            .store
            .subscribe(&paths::user_chat_ids(user_id)?, EventKind::ValueChanged)
            .await?;
        Ok(ChatListSubscription {
            store: self.store.clone(),
            subscription,
        })
    }

    async fn find_private_chat(
        &self,
        owner: &UserRecord,
        other_id: &str,
    ) -> AppResult<Option<ChatRecord>> {
        let ids = owner.chat_ids();
        let chats =
            try_join_all(ids.iter().map(|id| fetch_chat(self.store.as_ref(), id))).await?;
        Ok(chats
            .into_iter()
            .find(|chat| chat.chat_type == ChatType::Private && chat.is_member(other_id)))
    }
}

/// An open chat-list subscription. Each event is the current set of chat
/// ids; resolve them with [`ChatService::get_chat`] as needed.
pub struct ChatListSubscription {
    store: Arc<dyn RecordStore>,
    subscription: Subscription,
}

impl ChatListSubscription {
    /// The next chat-id set, or `None` once the subscription is closed.
    pub async fn next(&mut self) -> Option<Vec<String>> {
        loop {
            match self.subscription.recv().await? {
                StoreEvent::ValueChanged { value, .. } => {
                    let ids = value
                        .as_ref()
                        .and_then(Value::as_object)
                        .map(|entries| entries.keys().cloned().collect())
                        .unwrap_or_default();
                    return Some(ids);
                }
                StoreEvent::ChildAdded { .. } => {}
            }
        }
    }

    /// The store handle for this subscription.
    #[must_use]
    pub const fn id(&self) -> messenger_store::SubscriptionId {
        self.subscription.id()
    }

    /// Stop delivery.
    pub async fn unsubscribe(self) -> AppResult<()> {
        self.store.unsubscribe(self.subscription.id()).await
    }
}
