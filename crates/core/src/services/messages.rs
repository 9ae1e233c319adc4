//! Message service.

use crate::services::fetch_chat;
use messenger_common::{AppError, AppResult};
use messenger_store::{
    EventKind, MessageRecord, MessageType, RecordStore, StoreEvent, Subscription, paths, time,
};
use serde_json::json;
use std::sync::Arc;

/// Message service: the append-only per-chat log and the denormalized chat
/// summary.
#[derive(Clone)]
pub struct MessageService {
    store: Arc<dyn RecordStore>,
}

impl MessageService {
    /// Create a new message service.
    #[must_use]
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Append a message and refresh the owning chat's `lastMessage` /
    /// `updatedAt` summary.
    ///
    /// Both the append and the summary paths are known at call time, so
    /// they go through one atomic update: the log and the summary cannot
    /// diverge.
    pub async fn send_message(
        &self,
        chat_id: &str,
        sender_id: &str,
        text: &str,
        media_url: Option<String>,
    ) -> AppResult<MessageRecord> {
        let chat = fetch_chat(self.store.as_ref(), chat_id).await?;
        if !chat.is_member(sender_id) {
            return Err(AppError::MessagingNotAllowed(format!(
                "user {sender_id} is not a member of chat {chat_id}"
            )));
        }
        if text.trim().is_empty() && media_url.is_none() {
            return Err(AppError::Validation(
                "message must have text or media".to_string(),
            ));
        }

        let record = MessageRecord {
            message_id: self.store.push_id(),
            sender_id: sender_id.to_string(),
            text: text.to_string(),
            message_type: MessageType::Text,
            media_url,
            created_at: time::now_seconds(),
        };

        self.store
            .multi_update(vec![
                (
                    paths::message(chat_id, &record.message_id)?,
                    record.to_value()?,
                ),
                (
                    paths::chat_field(chat_id, "lastMessage")?,
                    json!(record.text),
                ),
                (
                    paths::chat_field(chat_id, "updatedAt")?,
                    json!(record.created_at),
                ),
            ])
            .await?;

        tracing::debug!(chat_id, message_id = %record.message_id, "message sent");
        Ok(record)
    }

    /// All messages of a chat, `createdAt` ascending; equal timestamps
    /// resolve to id order, which extends the timestamp order because push
    /// ids are generation-ordered.
    pub async fn list_messages(&self, chat_id: &str) -> AppResult<Vec<MessageRecord>> {
        let value = self.store.get(&paths::chat_messages(chat_id)?).await?;
        let Some(entries) = value.as_ref().and_then(serde_json::Value::as_object) else {
            return Ok(Vec::new());
        };

        let mut messages = Vec::with_capacity(entries.len());
        for (message_id, value) in entries {
            messages.push(MessageRecord::from_value(message_id, value.clone())?);
        }
        messages.sort_by(|a, b| {
            a.created_at
                .total_cmp(&b.created_at)
                .then_with(|| a.message_id.cmp(&b.message_id))
        });
        Ok(messages)
    }

    /// Observe the tail of a chat: each newly appended message exactly once,
    /// in append order. History is not replayed; fetch it with
    /// [`list_messages`](Self::list_messages) first, then subscribe.
    pub async fn subscribe(&self, chat_id: &str) -> AppResult<MessageSubscription> {
        let subscription = self
            .store
            .subscribe(&paths::chat_messages(chat_id)?, EventKind::ChildAdded)
            .await?;
        Ok(MessageSubscription {
            store: self.store.clone(),
            subscription,
        })
    }
}

/// An open tail subscription on one chat's message log.
pub struct MessageSubscription {
    store: Arc<dyn RecordStore>,
    subscription: Subscription,
}

impl MessageSubscription {
    /// The next appended message, or `None` once the subscription is
    /// closed. A malformed record in the log surfaces as an error item.
    pub async fn next(&mut self) -> Option<AppResult<MessageRecord>> {
        loop {
            match self.subscription.recv().await? {
                StoreEvent::ChildAdded { key, value, .. } => {
                    return Some(MessageRecord::from_value(key, value));
                }
                StoreEvent::ValueChanged { .. } => {}
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::{env, register};

    #[tokio::test]
    async fn test_send_appends_and_refreshes_summary() {
        let env = env();
        let alice = register(&env, "Alice", "a@x.com").await;
        let bob = register(&env, "Bob", "b@x.com").await;
        let chat_id = env
            .chats
            .create_private_chat(&alice.user_id, &bob.user_id, "hello")
            .await
            .unwrap();

        let sent = env
            .messages
            .send_message(&chat_id, &alice.user_id, "hello", None)
            .await
            .unwrap();
        assert_eq!(sent.message_type, MessageType::Text);

        tokio::time::sleep(std::time::Duration::from_millis(3)).await;
        env.messages
            .send_message(&chat_id, &bob.user_id, "hi back", None)
            .await
            .unwrap();

        let chat = env.chats.get_chat(&chat_id).await.unwrap();
        assert_eq!(chat.last_message, "hi back");

        let messages = env.messages.list_messages(&chat_id).await.unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].text, "hello");
        assert_eq!(messages[1].text, "hi back");
        assert!(messages[0].created_at <= messages[1].created_at);
        assert_eq!(chat.updated_at, messages[1].created_at);
    }

    #[tokio::test]
    async fn test_sends_never_reorder_prior_messages() {
        let env = env();
        let alice = register(&env, "Alice", "a@x.com").await;
        let bob = register(&env, "Bob", "b@x.com").await;
        let chat_id = env
            .chats
            .create_private_chat(&alice.user_id, &bob.user_id, "hello")
            .await
            .unwrap();

        // Rapid-fire sends can share a millisecond; id order keeps them in
        // append order anyway.
        for i in 0..10 {
            env.messages
                .send_message(&chat_id, &alice.user_id, &format!("msg {i}"), None)
                .await
                .unwrap();
        }

        let texts: Vec<String> = env
            .messages
            .list_messages(&chat_id)
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.text)
            .collect();
        let expected: Vec<String> = (0..10).map(|i| format!("msg {i}")).collect();
        assert_eq!(texts, expected);
    }

    #[tokio::test]
    async fn test_non_member_cannot_send() {
        let env = env();
        let alice = register(&env, "Alice", "a@x.com").await;
        let bob = register(&env, "Bob", "b@x.com").await;
        let eve = register(&env, "Eve", "e@x.com").await;
        let chat_id = env
            .chats
            .create_private_chat(&alice.user_id, &bob.user_id, "hello")
            .await
            .unwrap();

        let err = env
            .messages
            .send_message(&chat_id, &eve.user_id, "let me in", None)
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "MESSAGING_NOT_ALLOWED");
        assert!(env.messages.list_messages(&chat_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_message_is_refused() {
        let env = env();
        let alice = register(&env, "Alice", "a@x.com").await;
        let bob = register(&env, "Bob", "b@x.com").await;
        let chat_id = env
            .chats
            .create_private_chat(&alice.user_id, &bob.user_id, "hello")
            .await
            .unwrap();

        let err = env
            .messages
            .send_message(&chat_id, &alice.user_id, "   ", None)
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "VALIDATION_ERROR");

        // Media without text is fine.
        env.messages
            .send_message(
                &chat_id,
                &alice.user_id,
                "",
                Some("https://cdn.example/p.jpg".to_string()),
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_unknown_chat_is_refused() {
        let env = env();
        let alice = register(&env, "Alice", "a@x.com").await;

        let err = env
            .messages
            .send_message("ghost", &alice.user_id, "hi", None)
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "CHAT_NOT_FOUND");
    }

    #[tokio::test]
    async fn test_subscription_delivers_tail_only_in_order() {
        let env = env();
        let alice = register(&env, "Alice", "a@x.com").await;
        let bob = register(&env, "Bob", "b@x.com").await;
        let chat_id = env
            .chats
            .create_private_chat(&alice.user_id, &bob.user_id, "hello")
            .await
            .unwrap();

        // History that must not be replayed.
        env.messages
            .send_message(&chat_id, &alice.user_id, "before", None)
            .await
            .unwrap();

        let mut sub = env.messages.subscribe(&chat_id).await.unwrap();

        env.messages
            .send_message(&chat_id, &alice.user_id, "first", None)
            .await
            .unwrap();
        env.messages
            .send_message(&chat_id, &bob.user_id, "second", None)
            .await
            .unwrap();

        let first = sub.next().await.unwrap().unwrap();
        let second = sub.next().await.unwrap().unwrap();
        assert_eq!(first.text, "first");
        assert_eq!(second.text, "second");
        assert_eq!(second.sender_id, bob.user_id);

        env.store.unsubscribe(sub.id()).await.unwrap();

        env.messages
            .send_message(&chat_id, &alice.user_id, "after", None)
            .await
            .unwrap();
        // Closed subscription: nothing further arrives.
        assert!(sub.next().await.is_none());
    }
}
