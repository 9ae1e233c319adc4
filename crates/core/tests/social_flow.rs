//! End-to-end flows across the services: registration, the friend
//! handshake, chat creation, and realtime messaging, all against the
//! in-memory store and identity provider.

use chrono::NaiveDate;
use messenger_common::Config;
use messenger_core::{
    ChatService, CreateGroupInput, DirectoryService, FriendGraphService, MemoryIdentityProvider,
    MessageService, RegisterInput,
};
use messenger_store::{ChatType, Gender, MemoryStore, UserRecord};
use std::sync::Arc;

struct App {
    directory: DirectoryService,
    friends: FriendGraphService,
    chats: ChatService,
    messages: MessageService,
}

fn app() -> App {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
    let config = Config::default();
    let store = Arc::new(MemoryStore::with_config(&config.store));
    let identity = Arc::new(MemoryIdentityProvider::new(config.identity.clone()));
    App {
        directory: DirectoryService::new(store.clone(), identity, &config.directory),
        friends: FriendGraphService::new(store.clone()),
        chats: ChatService::new(store.clone()),
        messages: MessageService::new(store),
    }
}

async fn register(app: &App, name: &str, email: &str) -> UserRecord {
    app.directory
        .register(RegisterInput {
            user_name: name.to_string(),
            email: email.to_string(),
            password: "correct-horse".to_string(),
            gender: Gender::Male,
            dob: NaiveDate::from_ymd_opt(1998, 7, 21).unwrap(),
        })
        .await
        .unwrap()
}

#[tokio::test]
async fn registration_to_first_chat() {
    let app = app();
    let alice = register(&app, "Alice", "a@x.com").await;
    let bob = register(&app, "Bob", "b@x.com").await;

    // Alice finds Bob by email and they become friends.
    let found = app.directory.lookup_by_email("b@x.com").await.unwrap();
    assert_eq!(found.user_id, bob.user_id);

    app.friends
        .send_request(&alice.user_id, &bob.user_id)
        .await
        .unwrap();
    app.friends
        .accept_request(&bob.user_id, &alice.user_id)
        .await
        .unwrap();

    // First contact: chat plus first message.
    let chat_id = app
        .chats
        .create_private_chat(&alice.user_id, &bob.user_id, "hello")
        .await
        .unwrap();
    app.messages
        .send_message(&chat_id, &alice.user_id, "hello", None)
        .await
        .unwrap();

    let private = app
        .chats
        .list_chats(&alice.user_id, Some(ChatType::Private))
        .await
        .unwrap();
    assert_eq!(private.len(), 1);
    assert_eq!(private[0].chat_id, chat_id);
    assert_eq!(private[0].last_message, "hello");

    // Bob sees the same thread from his side.
    let bobs = app
        .chats
        .list_chats(&bob.user_id, Some(ChatType::Private))
        .await
        .unwrap();
    assert_eq!(bobs.len(), 1);
    assert_eq!(bobs[0].chat_id, chat_id);
}

#[tokio::test]
async fn group_creation_minimum_size() {
    let app = app();
    let owner = register(&app, "Owner", "o@x.com").await;
    let m1 = register(&app, "M1", "m1@x.com").await;
    let m2 = register(&app, "M2", "m2@x.com").await;

    let too_small = app
        .chats
        .create_group_chat(
            &owner.user_id,
            CreateGroupInput {
                group_name: "Team".to_string(),
                member_ids: vec![m1.user_id.clone()],
            },
        )
        .await
        .unwrap_err();
    assert_eq!(too_small.error_code(), "VALIDATION_ERROR");

    let chat_id = app
        .chats
        .create_group_chat(
            &owner.user_id,
            CreateGroupInput {
                group_name: "Team".to_string(),
                member_ids: vec![m1.user_id.clone(), m2.user_id.clone()],
            },
        )
        .await
        .unwrap();

    let chat = app.chats.get_chat(&chat_id).await.unwrap();
    let info = chat.group_info.unwrap();
    assert_eq!(info.roles.owners.keys().collect::<Vec<_>>(), vec![&owner.user_id]);
    assert_eq!(info.roles.members.len(), 2);
    assert!(info.roles.members.contains_key(&m1.user_id));
    assert!(info.roles.members.contains_key(&m2.user_id));
}

#[tokio::test]
async fn history_then_tail() {
    let app = app();
    let alice = register(&app, "Alice", "a@x.com").await;
    let bob = register(&app, "Bob", "b@x.com").await;

    let chat_id = app
        .chats
        .create_private_chat(&alice.user_id, &bob.user_id, "hello")
        .await
        .unwrap();
    app.messages
        .send_message(&chat_id, &alice.user_id, "hello", None)
        .await
        .unwrap();

    // The reader pattern: fetch history, then subscribe for the tail.
    let history = app.messages.list_messages(&chat_id).await.unwrap();
    assert_eq!(history.len(), 1);

    let mut tail = app.messages.subscribe(&chat_id).await.unwrap();
    app.messages
        .send_message(&chat_id, &bob.user_id, "hey!", None)
        .await
        .unwrap();

    let incoming = tail.next().await.unwrap().unwrap();
    assert_eq!(incoming.text, "hey!");
    assert_eq!(incoming.sender_id, bob.user_id);
    tail.unsubscribe().await.unwrap();

    // The summary tracked the tail message.
    let chat = app.chats.get_chat(&chat_id).await.unwrap();
    assert_eq!(chat.last_message, "hey!");
}
