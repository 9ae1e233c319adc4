//! Business logic services.

pub mod chats;
pub mod directory;
pub mod friends;
pub mod messages;

use messenger_common::{AppError, AppResult};
use messenger_store::{ChatRecord, RecordStore, UserRecord, paths};

pub(crate) async fn fetch_user(store: &dyn RecordStore, user_id: &str) -> AppResult<UserRecord> {
    let value = store
        .get(&paths::user(user_id)?)
        .await?
        .ok_or_else(|| AppError::UserNotFound(user_id.to_string()))?;
    UserRecord::from_value(user_id, value)
}

pub(crate) async fn fetch_chat(store: &dyn RecordStore, chat_id: &str) -> AppResult<ChatRecord> {
    let value = store
        .get(&paths::chat(chat_id)?)
        .await?
        .ok_or_else(|| AppError::ChatNotFound(chat_id.to_string()))?;
    ChatRecord::from_value(chat_id, value)
}

#[cfg(test)]
pub(crate) mod testing {
    //! Shared fixtures for service tests: a fresh in-memory store and
    //! provider with every service wired to them.

    use crate::identity::MemoryIdentityProvider;
    use crate::services::chats::ChatService;
    use crate::services::directory::{DirectoryService, RegisterInput};
    use crate::services::friends::FriendGraphService;
    use crate::services::messages::MessageService;
    use chrono::NaiveDate;
    use messenger_common::Config;
    use messenger_store::{Gender, MemoryStore, UserRecord};
    use std::sync::Arc;

    pub struct TestEnv {
        pub store: Arc<MemoryStore>,
        pub identity: Arc<MemoryIdentityProvider>,
        pub directory: DirectoryService,
        pub friends: FriendGraphService,
        pub chats: ChatService,
        pub messages: MessageService,
    }

    pub fn env() -> TestEnv {
        let config = Config::default();
        let store = Arc::new(MemoryStore::with_config(&config.store));
        let identity = Arc::new(MemoryIdentityProvider::new(config.identity.clone()));
        let directory = DirectoryService::new(
            store.clone(),
            identity.clone(),
            &config.directory,
        );
        TestEnv {
            friends: FriendGraphService::new(store.clone()),
            chats: ChatService::new(store.clone()),
            messages: MessageService::new(store.clone()),
            store,
            identity,
            directory,
        }
    }

    pub async fn register(env: &TestEnv, name: &str, email: &str) -> UserRecord {
        env.directory
            .register(RegisterInput {
                user_name: name.to_string(),
                email: email.to_string(),
                password: "correct-horse".to_string(),
                gender: Gender::Female,
                dob: NaiveDate::from_ymd_opt(2000, 1, 1).unwrap(),
            })
            .await
            .unwrap()
    }
}
