//! User directory service.

use crate::identity::IdentityProvider;
use crate::services::fetch_user;
use chrono::NaiveDate;
use messenger_common::config::DirectoryConfig;
use messenger_common::{AppError, AppResult};
use messenger_store::{
    Gender, MessagingPolicy, RecordStore, UserRecord, UserStatus, paths,
};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use validator::Validate;

/// Input for registering a user.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterInput {
    /// Display name.
    #[validate(length(min = 1, max = 64))]
    pub user_name: String,
    /// Registration email.
    #[validate(email)]
    pub email: String,
    /// Plain password, handed to the identity provider only.
    #[validate(length(min = 1))]
    pub password: String,
    /// Gender code.
    pub gender: Gender,
    /// Date of birth.
    pub dob: NaiveDate,
}

/// Partial update of the mutable profile attributes. Identity fields
/// (id, email) are immutable.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileInput {
    /// New display name.
    #[validate(length(min = 1, max = 64))]
    pub user_name: Option<String>,
    /// New bio.
    #[validate(length(max = 1024))]
    pub bio: Option<String>,
    /// New gender code.
    pub gender: Option<Gender>,
    /// New date of birth.
    pub dob: Option<NaiveDate>,
    /// New unsolicited-chat policy.
    pub allow_messages_from: Option<MessagingPolicy>,
}

/// User directory service: registration, sessions, profile lookup.
#[derive(Clone)]
pub struct DirectoryService {
    store: Arc<dyn RecordStore>,
    identity: Arc<dyn IdentityProvider>,
    search_limit: usize,
}

impl DirectoryService {
    /// Create a new directory service.
    #[must_use]
    pub fn new(
        store: Arc<dyn RecordStore>,
        identity: Arc<dyn IdentityProvider>,
        config: &DirectoryConfig,
    ) -> Self {
        Self {
            store,
            identity,
            search_limit: config.search_limit,
        }
    }

    /// Register a new user: create the identity, then write the directory
    /// record and the email index entry together.
    ///
    /// If the record write fails after the identity was created, the
    /// identity is orphaned until a retried registration for the same email
    /// is rejected by the provider. This is the accepted consistency window of the
    /// two external systems.
    pub async fn register(&self, input: RegisterInput) -> AppResult<UserRecord> {
        input.validate()?;
        let email = input.email.trim().to_lowercase();

        let email_path = paths::email_index(&email);
        if self.store.get(&email_path).await?.is_some() {
            return Err(AppError::Identity(format!(
                "email already registered: {email}"
            )));
        }

        let user_id = self.identity.sign_up(&email, &input.password).await?;
        let record = UserRecord::new(
            &user_id,
            input.user_name.trim(),
            &email,
            input.gender,
            input.dob,
        );

        self.store
            .multi_update(vec![
                (paths::user(&user_id)?, record.to_value()?),
                (email_path, Value::String(user_id.clone())),
            ])
            .await?;

        tracing::info!(%user_id, "user registered");
        Ok(record)
    }

    /// Authenticate and mark the user online.
    pub async fn login(&self, email: &str, password: &str) -> AppResult<UserRecord> {
        let user_id = self
            .identity
            .sign_in(email.trim().to_lowercase().as_str(), password)
            .await?;
        let mut record = fetch_user(self.store.as_ref(), &user_id).await?;
        record.status = UserStatus::online_now();
        self.write_status(&user_id, record.status).await?;
        tracing::info!(%user_id, "user logged in");
        Ok(record)
    }

    /// Authenticate via a provider-verified OAuth token and mark the user
    /// online.
    pub async fn login_with_token(&self, id_token: &str) -> AppResult<UserRecord> {
        let user_id = self.identity.sign_in_with_token(id_token).await?;
        let mut record = fetch_user(self.store.as_ref(), &user_id).await?;
        record.status = UserStatus::online_now();
        self.write_status(&user_id, record.status).await?;
        tracing::info!(%user_id, "user logged in via token");
        Ok(record)
    }

    /// Mark the user offline and end the provider session.
    pub async fn logout(&self, user_id: &str) -> AppResult<()> {
        fetch_user(self.store.as_ref(), user_id).await?;
        self.write_status(user_id, UserStatus::offline_now()).await?;
        self.identity.sign_out().await?;
        tracing::info!(user_id, "user logged out");
        Ok(())
    }

    /// Look up a user by email, case-insensitively, via the registration
    /// index.
    pub async fn lookup_by_email(&self, email: &str) -> AppResult<UserRecord> {
        let email = email.trim().to_lowercase();
        let value = self
            .store
            .get(&paths::email_index(&email))
            .await?
            .ok_or_else(|| AppError::NotFound(format!("no user registered with {email}")))?;
        let user_id = value
            .as_str()
            .ok_or_else(|| AppError::Internal(format!("email index entry for {email} is not an id")))?;
        fetch_user(self.store.as_ref(), user_id).await
    }

    /// Case-insensitive substring search over display names, excluding the
    /// requester. Scans the directory; results are name-sorted and capped.
    pub async fn search_by_name(
        &self,
        query: &str,
        requester_id: &str,
    ) -> AppResult<Vec<UserRecord>> {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return Ok(Vec::new());
        }

        let tree = self.store.get(&paths::users_root()).await?;
        let Some(records) = tree.as_ref().and_then(Value::as_object) else {
            return Ok(Vec::new());
        };

        let mut matches = Vec::new();
        for (user_id, value) in records {
            if user_id.as_str() == requester_id {
                continue;
            }
            let record = UserRecord::from_value(user_id, value.clone())?;
            if record.user_name.to_lowercase().contains(&query) {
                matches.push(record);
            }
        }
        matches.sort_by(|a, b| {
            a.user_name
                .cmp(&b.user_name)
                .then_with(|| a.user_id.cmp(&b.user_id))
        });
        matches.truncate(self.search_limit);
        Ok(matches)
    }

    /// Fetch a user record by id.
    pub async fn get_user(&self, user_id: &str) -> AppResult<UserRecord> {
        fetch_user(self.store.as_ref(), user_id).await
    }

    /// Apply a partial update to the mutable profile attributes.
    pub async fn update_profile(
        &self,
        user_id: &str,
        input: UpdateProfileInput,
    ) -> AppResult<()> {
        input.validate()?;
        fetch_user(self.store.as_ref(), user_id).await?;

        let mut fields = Map::new();
        if let Some(user_name) = input.user_name {
            fields.insert("user_name".to_string(), Value::String(user_name));
        }
        if let Some(bio) = input.bio {
            fields.insert("bio".to_string(), Value::String(bio));
        }
        if let Some(gender) = input.gender {
            fields.insert("gender_id".to_string(), to_wire(gender)?);
        }
        if let Some(dob) = input.dob {
            fields.insert("dob".to_string(), to_wire(dob)?);
        }
        if let Some(policy) = input.allow_messages_from {
            fields.insert("allowMessagesFrom".to_string(), to_wire(policy)?);
        }
        if fields.is_empty() {
            return Ok(());
        }

        self.store.update(&paths::user(user_id)?, fields).await?;
        tracing::debug!(user_id, "profile updated");
        Ok(())
    }

    async fn write_status(&self, user_id: &str, status: UserStatus) -> AppResult<()> {
        let value = to_wire(status)?;
        let fields = value
            .as_object()
            .cloned()
            .ok_or_else(|| AppError::Internal("status did not encode to an object".to_string()))?;
        self.store
            .update(&paths::user_status(user_id)?, fields)
            .await
    }
}

fn to_wire<T: serde::Serialize>(value: T) -> AppResult<Value> {
    serde_json::to_value(value).map_err(|e| AppError::Internal(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::{env, register};
    use messenger_store::PresenceStatus;

    #[tokio::test]
    async fn test_register_writes_fresh_record() {
        let env = env();
        let alice = register(&env, "Alice", "a@x.com").await;

        assert_eq!(alice.user_name, "Alice");
        assert_eq!(alice.email, "a@x.com");
        assert!(alice.friends.is_empty());
        assert!(alice.chat_ids.is_empty());
        assert_eq!(alice.allow_messages_from, MessagingPolicy::Everyone);
        assert_eq!(alice.status.status, PresenceStatus::Online);

        let stored = env.directory.get_user(&alice.user_id).await.unwrap();
        assert_eq!(stored, alice);
    }

    #[tokio::test]
    async fn test_register_rejects_duplicate_email() {
        let env = env();
        register(&env, "Alice", "a@x.com").await;

        let err = env
            .directory
            .register(RegisterInput {
                user_name: "Impostor".to_string(),
                email: "A@x.com".to_string(),
                password: "correct-horse".to_string(),
                gender: Gender::Male,
                dob: NaiveDate::from_ymd_opt(1990, 6, 15).unwrap(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "IDENTITY_ERROR");
    }

    #[tokio::test]
    async fn test_register_rejects_malformed_input() {
        let env = env();
        let err = env
            .directory
            .register(RegisterInput {
                user_name: String::new(),
                email: "not-an-email".to_string(),
                password: "correct-horse".to_string(),
                gender: Gender::Male,
                dob: NaiveDate::from_ymd_opt(1990, 6, 15).unwrap(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_login_flips_presence_and_rejects_bad_credentials() {
        let env = env();
        let alice = register(&env, "Alice", "a@x.com").await;
        env.directory.logout(&alice.user_id).await.unwrap();

        let offline = env.directory.get_user(&alice.user_id).await.unwrap();
        assert_eq!(offline.status.status, PresenceStatus::Offline);

        let back = env.directory.login("a@x.com", "correct-horse").await.unwrap();
        assert_eq!(back.status.status, PresenceStatus::Online);

        let err = env
            .directory
            .login("a@x.com", "wrong-password")
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "AUTH_ERROR");
    }

    #[tokio::test]
    async fn test_lookup_by_email_is_case_insensitive() {
        let env = env();
        let alice = register(&env, "Alice", "a@x.com").await;

        let found = env.directory.lookup_by_email("A@X.COM").await.unwrap();
        assert_eq!(found.user_id, alice.user_id);

        let err = env.directory.lookup_by_email("b@x.com").await.unwrap_err();
        assert_eq!(err.error_code(), "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_search_by_name_excludes_requester() {
        let env = env();
        let alice = register(&env, "Alice", "a@x.com").await;
        register(&env, "Alicia", "alicia@x.com").await;
        register(&env, "Bob", "b@x.com").await;

        let found = env
            .directory
            .search_by_name("ali", &alice.user_id)
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].user_name, "Alicia");

        let names: Vec<_> = env
            .directory
            .search_by_name("b", &alice.user_id)
            .await
            .unwrap()
            .into_iter()
            .map(|u| u.user_name)
            .collect();
        assert_eq!(names, vec!["Bob"]);
    }

    #[tokio::test]
    async fn test_update_profile_is_partial() {
        let env = env();
        let alice = register(&env, "Alice", "a@x.com").await;

        env.directory
            .update_profile(
                &alice.user_id,
                UpdateProfileInput {
                    bio: Some("hello".to_string()),
                    allow_messages_from: Some(MessagingPolicy::Friends),
                    ..UpdateProfileInput::default()
                },
            )
            .await
            .unwrap();

        let updated = env.directory.get_user(&alice.user_id).await.unwrap();
        assert_eq!(updated.bio, "hello");
        assert_eq!(updated.allow_messages_from, MessagingPolicy::Friends);
        // Untouched fields survive.
        assert_eq!(updated.user_name, "Alice");
        assert_eq!(updated.email, "a@x.com");
    }

    #[tokio::test]
    async fn test_update_profile_unknown_user() {
        let env = env();
        let err = env
            .directory
            .update_profile("ghost", UpdateProfileInput::default())
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "USER_NOT_FOUND");
    }
}
