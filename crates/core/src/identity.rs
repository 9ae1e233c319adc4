//! Identity provider contract and the in-memory implementation.
//!
//! The hosted identity provider is an external collaborator: the services
//! only ever need "verify credentials, return a stable user identifier".
//! [`MemoryIdentityProvider`] implements the contract for tests and
//! self-contained deployments.

use argon2::Argon2;
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use async_trait::async_trait;
use messenger_common::config::IdentityConfig;
use messenger_common::{AppError, AppResult, IdGenerator};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// The identity provider the directory authenticates against.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Create an identity; returns the new stable user identifier.
    async fn sign_up(&self, email: &str, password: &str) -> AppResult<String>;

    /// Verify credentials; returns the stable user identifier.
    async fn sign_in(&self, email: &str, password: &str) -> AppResult<String>;

    /// OAuth-shaped variant: exchange a provider-verified token for the same
    /// user-identifier shape as [`sign_in`](Self::sign_in).
    async fn sign_in_with_token(&self, id_token: &str) -> AppResult<String>;

    /// End the current session.
    async fn sign_out(&self) -> AppResult<()>;

    /// The signed-in user, if any.
    async fn current_user_id(&self) -> Option<String>;
}

struct Account {
    user_id: String,
    password_hash: String,
}

/// An [`IdentityProvider`] holding argon2-hashed credentials in memory.
pub struct MemoryIdentityProvider {
    accounts: RwLock<HashMap<String, Account>>,
    tokens: RwLock<HashMap<String, String>>,
    current: RwLock<Option<String>>,
    config: IdentityConfig,
    id_gen: IdGenerator,
}

impl MemoryIdentityProvider {
    /// Create an empty provider.
    #[must_use]
    pub fn new(config: IdentityConfig) -> Self {
        Self {
            accounts: RwLock::new(HashMap::new()),
            tokens: RwLock::new(HashMap::new()),
            current: RwLock::new(None),
            config,
            id_gen: IdGenerator::new(),
        }
    }

    /// Register a pre-verified OAuth token for an existing user, standing in
    /// for the external token-exchange handshake.
    pub async fn register_token(&self, user_id: &str) -> String {
        let token = self.id_gen.generate_token();
        self.tokens
            .write()
            .await
            .insert(token.clone(), user_id.to_string());
        token
    }

    fn hash_password(password: &str) -> AppResult<String> {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| AppError::Internal(format!("password hashing failed: {e}")))
    }

    fn verify_password(password: &str, hash: &str) -> bool {
        PasswordHash::new(hash)
            .map(|parsed| {
                Argon2::default()
                    .verify_password(password.as_bytes(), &parsed)
                    .is_ok()
            })
            .unwrap_or(false)
    }
}

#[async_trait]
impl IdentityProvider for MemoryIdentityProvider {
    async fn sign_up(&self, email: &str, password: &str) -> AppResult<String> {
        let email = email.trim().to_lowercase();
        if email.is_empty() || !email.contains('@') {
            return Err(AppError::Identity(format!("malformed email: {email:?}")));
        }
        if password.len() < self.config.min_password_length {
            return Err(AppError::Identity(format!(
                "password must be at least {} characters",
                self.config.min_password_length
            )));
        }

        let mut accounts = self.accounts.write().await;
        if accounts.contains_key(&email) {
            return Err(AppError::Identity(format!(
                "email already registered: {email}"
            )));
        }

        let user_id = self.id_gen.generate();
        accounts.insert(
            email,
            Account {
                user_id: user_id.clone(),
                password_hash: Self::hash_password(password)?,
            },
        );
        *self.current.write().await = Some(user_id.clone());
        Ok(user_id)
    }

    async fn sign_in(&self, email: &str, password: &str) -> AppResult<String> {
        let email = email.trim().to_lowercase();
        let accounts = self.accounts.read().await;
        let account = accounts
            .get(&email)
            .ok_or_else(|| AppError::Auth(format!("unknown account: {email}")))?;
        if !Self::verify_password(password, &account.password_hash) {
            return Err(AppError::Auth("wrong password".to_string()));
        }
        *self.current.write().await = Some(account.user_id.clone());
        Ok(account.user_id.clone())
    }

    async fn sign_in_with_token(&self, id_token: &str) -> AppResult<String> {
        let tokens = self.tokens.read().await;
        let user_id = tokens
            .get(id_token)
            .cloned()
            .ok_or_else(|| AppError::Auth("unrecognized identity token".to_string()))?;
        *self.current.write().await = Some(user_id.clone());
        Ok(user_id)
    }

    async fn sign_out(&self) -> AppResult<()> {
        *self.current.write().await = None;
        Ok(())
    }

    async fn current_user_id(&self) -> Option<String> {
        self.current.read().await.clone()
    }
}
