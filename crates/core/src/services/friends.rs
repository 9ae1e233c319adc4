//! Friend graph service.
//!
//! A friendship is a pair of mirror entries on both participants' records;
//! a pending request likewise. Every transition writes both mirrors in one
//! atomic multi-path update, so the symmetry invariant cannot be observed
//! half-applied.

use crate::services::fetch_user;
use futures::future::try_join_all;
use messenger_common::{AppError, AppResult};
use messenger_store::{
    ReceivedRequest, RecordStore, RequestStatus, SentRequest, UserRecord, paths, time,
};
use serde_json::{Value, json};
use std::sync::Arc;

/// A pending request resolved for display: the peer's record plus the
/// shared send time.
#[derive(Debug, Clone)]
pub struct PendingFriendRequest {
    /// The other side of the request (sender for received, target for sent).
    pub user: UserRecord,
    /// Shared send time, float seconds.
    pub sent_at: f64,
}

/// Friend graph service: the request handshake and the mutual edge set.
#[derive(Clone)]
pub struct FriendGraphService {
    store: Arc<dyn RecordStore>,
}

impl FriendGraphService {
    /// Create a new friend graph service.
    #[must_use]
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Send a friend request from `from_id` to `to_id`.
    ///
    /// Refused when the two are the same user, already friends, or a request
    /// is already pending in either direction. The relationship gate reads
    /// each record once; both reads run concurrently and are joined before
    /// deciding.
    pub async fn send_request(&self, from_id: &str, to_id: &str) -> AppResult<()> {
        if from_id == to_id {
            return Err(AppError::Validation(
                "cannot send a friend request to yourself".to_string(),
            ));
        }

        let (sender, _target) = tokio::try_join!(
            fetch_user(self.store.as_ref(), from_id),
            fetch_user(self.store.as_ref(), to_id)
        )?;

        if sender.is_friend(to_id) {
            return Err(AppError::AlreadyFriends(to_id.to_string()));
        }
        if sender.has_sent_request_to(to_id) || sender.has_received_request_from(to_id) {
            return Err(AppError::DuplicateRequest(
                from_id.to_string(),
                to_id.to_string(),
            ));
        }

        let sent_at = time::now_seconds();
        let sent = SentRequest {
            sent_at,
            status: RequestStatus::Pending,
        };
        let received = ReceivedRequest {
            sent_by: from_id.to_string(),
            sent_at,
            status: RequestStatus::Pending,
        };

        self.store
            .multi_update(vec![
                (paths::sent_request(from_id, to_id)?, to_wire(&sent)?),
                (paths::received_request(to_id, from_id)?, to_wire(&received)?),
            ])
            .await?;

        tracing::info!(from_id, to_id, "friend request sent");
        Ok(())
    }

    /// Accept a pending request from `sender_id`: add both friend edges and
    /// remove both mirror entries, atomically.
    pub async fn accept_request(&self, accepter_id: &str, sender_id: &str) -> AppResult<()> {
        let accepter = fetch_user(self.store.as_ref(), accepter_id).await?;
        if !accepter.has_received_request_from(sender_id) {
            return Err(AppError::NoSuchRequest(sender_id.to_string()));
        }

        self.store
            .multi_update(vec![
                (paths::user_friend(accepter_id, sender_id)?, json!(true)),
                (paths::user_friend(sender_id, accepter_id)?, json!(true)),
                (paths::received_request(accepter_id, sender_id)?, Value::Null),
                (paths::sent_request(sender_id, accepter_id)?, Value::Null),
            ])
            .await?;

        tracing::info!(accepter_id, sender_id, "friend request accepted");
        Ok(())
    }

    /// Decline a request from `sender_id`, removing both mirror entries.
    /// Declining an absent request is a successful no-op.
    pub async fn decline_request(&self, accepter_id: &str, sender_id: &str) -> AppResult<()> {
        self.store
            .multi_update(vec![
                (paths::received_request(accepter_id, sender_id)?, Value::Null),
                (paths::sent_request(sender_id, accepter_id)?, Value::Null),
            ])
            .await?;

        tracing::info!(accepter_id, sender_id, "friend request declined");
        Ok(())
    }

    /// Remove a friendship. Unilateral and idempotent: both edges go, no
    /// confirmation from the peer.
    pub async fn remove_friend(&self, user_id: &str, friend_id: &str) -> AppResult<()> {
        self.store
            .multi_update(vec![
                (paths::user_friend(user_id, friend_id)?, Value::Null),
                (paths::user_friend(friend_id, user_id)?, Value::Null),
            ])
            .await?;

        tracing::info!(user_id, friend_id, "friend removed");
        Ok(())
    }

    /// Resolve the friend set into full records, sorted by user name then
    /// id. Record fetches fan out concurrently and are joined before the
    /// result is produced.
    pub async fn list_friends(&self, user_id: &str) -> AppResult<Vec<UserRecord>> {
        let record = fetch_user(self.store.as_ref(), user_id).await?;
        let ids = record.friend_ids();
        let mut friends =
            try_join_all(ids.iter().map(|id| fetch_user(self.store.as_ref(), id))).await?;
        friends.sort_by(|a, b| {
            a.user_name
                .cmp(&b.user_name)
                .then_with(|| a.user_id.cmp(&b.user_id))
        });
        Ok(friends)
    }

    /// Requests waiting for this user's answer, newest first.
    pub async fn list_received_requests(
        &self,
        user_id: &str,
    ) -> AppResult<Vec<PendingFriendRequest>> {
        let record = fetch_user(self.store.as_ref(), user_id).await?;
        let entries: Vec<(String, f64)> = record
            .friend_requests
            .received
            .iter()
            .map(|(sender_id, request)| (sender_id.clone(), request.sent_at))
            .collect();
        self.resolve_requests(entries).await
    }

    /// Requests this user sent that are still pending, newest first.
    pub async fn list_sent_requests(&self, user_id: &str) -> AppResult<Vec<PendingFriendRequest>> {
        let record = fetch_user(self.store.as_ref(), user_id).await?;
        let entries: Vec<(String, f64)> = record
            .friend_requests
            .sent
            .iter()
            .map(|(target_id, request)| (target_id.clone(), request.sent_at))
            .collect();
        self.resolve_requests(entries).await
    }

    async fn resolve_requests(
        &self,
        entries: Vec<(String, f64)>,
    ) -> AppResult<Vec<PendingFriendRequest>> {
        let users = try_join_all(
            entries
                .iter()
                .map(|(id, _)| fetch_user(self.store.as_ref(), id)),
        )
        .await?;
        let mut requests: Vec<PendingFriendRequest> = users
            .into_iter()
            .zip(entries)
            .map(|(user, (_, sent_at))| PendingFriendRequest { user, sent_at })
            .collect();
        requests.sort_by(|a, b| {
            b.sent_at
                .total_cmp(&a.sent_at)
                .then_with(|| a.user.user_id.cmp(&b.user.user_id))
        });
        Ok(requests)
    }
}

fn to_wire<T: serde::Serialize>(value: &T) -> AppResult<Value> {
    serde_json::to_value(value).map_err(|e| AppError::Internal(e.to_string()))
}
