//! Chat records (`chats/{chatId}`).

use crate::records::{RequestStatus, decode, encode};
use messenger_common::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Chat type code. Shares the `type_05` code with the private messaging
/// policy in a different field, a pre-existing wire overload. Preserved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChatType {
    /// `type_05`: two fixed members.
    #[serde(rename = "type_05")]
    Private,
    /// `type_06`: role-managed group.
    #[serde(rename = "type_06")]
    Group,
}

/// Role sets of a group. A member id appears in exactly one of the three.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupRoles {
    /// Owner set; contains `ownerId` and never overlaps the others.
    #[serde(default)]
    pub owners: BTreeMap<String, bool>,
    /// Admin set.
    #[serde(default)]
    pub admins: BTreeMap<String, bool>,
    /// Ordinary members.
    #[serde(default)]
    pub members: BTreeMap<String, bool>,
}

impl GroupRoles {
    /// Every user id across the three role sets.
    #[must_use]
    pub fn all_member_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .owners
            .keys()
            .chain(self.admins.keys())
            .chain(self.members.keys())
            .cloned()
            .collect();
        ids.sort();
        ids.dedup();
        ids
    }
}

/// Approval-workflow entry for restricted groups. Modeled and persisted,
/// enforced by no operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingMember {
    /// Who added the candidate.
    #[serde(rename = "addedBy")]
    pub added_by: String,
    /// Who approved, once somebody has.
    #[serde(rename = "approvedBy", default, skip_serializing_if = "Option::is_none")]
    pub approved_by: Option<String>,
    /// When the candidate was added, float seconds.
    #[serde(rename = "addedAt")]
    pub added_at: f64,
    /// When the candidate was approved, float seconds.
    #[serde(rename = "approvedAt", default, skip_serializing_if = "Option::is_none")]
    pub approved_at: Option<f64>,
    /// Workflow state.
    #[serde(rename = "status_id", default)]
    pub status: RequestStatus,
}

/// Group switches. Modeled and persisted, enforced by no operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupSettings {
    /// Restrict sending to admins and owners.
    #[serde(rename = "onlyAdminCanChat", default)]
    pub only_admin_can_chat: bool,
    /// Gate joins on approval.
    #[serde(rename = "requireApprovalToJoin", default)]
    pub require_approval_to_join: bool,
}

/// Group subtree (`chats/{chatId}/groupInfo`), present on group chats only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupInfo {
    /// Display name.
    #[serde(rename = "group_name")]
    pub group_name: String,
    /// Group avatar URL, empty when unset.
    #[serde(rename = "avatarGroupUrl", default)]
    pub avatar_group_url: String,
    /// Description, empty when unset.
    #[serde(rename = "groupDescription", default)]
    pub group_description: String,
    /// The owning user; always present in `roles.owners`.
    #[serde(rename = "ownerId")]
    pub owner_id: String,
    /// Role sets.
    pub roles: GroupRoles,
    /// Approval workflow entries.
    #[serde(rename = "pendingMembers", default)]
    pub pending_members: BTreeMap<String, PendingMember>,
    /// Group switches.
    #[serde(default)]
    pub settings: GroupSettings,
}

/// A chat record.
///
/// The id is the record's key under `chats/`, injected when decoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRecord {
    /// Generated chat identifier (the tree key).
    #[serde(skip)]
    pub chat_id: String,
    /// Private or group.
    #[serde(rename = "type_id")]
    pub chat_type: ChatType,
    /// Denormalized text of the latest message.
    #[serde(rename = "lastMessage", default)]
    pub last_message: String,
    /// Chat-list sort key, float seconds; touched by every send.
    #[serde(rename = "updatedAt")]
    pub updated_at: f64,
    /// Membership map (id → true).
    #[serde(default)]
    pub users: BTreeMap<String, bool>,
    /// Present exactly when `type_id` is `type_06`.
    #[serde(rename = "groupInfo", default, skip_serializing_if = "Option::is_none")]
    pub group_info: Option<GroupInfo>,
}

impl ChatRecord {
    /// A new private chat between exactly two users.
    #[must_use]
    pub fn new_private(
        chat_id: impl Into<String>,
        user_a: &str,
        user_b: &str,
        first_message: impl Into<String>,
        updated_at: f64,
    ) -> Self {
        let mut users = BTreeMap::new();
        users.insert(user_a.to_string(), true);
        users.insert(user_b.to_string(), true);
        Self {
            chat_id: chat_id.into(),
            chat_type: ChatType::Private,
            last_message: first_message.into(),
            updated_at,
            users,
            group_info: None,
        }
    }

    /// A new group chat: the owner plus ordinary members, default settings,
    /// membership map derived from the roles.
    #[must_use]
    pub fn new_group(
        chat_id: impl Into<String>,
        owner_id: &str,
        group_name: impl Into<String>,
        member_ids: &[String],
        updated_at: f64,
    ) -> Self {
        let mut roles = GroupRoles::default();
        roles.owners.insert(owner_id.to_string(), true);
        for member_id in member_ids {
            if member_id != owner_id {
                roles.members.insert(member_id.clone(), true);
            }
        }
        let users = roles
            .all_member_ids()
            .into_iter()
            .map(|id| (id, true))
            .collect();
        Self {
            chat_id: chat_id.into(),
            chat_type: ChatType::Group,
            last_message: String::new(),
            updated_at,
            users,
            group_info: Some(GroupInfo {
                group_name: group_name.into(),
                avatar_group_url: String::new(),
                group_description: String::new(),
                owner_id: owner_id.to_string(),
                roles,
                pending_members: BTreeMap::new(),
                settings: GroupSettings::default(),
            }),
        }
    }

    /// Decode a `chats/{chatId}` snapshot, injecting the key as the id and
    /// checking the structural invariants.
    pub fn from_value(chat_id: impl Into<String>, value: Value) -> AppResult<Self> {
        let mut record: Self = decode("chat", value)?;
        record.chat_id = chat_id.into();
        record.check_invariants()?;
        Ok(record)
    }

    /// Encode for writing at `chats/{chatId}`.
    pub fn to_value(&self) -> AppResult<Value> {
        self.check_invariants()?;
        encode("chat", self)
    }

    /// Member user ids, sorted.
    #[must_use]
    pub fn member_ids(&self) -> Vec<String> {
        self.users.keys().cloned().collect()
    }

    /// Whether `user_id` is a current member.
    #[must_use]
    pub fn is_member(&self, user_id: &str) -> bool {
        self.users.contains_key(user_id)
    }

    /// For a private chat, the member that is not `user_id`.
    #[must_use]
    pub fn other_member(&self, user_id: &str) -> Option<&str> {
        if self.chat_type != ChatType::Private {
            return None;
        }
        self.users
            .keys()
            .find(|id| id.as_str() != user_id)
            .map(String::as_str)
    }

    fn check_invariants(&self) -> AppResult<()> {
        match (self.chat_type, &self.group_info) {
            (ChatType::Private, Some(_)) => Err(AppError::Validation(format!(
                "private chat {} carries group info",
                self.chat_id
            ))),
            (ChatType::Private, None) => {
                if self.users.len() == 2 {
                    Ok(())
                } else {
                    Err(AppError::Validation(format!(
                        "private chat {} has {} members",
                        self.chat_id,
                        self.users.len()
                    )))
                }
            }
            (ChatType::Group, None) => Err(AppError::Validation(format!(
                "group chat {} is missing group info",
                self.chat_id
            ))),
            (ChatType::Group, Some(info)) => {
                if !info.roles.owners.contains_key(&info.owner_id) {
                    return Err(AppError::Validation(format!(
                        "group chat {} owner is not in the owner role",
                        self.chat_id
                    )));
                }
                if info
                    .roles
                    .owners
                    .keys()
                    .any(|id| info.roles.members.contains_key(id))
                {
                    return Err(AppError::Validation(format!(
                        "group chat {} has overlapping owner and member roles",
                        self.chat_id
                    )));
                }
                Ok(())
            }
        }
    }
}
