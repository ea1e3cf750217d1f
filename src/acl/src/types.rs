//! Core permission engine types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::AclError;

/// Unique role identifier
pub type RoleId = String;

/// Unique permission identifier
pub type PermissionId = String;

/// Unique user identifier
pub type UserId = String;

/// Action being authorized
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PermissionAction {
    #[serde(rename = "create")]
    Create,
    #[serde(rename = "read")]
    Read,
    #[serde(rename = "update")]
    Update,
    #[serde(rename = "delete")]
    Delete,
    /// Matches any requested action
    #[serde(rename = "*")]
    All,
}

impl PermissionAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            PermissionAction::Create => "create",
            PermissionAction::Read => "read",
            PermissionAction::Update => "update",
            PermissionAction::Delete => "delete",
            PermissionAction::All => "*",
        }
    }
}

impl fmt::Display for PermissionAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PermissionAction {
    type Err = AclError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create" => Ok(PermissionAction::Create),
            "read" => Ok(PermissionAction::Read),
            "update" => Ok(PermissionAction::Update),
            "delete" => Ok(PermissionAction::Delete),
            "*" => Ok(PermissionAction::All),
            other => Err(AclError::InvalidInput(format!("Unknown action: {}", other))),
        }
    }
}

/// Authorization unit referenced by roles
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    /// Unique permission identifier (e.g., "read-all")
    pub id: PermissionId,

    /// Display name
    pub name: String,

    /// Action this permission grants
    pub action: PermissionAction,

    /// Optional resource type tag; `None` applies to every resource type
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_type: Option<String>,
}

impl Permission {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        action: PermissionAction,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            action,
            resource_type: None,
        }
    }

    /// Restrict the permission to a single resource type
    pub fn with_resource_type(mut self, resource_type: impl Into<String>) -> Self {
        self.resource_type = Some(resource_type.into());
        self
    }
}

/// Named bundle of permission identifiers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    /// Unique role identifier (e.g., "admin")
    pub id: RoleId,

    /// Display name
    pub name: String,

    /// Permission identifiers; may reference permissions not yet registered
    #[serde(default)]
    pub permissions: Vec<PermissionId>,
}

impl Role {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            permissions: Vec::new(),
        }
    }

    /// Add a permission reference, ignoring repeats
    pub fn with_permission(mut self, permission_id: impl Into<String>) -> Self {
        let permission_id = permission_id.into();
        if !self.permissions.contains(&permission_id) {
            self.permissions.push(permission_id);
        }
        self
    }
}

/// Options accepted when assigning a role
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssignmentOptions {
    /// Assignment stops being active once this instant is reached
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,

    /// Free-form justification, kept on the assignment record
    #[serde(default)]
    pub reason: Option<String>,

    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl AssignmentOptions {
    pub fn expiring_at(expires_at: DateTime<Utc>) -> Self {
        Self {
            expires_at: Some(expires_at),
            ..Default::default()
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

/// Binding of a role to a user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub user_id: UserId,
    pub role_id: RoleId,
    pub assigned_at: DateTime<Utc>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl Assignment {
    /// Active iff there is no expiry or the expiry is strictly after `now`
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            None => true,
            Some(expires_at) => expires_at > now,
        }
    }
}

/// Permission check request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionContext {
    pub user_id: UserId,

    pub action: PermissionAction,

    /// Resource type being accessed; `None` means "any"
    #[serde(default)]
    pub resource_type: Option<String>,
}

impl PermissionContext {
    pub fn new(user_id: impl Into<String>, action: PermissionAction) -> Self {
        Self {
            user_id: user_id.into(),
            action,
            resource_type: None,
        }
    }

    pub fn with_resource_type(mut self, resource_type: impl Into<String>) -> Self {
        self.resource_type = Some(resource_type.into());
        self
    }
}

/// Which rule of the evaluation chain produced a decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
    Exact,
    Wildcard,
    Deny,
}

/// Outcome of a permission check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PermissionCheckResult {
    /// Unique decision ID
    pub id: String,

    /// Whether the request is allowed
    pub granted: bool,

    /// Human-readable explanation naming the rule, permission and role
    pub reason: String,

    pub rule: MatchKind,

    /// Roles considered during evaluation
    pub applied_roles: Vec<RoleId>,

    /// Permissions that contributed to a grant (empty on deny)
    #[serde(default)]
    pub applied_permissions: Vec<PermissionId>,

    /// When the decision was computed; cached results keep their original time
    pub evaluated_at: DateTime<Utc>,
}

impl PermissionCheckResult {
    /// Create a grant decision
    pub fn grant(
        rule: MatchKind,
        reason: String,
        applied_roles: Vec<RoleId>,
        applied_permissions: Vec<PermissionId>,
        evaluated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            granted: true,
            reason,
            rule,
            applied_roles,
            applied_permissions,
            evaluated_at,
        }
    }

    /// Create a deny decision
    pub fn deny(reason: String, applied_roles: Vec<RoleId>, evaluated_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            granted: false,
            reason,
            rule: MatchKind::Deny,
            applied_roles,
            applied_permissions: Vec::new(),
            evaluated_at,
        }
    }
}
