//! Permission resolution
//!
//! Decisions come from an ordered, short-circuiting chain of [`MatchRule`]s.
//! The default chain is:
//!
//! 1. [`ExactMatch`]: same action, compatible resource type
//! 2. [`WildcardMatch`]: a `*` permission, any resource type
//!
//! If no rule matches the request is denied. Denial is a normal outcome, not an error.

use chrono::{DateTime, Utc};

use crate::types::{
    MatchKind, Permission, PermissionAction, PermissionCheckResult, PermissionContext,
    PermissionId, Role, RoleId,
};

/// One step of the evaluation chain
pub trait MatchRule: Send + Sync {
    fn kind(&self) -> MatchKind;

    /// First permission, in resolution order, that satisfies the rule
    fn find<'a>(
        &self,
        context: &PermissionContext,
        permissions: &'a [Permission],
    ) -> Option<&'a Permission>;

    /// Reason recorded on a grant by this rule
    fn describe(&self, permission: &Permission, role_id: Option<&str>) -> String;
}

/// Same action, with the resource type unset on either side or equal
pub struct ExactMatch;

impl MatchRule for ExactMatch {
    fn kind(&self) -> MatchKind {
        MatchKind::Exact
    }

    fn find<'a>(
        &self,
        context: &PermissionContext,
        permissions: &'a [Permission],
    ) -> Option<&'a Permission> {
        permissions.iter().find(|permission| {
            permission.action == context.action
                && match (&context.resource_type, &permission.resource_type) {
                    (Some(requested), Some(granted)) => requested == granted,
                    _ => true,
                }
        })
    }

    fn describe(&self, permission: &Permission, role_id: Option<&str>) -> String {
        with_role(
            format!("Permission granted via role permission: {}", permission.name),
            role_id,
        )
    }
}

/// Wildcard "all" action, irrespective of resource type
pub struct WildcardMatch;

impl MatchRule for WildcardMatch {
    fn kind(&self) -> MatchKind {
        MatchKind::Wildcard
    }

    fn find<'a>(
        &self,
        _context: &PermissionContext,
        permissions: &'a [Permission],
    ) -> Option<&'a Permission> {
        permissions
            .iter()
            .find(|permission| permission.action == PermissionAction::All)
    }

    fn describe(&self, permission: &Permission, role_id: Option<&str>) -> String {
        with_role(
            format!("Permission granted via role ALL permission: {}", permission.name),
            role_id,
        )
    }
}

fn with_role(reason: String, role_id: Option<&str>) -> String {
    match role_id {
        Some(role_id) => format!("{} (role: {})", reason, role_id),
        None => reason,
    }
}

/// Deny-by-default evaluator over a rule chain
pub struct Evaluator {
    rules: Vec<Box<dyn MatchRule>>,
}

impl Evaluator {
    /// Evaluator with the exact → wildcard chain
    pub fn new() -> Self {
        Self::with_rules(vec![Box::new(ExactMatch), Box::new(WildcardMatch)])
    }

    pub fn with_rules(rules: Vec<Box<dyn MatchRule>>) -> Self {
        Self { rules }
    }

    /// Decide a request from the user's active roles and resolved permissions
    ///
    /// `permissions` must already be de-duplicated in role order; the first
    /// permission a rule finds wins.
    pub fn evaluate(
        &self,
        context: &PermissionContext,
        roles: &[Role],
        permissions: &[Permission],
        evaluated_at: DateTime<Utc>,
    ) -> PermissionCheckResult {
        let applied_roles: Vec<RoleId> = roles.iter().map(|r| r.id.clone()).collect();

        for rule in &self.rules {
            if let Some(permission) = rule.find(context, permissions) {
                let via = granting_role(roles, &permission.id);
                return PermissionCheckResult::grant(
                    rule.kind(),
                    rule.describe(permission, via),
                    applied_roles,
                    vec![permission.id.clone()],
                    evaluated_at,
                );
            }
        }

        PermissionCheckResult::deny(
            format!("No matching permission found for action: {}", context.action),
            applied_roles,
            evaluated_at,
        )
    }
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new()
    }
}

/// First role, in order, that references the permission
fn granting_role<'a>(roles: &'a [Role], permission_id: &PermissionId) -> Option<&'a str> {
    roles
        .iter()
        .find(|role| role.permissions.contains(permission_id))
        .map(|role| role.id.as_str())
}

/// Drop repeated permission IDs, keeping the first occurrence
pub fn dedup_permissions(resolved: impl IntoIterator<Item = Permission>) -> Vec<Permission> {
    let mut seen = std::collections::HashSet::new();
    resolved
        .into_iter()
        .filter(|permission| seen.insert(permission.id.clone()))
        .collect()
}
