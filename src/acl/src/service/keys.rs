//! Cache key construction
//!
//! Every key has the shape `{namespace}:{user_id}:{rest}`, so evicting the
//! prefix `{namespace}:{user_id}:` removes exactly one user's entries in that
//! namespace. Caller-supplied segments are escaped (`%` as `%25`, `:` as `%3A`)
//! so they can never contain the separator, which keeps distinct requests on
//! distinct keys and makes prefix eviction exact.

use std::borrow::Cow;

use crate::types::PermissionContext;

/// Cached permission-check decisions
pub const PERMISSION_NAMESPACE: &str = "permission";

/// Cached active-role lists
pub const USER_ROLES_NAMESPACE: &str = "user-roles";

/// Cached resolved-permission lists
pub const USER_ROLE_PERMISSIONS_NAMESPACE: &str = "user-role-permissions";

/// Resource segment used when a check names no resource type
///
/// An escaped segment only ever has `%` before two hex digits, so no
/// resource type can produce this marker.
pub const ANY_RESOURCE: &str = "%*";

/// Escape a caller-supplied key segment
pub fn escape(segment: &str) -> Cow<'_, str> {
    if segment.contains(|c| c == ':' || c == '%') {
        Cow::Owned(segment.replace('%', "%25").replace(':', "%3A"))
    } else {
        Cow::Borrowed(segment)
    }
}

/// Key for a permission-check decision
pub fn permission(context: &PermissionContext) -> String {
    let resource = match context.resource_type.as_deref() {
        Some(resource_type) => escape(resource_type),
        None => Cow::Borrowed(ANY_RESOURCE),
    };

    format!(
        "{}:{}:{}:{}",
        PERMISSION_NAMESPACE,
        escape(&context.user_id),
        context.action,
        resource
    )
}

/// Key for a user's active roles
pub fn user_roles(user_id: &str) -> String {
    format!("{}:{}:active", USER_ROLES_NAMESPACE, escape(user_id))
}

/// Key for a user's resolved permissions
pub fn user_role_permissions(user_id: &str) -> String {
    format!("{}:{}:active", USER_ROLE_PERMISSIONS_NAMESPACE, escape(user_id))
}

/// The three invalidation prefixes for one user
pub fn user_namespaces(user_id: &str) -> [String; 3] {
    let user_id = escape(user_id);
    [
        format!("{}:{}:", USER_ROLES_NAMESPACE, user_id),
        format!("{}:{}:", USER_ROLE_PERMISSIONS_NAMESPACE, user_id),
        format!("{}:{}:", PERMISSION_NAMESPACE, user_id),
    ]
}
