//! Filter variants: an access predicate plus a deny response per variant.

use serde::{Deserialize, Serialize};

use crate::permission::WildcardPermission;
use crate::realm::AuthorizationInfo;

use super::response::DenyResponse;

/// AND/OR combination for permission lists.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Logical {
    And,
    Or,
}

/// Access policy attached to a chain rule. Each variant is a predicate over
/// the request's authentication/authorization state; the deny side is data
/// (`deny_response`), not an overridable method, so variants compose instead
/// of inheriting.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AccessFilter {
    /// Always allow; no principal required.
    Anonymous,
    /// Require an authenticated principal, attempting login from submitted
    /// credentials when there is none.
    Authenticated,
    /// Require every listed role.
    Roles(Vec<String>),
    /// Require at least one listed role. An empty list allows any
    /// authenticated principal.
    AnyOfRoles(Vec<String>),
    /// Require the listed permissions, combined per the logical mode.
    Permissions(Vec<WildcardPermission>, Logical),
}

impl AccessFilter {
    /// Whether this filter needs a resolved principal at all. An empty
    /// `anyOfRoles` list constrains nothing, so it allows even anonymous
    /// callers — the lenient reading, chosen deliberately and pinned by test.
    #[must_use]
    pub fn requires_principal(&self) -> bool {
        match self {
            Self::Anonymous => false,
            Self::AnyOfRoles(roles) => !roles.is_empty(),
            _ => true,
        }
    }

    /// Whether this filter consults authorization data (roles/permissions).
    #[must_use]
    pub fn requires_authorization(&self) -> bool {
        match self {
            Self::Roles(_) | Self::Permissions(..) => true,
            Self::AnyOfRoles(roles) => !roles.is_empty(),
            Self::Anonymous | Self::Authenticated => false,
        }
    }

    /// The authorization predicate. Only meaningful for filters where
    /// [`requires_authorization`](Self::requires_authorization) holds.
    #[must_use]
    pub fn allows(&self, authorization: &AuthorizationInfo) -> bool {
        match self {
            Self::Anonymous | Self::Authenticated => true,
            Self::Roles(roles) => {
                authorization.has_all_roles(roles.iter().map(String::as_str))
            }
            Self::AnyOfRoles(roles) => {
                roles.is_empty()
                    || authorization.has_any_role(roles.iter().map(String::as_str))
            }
            Self::Permissions(permissions, Logical::And) => {
                authorization.implies_all(permissions)
            }
            Self::Permissions(permissions, Logical::Or) => {
                authorization.implies_any(permissions)
            }
        }
    }

    /// Response written when this filter denies: 401 while unauthenticated,
    /// 403 once authenticated but short on grants.
    #[must_use]
    pub fn deny_response(&self, authenticated: bool) -> DenyResponse {
        if authenticated {
            DenyResponse::forbidden()
        } else {
            DenyResponse::unauthenticated()
        }
    }
}
