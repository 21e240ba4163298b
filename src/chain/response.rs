//! Allow/deny decisions and their structured response bodies.

use http::StatusCode;
use serde_json::{json, Value};

use crate::realm::Principal;

/// Remember-me token minted during dispatch, for the transport layer to set
/// as a cookie.
#[derive(Clone, Debug)]
pub struct IssuedToken {
    pub cookie_name: String,
    pub value: String,
    pub max_age_seconds: i64,
}

/// Outcome of dispatching one request through the chain.
#[derive(Debug)]
pub enum Decision {
    Allow(Allowed),
    Deny(DenyResponse),
}

impl Decision {
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow(_))
    }

    #[must_use]
    pub fn principal(&self) -> Option<&Principal> {
        match self {
            Self::Allow(allowed) => allowed.principal.as_ref(),
            Self::Deny(_) => None,
        }
    }
}

/// The request may proceed. Carries the resolved principal (absent on
/// anonymous passes) and any token minted by a remember-me login.
#[derive(Debug, Default)]
pub struct Allowed {
    pub principal: Option<Principal>,
    pub issued_token: Option<IssuedToken>,
}

impl Allowed {
    #[must_use]
    pub fn anonymous() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn authenticated(principal: Principal) -> Self {
        Self {
            principal: Some(principal),
            issued_token: None,
        }
    }
}

/// The request stops here: status code plus a machine-readable JSON body.
/// 401 for unauthenticated access, 403 for insufficient grants, 500 when a
/// collaborator faulted — a fault is never disguised as a denial.
#[derive(Clone, Debug)]
pub struct DenyResponse {
    status: StatusCode,
    body: Value,
}

impl DenyResponse {
    #[must_use]
    pub fn unauthenticated() -> Self {
        Self::with_message(StatusCode::UNAUTHORIZED, "authentication required")
    }

    #[must_use]
    pub fn forbidden() -> Self {
        Self::with_message(StatusCode::FORBIDDEN, "access denied")
    }

    #[must_use]
    pub fn fault() -> Self {
        Self::with_message(StatusCode::INTERNAL_SERVER_ERROR, "internal error")
    }

    fn with_message(status: StatusCode, message: &str) -> Self {
        let body = json!({
            "code": status.as_u16(),
            "message": message,
        });
        Self { status, body }
    }

    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    #[must_use]
    pub fn body(&self) -> &Value {
        &self.body
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bodies_carry_code_and_message() {
        let deny = DenyResponse::unauthenticated();
        assert_eq!(deny.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(deny.body()["code"], 401);
        assert_eq!(deny.body()["message"], "authentication required");

        let deny = DenyResponse::forbidden();
        assert_eq!(deny.status(), StatusCode::FORBIDDEN);
        assert_eq!(deny.body()["code"], 403);

        let deny = DenyResponse::fault();
        assert_eq!(deny.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(deny.body()["code"], 500);
    }

    #[test]
    fn decision_accessors() {
        let allowed = Decision::Allow(Allowed::authenticated(Principal::new(
            uuid::Uuid::new_v4(),
            "alice",
        )));
        assert!(allowed.is_allowed());
        assert_eq!(allowed.principal().unwrap().username(), "alice");

        let denied = Decision::Deny(DenyResponse::forbidden());
        assert!(!denied.is_allowed());
        assert!(denied.principal().is_none());
    }
}
