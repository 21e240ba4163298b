//! Ordered chain rules and the per-request dispatcher.

pub mod filter;
pub mod pattern;
pub mod response;

use std::sync::Arc;

use http::Method;
use time::OffsetDateTime;
use tracing::{debug, error, warn};

use crate::authenticator::MultiRealmAuthenticator;
use crate::credential::Credentials;
use crate::realm::{Principal, Realm};
use crate::remember_me::RememberMeManager;
use crate::session::AuthorizationCache;

pub use filter::{AccessFilter, Logical};
pub use pattern::PathPattern;
pub use response::{Allowed, Decision, DenyResponse, IssuedToken};

/// One ordered binding of a path pattern to an access filter.
#[derive(Clone, Debug)]
pub struct ChainRule {
    pattern: PathPattern,
    filter: AccessFilter,
}

impl ChainRule {
    #[must_use]
    pub fn new(pattern: PathPattern, filter: AccessFilter) -> Self {
        Self { pattern, filter }
    }

    #[must_use]
    pub fn pattern(&self) -> &PathPattern {
        &self.pattern
    }

    #[must_use]
    pub fn filter(&self) -> &AccessFilter {
        &self.filter
    }
}

/// Declaration-ordered rule list. The first pattern matching a request path
/// wins; a later, more general rule never overrides an earlier, more
/// specific one, so rule order is part of the security policy itself.
#[derive(Clone, Debug, Default)]
pub struct SecurityChain {
    rules: Vec<ChainRule>,
}

impl SecurityChain {
    #[must_use]
    pub fn new(rules: Vec<ChainRule>) -> Self {
        Self { rules }
    }

    #[must_use]
    pub fn rules(&self) -> &[ChainRule] {
        &self.rules
    }

    #[must_use]
    pub fn first_match(&self, path: &str) -> Option<&ChainRule> {
        self.rules.iter().find(|rule| rule.pattern.matches(path))
    }
}

/// Everything the engine is handed about one request. Submitted credentials
/// are owned by the request and dropped (zeroed) when dispatch finishes,
/// whatever the outcome.
#[derive(Debug)]
pub struct SecurityRequest {
    pub path: String,
    pub method: Method,
    pub credentials: Option<Credentials>,
    pub remember_me_token: Option<String>,
    /// Principal already bound by the embedder's session layer, if any.
    pub principal: Option<Principal>,
}

impl SecurityRequest {
    #[must_use]
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            method: Method::GET,
            credentials: None,
            remember_me_token: None,
            principal: None,
        }
    }

    #[must_use]
    pub fn post(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            method: Method::POST,
            credentials: None,
            remember_me_token: None,
            principal: None,
        }
    }

    #[must_use]
    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    #[must_use]
    pub fn with_remember_me_token(mut self, token: impl Into<String>) -> Self {
        self.remember_me_token = Some(token.into());
        self
    }

    #[must_use]
    pub fn with_principal(mut self, principal: Principal) -> Self {
        self.principal = Some(principal);
        self
    }
}

/// Drives a request through the chain: match the first rule, run its
/// filter's access check, and either let the request continue or write a
/// structured denial. The resolved principal and its authorization data are
/// threaded through explicitly; there is no ambient "current subject".
pub struct Dispatcher {
    chain: SecurityChain,
    authenticator: MultiRealmAuthenticator,
    authorizer: Arc<dyn Realm>,
    cache: AuthorizationCache,
    remember_me: Option<RememberMeManager>,
}

impl Dispatcher {
    #[must_use]
    pub fn new(
        chain: SecurityChain,
        authenticator: MultiRealmAuthenticator,
        authorizer: Arc<dyn Realm>,
        cache: AuthorizationCache,
    ) -> Self {
        Self {
            chain,
            authenticator,
            authorizer,
            cache,
            remember_me: None,
        }
    }

    #[must_use]
    pub fn with_remember_me(mut self, manager: RememberMeManager) -> Self {
        self.remember_me = Some(manager);
        self
    }

    #[must_use]
    pub fn cache(&self) -> &AuthorizationCache {
        &self.cache
    }

    #[must_use]
    pub fn authenticator(&self) -> &MultiRealmAuthenticator {
        &self.authenticator
    }

    /// Dispatch a request at the current wall-clock time.
    pub async fn dispatch(&self, request: SecurityRequest) -> Decision {
        self.dispatch_at(request, OffsetDateTime::now_utc().unix_timestamp())
            .await
    }

    /// Dispatch with an explicit clock, for deterministic token expiry.
    pub async fn dispatch_at(&self, request: SecurityRequest, now_unix_seconds: i64) -> Decision {
        let Some(rule) = self.chain.first_match(&request.path) else {
            // No rule constrains this path; pass it through with whatever
            // principal the request already carries.
            debug!(path = %request.path, "no chain rule matched");
            let principal = self.resolve_principal(&request, now_unix_seconds);
            return Decision::Allow(Allowed {
                principal,
                issued_token: None,
            });
        };
        debug!(path = %request.path, pattern = %rule.pattern(), "matched chain rule");

        let filter = rule.filter();
        if !filter.requires_principal() {
            let principal = self.resolve_principal(&request, now_unix_seconds);
            return Decision::Allow(Allowed {
                principal,
                issued_token: None,
            });
        }

        let principal = self.resolve_principal(&request, now_unix_seconds);

        if !filter.requires_authorization() {
            // Authentication-required: use the bound principal or attempt a
            // login from the submitted credentials.
            if let Some(principal) = principal {
                return Decision::Allow(Allowed::authenticated(principal));
            }
            return self.login(request, now_unix_seconds).await;
        }

        let Some(principal) = principal else {
            return Decision::Deny(filter.deny_response(false));
        };
        let authorization = match self
            .cache
            .authorization_for(&principal, self.authorizer.as_ref())
            .await
        {
            Ok(authorization) => authorization,
            Err(err) => {
                error!(error = %err, "failed to load authorization data");
                return Decision::Deny(DenyResponse::fault());
            }
        };
        if filter.allows(&authorization) {
            Decision::Allow(Allowed::authenticated(principal))
        } else {
            warn!(username = %principal.username(), path = %request.path, "access denied");
            Decision::Deny(filter.deny_response(true))
        }
    }

    /// Invalidate a principal's session state on logout.
    pub async fn logout(&self, principal: &Principal) {
        self.cache.invalidate(principal).await;
    }

    fn resolve_principal(
        &self,
        request: &SecurityRequest,
        now_unix_seconds: i64,
    ) -> Option<Principal> {
        if let Some(principal) = &request.principal {
            return Some(principal.clone());
        }
        let token = request.remember_me_token.as_deref()?;
        let manager = self.remember_me.as_ref()?;
        let principal = manager.resolve(token, now_unix_seconds)?;
        debug!(username = %principal.username(), "principal restored from remember-me token");
        Some(principal)
    }

    async fn login(&self, request: SecurityRequest, now_unix_seconds: i64) -> Decision {
        let Some(credentials) = request.credentials else {
            return Decision::Deny(DenyResponse::unauthenticated());
        };
        match self.authenticator.authenticate(&credentials).await {
            Ok(principal) => {
                let issued_token = if credentials.remember_me() {
                    self.issue_token(&principal, now_unix_seconds)
                } else {
                    None
                };
                Decision::Allow(Allowed {
                    principal: Some(principal),
                    issued_token,
                })
            }
            Err(err) if err.is_fault() => {
                error!(error = %err, "authentication faulted");
                Decision::Deny(DenyResponse::fault())
            }
            Err(err) => {
                warn!(identifier = credentials.identifier(), error = %err, "authentication failed");
                Decision::Deny(DenyResponse::unauthenticated())
            }
        }
    }

    fn issue_token(&self, principal: &Principal, now_unix_seconds: i64) -> Option<IssuedToken> {
        let manager = self.remember_me.as_ref()?;
        match manager.issue(principal, now_unix_seconds) {
            Ok(value) => Some(IssuedToken {
                cookie_name: manager.cookie_name().to_string(),
                value,
                max_age_seconds: manager.ttl_seconds(),
            }),
            Err(err) => {
                // A failed mint never fails the login itself.
                error!(error = %err, "failed to issue remember-me token");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permission::WildcardPermission;

    fn rule(pattern: &str, filter: AccessFilter) -> ChainRule {
        ChainRule::new(PathPattern::parse(pattern).unwrap(), filter)
    }

    #[test]
    fn first_match_wins_over_later_general_rules() {
        let chain = SecurityChain::new(vec![
            rule("/api/v1/login", AccessFilter::Anonymous),
            rule("/api/v1/**", AccessFilter::Authenticated),
        ]);

        let matched = chain.first_match("/api/v1/login").unwrap();
        assert_eq!(matched.filter(), &AccessFilter::Anonymous);

        let matched = chain.first_match("/api/v1/users").unwrap();
        assert_eq!(matched.filter(), &AccessFilter::Authenticated);
    }

    #[test]
    fn declaration_order_is_preserved_even_when_reversed() {
        // The general rule first shadows the specific one entirely.
        let chain = SecurityChain::new(vec![
            rule("/api/v1/**", AccessFilter::Authenticated),
            rule("/api/v1/login", AccessFilter::Anonymous),
        ]);
        let matched = chain.first_match("/api/v1/login").unwrap();
        assert_eq!(matched.filter(), &AccessFilter::Authenticated);
    }

    #[test]
    fn unmatched_paths_have_no_rule() {
        let chain = SecurityChain::new(vec![rule(
            "/api/**",
            AccessFilter::Roles(vec!["admin".into()]),
        )]);
        assert!(chain.first_match("/health").is_none());
    }

    #[test]
    fn rules_expose_their_parts() {
        let permissions = vec![WildcardPermission::parse("user:view").unwrap()];
        let rule = rule(
            "/api/users/**",
            AccessFilter::Permissions(permissions, Logical::And),
        );
        assert_eq!(rule.pattern().as_str(), "/api/users/**");
        assert!(rule.filter().requires_authorization());
    }
}
