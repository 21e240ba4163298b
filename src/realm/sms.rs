//! SMS-code realm: verifies one-time codes, delegates authorization.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::credential::{CredentialKind, Credentials};
use crate::error::Error;
use crate::store::{SmsCodeStore, UserStore};

use super::password::validate_account;
use super::{AuthenticationInfo, AuthorizationInfo, Principal, Realm};

pub const SMS_REALM_NAME: &str = "sms-code";

/// Authenticates phone-number/one-time-code submissions. The code comparison
/// happens here against the code store (there is no stored hash to derive),
/// so the returned info is marked pre-verified. Authorization is delegated to
/// the canonical realm: a user logging in by SMS holds exactly the grants
/// they would hold after a password login.
pub struct SmsCodeRealm<S, C> {
    name: String,
    store: Arc<S>,
    codes: Arc<C>,
    authorizer: Arc<dyn Realm>,
}

impl<S, C> SmsCodeRealm<S, C> {
    pub fn new(store: Arc<S>, codes: Arc<C>, authorizer: Arc<dyn Realm>) -> Self {
        Self {
            name: SMS_REALM_NAME.to_string(),
            store,
            codes,
            authorizer,
        }
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

#[async_trait]
impl<S: UserStore, C: SmsCodeStore> Realm for SmsCodeRealm<S, C> {
    fn name(&self) -> &str {
        &self.name
    }

    fn supports(&self, credentials: &Credentials) -> bool {
        credentials.kind() == CredentialKind::SmsCode
    }

    async fn authentication_info(
        &self,
        credentials: &Credentials,
    ) -> Result<AuthenticationInfo, Error> {
        let phone_number = credentials.identifier();
        debug!(phone_number, realm = %self.name, "authenticating");

        let issued = self
            .codes
            .current_code(phone_number)
            .await?
            .ok_or(Error::CredentialMismatch)?;
        if issued != credentials.expose_secret() {
            return Err(Error::CredentialMismatch);
        }

        let record = validate_account(self.store.find_by_phone(phone_number).await?)?;
        let principal = Principal::new(record.id, record.username);
        Ok(AuthenticationInfo::pre_verified(principal, &self.name))
    }

    async fn authorization_info(&self, principal: &Principal) -> Result<AuthorizationInfo, Error> {
        self.authorizer.authorization_info(principal).await
    }
}
