//! Multi-realm authentication with a configurable aggregation strategy.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::credential::Credentials;
use crate::error::{AggregateFailure, Error};
use crate::hashing::HashingConfig;
use crate::realm::{AuthenticationInfo, Principal, Realm, StoredCredential};

/// How authentication aggregates across multiple supporting realms.
///
/// `AtLeastOneSuccess` favors availability: realms are different login
/// methods over one user population, so any one of them vouching for the
/// caller is enough. `AllSuccessful` is for deployments that treat realms as
/// independent trust domains and require consensus.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AuthenticationStrategy {
    #[default]
    AtLeastOneSuccess,
    AllSuccessful,
}

/// Routes a submission to the realms that support its credential type and
/// verifies the submitted secret against the stored material each realm
/// returns.
pub struct MultiRealmAuthenticator {
    realms: Vec<Arc<dyn Realm>>,
    hashing: HashingConfig,
    strategy: AuthenticationStrategy,
}

impl MultiRealmAuthenticator {
    #[must_use]
    pub fn new(realms: Vec<Arc<dyn Realm>>, hashing: HashingConfig) -> Self {
        Self {
            realms,
            hashing,
            strategy: AuthenticationStrategy::default(),
        }
    }

    #[must_use]
    pub fn with_strategy(mut self, strategy: AuthenticationStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    #[must_use]
    pub fn strategy(&self) -> AuthenticationStrategy {
        self.strategy
    }

    #[must_use]
    pub fn realms(&self) -> &[Arc<dyn Realm>] {
        &self.realms
    }

    /// Authenticate a submission.
    ///
    /// Zero supporting realms fail with `UnsupportedCredentialType`. One
    /// supporting realm authenticates directly. Several are attempted in
    /// configured order; the strategy decides how their outcomes combine,
    /// and under `AtLeastOneSuccess` the first successful realm in
    /// configured order supplies the canonical principal.
    ///
    /// # Errors
    ///
    /// See the crate error taxonomy; all-realm failure surfaces as
    /// `Error::Aggregate` carrying each realm's error by name.
    pub async fn authenticate(&self, credentials: &Credentials) -> Result<Principal, Error> {
        let supporting: Vec<&Arc<dyn Realm>> = self
            .realms
            .iter()
            .filter(|realm| realm.supports(credentials))
            .collect();

        if supporting.is_empty() {
            warn!(kind = %credentials.kind(), "no realm supports the submitted credential type");
            return Err(Error::UnsupportedCredentialType);
        }

        if let [realm] = supporting.as_slice() {
            return self.authenticate_single(realm.as_ref(), credentials).await;
        }

        self.authenticate_multi(&supporting, credentials).await
    }

    async fn authenticate_single(
        &self,
        realm: &dyn Realm,
        credentials: &Credentials,
    ) -> Result<Principal, Error> {
        let info = realm.authentication_info(credentials).await?;
        let principal = self.verify(credentials, info)?;
        info!(username = %principal.username(), realm = realm.name(), "authentication succeeded");
        Ok(principal)
    }

    async fn authenticate_multi(
        &self,
        realms: &[&Arc<dyn Realm>],
        credentials: &Credentials,
    ) -> Result<Principal, Error> {
        // Realms are tried sequentially in configured order, which makes the
        // first-success tie-break deterministic by construction.
        let mut first_success: Option<Principal> = None;
        let mut failures = AggregateFailure::default();

        for realm in realms {
            let outcome = match realm.authentication_info(credentials).await {
                Ok(info) => self.verify(credentials, info),
                Err(err) => Err(err),
            };
            match outcome {
                Ok(principal) => {
                    debug!(realm = realm.name(), username = %principal.username(), "realm accepted");
                    if first_success.is_none() {
                        first_success = Some(principal);
                    }
                }
                Err(err) => {
                    debug!(realm = realm.name(), error = %err, "realm rejected");
                    failures.push(realm.name(), err);
                }
            }
        }

        match self.strategy {
            AuthenticationStrategy::AtLeastOneSuccess => match first_success {
                Some(principal) => {
                    info!(username = %principal.username(), "authentication succeeded");
                    Ok(principal)
                }
                None => Err(Error::Aggregate(failures)),
            },
            AuthenticationStrategy::AllSuccessful => {
                if failures.failures.is_empty() {
                    // Every realm agreed; the first in configured order is canonical.
                    let principal = first_success.ok_or(Error::UnsupportedCredentialType)?;
                    info!(username = %principal.username(), "authentication succeeded in all realms");
                    Ok(principal)
                } else {
                    Err(Error::Aggregate(failures))
                }
            }
        }
    }

    /// Compare the submitted secret against the stored material using the
    /// configured hashing scheme. The error never says which part of the
    /// submission was wrong.
    fn verify(
        &self,
        credentials: &Credentials,
        info: AuthenticationInfo,
    ) -> Result<Principal, Error> {
        match info.credential() {
            StoredCredential::Hashed { hash, salt } => {
                let submitted = self.hashing.hash_secret(credentials.expose_secret(), salt)?;
                if &submitted != hash {
                    return Err(Error::CredentialMismatch);
                }
                Ok(info.into_principal())
            }
            StoredCredential::PreVerified => Ok(info.into_principal()),
        }
    }
}
