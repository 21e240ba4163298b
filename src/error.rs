use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("unknown identity")]
    UnknownIdentity,
    #[error("account is locked")]
    AccountLocked,
    #[error("stored credential record is incomplete")]
    IncompleteCredentialRecord,
    #[error("submitted credentials do not match")]
    CredentialMismatch,
    #[error("no realm supports the submitted credential type")]
    UnsupportedCredentialType,
    #[error("authentication failed in every realm: {0}")]
    Aggregate(AggregateFailure),
    #[error("access denied")]
    AccessDenied,
    #[error("token invalid or expired")]
    TokenInvalidOrExpired,
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("crypto failure: {0}")]
    Crypto(String),
    #[error("store error: {0}")]
    Store(#[from] anyhow::Error),
}

impl Error {
    /// Whether the failure is a fault in a collaborator rather than a
    /// legitimate denial. Faults map to 5xx at the boundary, denials never do.
    #[must_use]
    pub fn is_fault(&self) -> bool {
        match self {
            Self::Store(_) | Self::Config(_) | Self::Crypto(_) => true,
            Self::Aggregate(aggregate) => aggregate
                .failures
                .iter()
                .any(|(_, failure)| failure.is_fault()),
            _ => false,
        }
    }
}

/// Per-realm failures collected when every supporting realm rejected the
/// attempt. Realm order matches the configured realm order.
#[derive(Debug, Default)]
pub struct AggregateFailure {
    pub failures: Vec<(String, Error)>,
}

impl AggregateFailure {
    pub fn push(&mut self, realm: impl Into<String>, failure: Error) {
        self.failures.push((realm.into(), failure));
    }
}

impl fmt::Display for AggregateFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (realm, failure) in &self.failures {
            if !first {
                write!(f, "; ")?;
            }
            write!(f, "{realm}: {failure}")?;
            first = false;
        }
        Ok(())
    }
}
