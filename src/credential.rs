//! Submitted credential material, one variant per login method.

use std::fmt;

use secrecy::{ExposeSecret, SecretString};

/// Discriminant used by realms to declare which submissions they handle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CredentialKind {
    Password,
    SmsCode,
}

impl fmt::Display for CredentialKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Password => f.write_str("password"),
            Self::SmsCode => f.write_str("sms-code"),
        }
    }
}

/// Credentials submitted by a caller. Secrets are wrapped in
/// [`SecretString`], which zeroes the backing memory on drop — every exit
/// path of an authentication attempt clears them, and `Debug` never prints
/// them.
pub enum Credentials {
    Password {
        username: String,
        password: SecretString,
        remember_me: bool,
    },
    SmsCode {
        phone_number: String,
        code: SecretString,
    },
}

impl Credentials {
    #[must_use]
    pub fn password(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self::Password {
            username: username.into(),
            password: SecretString::from(password.into()),
            remember_me: false,
        }
    }

    #[must_use]
    pub fn password_remembered(
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self::Password {
            username: username.into(),
            password: SecretString::from(password.into()),
            remember_me: true,
        }
    }

    #[must_use]
    pub fn sms_code(phone_number: impl Into<String>, code: impl Into<String>) -> Self {
        Self::SmsCode {
            phone_number: phone_number.into(),
            code: SecretString::from(code.into()),
        }
    }

    #[must_use]
    pub fn kind(&self) -> CredentialKind {
        match self {
            Self::Password { .. } => CredentialKind::Password,
            Self::SmsCode { .. } => CredentialKind::SmsCode,
        }
    }

    /// The public identifier part of the submission (username or phone
    /// number); safe to log.
    #[must_use]
    pub fn identifier(&self) -> &str {
        match self {
            Self::Password { username, .. } => username,
            Self::SmsCode { phone_number, .. } => phone_number,
        }
    }

    /// Whether the caller asked for a remember-me token on success.
    #[must_use]
    pub fn remember_me(&self) -> bool {
        match self {
            Self::Password { remember_me, .. } => *remember_me,
            Self::SmsCode { .. } => false,
        }
    }

    pub(crate) fn expose_secret(&self) -> &str {
        match self {
            Self::Password { password, .. } => password.expose_secret(),
            Self::SmsCode { code, .. } => code.expose_secret(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Password {
                username,
                remember_me,
                ..
            } => f
                .debug_struct("Password")
                .field("username", username)
                .field("password", &"[REDACTED]")
                .field("remember_me", remember_me)
                .finish(),
            Self::SmsCode { phone_number, .. } => f
                .debug_struct("SmsCode")
                .field("phone_number", phone_number)
                .field("code", &"[REDACTED]")
                .finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_follows_variant() {
        assert_eq!(
            Credentials::password("alice", "hunter2").kind(),
            CredentialKind::Password
        );
        assert_eq!(
            Credentials::sms_code("13800000000", "1234").kind(),
            CredentialKind::SmsCode
        );
    }

    #[test]
    fn debug_redacts_secrets() {
        let printed = format!("{:?}", Credentials::password("alice", "hunter2"));
        assert!(printed.contains("alice"));
        assert!(printed.contains("[REDACTED]"));
        assert!(!printed.contains("hunter2"));

        let printed = format!("{:?}", Credentials::sms_code("13800000000", "9999"));
        assert!(!printed.contains("9999"));
    }

    #[test]
    fn remember_me_only_for_password_logins() {
        assert!(Credentials::password_remembered("alice", "x").remember_me());
        assert!(!Credentials::password("alice", "x").remember_me());
        assert!(!Credentials::sms_code("13800000000", "1234").remember_me());
    }
}
