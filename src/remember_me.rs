//! Encrypted remember-me tokens for silent re-authentication.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Key, Nonce,
};
use rand::{rngs::OsRng, RngCore};
use secrecy::{ExposeSecret, SecretBox};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Error;
use crate::realm::Principal;

const NONCE_BYTES: usize = 12;
const KEY_BYTES: usize = 32;

/// 256-bit cipher key, sourced from an external secret and zeroed on drop.
pub struct RememberMeKey {
    key: SecretBox<[u8; KEY_BYTES]>,
}

impl RememberMeKey {
    #[must_use]
    pub fn from_bytes(bytes: [u8; KEY_BYTES]) -> Self {
        Self {
            key: SecretBox::new(Box::new(bytes)),
        }
    }

    /// Decode a base64url-encoded key.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` when the encoding is invalid or the decoded
    /// key is not exactly 32 bytes.
    pub fn from_base64(encoded: &str) -> Result<Self, Error> {
        let decoded = URL_SAFE_NO_PAD
            .decode(encoded.trim())
            .map_err(|_| Error::Config("remember-me key is not valid base64url".to_string()))?;
        let bytes: [u8; KEY_BYTES] = decoded
            .try_into()
            .map_err(|_| Error::Config("remember-me key must be 32 bytes".to_string()))?;
        Ok(Self::from_bytes(bytes))
    }
}

#[derive(Serialize, Deserialize)]
struct TokenClaims {
    sub: uuid::Uuid,
    username: String,
    iat: i64,
    exp: i64,
}

/// Issues and resolves encrypted, time-bounded bearer tokens. The token is
/// `base64url(nonce ‖ ciphertext)` under ChaCha20-Poly1305; tampering with a
/// single byte fails the AEAD tag and the token resolves as absent.
pub struct RememberMeManager {
    key: RememberMeKey,
    ttl_seconds: i64,
    cookie_name: String,
}

impl RememberMeManager {
    /// # Errors
    ///
    /// Returns `Error::Config` when the lifetime is not positive.
    pub fn new(key: RememberMeKey, ttl_seconds: i64) -> Result<Self, Error> {
        if ttl_seconds <= 0 {
            return Err(Error::Config(
                "remember-me lifetime must be positive".to_string(),
            ));
        }
        Ok(Self {
            key,
            ttl_seconds,
            cookie_name: "rememberMe".to_string(),
        })
    }

    #[must_use]
    pub fn with_cookie_name(mut self, cookie_name: impl Into<String>) -> Self {
        self.cookie_name = cookie_name.into();
        self
    }

    /// Cookie name the transport layer should carry the token under.
    #[must_use]
    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    #[must_use]
    pub fn ttl_seconds(&self) -> i64 {
        self.ttl_seconds
    }

    /// Issue a token for the principal, expiring `ttl_seconds` after `now`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Crypto` when encryption fails.
    pub fn issue(&self, principal: &Principal, now_unix_seconds: i64) -> Result<String, Error> {
        let claims = TokenClaims {
            sub: principal.id(),
            username: principal.username().to_string(),
            iat: now_unix_seconds,
            exp: now_unix_seconds + self.ttl_seconds,
        };
        let plaintext = serde_json::to_vec(&claims)
            .map_err(|err| Error::Crypto(format!("failed to encode token claims: {err}")))?;

        let cipher = ChaCha20Poly1305::new(Key::from_slice(self.key.key.expose_secret()));
        let mut nonce_bytes = [0u8; NONCE_BYTES];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(nonce, plaintext.as_slice())
            .map_err(|err| Error::Crypto(format!("failed to encrypt token: {err}")))?;

        let mut wire = Vec::with_capacity(NONCE_BYTES + ciphertext.len());
        wire.extend_from_slice(&nonce_bytes);
        wire.extend_from_slice(&ciphertext);
        Ok(URL_SAFE_NO_PAD.encode(wire))
    }

    /// Resolve a token back to its principal. Every failure mode — bad
    /// encoding, wrong key, tampered ciphertext, malformed claims, expiry —
    /// is treated as "no session" and returns `None`; resolution never
    /// errors into the caller's request path.
    #[must_use]
    pub fn resolve(&self, token: &str, now_unix_seconds: i64) -> Option<Principal> {
        match self.try_resolve(token, now_unix_seconds) {
            Ok(principal) => Some(principal),
            Err(err) => {
                debug!(error = %err, "remember-me token rejected");
                None
            }
        }
    }

    /// Resolution with the failure surfaced, for diagnostics outside the
    /// request path.
    ///
    /// # Errors
    ///
    /// Returns `Error::TokenInvalidOrExpired` for any rejected token.
    pub fn try_resolve(&self, token: &str, now_unix_seconds: i64) -> Result<Principal, Error> {
        let wire = URL_SAFE_NO_PAD
            .decode(token.trim())
            .map_err(|_| Error::TokenInvalidOrExpired)?;
        if wire.len() <= NONCE_BYTES {
            return Err(Error::TokenInvalidOrExpired);
        }
        let (nonce_bytes, ciphertext) = wire.split_at(NONCE_BYTES);

        let cipher = ChaCha20Poly1305::new(Key::from_slice(self.key.key.expose_secret()));
        let plaintext = cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|_| Error::TokenInvalidOrExpired)?;

        let claims: TokenClaims =
            serde_json::from_slice(&plaintext).map_err(|_| Error::TokenInvalidOrExpired)?;
        if claims.exp <= now_unix_seconds {
            return Err(Error::TokenInvalidOrExpired);
        }
        Ok(Principal::new(claims.sub, claims.username))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    const NOW: i64 = 1_700_000_000;
    const THIRTY_DAYS: i64 = 30 * 24 * 60 * 60;

    fn manager() -> RememberMeManager {
        RememberMeManager::new(RememberMeKey::from_bytes([42u8; 32]), THIRTY_DAYS).unwrap()
    }

    fn principal() -> Principal {
        Principal::new(Uuid::new_v4(), "alice")
    }

    #[test]
    fn issue_then_resolve_round_trip() {
        let manager = manager();
        let principal = principal();
        let token = manager.issue(&principal, NOW).unwrap();
        let resolved = manager.resolve(&token, NOW + 1).unwrap();
        assert_eq!(resolved, principal);
        assert_eq!(resolved.username(), "alice");
    }

    #[test]
    fn expired_token_is_absent() {
        let manager = manager();
        let token = manager.issue(&principal(), NOW).unwrap();
        assert!(manager.resolve(&token, NOW + THIRTY_DAYS).is_none());
        assert!(manager.resolve(&token, NOW + THIRTY_DAYS - 1).is_some());
    }

    #[test]
    fn tampering_with_one_byte_invalidates() {
        let manager = manager();
        let token = manager.issue(&principal(), NOW).unwrap();

        let mut wire = URL_SAFE_NO_PAD.decode(&token).unwrap();
        let last = wire.len() - 1;
        wire[last] ^= 0x01;
        let forged = URL_SAFE_NO_PAD.encode(wire);

        assert!(manager.resolve(&forged, NOW).is_none());
    }

    #[test]
    fn wrong_key_fails_silently() {
        let manager = manager();
        let token = manager.issue(&principal(), NOW).unwrap();
        let other =
            RememberMeManager::new(RememberMeKey::from_bytes([7u8; 32]), THIRTY_DAYS).unwrap();
        assert!(other.resolve(&token, NOW).is_none());
    }

    #[test]
    fn garbage_tokens_are_absent() {
        let manager = manager();
        assert!(manager.resolve("", NOW).is_none());
        assert!(manager.resolve("not base64 ☂", NOW).is_none());
        assert!(manager.resolve("aGVsbG8", NOW).is_none());
    }

    #[test]
    fn try_resolve_names_the_failure() {
        let manager = manager();
        let result = manager.try_resolve("aGVsbG8", NOW);
        assert!(matches!(
            result,
            Err(crate::error::Error::TokenInvalidOrExpired)
        ));
    }

    #[test]
    fn key_decoding_validates_length() {
        let short = URL_SAFE_NO_PAD.encode([1u8; 16]);
        assert!(RememberMeKey::from_base64(&short).is_err());
        let good = URL_SAFE_NO_PAD.encode([1u8; 32]);
        assert!(RememberMeKey::from_base64(&good).is_ok());
        assert!(RememberMeKey::from_base64("!!!").is_err());
    }

    #[test]
    fn non_positive_lifetime_rejected() {
        assert!(RememberMeManager::new(RememberMeKey::from_bytes([0u8; 32]), 0).is_err());
        assert!(RememberMeManager::new(RememberMeKey::from_bytes([0u8; 32]), -5).is_err());
    }
}
