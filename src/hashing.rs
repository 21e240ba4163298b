//! Salted, iterated credential hashing.

use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256, Sha512};

use crate::error::Error;

const SALT_BYTES: usize = 16;
const RECOMMENDED_MIN_ITERATIONS: u32 = 1024;

/// Digest algorithm for stored credentials. Always named explicitly in
/// configuration; there is no implicit platform default.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HashAlgorithm {
    Sha256,
    Sha512,
}

impl HashAlgorithm {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sha256 => "sha-256",
            Self::Sha512 => "sha-512",
        }
    }
}

/// Compute the hex digest of `secret` under `salt`, re-digesting `iterations`
/// times. Registration and verification must call this with identical
/// algorithm, salt, and iteration count; both read [`HashingConfig`] so the
/// call sites cannot drift apart.
///
/// # Errors
///
/// Returns `Error::Config` when `iterations` is zero.
pub fn hash(
    algorithm: HashAlgorithm,
    secret: &str,
    salt: &str,
    iterations: u32,
) -> Result<String, Error> {
    if iterations == 0 {
        return Err(Error::Config(
            "hash iterations must be at least 1".to_string(),
        ));
    }
    let digest = match algorithm {
        HashAlgorithm::Sha256 => iterate::<Sha256>(secret, salt, iterations),
        HashAlgorithm::Sha512 => iterate::<Sha512>(secret, salt, iterations),
    };
    Ok(digest)
}

fn iterate<D: Digest>(secret: &str, salt: &str, iterations: u32) -> String {
    let mut digest = D::new()
        .chain_update(salt.as_bytes())
        .chain_update(secret.as_bytes())
        .finalize();
    for _ in 1..iterations {
        digest = D::new().chain_update(&digest).finalize();
    }
    hex_encode(&digest)
}

/// Generate a fresh per-account salt from the OS random source, hex-encoded.
#[must_use]
pub fn generate_salt() -> String {
    let mut bytes = [0u8; SALT_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex_encode(&bytes)
}

fn hex_encode(bytes: &[u8]) -> String {
    use std::fmt::Write;

    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        let _ = write!(out, "{byte:02x}");
    }
    out
}

/// Hashing scheme shared by registration and login-time verification.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashingConfig {
    algorithm: HashAlgorithm,
    iterations: u32,
}

/// Freshly hashed password material ready to be stored on an account record.
#[derive(Clone, Debug)]
pub struct PasswordRecord {
    pub hash: String,
    pub salt: String,
}

impl HashingConfig {
    /// # Errors
    ///
    /// Returns `Error::Config` when `iterations` is zero.
    pub fn new(algorithm: HashAlgorithm, iterations: u32) -> Result<Self, Error> {
        if iterations == 0 {
            return Err(Error::Config(
                "hash iterations must be at least 1".to_string(),
            ));
        }
        if iterations < RECOMMENDED_MIN_ITERATIONS {
            tracing::warn!(
                iterations,
                "hash iteration count below the recommended minimum of {RECOMMENDED_MIN_ITERATIONS}"
            );
        }
        Ok(Self {
            algorithm,
            iterations,
        })
    }

    #[must_use]
    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    #[must_use]
    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    /// Hash a submitted secret against a stored salt, for verification.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` when the configured iteration count is invalid.
    pub fn hash_secret(&self, secret: &str, salt: &str) -> Result<String, Error> {
        hash(self.algorithm, secret, salt, self.iterations)
    }

    /// Hash a new password under a fresh salt, for registration.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` when the configured iteration count is invalid.
    pub fn new_password_record(&self, password: &str) -> Result<PasswordRecord, Error> {
        let salt = generate_salt();
        let hash = self.hash_secret(password, &salt)?;
        Ok(PasswordRecord { hash, salt })
    }
}
