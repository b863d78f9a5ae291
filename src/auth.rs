//! API-key authentication for private REST calls.
//!
//! Every request carries an HMAC-SHA256 signature over the canonical string
//! `METHOD + timestamp + path + query + body`, hex encoded.

use std::fmt;

use hmac::{Hmac, Mac as _};
use reqwest::Method;
use secrecy::{ExposeSecret as _, SecretString};
use sha2::Sha256;

use crate::Timestamp;

type HmacSha256 = Hmac<Sha256>;

const MASK_PREFIX: usize = 10;
const MASK_SUFFIX: usize = 5;

/// API key and secret issued by the exchange.
///
/// The secret never leaves this module except as HMAC key material, and the
/// `Debug` output only shows [`Credentials::masked_key`].
#[derive(Clone)]
pub struct Credentials {
    key: String,
    secret: SecretString,
}

impl Credentials {
    #[must_use]
    pub fn new<K: Into<String>>(key: K, secret: SecretString) -> Self {
        Self {
            key: key.into(),
            secret,
        }
    }

    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// First and last few characters of the key, for diagnostics.
    #[must_use]
    pub fn masked_key(&self) -> String {
        let count = self.key.chars().count();
        if count <= MASK_PREFIX + MASK_SUFFIX {
            return "***".to_owned();
        }

        let prefix: String = self.key.chars().take(MASK_PREFIX).collect();
        let suffix: String = self.key.chars().skip(count - MASK_SUFFIX).collect();
        format!("{prefix}...{suffix}")
    }

    pub(crate) fn signer(&self) -> Signer {
        Signer::new(self.secret.clone())
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("key", &self.masked_key())
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

/// Signature and the timestamp it was computed for.
#[non_exhaustive]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Signature {
    pub hex: String,
    pub timestamp: String,
}

/// HMAC-SHA256 request signer keyed by the API secret.
#[derive(Clone)]
pub struct Signer {
    secret: SecretString,
}

impl Signer {
    #[must_use]
    pub fn new(secret: SecretString) -> Self {
        Self { secret }
    }

    /// Signs with the current wall-clock time.
    #[must_use]
    pub fn sign(&self, method: &Method, path: &str, query: &str, body: &[u8]) -> Signature {
        self.sign_at(chrono::Utc::now().timestamp(), method, path, query, body)
    }

    /// Signs with an explicit Unix timestamp in seconds.
    ///
    /// `query` must be empty or start with `?`, and `body` must be the exact bytes
    /// that go on the wire.
    #[must_use]
    pub fn sign_at(
        &self,
        timestamp: Timestamp,
        method: &Method,
        path: &str,
        query: &str,
        body: &[u8],
    ) -> Signature {
        let timestamp = timestamp.to_string();

        let Ok(mut mac) = HmacSha256::new_from_slice(self.secret.expose_secret().as_bytes())
        else {
            unreachable!("HMAC accepts keys of any length")
        };
        mac.update(method.as_str().as_bytes());
        mac.update(timestamp.as_bytes());
        mac.update(path.as_bytes());
        mac.update(query.as_bytes());
        mac.update(body);

        Signature {
            hex: hex::encode(mac.finalize().into_bytes()),
            timestamp,
        }
    }
}

impl fmt::Debug for Signer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signer").finish_non_exhaustive()
    }
}
