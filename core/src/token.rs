//! Identity claims and token signing.
//!
//! # Design
//! The agent mints a fresh [`Claims`] value for every request and hands it,
//! together with the role's secret, to a [`TokenSigner`]. The signer is a
//! capability injected at construction so any algorithm or key store can sit
//! behind it; [`JwtSigner`] is the HMAC JWT implementation PostgREST expects
//! out of the box.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};

use crate::error::{BoxError, Error, Result};

/// Claims carried by the bearer token. PostgREST switches to the database
/// role named by `role`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub role: String,
    #[serde(rename = "iss", default, skip_serializing_if = "String::is_empty")]
    pub issuer: String,
    /// Expiry as Unix seconds.
    #[serde(rename = "exp")]
    pub expires_at: u64,
}

impl Claims {
    pub fn new(role: impl Into<String>, issuer: impl Into<String>, expires_at: u64) -> Self {
        Self {
            role: role.into(),
            issuer: issuer.into(),
            expires_at,
        }
    }

    /// Claims for `role` that expire `lifetime` from now.
    pub fn for_role(role: &str, issuer: &str, lifetime: Duration) -> Self {
        Self::new(role, issuer, current_time_secs().saturating_add(lifetime.as_secs()))
    }

    /// Checks the claims carry a role and have not expired.
    ///
    /// The agent never calls this before sending; the service is the
    /// authority on token validity. It is here for callers that decode
    /// tokens themselves.
    pub fn validate(&self) -> Result<()> {
        self.validate_at(current_time_secs())
    }

    /// [`validate`](Self::validate) against an explicit clock reading.
    pub fn validate_at(&self, now: u64) -> Result<()> {
        if self.role.is_empty() {
            return Err(Error::MissingRole);
        }
        if self.expires_at <= now {
            return Err(Error::ExpiredClaims);
        }
        Ok(())
    }
}

/// Signs claims with a role's secret.
///
/// Implemented for any `Fn(&Claims, &str) -> Result<String, BoxError>`, so a
/// plain function can stand in for a real signer.
pub trait TokenSigner: Send + Sync {
    fn sign(&self, claims: &Claims, secret: &str) -> Result<String, BoxError>;
}

impl<F> TokenSigner for F
where
    F: Fn(&Claims, &str) -> Result<String, BoxError> + Send + Sync,
{
    fn sign(&self, claims: &Claims, secret: &str) -> Result<String, BoxError> {
        self(claims, secret)
    }
}

/// HMAC-signed JSON Web Tokens, the format PostgREST verifies with its
/// `jwt-secret`.
#[derive(Debug, Clone)]
pub struct JwtSigner {
    header: Header,
}

impl JwtSigner {
    /// Signer for an HMAC algorithm (`HS256`, `HS384` or `HS512`). Other
    /// algorithms need a non-secret key and fail at signing time.
    pub fn new(algorithm: Algorithm) -> Self {
        Self {
            header: Header::new(algorithm),
        }
    }

    pub fn hs256() -> Self {
        Self::new(Algorithm::HS256)
    }

    pub fn algorithm(&self) -> Algorithm {
        self.header.alg
    }
}

impl Default for JwtSigner {
    fn default() -> Self {
        Self::hs256()
    }
}

impl TokenSigner for JwtSigner {
    fn sign(&self, claims: &Claims, secret: &str) -> Result<String, BoxError> {
        let key = EncodingKey::from_secret(secret.as_bytes());
        Ok(jsonwebtoken::encode(&self.header, claims, &key)?)
    }
}

/// Current Unix time in seconds, or 0 if the clock is before the epoch.
pub(crate) fn current_time_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
