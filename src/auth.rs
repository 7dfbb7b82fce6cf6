//! Caller identity: bearer-token verification for agent mode.
//!
//! Token issuance lives elsewhere; this module only verifies. A request
//! carries its credential as `Authorization: Bearer <jwt>` or, for browser
//! clients, an `access_token` cookie.

use std::fmt;

use axum::http::HeaderMap;
use axum::http::header::{AUTHORIZATION, COOKIE};
use jsonwebtoken::{DecodingKey, Validation, decode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Cookie consulted when no Authorization header is present.
pub const ACCESS_TOKEN_COOKIE: &str = "access_token";

/// Owner identity of a verified caller.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Verifies a raw credential and yields the caller's identity.
pub trait IdentityVerifier: Send + Sync {
    /// Returns `None` for any invalid, expired, or malformed token.
    fn verify(&self, token: &str) -> Option<UserId>;
}

/// Claims read from an access token.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject: the user id.
    pub sub: String,
    /// Expiration timestamp.
    pub exp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
}

/// HS256 JWT verifier.
pub struct JwtVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    pub fn new(secret: &SecretString, issuer: Option<&str>) -> Self {
        let mut validation = Validation::default();
        if let Some(iss) = issuer {
            validation.set_issuer(&[iss]);
        }
        Self {
            decoding_key: DecodingKey::from_secret(secret.expose_secret().as_bytes()),
            validation,
        }
    }
}

impl IdentityVerifier for JwtVerifier {
    fn verify(&self, token: &str) -> Option<UserId> {
        match decode::<Claims>(token, &self.decoding_key, &self.validation) {
            Ok(data) if !data.claims.sub.trim().is_empty() => Some(UserId::new(data.claims.sub)),
            Ok(_) => {
                debug!("Rejected token with empty subject");
                None
            }
            Err(e) => {
                debug!(error = %e, "Token verification failed");
                None
            }
        }
    }
}

/// Pull the raw credential out of request headers.
pub fn extract_token(headers: &HeaderMap) -> Option<String> {
    if let Some(auth) = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok()) {
        let token = auth.strip_prefix("Bearer ").unwrap_or(auth).trim();
        if !token.is_empty() {
            return Some(token.to_string());
        }
    }

    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == ACCESS_TOKEN_COOKIE)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Resolve the caller's identity, if any. Anonymous callers yield `None`.
pub fn authenticate(headers: &HeaderMap, verifier: Option<&dyn IdentityVerifier>) -> Option<UserId> {
    let verifier = verifier?;
    let token = extract_token(headers)?;
    verifier.verify(&token)
}
