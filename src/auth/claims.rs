/// JWT Claims structure
///
/// Strongly-typed payload of access and refresh tokens: the account identity
/// plus the standard RFC 7519 claims.

use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::auth::jwt::TokenError;

const NONCE_LENGTH: usize = 16;

/// Which half of a token pair a token is. Carried inside the claims so an
/// access token can never be replayed as a refresh token or vice versa.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Access => write!(f, "access"),
            TokenKind::Refresh => write!(f, "refresh"),
        }
    }
}

/// Verified identity of the caller, handed to handlers by the auth guard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub account_id: Uuid,
    pub username: String,
    pub full_name: String,
    pub email: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Claims {
    /// Subject (account ID as UUID string)
    pub sub: String,
    pub username: String,
    pub full_name: String,
    pub email: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    pub iss: String,
    /// Random nonce; two tokens minted in the same second still differ
    pub jti: String,
    pub kind: TokenKind,
}

impl Claims {
    /// Build claims for `identity` issued at `now`, expiring `ttl_seconds` later.
    pub fn new(identity: &Identity, kind: TokenKind, ttl_seconds: i64, issuer: &str, now: i64) -> Self {
        Self {
            sub: identity.account_id.to_string(),
            username: identity.username.clone(),
            full_name: identity.full_name.clone(),
            email: identity.email.clone(),
            iat: now,
            exp: now + ttl_seconds,
            iss: issuer.to_string(),
            jti: generate_nonce(),
            kind,
        }
    }

    /// Extract account ID from claims
    pub fn account_id(&self) -> Result<Uuid, TokenError> {
        Uuid::parse_str(&self.sub).map_err(|_| TokenError::Malformed)
    }

    pub fn identity(&self) -> Result<Identity, TokenError> {
        Ok(Identity {
            account_id: self.account_id()?,
            username: self.username.clone(),
            full_name: self.full_name.clone(),
            email: self.email.clone(),
        })
    }
}

fn generate_nonce() -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(NONCE_LENGTH)
        .map(char::from)
        .collect()
}
