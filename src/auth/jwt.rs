/// JWT Token Generation and Validation
///
/// The token codec: a pure function of (claims, secret, clock) to a signed
/// HS256 string, and its inverse. Only HS256 is accepted on the way back in,
/// with zero leeway on expiry.

use chrono::Utc;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::Serialize;
use std::fmt;

use crate::auth::claims::{Claims, Identity, TokenKind};
use crate::configuration::JwtSettings;
use crate::error::{AppError, AuthError};

/// Why a token was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenError {
    Malformed,
    BadSignature,
    Expired,
    WrongKind,
}

impl fmt::Display for TokenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenError::Malformed => write!(f, "token is malformed"),
            TokenError::BadSignature => write!(f, "token signature is invalid"),
            TokenError::Expired => write!(f, "token has expired"),
            TokenError::WrongKind => write!(f, "token is of the wrong kind"),
        }
    }
}

impl std::error::Error for TokenError {}

impl From<TokenError> for AuthError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Expired => AuthError::TokenExpired,
            _ => AuthError::TokenInvalid,
        }
    }
}

impl From<TokenError> for AppError {
    fn from(err: TokenError) -> Self {
        AppError::Auth(err.into())
    }
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::ExpiredSignature => TokenError::Expired,
            ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => TokenError::BadSignature,
            _ => TokenError::Malformed,
        }
    }
}

/// Access and refresh token minted together
#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

fn ttl_for(kind: TokenKind, config: &JwtSettings) -> i64 {
    match kind {
        TokenKind::Access => config.access_token_expiry,
        TokenKind::Refresh => config.refresh_token_expiry,
    }
}

/// Sign an already-built claim set
///
/// # Errors
/// Returns an internal error if signing fails
pub fn encode_claims(claims: &Claims, secret: &str) -> Result<String, AppError> {
    encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(format!("Token generation failed: {}", e)))
}

/// Mint a token of `kind` for `identity`, valid from now for the configured TTL
pub fn issue_token(
    identity: &Identity,
    kind: TokenKind,
    config: &JwtSettings,
) -> Result<String, AppError> {
    let claims = Claims::new(
        identity,
        kind,
        ttl_for(kind, config),
        &config.issuer,
        Utc::now().timestamp(),
    );
    encode_claims(&claims, &config.secret)
}

pub fn issue_token_pair(identity: &Identity, config: &JwtSettings) -> Result<TokenPair, AppError> {
    Ok(TokenPair {
        access_token: issue_token(identity, TokenKind::Access, config)?,
        refresh_token: issue_token(identity, TokenKind::Refresh, config)?,
    })
}

/// Verify signature, algorithm, issuer, expiry and kind; return the claims
///
/// # Errors
/// Returns the first check that failed as a `TokenError`
pub fn decode_token(
    token: &str,
    expected: TokenKind,
    config: &JwtSettings,
) -> Result<Claims, TokenError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;
    validation.set_issuer(&[&config.issuer]);
    validation.set_required_spec_claims(&["exp", "iss", "sub"]);

    let claims = decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)?;

    if claims.kind != expected {
        return Err(TokenError::WrongKind);
    }
    Ok(claims)
}
