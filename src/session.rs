/// Session Manager
///
/// Orchestrates registration, login, refresh-token rotation and logout on top
/// of the credential store and the token codec. Session state lives entirely
/// in the store: an account is logged in while it has a stored refresh token
/// digest, and each login or refresh overwrites it.

use std::sync::Arc;

use bcrypt::DEFAULT_COST;
use tracing::Span;
use uuid::Uuid;

use crate::auth::{
    decode_token, fingerprint, hash_password_with_cost, issue_token_pair, prepare_dummy_hash,
    verify_against_dummy, verify_password, TokenKind, TokenPair,
};
use crate::configuration::JwtSettings;
use crate::error::{AppError, AuthError, DatabaseError};
use crate::store::{Account, CredentialStore, NewAccount};
use crate::validators::{is_valid_email, is_valid_name, is_valid_username};

/// Registration input as received from the caller, not yet validated
#[derive(Debug, Clone)]
pub struct Registration {
    pub username: String,
    pub password: String,
    pub email: String,
    pub full_name: String,
}

pub struct SessionManager {
    store: Arc<dyn CredentialStore>,
    jwt: JwtSettings,
    hash_cost: u32,
    span: Span,
}

impl SessionManager {
    pub fn new(store: Arc<dyn CredentialStore>, jwt: JwtSettings) -> Self {
        prepare_dummy_hash();
        Self {
            store,
            jwt,
            hash_cost: DEFAULT_COST,
            span: tracing::info_span!("session_manager"),
        }
    }

    /// Span every operation of this manager links to. Operation spans still
    /// nest under the caller's current span, so request ids carry through.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// bcrypt cost for newly registered passwords
    pub fn with_hash_cost(mut self, cost: u32) -> Self {
        self.hash_cost = cost;
        self
    }

    pub fn jwt_settings(&self) -> &JwtSettings {
        &self.jwt
    }

    fn link_span(&self) {
        Span::current().follows_from(&self.span);
    }

    /// Create an account with a salted bcrypt hash of the password.
    ///
    /// # Errors
    /// - Validation: malformed username, email, full name or password
    /// - Database(UniqueConstraintViolation): username or email taken
    #[tracing::instrument(name = "register", skip_all, fields(component = "session"))]
    pub async fn register(&self, registration: Registration) -> Result<Account, AppError> {
        self.link_span();
        let username = is_valid_username(&registration.username)?;
        let email = is_valid_email(&registration.email)?;
        let full_name = is_valid_name(&registration.full_name)?;
        let password_hash = hash_password_with_cost(&registration.password, self.hash_cost)?;

        let account = self
            .store
            .create_account(NewAccount {
                username,
                email,
                password_hash,
                full_name,
            })
            .await?;

        tracing::info!(user_id = %account.id, "Account registered");
        Ok(account)
    }

    /// Check credentials, mint a token pair and store its refresh token.
    ///
    /// A missing account and a wrong password are indistinguishable to the
    /// caller: both return `InvalidCredentials` after one bcrypt verification.
    /// Concurrent logins race on the stored token; the last write wins.
    #[tracing::instrument(name = "login", skip_all, fields(component = "session"))]
    pub async fn login(&self, username: &str, password: &str) -> Result<TokenPair, AppError> {
        self.link_span();
        // Registration stores usernames trimmed
        let account = match self.store.find_by_username(username.trim()).await {
            Ok(account) => Some(account),
            Err(DatabaseError::NotFound(_)) => None,
            Err(e) => return Err(e.into()),
        };

        let verified = match &account {
            Some(account) => verify_password(password, &account.password_hash)?,
            None => verify_against_dummy(password),
        };

        let account = match account {
            Some(account) if verified => account,
            _ => {
                tracing::warn!("Login rejected");
                return Err(AuthError::InvalidCredentials.into());
            }
        };

        let pair = issue_token_pair(&account.identity(), &self.jwt)?;
        self.store
            .set_refresh_token(account.id, Some(&fingerprint(&pair.refresh_token)))
            .await?;

        tracing::info!(user_id = %account.id, "User logged in");
        Ok(pair)
    }

    /// Rotate a refresh token: the presented token must verify and match the
    /// stored one, and is consumed by this call.
    ///
    /// The new token replaces the old one with a compare-and-swap, so of two
    /// concurrent refreshes presenting the same token only one succeeds.
    #[tracing::instrument(name = "refresh", skip_all, fields(component = "session"))]
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, AppError> {
        self.link_span();
        let claims = decode_token(refresh_token, TokenKind::Refresh, &self.jwt).map_err(|e| {
            tracing::warn!(error = %e, "Refresh token rejected");
            AppError::from(e)
        })?;
        let account_id = claims.account_id()?;

        let stored = match self.store.get_refresh_token(account_id).await {
            Ok(stored) => stored,
            Err(DatabaseError::NotFound(_)) => return Err(AuthError::TokenInvalid.into()),
            Err(e) => return Err(e.into()),
        };

        let presented = fingerprint(refresh_token);
        if stored.as_deref() != Some(presented.as_str()) {
            tracing::warn!(user_id = %account_id, "Stale or revoked refresh token presented");
            return Err(AuthError::TokenInvalid.into());
        }

        let account = match self.store.find_by_id(account_id).await {
            Ok(account) => account,
            Err(DatabaseError::NotFound(_)) => return Err(AuthError::TokenInvalid.into()),
            Err(e) => return Err(e.into()),
        };

        let pair = issue_token_pair(&account.identity(), &self.jwt)?;
        let swapped = self
            .store
            .swap_refresh_token(account_id, &presented, &fingerprint(&pair.refresh_token))
            .await?;
        if !swapped {
            tracing::warn!(user_id = %account_id, "Lost refresh race to a concurrent rotation");
            return Err(AuthError::TokenInvalid.into());
        }

        tracing::info!(user_id = %account_id, "Token refreshed");
        Ok(pair)
    }

    /// Clear the stored refresh token. Outstanding access tokens stay valid
    /// until they expire.
    ///
    /// # Errors
    /// - Database(NotFound): no live account with this id
    #[tracing::instrument(name = "logout", skip_all, fields(component = "session"))]
    pub async fn logout(&self, account_id: Uuid) -> Result<(), AppError> {
        self.link_span();
        self.store.set_refresh_token(account_id, None).await?;

        tracing::info!(user_id = %account_id, "User logged out");
        Ok(())
    }
}
