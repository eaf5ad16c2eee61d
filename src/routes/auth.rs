/// Authentication Routes
///
/// Handles user registration, login, token refresh, and logout.

use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};

use crate::auth::{Identity, TokenPair};
use crate::error::AppError;
use crate::session::{Registration, SessionManager};

/// User registration request
#[derive(Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    pub email: String,
    pub full_name: String,
}

/// User login request
#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Token refresh request
#[derive(Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Serialize)]
pub struct RegisterResponse {
    pub id: String,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub created_at: String,
}

/// Authentication response with access and refresh tokens
#[derive(Serialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

impl AuthResponse {
    fn new(pair: TokenPair, expires_in: i64) -> Self {
        Self {
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
            token_type: "Bearer".to_string(),
            expires_in,
        }
    }
}

#[derive(Serialize)]
pub struct MessageResponse {
    pub message: String,
}

/// POST /auth/register
///
/// # Errors
/// - 400: invalid username, email, full name or password
/// - 409: username or email already registered
/// - 500: Internal server error
pub async fn register(
    form: web::Json<RegisterRequest>,
    sessions: web::Data<SessionManager>,
) -> Result<HttpResponse, AppError> {
    let form = form.into_inner();
    let account = sessions
        .register(Registration {
            username: form.username,
            password: form.password,
            email: form.email,
            full_name: form.full_name,
        })
        .await?;

    Ok(HttpResponse::Created().json(RegisterResponse {
        id: account.id.to_string(),
        username: account.username,
        email: account.email,
        full_name: account.full_name,
        created_at: account.created_at.to_rfc3339(),
    }))
}

/// POST /auth/login
///
/// # Errors
/// - 400: malformed body
/// - 401: invalid credentials (same response for unknown user and wrong password)
/// - 500: Internal server error
pub async fn login(
    form: web::Json<LoginRequest>,
    sessions: web::Data<SessionManager>,
) -> Result<HttpResponse, AppError> {
    let pair = sessions.login(&form.username, &form.password).await?;

    Ok(HttpResponse::Ok().json(AuthResponse::new(
        pair,
        sessions.jwt_settings().access_token_expiry,
    )))
}

/// POST /auth/refresh
///
/// Exchanges a refresh token for a new pair. The presented token is consumed.
///
/// # Errors
/// - 400: malformed body
/// - 401: invalid, expired, rotated-out or revoked refresh token
/// - 500: Internal server error
pub async fn refresh(
    form: web::Json<RefreshRequest>,
    sessions: web::Data<SessionManager>,
) -> Result<HttpResponse, AppError> {
    let pair = sessions.refresh(&form.refresh_token).await?;

    Ok(HttpResponse::Ok().json(AuthResponse::new(
        pair,
        sessions.jwt_settings().access_token_expiry,
    )))
}

/// POST /auth/logout
///
/// **Requires valid JWT access token** in Authorization header.
///
/// # Errors
/// - 401: Missing or invalid token (handled by middleware)
/// - 404: account no longer exists
pub async fn logout(
    identity: web::ReqData<Identity>,
    sessions: web::Data<SessionManager>,
) -> Result<HttpResponse, AppError> {
    sessions.logout(identity.account_id).await?;

    Ok(HttpResponse::Ok().json(MessageResponse {
        message: format!("User {} successfully logged out", identity.username),
    }))
}
