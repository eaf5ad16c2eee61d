/// Profile and follow-graph routes
///
/// All handlers sit behind the auth guard and receive the caller's identity.

use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::Identity;
use crate::error::{AppError, AuthError, ValidationError};
use crate::store::{Account, CredentialStore, Follower, ProfileUpdate};
use crate::validators::{is_valid_bio, is_valid_name};

const DEFAULT_PAGE_SIZE: i64 = 10;
const MAX_PAGE_SIZE: i64 = 100;

#[derive(Deserialize)]
pub struct UpdateProfileRequest {
    pub full_name: Option<String>,
    pub bio: Option<String>,
}

#[derive(Deserialize)]
pub struct PageQuery {
    pub limit: Option<i64>,
    pub page: Option<i64>,
}

#[derive(Serialize)]
pub struct ProfileResponse {
    pub id: String,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub bio: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Account> for ProfileResponse {
    fn from(account: Account) -> Self {
        Self {
            id: account.id.to_string(),
            username: account.username,
            email: account.email,
            full_name: account.full_name,
            bio: account.bio,
            created_at: account.created_at.to_rfc3339(),
            updated_at: account.updated_at.to_rfc3339(),
        }
    }
}

#[derive(Serialize)]
pub struct UserSummary {
    pub id: String,
    pub username: String,
    pub full_name: String,
}

impl From<Account> for UserSummary {
    fn from(account: Account) -> Self {
        Self {
            id: account.id.to_string(),
            username: account.username,
            full_name: account.full_name,
        }
    }
}

#[derive(Serialize)]
pub struct UsersResponse {
    pub users: Vec<UserSummary>,
    pub page: i64,
    pub limit: i64,
}

#[derive(Serialize)]
pub struct FollowResponse {
    pub follower_id: String,
    pub following_id: String,
    pub followed_at: String,
}

#[derive(Serialize)]
pub struct FollowerResponse {
    pub id: String,
    pub username: String,
    pub full_name: String,
    pub followed_at: String,
}

impl From<Follower> for FollowerResponse {
    fn from(follower: Follower) -> Self {
        Self {
            id: follower.id.to_string(),
            username: follower.username,
            full_name: follower.full_name,
            followed_at: follower.followed_at.to_rfc3339(),
        }
    }
}

#[derive(Serialize)]
pub struct FollowersResponse {
    pub followers: Vec<FollowerResponse>,
    pub page: i64,
    pub limit: i64,
}

#[derive(Serialize)]
pub struct MessageResponse {
    pub message: String,
}

fn ensure_owner(identity: &Identity, user_id: Uuid) -> Result<(), AppError> {
    if identity.account_id != user_id {
        return Err(AuthError::Forbidden.into());
    }
    Ok(())
}

/// Resolve `limit`/`page` into (limit, page, offset)
fn page_bounds(query: &PageQuery) -> Result<(i64, i64, i64), AppError> {
    let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE);
    let page = query.page.unwrap_or(1);

    if !(1..=MAX_PAGE_SIZE).contains(&limit) {
        return Err(ValidationError::Malformed(format!(
            "limit must be between 1 and {}",
            MAX_PAGE_SIZE
        ))
        .into());
    }
    if page < 1 {
        return Err(ValidationError::Malformed("page must be at least 1".to_string()).into());
    }

    let offset = (page - 1)
        .checked_mul(limit)
        .ok_or_else(|| ValidationError::Malformed("page is out of range".to_string()))?;
    Ok((limit, page, offset))
}

/// GET /users?limit=&page=
pub async fn list_users(
    query: web::Query<PageQuery>,
    store: web::Data<dyn CredentialStore>,
) -> Result<HttpResponse, AppError> {
    let (limit, page, offset) = page_bounds(&query)?;
    let accounts = store.list_accounts(limit, offset).await?;

    Ok(HttpResponse::Ok().json(UsersResponse {
        users: accounts.into_iter().map(UserSummary::from).collect(),
        page,
        limit,
    }))
}

/// GET /users/me
pub async fn me(
    identity: web::ReqData<Identity>,
    store: web::Data<dyn CredentialStore>,
) -> Result<HttpResponse, AppError> {
    let account = store.find_by_id(identity.account_id).await?;
    Ok(HttpResponse::Ok().json(ProfileResponse::from(account)))
}

/// GET /users/{user_id}
pub async fn profile(
    path: web::Path<Uuid>,
    store: web::Data<dyn CredentialStore>,
) -> Result<HttpResponse, AppError> {
    let account = store.find_by_id(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ProfileResponse::from(account)))
}

/// PUT /users/{user_id}
///
/// # Errors
/// - 400: invalid full name or bio
/// - 403: caller is not the account owner
pub async fn update_profile(
    path: web::Path<Uuid>,
    identity: web::ReqData<Identity>,
    form: web::Json<UpdateProfileRequest>,
    store: web::Data<dyn CredentialStore>,
) -> Result<HttpResponse, AppError> {
    let user_id = path.into_inner();
    ensure_owner(&identity, user_id)?;

    let update = ProfileUpdate {
        full_name: form.full_name.as_deref().map(is_valid_name).transpose()?,
        bio: form.bio.as_deref().map(is_valid_bio).transpose()?,
    };

    let account = store.update_profile(user_id, update).await?;
    tracing::info!(user_id = %user_id, "Profile updated");
    Ok(HttpResponse::Ok().json(ProfileResponse::from(account)))
}

/// DELETE /users/{user_id}
///
/// Soft-deletes the caller's own account and revokes its refresh token.
pub async fn delete_account(
    path: web::Path<Uuid>,
    identity: web::ReqData<Identity>,
    store: web::Data<dyn CredentialStore>,
) -> Result<HttpResponse, AppError> {
    let user_id = path.into_inner();
    ensure_owner(&identity, user_id)?;

    store.soft_delete(user_id).await?;
    tracing::info!(user_id = %user_id, "Account deleted");
    Ok(HttpResponse::Ok().json(MessageResponse {
        message: "user deleted".to_string(),
    }))
}

/// POST /users/{user_id}/follow
///
/// # Errors
/// - 400: following yourself
/// - 404: no such user
/// - 409: already following
pub async fn follow(
    path: web::Path<Uuid>,
    identity: web::ReqData<Identity>,
    store: web::Data<dyn CredentialStore>,
) -> Result<HttpResponse, AppError> {
    let following_id = path.into_inner();
    if following_id == identity.account_id {
        return Err(ValidationError::Malformed("cannot follow yourself".to_string()).into());
    }

    let follow = store.follow(identity.account_id, following_id).await?;
    tracing::info!(
        follower_id = %follow.follower_id,
        following_id = %follow.following_id,
        "Follow created"
    );

    Ok(HttpResponse::Ok().json(FollowResponse {
        follower_id: follow.follower_id.to_string(),
        following_id: follow.following_id.to_string(),
        followed_at: follow.followed_at.to_rfc3339(),
    }))
}

/// GET /users/{user_id}/followers?limit=&page=
pub async fn followers(
    path: web::Path<Uuid>,
    query: web::Query<PageQuery>,
    store: web::Data<dyn CredentialStore>,
) -> Result<HttpResponse, AppError> {
    let user_id = path.into_inner();
    let (limit, page, offset) = page_bounds(&query)?;

    // 404 for unknown users rather than an empty page
    store.find_by_id(user_id).await?;
    let followers = store.followers(user_id, limit, offset).await?;

    Ok(HttpResponse::Ok().json(FollowersResponse {
        followers: followers.into_iter().map(FollowerResponse::from).collect(),
        page,
        limit,
    }))
}
