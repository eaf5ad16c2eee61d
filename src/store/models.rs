use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::auth::Identity;

/// A user account as persisted by the credential store.
///
/// Deliberately not `Serialize`: the password hash and refresh token digest
/// must never end up in a response body.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Account {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub full_name: String,
    pub bio: Option<String>,
    pub refresh_token_hash: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Account {
    pub fn identity(&self) -> Identity {
        Identity {
            account_id: self.id,
            username: self.username.clone(),
            full_name: self.full_name.clone(),
            email: self.email.clone(),
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// Validated input for a new account; the password is already hashed.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub full_name: String,
}

/// Fields a user may change on their own profile. `None` leaves the column as is.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub full_name: Option<String>,
    pub bio: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Follow {
    pub follower_id: Uuid,
    pub following_id: Uuid,
    pub followed_at: DateTime<Utc>,
}

/// One row of a followers listing.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Follower {
    pub id: Uuid,
    pub username: String,
    pub full_name: String,
    pub followed_at: DateTime<Utc>,
}
