/// Credential Store
///
/// Persists accounts, the single active refresh token digest per account,
/// and the follow graph. Every lookup excludes soft-deleted accounts and
/// reports a missing row as `DatabaseError::NotFound`, distinct from
/// connection or query failures.

mod memory;
mod models;
mod postgres;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::DatabaseError;

pub use memory::InMemoryCredentialStore;
pub use models::{Account, Follow, Follower, NewAccount, ProfileUpdate};
pub use postgres::PgCredentialStore;

#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Insert a new account. Duplicate username or email yields
    /// `UniqueConstraintViolation`.
    async fn create_account(&self, account: NewAccount) -> Result<Account, DatabaseError>;

    async fn find_by_username(&self, username: &str) -> Result<Account, DatabaseError>;

    async fn find_by_id(&self, account_id: Uuid) -> Result<Account, DatabaseError>;

    /// Live accounts, oldest first (ties by id).
    async fn list_accounts(&self, limit: i64, offset: i64) -> Result<Vec<Account>, DatabaseError>;

    /// The stored refresh token digest, `None` when logged out.
    async fn get_refresh_token(&self, account_id: Uuid) -> Result<Option<String>, DatabaseError>;

    /// Unconditionally overwrite (or clear, with `None`) the stored token.
    async fn set_refresh_token(
        &self,
        account_id: Uuid,
        token: Option<&str>,
    ) -> Result<(), DatabaseError>;

    /// Replace the stored token only if it still equals `current`.
    /// Returns `false` when another writer got there first.
    async fn swap_refresh_token(
        &self,
        account_id: Uuid,
        current: &str,
        next: &str,
    ) -> Result<bool, DatabaseError>;

    async fn update_profile(
        &self,
        account_id: Uuid,
        update: ProfileUpdate,
    ) -> Result<Account, DatabaseError>;

    /// Mark the account deleted and drop its refresh token.
    async fn soft_delete(&self, account_id: Uuid) -> Result<(), DatabaseError>;

    async fn follow(&self, follower_id: Uuid, following_id: Uuid) -> Result<Follow, DatabaseError>;

    /// Followers of `account_id`, newest first.
    async fn followers(
        &self,
        account_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Follower>, DatabaseError>;
}
