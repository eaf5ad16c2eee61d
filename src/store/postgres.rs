use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use super::{Account, CredentialStore, Follow, Follower, NewAccount, ProfileUpdate};
use crate::error::DatabaseError;

const ACCOUNT_COLUMNS: &str = "id, username, email, password_hash, full_name, bio, \
     refresh_token_hash, created_at, updated_at, deleted_at";

/// Postgres-backed credential store. Each refresh token write is a single
/// `UPDATE ... WHERE id = $1` so row-level atomicity is all it relies on.
#[derive(Clone)]
pub struct PgCredentialStore {
    pool: PgPool,
}

impl PgCredentialStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn create_account(&self, account: NewAccount) -> Result<Account, DatabaseError> {
        let now = Utc::now();
        let created = sqlx::query_as::<_, Account>(&format!(
            r#"
            INSERT INTO users (id, username, email, password_hash, full_name, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $6)
            RETURNING {}
            "#,
            ACCOUNT_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(&account.username)
        .bind(&account.email)
        .bind(&account.password_hash)
        .bind(&account.full_name)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(created)
    }

    async fn find_by_username(&self, username: &str) -> Result<Account, DatabaseError> {
        let account = sqlx::query_as::<_, Account>(&format!(
            "SELECT {} FROM users WHERE username = $1 AND deleted_at IS NULL",
            ACCOUNT_COLUMNS
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        account.ok_or_else(|| DatabaseError::NotFound(format!("account {}", username)))
    }

    async fn find_by_id(&self, account_id: Uuid) -> Result<Account, DatabaseError> {
        let account = sqlx::query_as::<_, Account>(&format!(
            "SELECT {} FROM users WHERE id = $1 AND deleted_at IS NULL",
            ACCOUNT_COLUMNS
        ))
        .bind(account_id)
        .fetch_optional(&self.pool)
        .await?;

        account.ok_or_else(|| DatabaseError::NotFound(format!("account {}", account_id)))
    }

    async fn list_accounts(&self, limit: i64, offset: i64) -> Result<Vec<Account>, DatabaseError> {
        let accounts = sqlx::query_as::<_, Account>(&format!(
            r#"
            SELECT {}
            FROM users
            WHERE deleted_at IS NULL
            ORDER BY created_at, id
            LIMIT $1 OFFSET $2
            "#,
            ACCOUNT_COLUMNS
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(accounts)
    }

    async fn get_refresh_token(&self, account_id: Uuid) -> Result<Option<String>, DatabaseError> {
        let row = sqlx::query_as::<_, (Option<String>,)>(
            "SELECT refresh_token_hash FROM users WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(account_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|(token,)| token)
            .ok_or_else(|| DatabaseError::NotFound(format!("account {}", account_id)))
    }

    async fn set_refresh_token(
        &self,
        account_id: Uuid,
        token: Option<&str>,
    ) -> Result<(), DatabaseError> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET refresh_token_hash = $2, updated_at = $3
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(account_id)
        .bind(token)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound(format!("account {}", account_id)));
        }
        Ok(())
    }

    async fn swap_refresh_token(
        &self,
        account_id: Uuid,
        current: &str,
        next: &str,
    ) -> Result<bool, DatabaseError> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET refresh_token_hash = $3, updated_at = $4
            WHERE id = $1 AND refresh_token_hash = $2 AND deleted_at IS NULL
            "#,
        )
        .bind(account_id)
        .bind(current)
        .bind(next)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn update_profile(
        &self,
        account_id: Uuid,
        update: ProfileUpdate,
    ) -> Result<Account, DatabaseError> {
        let account = sqlx::query_as::<_, Account>(&format!(
            r#"
            UPDATE users
            SET full_name = COALESCE($2, full_name),
                bio = COALESCE($3, bio),
                updated_at = $4
            WHERE id = $1 AND deleted_at IS NULL
            RETURNING {}
            "#,
            ACCOUNT_COLUMNS
        ))
        .bind(account_id)
        .bind(update.full_name)
        .bind(update.bio)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;

        account.ok_or_else(|| DatabaseError::NotFound(format!("account {}", account_id)))
    }

    async fn soft_delete(&self, account_id: Uuid) -> Result<(), DatabaseError> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            UPDATE users
            SET deleted_at = $2, updated_at = $2, refresh_token_hash = NULL
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(account_id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound(format!("account {}", account_id)));
        }
        Ok(())
    }

    async fn follow(&self, follower_id: Uuid, following_id: Uuid) -> Result<Follow, DatabaseError> {
        self.find_by_id(follower_id).await?;
        self.find_by_id(following_id).await?;

        let follow = sqlx::query_as::<_, Follow>(
            r#"
            INSERT INTO follows (follower_id, following_id, followed_at)
            VALUES ($1, $2, $3)
            RETURNING follower_id, following_id, followed_at
            "#,
        )
        .bind(follower_id)
        .bind(following_id)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(follow)
    }

    async fn followers(
        &self,
        account_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Follower>, DatabaseError> {
        let followers = sqlx::query_as::<_, Follower>(
            r#"
            SELECT u.id, u.username, u.full_name, f.followed_at
            FROM follows f
            JOIN users u ON u.id = f.follower_id
            WHERE f.following_id = $1 AND u.deleted_at IS NULL
            ORDER BY f.followed_at DESC, u.id
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(account_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(followers)
    }
}
