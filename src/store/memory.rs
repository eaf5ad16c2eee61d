use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{Account, CredentialStore, Follow, Follower, NewAccount, ProfileUpdate};
use crate::error::DatabaseError;

/// In-process credential store for tests and local runs without Postgres.
///
/// Mirrors the Postgres semantics: unique usernames and emails across all
/// rows (deleted ones included), soft-deleted accounts invisible to lookups,
/// and a single write lock per refresh token update.
#[derive(Default)]
pub struct InMemoryCredentialStore {
    state: RwLock<State>,
}

#[derive(Default)]
struct State {
    accounts: HashMap<Uuid, Account>,
    follows: Vec<Follow>,
}

impl State {
    fn live(&self, account_id: Uuid) -> Result<&Account, DatabaseError> {
        self.accounts
            .get(&account_id)
            .filter(|account| !account.is_deleted())
            .ok_or_else(|| not_found(account_id))
    }

    fn live_mut(&mut self, account_id: Uuid) -> Result<&mut Account, DatabaseError> {
        self.accounts
            .get_mut(&account_id)
            .filter(|account| !account.is_deleted())
            .ok_or_else(|| not_found(account_id))
    }
}

fn not_found(account_id: Uuid) -> DatabaseError {
    DatabaseError::NotFound(format!("account {}", account_id))
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn create_account(&self, account: NewAccount) -> Result<Account, DatabaseError> {
        let mut state = self.state.write().await;

        let duplicate = state
            .accounts
            .values()
            .any(|a| a.username == account.username || a.email == account.email);
        if duplicate {
            return Err(DatabaseError::UniqueConstraintViolation(
                "username or email already registered".to_string(),
            ));
        }

        let now = Utc::now();
        let created = Account {
            id: Uuid::new_v4(),
            username: account.username,
            email: account.email,
            password_hash: account.password_hash,
            full_name: account.full_name,
            bio: None,
            refresh_token_hash: None,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        state.accounts.insert(created.id, created.clone());
        Ok(created)
    }

    async fn find_by_username(&self, username: &str) -> Result<Account, DatabaseError> {
        let state = self.state.read().await;
        state
            .accounts
            .values()
            .find(|a| a.username == username && !a.is_deleted())
            .cloned()
            .ok_or_else(|| DatabaseError::NotFound(format!("account {}", username)))
    }

    async fn find_by_id(&self, account_id: Uuid) -> Result<Account, DatabaseError> {
        let state = self.state.read().await;
        state.live(account_id).cloned()
    }

    async fn list_accounts(&self, limit: i64, offset: i64) -> Result<Vec<Account>, DatabaseError> {
        let state = self.state.read().await;
        let mut accounts: Vec<&Account> =
            state.accounts.values().filter(|a| !a.is_deleted()).collect();
        accounts.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));

        Ok(accounts
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn get_refresh_token(&self, account_id: Uuid) -> Result<Option<String>, DatabaseError> {
        let state = self.state.read().await;
        Ok(state.live(account_id)?.refresh_token_hash.clone())
    }

    async fn set_refresh_token(
        &self,
        account_id: Uuid,
        token: Option<&str>,
    ) -> Result<(), DatabaseError> {
        let mut state = self.state.write().await;
        let account = state.live_mut(account_id)?;
        account.refresh_token_hash = token.map(str::to_string);
        account.updated_at = Utc::now();
        Ok(())
    }

    async fn swap_refresh_token(
        &self,
        account_id: Uuid,
        current: &str,
        next: &str,
    ) -> Result<bool, DatabaseError> {
        let mut state = self.state.write().await;
        let account = match state.live_mut(account_id) {
            Ok(account) => account,
            Err(_) => return Ok(false),
        };
        if account.refresh_token_hash.as_deref() != Some(current) {
            return Ok(false);
        }
        account.refresh_token_hash = Some(next.to_string());
        account.updated_at = Utc::now();
        Ok(true)
    }

    async fn update_profile(
        &self,
        account_id: Uuid,
        update: ProfileUpdate,
    ) -> Result<Account, DatabaseError> {
        let mut state = self.state.write().await;
        let account = state.live_mut(account_id)?;
        if let Some(full_name) = update.full_name {
            account.full_name = full_name;
        }
        if let Some(bio) = update.bio {
            account.bio = Some(bio);
        }
        account.updated_at = Utc::now();
        Ok(account.clone())
    }

    async fn soft_delete(&self, account_id: Uuid) -> Result<(), DatabaseError> {
        let mut state = self.state.write().await;
        let account = state.live_mut(account_id)?;
        let now = Utc::now();
        account.deleted_at = Some(now);
        account.updated_at = now;
        account.refresh_token_hash = None;
        Ok(())
    }

    async fn follow(&self, follower_id: Uuid, following_id: Uuid) -> Result<Follow, DatabaseError> {
        let mut state = self.state.write().await;
        state.live(follower_id)?;
        state.live(following_id)?;

        let exists = state
            .follows
            .iter()
            .any(|f| f.follower_id == follower_id && f.following_id == following_id);
        if exists {
            return Err(DatabaseError::UniqueConstraintViolation(
                "already following".to_string(),
            ));
        }

        let follow = Follow {
            follower_id,
            following_id,
            followed_at: Utc::now(),
        };
        state.follows.push(follow.clone());
        Ok(follow)
    }

    async fn followers(
        &self,
        account_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Follower>, DatabaseError> {
        let state = self.state.read().await;

        let mut followers: Vec<Follower> = state
            .follows
            .iter()
            .filter(|f| f.following_id == account_id)
            .filter_map(|f| {
                state.live(f.follower_id).ok().map(|account| Follower {
                    id: account.id,
                    username: account.username.clone(),
                    full_name: account.full_name.clone(),
                    followed_at: f.followed_at,
                })
            })
            .collect();
        // Same order as the Postgres query: newest first, ties by id
        followers.sort_by(|a, b| b.followed_at.cmp(&a.followed_at).then(a.id.cmp(&b.id)));

        Ok(followers
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_account(username: &str) -> NewAccount {
        NewAccount {
            username: username.to_string(),
            email: format!("{}@example.com", username),
            password_hash: "hash".to_string(),
            full_name: "Test User".to_string(),
        }
    }

    #[tokio::test]
    async fn test_duplicate_username_rejected() {
        let store = InMemoryCredentialStore::new();
        store.create_account(new_account("alice")).await.unwrap();

        let err = store.create_account(new_account("alice")).await.unwrap_err();
        assert!(matches!(err, DatabaseError::UniqueConstraintViolation(_)));
    }

    #[tokio::test]
    async fn test_refresh_token_set_get_clear() {
        let store = InMemoryCredentialStore::new();
        let account = store.create_account(new_account("alice")).await.unwrap();

        assert_eq!(store.get_refresh_token(account.id).await.unwrap(), None);

        store.set_refresh_token(account.id, Some("digest")).await.unwrap();
        assert_eq!(
            store.get_refresh_token(account.id).await.unwrap().as_deref(),
            Some("digest")
        );

        store.set_refresh_token(account.id, None).await.unwrap();
        assert_eq!(store.get_refresh_token(account.id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_unknown_account_is_not_found() {
        let store = InMemoryCredentialStore::new();
        let err = store.set_refresh_token(Uuid::new_v4(), None).await.unwrap_err();
        assert!(matches!(err, DatabaseError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_swap_only_succeeds_on_match() {
        let store = InMemoryCredentialStore::new();
        let account = store.create_account(new_account("alice")).await.unwrap();
        store.set_refresh_token(account.id, Some("first")).await.unwrap();

        assert!(!store.swap_refresh_token(account.id, "stale", "second").await.unwrap());
        assert!(store.swap_refresh_token(account.id, "first", "second").await.unwrap());
        assert!(!store.swap_refresh_token(account.id, "first", "third").await.unwrap());
        assert_eq!(
            store.get_refresh_token(account.id).await.unwrap().as_deref(),
            Some("second")
        );
    }

    #[tokio::test]
    async fn test_soft_deleted_account_is_invisible() {
        let store = InMemoryCredentialStore::new();
        let account = store.create_account(new_account("alice")).await.unwrap();
        store.set_refresh_token(account.id, Some("digest")).await.unwrap();

        store.soft_delete(account.id).await.unwrap();

        assert!(store.find_by_id(account.id).await.is_err());
        assert!(store.find_by_username("alice").await.is_err());
        assert!(store.get_refresh_token(account.id).await.is_err());
        assert!(matches!(
            store.soft_delete(account.id).await,
            Err(DatabaseError::NotFound(_))
        ));
    }

    // Follow with an explicit timestamp
    async fn follow_at(
        store: &InMemoryCredentialStore,
        follower_id: Uuid,
        following_id: Uuid,
        followed_at: chrono::DateTime<Utc>,
    ) {
        store.state.write().await.follows.push(Follow {
            follower_id,
            following_id,
            followed_at,
        });
    }

    #[tokio::test]
    async fn test_followers_pagination() {
        let store = InMemoryCredentialStore::new();
        let target = store.create_account(new_account("target")).await.unwrap();
        let start = Utc::now();
        for (i, name) in ["a1", "a2", "a3"].into_iter().enumerate() {
            let follower = store.create_account(new_account(name)).await.unwrap();
            let at = start + chrono::Duration::seconds(i as i64);
            follow_at(&store, follower.id, target.id, at).await;
        }

        let page = store.followers(target.id, 2, 0).await.unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].username, "a3");

        let rest = store.followers(target.id, 2, 2).await.unwrap();
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].username, "a1");
    }

    #[tokio::test]
    async fn test_followers_with_same_timestamp_ordered_by_id() {
        let store = InMemoryCredentialStore::new();
        let target = store.create_account(new_account("target")).await.unwrap();
        let at = Utc::now();
        let mut ids = Vec::new();
        for name in ["b1", "b2", "b3", "b4"] {
            let follower = store.create_account(new_account(name)).await.unwrap();
            follow_at(&store, follower.id, target.id, at).await;
            ids.push(follower.id);
        }
        ids.sort();

        let listed: Vec<Uuid> = store
            .followers(target.id, 10, 0)
            .await
            .unwrap()
            .into_iter()
            .map(|f| f.id)
            .collect();
        assert_eq!(listed, ids);
    }

    #[tokio::test]
    async fn test_list_accounts_skips_deleted_and_pages() {
        let store = InMemoryCredentialStore::new();
        let mut live = Vec::new();
        for name in ["u1", "u2", "u3", "u4"] {
            live.push(store.create_account(new_account(name)).await.unwrap());
        }
        let removed = live.remove(1);
        store.soft_delete(removed.id).await.unwrap();
        live.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));

        let all = store.list_accounts(10, 0).await.unwrap();
        let all_ids: Vec<Uuid> = all.iter().map(|a| a.id).collect();
        let expected: Vec<Uuid> = live.iter().map(|a| a.id).collect();
        assert_eq!(all_ids, expected);

        let second = store.list_accounts(2, 2).await.unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].id, expected[2]);
    }

    #[tokio::test]
    async fn test_duplicate_follow_rejected() {
        let store = InMemoryCredentialStore::new();
        let a = store.create_account(new_account("a")).await.unwrap();
        let b = store.create_account(new_account("b")).await.unwrap();

        store.follow(a.id, b.id).await.unwrap();
        assert!(matches!(
            store.follow(a.id, b.id).await,
            Err(DatabaseError::UniqueConstraintViolation(_))
        ));
    }
}
