#![allow(dead_code)]

use async_trait::async_trait;
use auth_service::configuration::JwtSettings;
use auth_service::error::DatabaseError;
use auth_service::session::SessionManager;
use auth_service::startup::run_with_sessions;
use auth_service::store::{
    Account, CredentialStore, Follow, Follower, InMemoryCredentialStore, NewAccount,
    ProfileUpdate,
};
use reqwest::Response;
use serde_json::{json, Value};
use std::net::TcpListener;
use std::sync::Arc;
use uuid::Uuid;

pub struct TestApp {
    pub address: String,
    pub client: reqwest::Client,
}

pub fn jwt_settings() -> JwtSettings {
    JwtSettings {
        secret: "integration-test-secret-at-least-32-bytes".to_string(),
        access_token_expiry: 10800,
        refresh_token_expiry: 86400,
        issuer: "auth_service_test".to_string(),
    }
}

pub async fn spawn_app() -> TestApp {
    spawn_app_with_store(Arc::new(InMemoryCredentialStore::new())).await
}

pub async fn spawn_app_with_store(store: Arc<dyn CredentialStore>) -> TestApp {
    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();

    let sessions = SessionManager::new(store.clone(), jwt_settings()).with_hash_cost(4);
    let server = run_with_sessions(listener, store, sessions).expect("Failed to bind address");
    let _ = tokio::spawn(server);

    TestApp {
        address: format!("http://127.0.0.1:{}", port),
        client: reqwest::Client::new(),
    }
}

/// Store that fails every call with a connection error
pub struct UnavailableStore;

fn pool_down<T>() -> Result<T, DatabaseError> {
    Err(DatabaseError::ConnectionPool("pool timed out".to_string()))
}

#[async_trait]
impl CredentialStore for UnavailableStore {
    async fn create_account(&self, _: NewAccount) -> Result<Account, DatabaseError> {
        pool_down()
    }
    async fn find_by_username(&self, _: &str) -> Result<Account, DatabaseError> {
        pool_down()
    }
    async fn find_by_id(&self, _: Uuid) -> Result<Account, DatabaseError> {
        pool_down()
    }
    async fn list_accounts(&self, _: i64, _: i64) -> Result<Vec<Account>, DatabaseError> {
        pool_down()
    }
    async fn get_refresh_token(&self, _: Uuid) -> Result<Option<String>, DatabaseError> {
        pool_down()
    }
    async fn set_refresh_token(&self, _: Uuid, _: Option<&str>) -> Result<(), DatabaseError> {
        pool_down()
    }
    async fn swap_refresh_token(&self, _: Uuid, _: &str, _: &str) -> Result<bool, DatabaseError> {
        pool_down()
    }
    async fn update_profile(&self, _: Uuid, _: ProfileUpdate) -> Result<Account, DatabaseError> {
        pool_down()
    }
    async fn soft_delete(&self, _: Uuid) -> Result<(), DatabaseError> {
        pool_down()
    }
    async fn follow(&self, _: Uuid, _: Uuid) -> Result<Follow, DatabaseError> {
        pool_down()
    }
    async fn followers(&self, _: Uuid, _: i64, _: i64) -> Result<Vec<Follower>, DatabaseError> {
        pool_down()
    }
}

impl TestApp {
    pub async fn post_json(&self, path: &str, body: &Value) -> Response {
        self.client
            .post(&format!("{}{}", &self.address, path))
            .json(body)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn register(&self, username: &str, password: &str) -> Value {
        let response = self
            .post_json(
                "/auth/register",
                &json!({
                    "username": username,
                    "password": password,
                    "email": format!("{}@x.com", username),
                    "full_name": format!("{} Example", username),
                }),
            )
            .await;
        assert_eq!(201, response.status().as_u16(), "registration of {} failed", username);
        response.json().await.expect("Failed to parse response")
    }

    pub async fn login(&self, username: &str, password: &str) -> Response {
        self.post_json(
            "/auth/login",
            &json!({ "username": username, "password": password }),
        )
        .await
    }

    /// Register and log in; returns (account id, access token, refresh token)
    pub async fn signed_in_user(&self, username: &str) -> (String, String, String) {
        let registered = self.register(username, "pw1").await;
        let tokens: Value = self
            .login(username, "pw1")
            .await
            .json()
            .await
            .expect("Failed to parse response");

        (
            registered["id"].as_str().unwrap().to_string(),
            tokens["access_token"].as_str().unwrap().to_string(),
            tokens["refresh_token"].as_str().unwrap().to_string(),
        )
    }

    pub async fn refresh(&self, refresh_token: &str) -> Response {
        self.post_json("/auth/refresh", &json!({ "refresh_token": refresh_token }))
            .await
    }

    pub async fn get_authed(&self, path: &str, access_token: &str) -> Response {
        self.client
            .get(&format!("{}{}", &self.address, path))
            .bearer_auth(access_token)
            .send()
            .await
            .expect("Failed to execute request.")
    }
}
