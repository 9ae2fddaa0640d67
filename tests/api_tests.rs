// tests/api_tests.rs

use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use async_trait::async_trait;
use axum::http::HeaderValue;
use serde_json::{Value, json};
use vidtube::{
    config::{Config, base_url},
    media::LocalMediaStorage,
    models::{
        id::ObjectId,
        video::{MediaRef, Video},
    },
    routes,
    state::{AppState, SharedStore},
    store::{
        Document, DocumentStore, Presence, StoreError,
        collections::VIDEOS,
        memory::MemoryStore,
        pipeline::Stage,
        query::{Filter, Update},
        to_document,
    },
    utils::jwt::sign_jwt,
};

const JWT_SECRET: &str = "test_secret_for_integration_tests";

/// Spawns the app on a random port backed by `store`.
/// Returns the API base URL (e.g., "http://127.0.0.1:12345/api/v1").
async fn spawn_app_with(store: SharedStore) -> String {
    let upload_dir = std::env::temp_dir().join(format!("vidtube-test-{}", uuid::Uuid::new_v4()));

    let config = Config {
        database_url: None,
        jwt_secret: JWT_SECRET.to_string(),
        jwt_expiration: 600, // 10 minutes for tests
        rust_log: "error".to_string(),
        port: 0,
        upload_dir: upload_dir.clone(),
        public_base_url: base_url("http://localhost:8000").unwrap(),
        cors_origin: HeaderValue::from_static("http://localhost:3000"),
        max_upload_bytes: 10 * 1024 * 1024,
    };

    let media = Arc::new(LocalMediaStorage::new(upload_dir, config.public_base_url.clone()));
    let state = AppState { store, media, config };
    let app = routes::create_router(state);

    // Bind to port 0 to get a random available port
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://127.0.0.1:{}/api/v1", port)
}

async fn spawn_app() -> String {
    spawn_app_with(Arc::new(MemoryStore::new())).await
}

struct TestUser {
    id: String,
    username: String,
    token: String,
}

/// Registers and logs in a fresh user.
async fn signup(client: &reqwest::Client, address: &str) -> TestUser {
    let username = format!("u_{}", &uuid::Uuid::new_v4().simple().to_string()[..8]);
    let password = "password123";

    let register = client
        .post(format!("{}/users/register", address))
        .json(&json!({
            "username": username,
            "email": format!("{}@example.com", username),
            "fullName": "Test User",
            "password": password
        }))
        .send()
        .await
        .expect("Register failed");
    assert_eq!(register.status().as_u16(), 201);

    let login: Value = client
        .post(format!("{}/users/login", address))
        .json(&json!({ "username": username, "password": password }))
        .send()
        .await
        .expect("Login failed")
        .json()
        .await
        .expect("Failed to parse login json");

    TestUser {
        id: login["data"]["user"]["_id"].as_str().expect("id not found").to_string(),
        username,
        token: login["data"]["accessToken"]
            .as_str()
            .expect("Token not found")
            .to_string(),
    }
}

fn bearer(token: &str) -> String {
    format!("Bearer {}", token)
}

#[tokio::test]
async fn health_check_404() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{}/random_path_that_does_not_exist", address))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 404);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn healthcheck_is_public() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{}/healthcheck", address))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["statusCode"], 200);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["message"], "Everything is O.K");
}

#[tokio::test]
async fn register_works_and_hides_the_password() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/users/register", address))
        .json(&json!({
            "username": "MixedCase_User",
            "email": "mixed@example.com",
            "fullName": "Mixed Case",
            "password": "password123"
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 201);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["data"]["username"], "mixedcase_user");
    assert!(body["data"].get("password").is_none());
    assert!(ObjectId::is_valid(body["data"]["_id"].as_str().unwrap()));
}

#[tokio::test]
async fn register_fails_validation() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    // Username too short
    let response = client
        .post(format!("{}/users/register", address))
        .json(&json!({
            "username": "yo",
            "email": "yo@example.com",
            "fullName": "Yo",
            "password": "password123"
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["statusCode"], 400);
    assert_eq!(body["success"], false);
    assert_eq!(body["data"], Value::Null);
}

#[tokio::test]
async fn duplicate_registration_conflicts() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let user = signup(&client, &address).await;

    let response = client
        .post(format!("{}/users/register", address))
        .json(&json!({
            "username": user.username,
            "email": "someone-else@example.com",
            "fullName": "Copycat",
            "password": "password123"
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 409);
}

#[tokio::test]
async fn login_rejects_a_wrong_password() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let user = signup(&client, &address).await;

    let response = client
        .post(format!("{}/users/login", address))
        .json(&json!({ "username": user.username, "password": "wrong-password" }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 401);
}

#[tokio::test]
async fn protected_routes_require_a_token() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    let missing = client
        .get(format!("{}/users/current-user", address))
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status().as_u16(), 401);

    let garbage = client
        .get(format!("{}/users/current-user", address))
        .header("Authorization", "Bearer not.a.token")
        .send()
        .await
        .unwrap();
    assert_eq!(garbage.status().as_u16(), 401);
}

#[tokio::test]
async fn current_user_returns_the_caller() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let user = signup(&client, &address).await;

    let body: Value = client
        .get(format!("{}/users/current-user", address))
        .header("Authorization", bearer(&user.token))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["data"]["_id"], user.id.as_str());
    assert_eq!(body["data"]["username"], user.username.as_str());
    assert_eq!(body["data"]["watchHistory"], json!([]));
}

#[tokio::test]
async fn tweet_ownership_flow() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let user_a = signup(&client, &address).await;
    let user_b = signup(&client, &address).await;

    // 1. A creates a tweet
    let created: Value = client
        .post(format!("{}/tweets", address))
        .header("Authorization", bearer(&user_a.token))
        .json(&json!({ "content": "hello" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(created["statusCode"], 201);
    assert_eq!(created["data"]["owner"], user_a.id.as_str());
    let tweet_id = created["data"]["_id"].as_str().unwrap().to_string();

    // 2. B may not edit it
    let forbidden = client
        .patch(format!("{}/tweets/{}", address, tweet_id))
        .header("Authorization", bearer(&user_b.token))
        .json(&json!({ "content": "hijacked" }))
        .send()
        .await
        .unwrap();
    assert_eq!(forbidden.status().as_u16(), 403);

    // 3. A can
    let updated: Value = client
        .patch(format!("{}/tweets/{}", address, tweet_id))
        .header("Authorization", bearer(&user_a.token))
        .json(&json!({ "content": "hi" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(updated["statusCode"], 200);
    assert_eq!(updated["data"]["content"], "hi");

    // 4. The listing reflects A's edit, not B's attempt
    let listed: Value = client
        .get(format!("{}/tweets/user/{}", address, user_a.id))
        .header("Authorization", bearer(&user_b.token))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(listed["data"].as_array().unwrap().len(), 1);
    assert_eq!(listed["data"][0]["content"], "hi");

    // 5. B may not delete it, A can
    let forbidden = client
        .delete(format!("{}/tweets/{}", address, tweet_id))
        .header("Authorization", bearer(&user_b.token))
        .send()
        .await
        .unwrap();
    assert_eq!(forbidden.status().as_u16(), 403);

    let deleted = client
        .delete(format!("{}/tweets/{}", address, tweet_id))
        .header("Authorization", bearer(&user_a.token))
        .send()
        .await
        .unwrap();
    assert_eq!(deleted.status().as_u16(), 200);

    let gone = client
        .delete(format!("{}/tweets/{}", address, tweet_id))
        .header("Authorization", bearer(&user_a.token))
        .send()
        .await
        .unwrap();
    assert_eq!(gone.status().as_u16(), 404);
}

#[tokio::test]
async fn blank_tweets_are_rejected() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let user = signup(&client, &address).await;

    for content in ["", "   ", "<script>alert(1)</script>"] {
        let response = client
            .post(format!("{}/tweets", address))
            .header("Authorization", bearer(&user.token))
            .json(&json!({ "content": content }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 400, "content {:?}", content);
    }
}

#[tokio::test]
async fn unreadable_json_bodies_get_the_error_envelope() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let user = signup(&client, &address).await;

    let truncated = client
        .post(format!("{}/tweets", address))
        .header("Authorization", bearer(&user.token))
        .header("Content-Type", "application/json")
        .body("{\"content\":")
        .send()
        .await
        .unwrap();
    assert_eq!(truncated.status().as_u16(), 400);
    let body: Value = truncated.json().await.unwrap();
    assert_eq!(body["statusCode"], 400);
    assert_eq!(body["success"], false);
    assert!(body["data"].is_null());

    let untyped = client
        .post(format!("{}/users/register", address))
        .body(r#"{"username":"x"}"#)
        .send()
        .await
        .unwrap();
    assert_eq!(untyped.status().as_u16(), 400);
    let body: Value = untyped.json().await.unwrap();
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn tweet_like_toggles_back_and_forth() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let user = signup(&client, &address).await;

    let created: Value = client
        .post(format!("{}/tweets", address))
        .header("Authorization", bearer(&user.token))
        .json(&json!({ "content": "like me" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let tweet_id = created["data"]["_id"].as_str().unwrap().to_string();

    let mut states = Vec::new();
    for _ in 0..3 {
        let body: Value = client
            .post(format!("{}/likes/toggle/t/{}", address, tweet_id))
            .header("Authorization", bearer(&user.token))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        states.push(body["data"]["isLiked"].as_bool().unwrap());
    }

    assert_eq!(states, vec![true, false, true]);
}

#[tokio::test]
async fn liking_a_missing_target_is_not_found() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let user = signup(&client, &address).await;
    let missing = ObjectId::new();

    for kind in ["v", "c", "t"] {
        let response = client
            .post(format!("{}/likes/toggle/{}/{}", address, kind, missing))
            .header("Authorization", bearer(&user.token))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 404, "kind {}", kind);
    }
}

/// Memory store that counts every call reaching it.
struct CountingStore {
    inner: MemoryStore,
    calls: AtomicUsize,
}

impl CountingStore {
    fn tick(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl DocumentStore for CountingStore {
    async fn insert(&self, collection: &str, doc: Document) -> Result<Document, StoreError> {
        self.tick();
        self.inner.insert(collection, doc).await
    }

    async fn find(&self, collection: &str, filter: &Filter) -> Result<Vec<Document>, StoreError> {
        self.tick();
        self.inner.find(collection, filter).await
    }

    async fn find_by_id_and_update(
        &self,
        collection: &str,
        id: &ObjectId,
        update: &Update,
    ) -> Result<Option<Document>, StoreError> {
        self.tick();
        self.inner.find_by_id_and_update(collection, id, update).await
    }

    async fn find_by_id_and_delete(
        &self,
        collection: &str,
        id: &ObjectId,
    ) -> Result<Option<Document>, StoreError> {
        self.tick();
        self.inner.find_by_id_and_delete(collection, id).await
    }

    async fn aggregate(
        &self,
        collection: &str,
        pipeline: &[Stage],
    ) -> Result<Vec<Document>, StoreError> {
        self.tick();
        self.inner.aggregate(collection, pipeline).await
    }

    async fn toggle_presence(
        &self,
        collection: &str,
        pair: Document,
    ) -> Result<Presence, StoreError> {
        self.tick();
        self.inner.toggle_presence(collection, pair).await
    }
}

#[tokio::test]
async fn malformed_ids_are_rejected_before_touching_the_store() {
    let store = Arc::new(CountingStore {
        inner: MemoryStore::new(),
        calls: AtomicUsize::new(0),
    });
    let address = spawn_app_with(store.clone()).await;
    let client = reqwest::Client::new();
    let token = sign_jwt(&ObjectId::new(), "ghost", JWT_SECRET, 600).unwrap();

    let requests = [
        client.get(format!("{}/videos/not-an-id", address)),
        client.patch(format!("{}/videos/toggle/publish/123", address)),
        client.get(format!("{}/comments/zzzzzzzzzzzzzzzzzzzzzzzz", address)),
        client.delete(format!("{}/comments/c/abc", address)),
        client.post(format!("{}/likes/toggle/v/xyz", address)),
        client.post(format!("{}/likes/toggle/c/65a1f0c2e4b0a1b2c3d4e5f", address)),
        client.post(format!("{}/likes/toggle/t/65a1f0c2e4b0a1b2c3d4e5f6a", address)),
        client.post(format!("{}/subscriptions/c/nope", address)),
        client.get(format!("{}/subscriptions/u/nope", address)),
        client.get(format!("{}/tweets/user/nope", address)),
        client.delete(format!("{}/tweets/nope", address)),
        client.get(format!("{}/videos?userId=nope", address)),
    ];

    for request in requests {
        let response = request.header("Authorization", bearer(&token)).send().await.unwrap();
        assert_eq!(response.status().as_u16(), 400);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["success"], false);
        assert!(body["message"].as_str().unwrap().starts_with("Invalid"));
    }

    assert_eq!(store.calls.load(Ordering::SeqCst), 0);
}

/// Memory store whose deletes always lose to a concurrent delete.
struct RacingDeleteStore {
    inner: MemoryStore,
}

#[async_trait]
impl DocumentStore for RacingDeleteStore {
    async fn insert(&self, collection: &str, doc: Document) -> Result<Document, StoreError> {
        self.inner.insert(collection, doc).await
    }

    async fn find(&self, collection: &str, filter: &Filter) -> Result<Vec<Document>, StoreError> {
        self.inner.find(collection, filter).await
    }

    async fn find_by_id_and_update(
        &self,
        collection: &str,
        id: &ObjectId,
        update: &Update,
    ) -> Result<Option<Document>, StoreError> {
        self.inner.find_by_id_and_update(collection, id, update).await
    }

    async fn find_by_id_and_delete(
        &self,
        collection: &str,
        id: &ObjectId,
    ) -> Result<Option<Document>, StoreError> {
        self.inner.find_by_id_and_delete(collection, id).await?;
        Ok(None)
    }

    async fn aggregate(
        &self,
        collection: &str,
        pipeline: &[Stage],
    ) -> Result<Vec<Document>, StoreError> {
        self.inner.aggregate(collection, pipeline).await
    }

    async fn toggle_presence(
        &self,
        collection: &str,
        pair: Document,
    ) -> Result<Presence, StoreError> {
        self.inner.toggle_presence(collection, pair).await
    }
}

#[tokio::test]
async fn deleting_a_video_removed_meanwhile_is_not_found() {
    let store = Arc::new(RacingDeleteStore { inner: MemoryStore::new() });
    let owner = ObjectId::new();
    let media = |id: &str| MediaRef {
        url: format!("http://localhost:8000/media/{}", id),
        public_id: id.to_string(),
    };
    let video = Video {
        id: ObjectId::new(),
        video_file: media("clip.mp4"),
        thumbnail: media("thumb.png"),
        title: "Contested".to_string(),
        description: "Deleted twice at once".to_string(),
        duration: 0.0,
        views: 0,
        is_published: true,
        owner,
        created_at: None,
        updated_at: None,
    };
    store.insert(VIDEOS, to_document(&video).unwrap()).await.unwrap();

    let address = spawn_app_with(store.clone()).await;
    let token = sign_jwt(&owner, "racer", JWT_SECRET, 600).unwrap();

    let response = reqwest::Client::new()
        .delete(format!("{}/videos/{}", address, video.id))
        .header("Authorization", bearer(&token))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 404);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["message"], "Video not found");
}
