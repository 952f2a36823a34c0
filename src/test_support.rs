use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request},
    Router,
};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::api;
use crate::core::{bootstrap, config::Settings, security, state::AppState, time::primitive_now_utc};
use crate::db::models::User;
use crate::db::types::UserType;
use crate::repositories;
use crate::services::embedding::{EmbeddingError, EmbeddingProvider, SharedEmbedder};
use crate::services::spreadsheet;

const TEST_SECRET_KEY: &str = "test-secret";
pub(crate) const ADMIN_LOGIN: &str = "admin";
pub(crate) const ADMIN_PASSWORD: &str = "admin-password";
const HASH_DIMENSIONS: usize = 64;

pub(crate) struct TestContext {
    pub(crate) state: AppState,
    pub(crate) app: Router,
    _guard: OwnedMutexGuard<()>,
}

pub(crate) async fn env_lock() -> OwnedMutexGuard<()> {
    static LOCK: OnceLock<Arc<Mutex<()>>> = OnceLock::new();
    let lock = LOCK.get_or_init(|| Arc::new(Mutex::new(()))).clone();
    lock.lock_owned().await
}

pub(crate) fn set_test_env() {
    std::env::set_var("QUIZCHECK_ENV", "test");
    std::env::set_var("QUIZCHECK_STRICT_CONFIG", "0");
    std::env::set_var("SECRET_KEY", TEST_SECRET_KEY);
    std::env::set_var("DATABASE_URL", "sqlite::memory:");
    std::env::set_var("PROMETHEUS_ENABLED", "0");
    std::env::set_var("FIRST_SUPERUSER_LOGIN", ADMIN_LOGIN);
    std::env::set_var("FIRST_SUPERUSER_PASSWORD", ADMIN_PASSWORD);
    std::env::set_var("EMBEDDING_PROVIDER", "local");
    std::env::remove_var("EMBEDDING_AUTO_DOWNLOAD");
    std::env::remove_var("SCORING_THRESHOLD");
    std::env::remove_var("BACKEND_CORS_ORIGINS");

    let bank_dir = std::env::temp_dir().join(format!("quizcheck-test-{}", uuid::Uuid::new_v4()));
    std::env::set_var("QUESTION_BANK_DIR", bank_dir);
}

/// Single-connection in-memory database with migrations applied.
pub(crate) async fn memory_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .expect("memory pool");
    crate::db::run_migrations(&pool).await.expect("migrations");
    pool
}

pub(crate) async fn setup_test_context() -> TestContext {
    setup_test_context_with(|| {}).await
}

/// Like [`setup_test_context`], with a hook to adjust the environment before settings load.
pub(crate) async fn setup_test_context_with(configure: impl FnOnce()) -> TestContext {
    build_context(configure, Arc::new(HashingEmbedder::default())).await
}

pub(crate) async fn setup_test_context_with_embedder(embedder: SharedEmbedder) -> TestContext {
    build_context(|| {}, embedder).await
}

async fn build_context(configure: impl FnOnce(), embedder: SharedEmbedder) -> TestContext {
    let guard = env_lock().await;
    set_test_env();
    configure();

    let settings = Settings::load().expect("settings");
    let db = crate::db::init_pool(&settings).await.expect("db pool");
    crate::db::run_migrations(&db).await.expect("migrations");

    let state = AppState::new(settings, db, embedder);
    state.question_files().ensure_root().await.expect("question bank dir");
    bootstrap::ensure_superuser(&state).await.expect("superuser");
    let app = api::router::router(state.clone());

    TestContext { state, app, _guard: guard }
}

/// Deterministic bag-of-characters embedding: equal texts give equal unit vectors and
/// texts sharing characters land close together.
#[derive(Debug, Default)]
pub(crate) struct HashingEmbedder;

impl HashingEmbedder {
    fn embed(text: &str) -> Vec<f32> {
        let mut vector = vec![0.0_f32; HASH_DIMENSIONS];
        let chars: Vec<char> = text.trim().to_lowercase().chars().collect();

        for (position, c) in chars.iter().enumerate() {
            vector[bucket(&[*c])] += 1.0;
            if let Some(next) = chars.get(position + 1) {
                vector[bucket(&[*c, *next])] += 0.5;
            }
        }

        let norm = vector.iter().map(|value| value * value).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|value| *value /= norm);
        }
        vector
    }
}

fn bucket(chars: &[char]) -> usize {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for c in chars {
        hash ^= u64::from(*c);
        hash = hash.wrapping_mul(0x0100_0000_01b3);
    }
    (hash % HASH_DIMENSIONS as u64) as usize
}

#[async_trait]
impl EmbeddingProvider for HashingEmbedder {
    fn name(&self) -> &str {
        "hashing-test"
    }

    async fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Ok(texts.iter().map(|text| Self::embed(text)).collect())
    }
}

/// Fails every non-empty batch.
#[derive(Debug)]
pub(crate) struct FailingEmbedder;

#[async_trait]
impl EmbeddingProvider for FailingEmbedder {
    fn name(&self) -> &str {
        "failing-test"
    }

    async fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        Err(EmbeddingError::Request("embedding backend unavailable".to_string()))
    }
}

pub(crate) async fn insert_user(
    pool: &SqlitePool,
    user_type: UserType,
    login: &str,
    password: &str,
    group_name: Option<&str>,
) -> User {
    let now = primitive_now_utc();
    let id = uuid::Uuid::new_v4().to_string();
    repositories::users::create(
        pool,
        repositories::users::CreateUser {
            id: &id,
            user_type,
            last_name: "Testov",
            first_name: login,
            middle_name: None,
            group_name,
            login,
            hashed_password: security::hash_password(password).expect("hash password"),
            created_at: now,
            updated_at: now,
        },
    )
    .await
    .expect("insert user")
}

/// Logs in through the API and returns the bearer token.
pub(crate) async fn login(ctx: &TestContext, login: &str, password: &str) -> String {
    use tower::ServiceExt;

    let response = ctx
        .app
        .clone()
        .oneshot(json_request(
            Method::POST,
            "/api/v1/auth/login",
            None,
            Some(serde_json::json!({"login": login, "password": password})),
        ))
        .await
        .expect("login response");
    let status = response.status();
    let body = read_json(response).await;
    assert!(status.is_success(), "login failed: {body}");
    body["access_token"].as_str().expect("access token").to_string()
}

pub(crate) async fn admin_token(ctx: &TestContext) -> String {
    login(ctx, ADMIN_LOGIN, ADMIN_PASSWORD).await
}

/// Creates a fresh account of `user_type` and logs it in.
pub(crate) async fn user_token(ctx: &TestContext, user_type: UserType) -> (String, User) {
    let login_name = format!("{}{}", user_type.as_str(), &uuid::Uuid::new_v4().simple().to_string()[..8]);
    let group = (user_type == UserType::Student).then_some("T-1");
    let user = insert_user(ctx.state.db(), user_type, &login_name, "secret-pass", group).await;
    let token = login(ctx, &login_name, "secret-pass").await;
    (token, user)
}

pub(crate) fn json_request(
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<serde_json::Value>,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }

    if let Some(body) = body {
        builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .expect("request")
    } else {
        builder.body(Body::empty()).expect("request")
    }
}

/// `multipart/form-data` POST with a single `file` field.
pub(crate) fn multipart_request(
    uri: &str,
    token: &str,
    filename: &str,
    bytes: Vec<u8>,
) -> Request<Body> {
    let boundary = "quizcheck-test-boundary";
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
    body.extend_from_slice(
        format!("Content-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\n")
            .as_bytes(),
    );
    body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
    body.extend_from_slice(&bytes);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={boundary}"))
        .body(Body::from(body))
        .expect("request")
}

pub(crate) async fn read_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
    if bytes.is_empty() {
        return serde_json::Value::Null;
    }
    serde_json::from_slice(&bytes).expect("json")
}

/// Two-column question bank workbook with the given `(question, answers cell)` rows.
pub(crate) fn bank_xlsx(rows: &[(&str, &str)]) -> Vec<u8> {
    let rows: Vec<(String, String)> =
        rows.iter().map(|(question, answers)| (question.to_string(), answers.to_string())).collect();
    spreadsheet::write_question_bank(&rows).expect("bank workbook")
}
