#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;

use thumbforge_api::auth::jwt::{issue_token, JwtConfig};
use thumbforge_api::config::{GenerationConfig, ServerConfig};
use thumbforge_api::router::build_app_router;
use thumbforge_api::state::{AppState, Providers, Stores};
use thumbforge_core::memory::{MemoryEntitlementStore, MemoryResultStore, MemorySessionStore};
use thumbforge_core::provider::{AssembledRequest, GeneratedImage, GenerationError, ImageGenerator};
use thumbforge_core::types::ImagePayload;

pub const JWT_SECRET: &str = "test-secret-that-is-long-enough-for-hmac";
pub const INTERNAL_TOKEN: &str = "internal-test-token";
pub const ADMIN_EMAIL: &str = "owner@thumbforge.test";

/// Generator that returns a tiny PNG, or fails while `fail` is set.
#[derive(Default)]
pub struct FakeGenerator {
    pub fail: AtomicBool,
    pub calls: AtomicUsize,
}

#[async_trait]
impl ImageGenerator for FakeGenerator {
    async fn generate(
        &self,
        _request: &AssembledRequest,
    ) -> Result<GeneratedImage, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(GenerationError::Provider("upstream returned 503".into()));
        }
        Ok(GeneratedImage {
            image: ImagePayload::new("image/png", vec![0x89, b'P', b'N', b'G']),
            model: "fake-image-model".into(),
            provider_text: None,
        })
    }
}

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub generator: Arc<FakeGenerator>,
    _scratch: tempfile::TempDir,
}

impl TestApp {
    pub fn app(&self) -> Router {
        self.router.clone()
    }
}

/// Build a test `ServerConfig` with safe defaults and no inter-variation delay.
pub fn test_config(scratch_dir: PathBuf) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        jwt: JwtConfig {
            secret: JWT_SECRET.to_string(),
        },
        admin_emails: vec![ADMIN_EMAIL.to_string()],
        internal_api_token: INTERNAL_TOKEN.to_string(),
        scratch_dir,
        generation: GenerationConfig {
            gemini_api_key: "unused".to_string(),
            gemini_model: "fake-image-model".to_string(),
            youtube_api_key: None,
            max_references: 3,
            min_reference_views: 10_000,
            search_timeout_secs: 1,
            fetch_timeout_secs: 1,
            generation_timeout_secs: 5,
            variation_delay_ms: 0,
            max_variations: 4,
        },
    }
}

/// Build the full application router over in-memory stores and a fake
/// generator, with the same middleware stack production uses.
pub fn build_test_app() -> TestApp {
    let scratch = tempfile::tempdir().expect("scratch dir");
    let generator = Arc::new(FakeGenerator::default());

    let state = AppState::new(
        test_config(scratch.path().to_path_buf()),
        None,
        Stores {
            entitlements: Arc::new(MemoryEntitlementStore::new()),
            sessions: Arc::new(MemorySessionStore::new()),
            results: Arc::new(MemoryResultStore::new()),
        },
        Providers {
            generator: generator.clone(),
            references: None,
        },
    );

    TestApp {
        router: build_app_router(state.clone()),
        state,
        generator,
        _scratch: scratch,
    }
}

/// Mint a token the test app accepts.
pub fn token_for(user_id: &str, email: &str) -> String {
    let config = JwtConfig {
        secret: JWT_SECRET.to_string(),
    };
    issue_token(user_id, email, 900, &config).expect("token")
}

pub fn admin_token() -> String {
    token_for("admin-1", ADMIN_EMAIL)
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

async fn send(app: Router, request: Request<Body>) -> Response<Body> {
    app.oneshot(request).await.expect("request should complete")
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}

pub async fn get_auth(app: Router, uri: &str, token: &str) -> Response<Body> {
    let request = Request::builder()
        .uri(uri)
        .header("authorization", format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}

pub async fn post_json_auth(
    app: Router,
    uri: &str,
    body: serde_json::Value,
    token: &str,
) -> Response<Body> {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/json")
        .header("authorization", format!("Bearer {token}"))
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

pub async fn post_auth(app: Router, uri: &str, token: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("authorization", format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}

pub async fn delete_auth(app: Router, uri: &str, token: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::DELETE)
        .uri(uri)
        .header("authorization", format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}

pub async fn post_internal(
    app: Router,
    uri: &str,
    body: serde_json::Value,
    internal_token: &str,
) -> Response<Body> {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/json")
        .header("x-internal-token", internal_token)
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body should be readable")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("body should be JSON")
}
