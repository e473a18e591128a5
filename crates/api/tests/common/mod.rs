//! Shared harness for HTTP-level integration tests.
//!
//! Builds the real application router (same middleware stack as
//! production) on top of a `#[sqlx::test]` pool and a scripted
//! inference-service double, plus request/response helpers.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, Response, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use sqlx::PgPool;
use tower::ServiceExt;

use pixelsmith_api::auth::jwt::{generate_access_token, JwtConfig};
use pixelsmith_api::auth::password::hash_password;
use pixelsmith_api::config::{MonitorConfig, ServerConfig};
use pixelsmith_api::router::build_app_router;
use pixelsmith_api::state::AppState;
use pixelsmith_db::models::user::{CreateUser, User};
use pixelsmith_db::repositories::UserRepo;
use pixelsmith_fal::{FalError, InferenceService, PollOutcome, Submission};
use pixelsmith_fal::client::{IMAGE_TO_IMAGE_ENDPOINT, TEXT_TO_IMAGE_ENDPOINT};

// ---------------------------------------------------------------------------
// Scripted inference service
// ---------------------------------------------------------------------------

/// Test double for the inference service.
///
/// `submit` hands out sequential request ids; `poll_status` replays a
/// scripted sequence of outcomes, then repeats `fallback` forever.
pub struct ScriptedFal {
    submissions: AtomicU64,
    fail_submissions: bool,
    unconfigured: bool,
    script: Mutex<VecDeque<PollOutcome>>,
    fallback: PollOutcome,
    polls: AtomicU32,
}

impl ScriptedFal {
    /// A service where polling always reports `fallback`.
    pub fn new(fallback: PollOutcome) -> Self {
        Self {
            submissions: AtomicU64::new(0),
            fail_submissions: false,
            unconfigured: false,
            script: Mutex::new(VecDeque::new()),
            fallback,
            polls: AtomicU32::new(0),
        }
    }

    /// Replay `outcomes` in order before falling back.
    pub fn with_script(mut self, outcomes: Vec<PollOutcome>) -> Self {
        self.script = Mutex::new(outcomes.into());
        self
    }

    /// A service with no credential configured: all submissions fail.
    pub fn unconfigured() -> Self {
        let mut fal = Self::new(PollOutcome::Unknown);
        fal.unconfigured = true;
        fal
    }

    /// A service that rejects every submission.
    pub fn failing_submissions() -> Self {
        let mut fal = Self::new(PollOutcome::Unknown);
        fal.fail_submissions = true;
        fal
    }

    /// Number of submissions accepted so far.
    pub fn submission_count(&self) -> u64 {
        self.submissions.load(Ordering::SeqCst)
    }

    /// Number of status polls served so far.
    pub fn poll_count(&self) -> u32 {
        self.polls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl InferenceService for ScriptedFal {
    async fn submit(&self, _prompt: &str, image: Option<&[u8]>) -> Result<Submission, FalError> {
        if self.unconfigured {
            return Err(FalError::Unconfigured);
        }
        if self.fail_submissions {
            return Err(FalError::Api {
                status: 500,
                body: "scripted submission failure".to_string(),
            });
        }

        let n = self.submissions.fetch_add(1, Ordering::SeqCst) + 1;
        let application = if image.is_some() {
            IMAGE_TO_IMAGE_ENDPOINT
        } else {
            TEXT_TO_IMAGE_ENDPOINT
        };
        Ok(Submission {
            request_id: format!("req-{n}"),
            application: application.to_string(),
        })
    }

    async fn poll_status(&self, _request_id: &str, _application: &str) -> PollOutcome {
        self.polls.fetch_add(1, Ordering::SeqCst);
        let scripted = self.script.lock().unwrap().pop_front();
        scripted.unwrap_or_else(|| self.fallback.clone())
    }
}

// ---------------------------------------------------------------------------
// App construction
// ---------------------------------------------------------------------------

/// Build a test `ServerConfig` with safe defaults and a fast monitor.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        jwt: test_jwt_config(),
        monitor: MonitorConfig {
            poll_interval: Duration::from_millis(5),
            max_attempts: 3,
        },
    }
}

/// JWT config shared by the app under test and token helpers.
pub fn test_jwt_config() -> JwtConfig {
    JwtConfig {
        secret: "integration-test-secret-long-enough-for-hmac".to_string(),
        access_token_expiry_mins: 60,
    }
}

/// Build the full application router with all middleware layers, using
/// the given database pool and inference service double.
pub fn build_test_app(pool: PgPool, fal: Arc<dyn InferenceService>) -> Router {
    let config = test_config();
    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
        fal,
    };
    build_app_router(state, &config)
}

/// Create a user directly in the database and mint a bearer token for it.
pub async fn create_user_with_token(pool: &PgPool, email: &str) -> (User, String) {
    let password_hash = hash_password("test_password_123!").expect("hashing should succeed");
    let user = UserRepo::create(
        pool,
        &CreateUser {
            email: email.to_string(),
            password_hash,
        },
    )
    .await
    .expect("user creation should succeed");

    let token = generate_access_token(user.id, &user.email, &test_jwt_config())
        .expect("token generation should succeed");
    (user, token)
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

/// Send a GET request without authentication.
pub async fn get(app: Router, path: &str) -> Response<Body> {
    let request = Request::builder()
        .uri(path)
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

/// Send a GET request with a bearer token.
pub async fn get_auth(app: Router, path: &str, token: &str) -> Response<Body> {
    let request = Request::builder()
        .uri(path)
        .header("authorization", format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

/// Send a POST request with a JSON body, without authentication.
pub async fn post_json(app: Router, path: &str, body: serde_json::Value) -> Response<Body> {
    let request = Request::builder()
        .method("POST")
        .uri(path)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

/// Collect a response body and parse it as JSON.
pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).expect("response body should be valid JSON")
}

/// Assert a response is an error with the expected status and `code` field.
pub async fn assert_error(response: Response<Body>, status: StatusCode, code: &str) {
    assert_eq!(response.status(), status);
    let json = body_json(response).await;
    assert_eq!(json["code"], code, "unexpected error code: {json}");
}

// ---------------------------------------------------------------------------
// Multipart helpers
// ---------------------------------------------------------------------------

/// One field of a multipart form body.
pub struct FormField<'a> {
    pub name: &'a str,
    pub filename: Option<&'a str>,
    pub content_type: Option<&'a str>,
    pub data: Vec<u8>,
}

impl<'a> FormField<'a> {
    /// A plain text field.
    pub fn text(name: &'a str, value: &str) -> Self {
        Self {
            name,
            filename: None,
            content_type: None,
            data: value.as_bytes().to_vec(),
        }
    }

    /// A file field with an explicit content type.
    pub fn file(name: &'a str, filename: &'a str, content_type: &'a str, data: Vec<u8>) -> Self {
        Self {
            name,
            filename: Some(filename),
            content_type: Some(content_type),
            data,
        }
    }
}

/// Multipart boundary used by [`post_multipart`].
const BOUNDARY: &str = "pixelsmith-test-boundary";

/// Encode fields as a `multipart/form-data` body.
fn multipart_body(fields: &[FormField<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for field in fields {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match field.filename {
            Some(filename) => body.extend_from_slice(
                format!(
                    "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
                    field.name, filename
                )
                .as_bytes(),
            ),
            None => body.extend_from_slice(
                format!("Content-Disposition: form-data; name=\"{}\"\r\n", field.name).as_bytes(),
            ),
        }
        if let Some(content_type) = field.content_type {
            body.extend_from_slice(format!("Content-Type: {content_type}\r\n").as_bytes());
        }
        body.extend_from_slice(b"\r\n");
        body.extend_from_slice(&field.data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

/// Send an authenticated multipart POST request.
pub async fn post_multipart(
    app: Router,
    path: &str,
    token: &str,
    fields: &[FormField<'_>],
) -> Response<Body> {
    let request = Request::builder()
        .method("POST")
        .uri(path)
        .header("authorization", format!("Bearer {token}"))
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(multipart_body(fields)))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

/// Encode a solid-color RGB PNG of the given dimensions in memory.
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    use std::io::Cursor;
    let img = image::RgbImage::from_pixel(width, height, image::Rgb([64, 128, 255]));
    let mut out = Vec::new();
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut out), image::ImageFormat::Png)
        .expect("in-memory PNG encoding should succeed");
    out
}
