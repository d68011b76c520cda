#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use tower::ServiceExt;
use uuid::Uuid;
use vidquiz_api::{
    config::{Config, StorageBackend},
    create_router,
    models::quiz::{DraftQuestion, QuizDraft},
    services::{
        media_downloader::{AudioFetcher, DownloadError},
        quiz_generator::{GenerationError, QuizGenerator},
        quiz_pipeline::QuizPipeline,
        transcriber::{Transcriber, TranscriptionError},
        AppState,
    },
    store::memory::{MemoryQuizStore, MemoryTokenBlacklist, MemoryUserStore},
};

/// Downloads are stubbed with a small file write so the pipeline's disk
/// handling is still exercised.
pub struct StubFetcher {
    pub fail: bool,
}

#[async_trait]
impl AudioFetcher for StubFetcher {
    async fn fetch(&self, _video_url: &str, dest: &Path) -> Result<(), DownloadError> {
        if self.fail {
            return Err(DownloadError::Failed("Video unavailable".to_string()));
        }
        tokio::fs::write(dest, b"fake audio")
            .await
            .map_err(DownloadError::Prepare)
    }
}

pub struct StubTranscriber {
    pub fail: bool,
}

#[async_trait]
impl Transcriber for StubTranscriber {
    async fn transcribe(&self, audio_path: &Path) -> Result<String, TranscriptionError> {
        assert!(
            audio_path.exists(),
            "audio file must exist while transcribing"
        );
        if self.fail {
            return Err(TranscriptionError::Failed("no speech detected".to_string()));
        }
        Ok("A transcript about the borrow checker.".to_string())
    }
}

pub struct StubGenerator {
    pub fail: bool,
}

#[async_trait]
impl QuizGenerator for StubGenerator {
    async fn generate(&self, _transcript: &str) -> Result<QuizDraft, GenerationError> {
        if self.fail {
            return Err(GenerationError::InvalidOutput {
                reason: "not valid JSON: expected value".to_string(),
                raw: "I cannot help with that.".to_string(),
            });
        }
        Ok(sample_draft())
    }
}

pub fn sample_draft() -> QuizDraft {
    QuizDraft {
        title: "Rust ownership basics".to_string(),
        description: "A short tour of moves, borrows and lifetimes.".to_string(),
        questions: (0..10)
            .map(|i| DraftQuestion {
                question_title: format!("Question {}?", i + 1),
                question_options: vec![
                    format!("Option A{i}"),
                    format!("Option B{i}"),
                    format!("Option C{i}"),
                    format!("Option D{i}"),
                ],
                answer: format!("Option A{i}"),
            })
            .collect(),
    }
}

pub fn test_config(media_dir: PathBuf) -> Config {
    Config {
        storage_backend: StorageBackend::Memory,
        mongo_uri: "mongodb://localhost:27017".to_string(),
        mongo_database: "vidquiz_test".to_string(),
        redis_uri: "redis://localhost:6379".to_string(),
        jwt_secret: "test-secret".to_string(),
        access_token_ttl_seconds: 300,
        refresh_token_ttl_seconds: 86_400,
        media_dir,
        ytdlp_bin: "yt-dlp".to_string(),
        whisper_bin: "whisper".to_string(),
        whisper_model: "tiny".to_string(),
        whisper_use_cuda: false,
        gemini_api_key: String::new(),
        gemini_model: "gemini-2.5-flash".to_string(),
        gemini_base_url: "https://generativelanguage.googleapis.com".to_string(),
    }
}

/// App over in-memory stores and a fully stubbed pipeline.
pub async fn create_test_app() -> Router {
    create_test_app_with_stages(false, false, false).await.0
}

/// Same as `create_test_app` but lets a chosen pipeline stage fail, and hands
/// back the per-test media directory so tests can check it is left empty.
pub async fn create_test_app_with_stages(
    download_fails: bool,
    transcription_fails: bool,
    generation_fails: bool,
) -> (Router, PathBuf) {
    // Initialize tracing for tests
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();

    let media_dir = std::env::temp_dir().join(format!("vidquiz-test-{}", Uuid::new_v4()));
    let config = test_config(media_dir.clone());

    let pipeline = Arc::new(QuizPipeline::new(
        Arc::new(StubFetcher {
            fail: download_fails,
        }),
        Arc::new(StubTranscriber {
            fail: transcription_fails,
        }),
        Arc::new(StubGenerator {
            fail: generation_fails,
        }),
        media_dir.clone(),
    ));

    let app_state = Arc::new(AppState::with_components(
        config,
        Arc::new(MemoryUserStore::new()),
        Arc::new(MemoryQuizStore::new()),
        Arc::new(MemoryTokenBlacklist::new()),
        pipeline,
    ));

    (create_router(app_state), media_dir)
}

pub fn assert_media_dir_empty(media_dir: &Path) {
    let leftovers: Vec<_> = std::fs::read_dir(media_dir)
        .map(|entries| entries.flatten().map(|e| e.path()).collect())
        .unwrap_or_default();
    assert!(leftovers.is_empty(), "leftover media files: {leftovers:?}");
}

/// Test helper to register a new user
pub async fn register_user(
    app: &Router,
    username: &str,
    email: &str,
    password: &str,
) -> (StatusCode, String, Vec<String>) {
    let request_body = serde_json::json!({
        "username": username,
        "email": email,
        "password": password,
        "confirmed_password": password,
    });

    send_json(app, "POST", "/register", None, Some(request_body)).await
}

/// Test helper to login a user
pub async fn login_user(
    app: &Router,
    username: &str,
    password: &str,
) -> (StatusCode, String, Vec<String>) {
    let request_body = serde_json::json!({
        "username": username,
        "password": password,
    });

    send_json(app, "POST", "/login", None, Some(request_body)).await
}

/// Registers and logs in a fresh user, returning the session cookies ready to
/// send back in a Cookie header.
pub async fn authenticated_session(app: &Router, username: &str) -> String {
    let email = format!("{username}@example.com");
    let (status, _, _) = register_user(app, username, &email, "SecurePassword123!").await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _, cookies) = login_user(app, username, "SecurePassword123!").await;
    assert_eq!(status, StatusCode::OK);

    cookie_header(&cookies)
}

/// Sends one request through the router, returning status, body text and all
/// Set-Cookie headers.
pub async fn send_json(
    app: &Router,
    method: &str,
    uri: &str,
    cookie_header: Option<&str>,
    body: Option<serde_json::Value>,
) -> (StatusCode, String, Vec<String>) {
    let mut builder = Request::builder().method(method).uri(uri);

    if let Some(cookie) = cookie_header {
        builder = builder.header("cookie", cookie);
    }

    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();

    let status = response.status();

    let cookies: Vec<String> = response
        .headers()
        .get_all("set-cookie")
        .iter()
        .filter_map(|v| v.to_str().ok().map(|s| s.to_string()))
        .collect();

    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body_str = String::from_utf8(body.to_vec()).unwrap();

    (status, body_str, cookies)
}

/// Extract a named cookie's value from Set-Cookie headers
pub fn cookie_value(cookies: &[String], name: &str) -> Option<String> {
    let prefix = format!("{name}=");
    for cookie in cookies {
        if let Some(rest) = cookie.strip_prefix(&prefix) {
            if let Some(value) = rest.split(';').next() {
                return Some(value.to_string());
            }
        }
    }
    None
}

/// Find the full Set-Cookie header for a named cookie
pub fn cookie_attributes<'a>(cookies: &'a [String], name: &str) -> Option<&'a String> {
    let prefix = format!("{name}=");
    cookies.iter().find(|c| c.starts_with(&prefix))
}

/// Builds a Cookie request header out of captured Set-Cookie headers.
pub fn cookie_header(cookies: &[String]) -> String {
    let mut pairs = Vec::new();
    for name in ["access_token", "refresh_token"] {
        if let Some(value) = cookie_value(cookies, name) {
            pairs.push(format!("{name}={value}"));
        }
    }
    pairs.join("; ")
}
