use crate::config::Config;
use crate::engines;
use crate::error::OcrError;
use crate::preprocessing::{Pipeline, PreprocessingReport, Preset};
use crate::session::{EngineSession, Outcome, SessionStatus};
use crate::upload::ImageFile;
use axum::{
    extract::{multipart::MultipartError, DefaultBodyLimit, Multipart, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Room for multipart boundaries and headers on top of the file itself
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Message returned when the engine threw during recognition
const CONVERSION_FAILED: &str = "Failed to convert image to text. Please try again.";

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub session: Arc<EngineSession>,
    pub config: Arc<Config>,
}

/// Query parameters accepted by the OCR endpoint
#[derive(Debug, Deserialize)]
pub struct OcrParams {
    pub preprocess: Option<String>,
}

/// OCR response
#[derive(Serialize)]
pub struct OcrResponse {
    pub text: String,
    pub outcome: Outcome,
    pub engine: String,
    pub processing_time_ms: u64,
    pub preprocessing: PreprocessingReport,
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Server info response
#[derive(Serialize)]
pub struct InfoResponse {
    pub version: String,
    pub engine: String,
    pub engine_description: String,
    pub available_engines: Vec<String>,
    pub supported_languages: Vec<String>,
    pub language: String,
    pub max_file_size_bytes: usize,
    pub page_seg_mode: u32,
    pub preserve_interword_spaces: bool,
    pub default_preprocess: String,
}

/// Run the HTTP server
pub async fn run(config: Config) -> anyhow::Result<()> {
    let engine = engines::create(config.engine.as_deref(), &config.engine_options())?;
    let session = Arc::new(EngineSession::new(engine, Pipeline::new(config.preprocess)));
    let addr = format!("{}:{}", config.host, config.port);

    tokio::spawn(log_progress(session.subscribe()));

    if config.warm_up {
        let session = Arc::clone(&session);
        tokio::spawn(async move {
            if let Err(e) = session.ensure_initialized().await {
                tracing::error!("Warm-up failed: {}", e);
            }
        });
    }

    let state = AppState {
        session: Arc::clone(&session),
        config: Arc::new(config),
    };

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // In-flight requests have drained; the engine can go
    session.release().await;

    Ok(())
}

/// Build the application router
pub fn router(state: AppState) -> Router {
    let body_limit = state.config.max_file_size + MULTIPART_OVERHEAD;

    Router::new()
        .route("/api/ocr", post(handle_ocr))
        .route("/health", get(handle_health))
        .route("/info", get(handle_info))
        .route("/status", get(handle_status))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

async fn log_progress(mut progress: tokio::sync::watch::Receiver<crate::engine::Progress>) {
    while progress.changed().await.is_ok() {
        let current = progress.borrow_and_update().clone();
        if !current.status.is_empty() {
            tracing::debug!(
                "Engine progress: {} ({:.0}%)",
                current.status,
                current.progress * 100.0
            );
        }
    }
}

fn multipart_error(e: MultipartError, max_file_size: usize) -> OcrError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        OcrError::ImageTooLarge { max: max_file_size }
    } else {
        OcrError::InvalidRequest(format!("Failed to parse multipart: {}", e))
    }
}

/// Handle OCR requests
async fn handle_ocr(
    State(state): State<AppState>,
    Query(params): Query<OcrParams>,
    mut multipart: Multipart,
) -> Result<Json<OcrResponse>, OcrError> {
    let max_file_size = state.config.max_file_size;

    let pipeline = match params.preprocess.as_deref() {
        Some(name) => Some(Pipeline::new(Preset::from_str(name).ok_or_else(|| {
            OcrError::InvalidRequest(format!("Unknown preprocessing preset: {}", name))
        })?)),
        None => None,
    };

    let mut file: Option<ImageFile> = None;

    // Parse multipart form
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, max_file_size))?
    {
        let name = field.name().unwrap_or_default().to_string();

        if name == "image" {
            let content_type = field.content_type().map(|s| s.to_string());
            let data = field
                .bytes()
                .await
                .map_err(|e| multipart_error(e, max_file_size))?;
            file = Some(ImageFile::validate(
                content_type.as_deref(),
                data.to_vec(),
                max_file_size,
            )?);
        }
        // Ignore unknown fields
    }

    let file = file.ok_or(OcrError::MissingFile)?;

    tracing::info!(
        "Received {} upload ({} bytes)",
        file.content_type,
        file.bytes.len()
    );

    let conversion = state.session.convert(file, pipeline).await?;

    if conversion.outcome == Outcome::Failed {
        return Err(OcrError::RecognitionFailed(CONVERSION_FAILED.to_string()));
    }

    Ok(Json(OcrResponse {
        text: conversion.text,
        outcome: conversion.outcome,
        engine: state.session.engine_name().to_string(),
        processing_time_ms: conversion.processing_time_ms,
        preprocessing: conversion.preprocessing,
    }))
}

/// Handle health check requests
async fn handle_health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Handle info requests
async fn handle_info(State(state): State<AppState>) -> impl IntoResponse {
    Json(InfoResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
        engine: state.session.engine_name().to_string(),
        engine_description: state.session.engine_description().to_string(),
        available_engines: engines::available()
            .into_iter()
            .map(str::to_string)
            .collect(),
        supported_languages: state.session.supported_languages().await,
        language: state.config.language.clone(),
        max_file_size_bytes: state.config.max_file_size,
        page_seg_mode: state.config.page_seg_mode,
        preserve_interword_spaces: state.config.preserve_interword_spaces,
        default_preprocess: state.session.pipeline().preset().as_str().to_string(),
    })
}

/// Handle engine status requests
async fn handle_status(State(state): State<AppState>) -> Json<SessionStatus> {
    Json(state.session.status())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Recognition;
    use crate::layout::{BoundingBox, TextBlock, NO_TEXT_FOUND};
    use crate::session::tests::{sample_png, ScriptedEngine};
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request};
    use serde_json::Value;
    use tower::ServiceExt;

    const BOUNDARY: &str = "test-boundary-7d1a";

    fn test_config() -> Config {
        Config {
            host: "127.0.0.1".to_string(),
            port: 0,
            max_file_size: 1024,
            engine: None,
            language: "eng".to_string(),
            page_seg_mode: 3,
            preserve_interword_spaces: true,
            preprocess: Preset::Default,
            warm_up: false,
            tessdata_path: None,
        }
    }

    fn app(engine: ScriptedEngine, config: Config) -> Router {
        let session = EngineSession::new(Box::new(engine), Pipeline::new(config.preprocess));
        router(AppState {
            session: Arc::new(session),
            config: Arc::new(config),
        })
    }

    fn multipart_body(field: &str, content_type: &str, data: &[u8]) -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"upload\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    fn ocr_request(uri: &str, body: Vec<u8>) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let request = Request::get("/health").body(Body::empty()).unwrap();
        let (status, body) = send(app(ScriptedEngine::default(), test_config()), request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_ocr_returns_reconstructed_text() {
        let engine = ScriptedEngine {
            recognition: Recognition {
                text: String::new(),
                blocks: vec![
                    TextBlock::new("Total", BoundingBox::new(0.0, 100.0, 50.0, 110.0)),
                    TextBlock::new("Invoice", BoundingBox::new(0.0, 0.0, 80.0, 12.0)),
                    TextBlock::new("$42", BoundingBox::new(200.0, 104.0, 240.0, 114.0)),
                ],
            },
            ..Default::default()
        };
        let body = multipart_body("image", "image/png", &sample_png().bytes);

        let (status, body) = send(app(engine, test_config()), ocr_request("/api/ocr", body)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["text"], "Invoice\n\nTotal    $42");
        assert_eq!(body["outcome"], "text");
        assert_eq!(body["engine"], "scripted");
        assert_eq!(body["preprocessing"]["applied"], true);
    }

    #[tokio::test]
    async fn test_ocr_reports_no_text() {
        let body = multipart_body("image", "image/png", &sample_png().bytes);
        let (status, body) = send(
            app(ScriptedEngine::default(), test_config()),
            ocr_request("/api/ocr?preprocess=none", body),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["text"], NO_TEXT_FOUND);
        assert_eq!(body["outcome"], "no_text");
        assert_eq!(body["preprocessing"]["preset"], "none");
    }

    #[tokio::test]
    async fn test_ocr_rejects_non_image() {
        let body = multipart_body("image", "application/pdf", b"%PDF-1.4");
        let (status, body) = send(
            app(ScriptedEngine::default(), test_config()),
            ocr_request("/api/ocr", body),
        )
        .await;

        assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
        assert_eq!(body["code"], "UNSUPPORTED_FORMAT");
        assert_eq!(body["error"], "Please upload an image file");
    }

    #[tokio::test]
    async fn test_ocr_rejects_oversized_image() {
        let body = multipart_body("image", "image/png", &[0u8; 2048]);
        let (status, body) = send(
            app(ScriptedEngine::default(), test_config()),
            ocr_request("/api/ocr", body),
        )
        .await;

        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(body["code"], "IMAGE_TOO_LARGE");
        assert_eq!(body["error"], "File size should be less than 1KB");
    }

    #[tokio::test]
    async fn test_ocr_requires_image_field() {
        let body = multipart_body("file", "image/png", &sample_png().bytes);
        let (status, body) = send(
            app(ScriptedEngine::default(), test_config()),
            ocr_request("/api/ocr", body),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "MISSING_FILE");
    }

    #[tokio::test]
    async fn test_ocr_rejects_unknown_preset() {
        let body = multipart_body("image", "image/png", &sample_png().bytes);
        let (status, body) = send(
            app(ScriptedEngine::default(), test_config()),
            ocr_request("/api/ocr?preprocess=sepia", body),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "INVALID_REQUEST");
    }

    #[tokio::test]
    async fn test_recognition_failure_is_server_error() {
        let engine = ScriptedEngine {
            fail_recognize: true,
            ..Default::default()
        };
        let body = multipart_body("image", "image/png", &sample_png().bytes);
        let (status, body) = send(app(engine, test_config()), ocr_request("/api/ocr", body)).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["code"], "RECOGNITION_FAILED");
        assert_eq!(body["error"], CONVERSION_FAILED);
    }

    #[tokio::test]
    async fn test_init_failure_is_service_unavailable() {
        let engine = ScriptedEngine {
            fail_init: true,
            ..Default::default()
        };
        let session = Arc::new(EngineSession::new(
            Box::new(engine),
            Pipeline::new(Preset::Default),
        ));
        let router = router(AppState {
            session: Arc::clone(&session),
            config: Arc::new(test_config()),
        });

        let body = multipart_body("image", "image/png", &sample_png().bytes);
        let (status, body) = send(router.clone(), ocr_request("/api/ocr", body)).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["code"], "INIT_ERROR");

        let request = Request::get("/status").body(Body::empty()).unwrap();
        let (status, body) = send(router, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["state"], "failed");
        assert_eq!(body["error"], "model missing");
        assert_eq!(body["busy"], false);
    }

    #[tokio::test]
    async fn test_info_reports_configuration() {
        let request = Request::get("/info").body(Body::empty()).unwrap();
        let (status, body) = send(app(ScriptedEngine::default(), test_config()), request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["engine"], "scripted");
        assert_eq!(body["max_file_size_bytes"], 1024);
        assert_eq!(body["page_seg_mode"], 3);
        assert_eq!(body["preserve_interword_spaces"], true);
        assert_eq!(body["default_preprocess"], "default");
        assert_eq!(body["supported_languages"][0], "eng");
    }

    #[tokio::test]
    async fn test_status_starts_uninitialized() {
        let request = Request::get("/status").body(Body::empty()).unwrap();
        let (status, body) = send(app(ScriptedEngine::default(), test_config()), request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["state"], "uninitialized");
        assert_eq!(body["busy"], false);
        assert!(body.get("error").is_none());
    }
}
