//! HTTP surface: `POST /api/process` and `GET /health`.
//!
//! The handler persists the multipart `document` field to a temp file inside
//! the upload directory, hands its path to [`DocumentExtractor`], and maps the
//! outcome to a status code:
//!
//! | Outcome | Status |
//! |---------|--------|
//! | extraction ran (`success: true`) | 200 |
//! | missing file, unsupported type, unknown mode, invalid model | 400 |
//! | PDF could not be opened (`success: false`) | 400 |
//! | mode not configured | 503 |
//! | anything else | 500 |
//!
//! The temp file is removed when the request finishes, whatever the outcome.

use crate::error::DocExtractError;
use crate::extract::{DocumentExtractor, ExtractionRequest};
use crate::output::DocumentResult;
use crate::pipeline::input::DocumentKind;
use axum::extract::{DefaultBodyLimit, Multipart, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{debug, error, info, warn, Level};

/// Name of the multipart field carrying the document.
pub const DOCUMENT_FIELD: &str = "document";

/// Listener and upload settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub upload_dir: PathBuf,
    /// Largest accepted upload, in bytes.
    pub max_file_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3080,
            upload_dir: PathBuf::from("uploads"),
            max_file_size: 500 * 1024 * 1024,
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub extractor: Arc<DocumentExtractor>,
    pub upload_dir: PathBuf,
}

/// Query parameters of `POST /api/process`.
#[derive(Debug, Default, Deserialize)]
pub struct ProcessParams {
    pub parallel: Option<String>,
    pub mode: Option<String>,
    pub model: Option<String>,
    pub page_range: Option<String>,
    pub selected_pages: Option<String>,
}

impl ProcessParams {
    /// Validate and convert into an [`ExtractionRequest`].
    pub fn into_request(self) -> Result<ExtractionRequest, DocExtractError> {
        let mode = match non_empty(self.mode) {
            Some(m) => Some(m.parse()?),
            None => None,
        };
        Ok(ExtractionRequest {
            parallel: non_empty(self.parallel).map(|p| p == "true"),
            mode,
            model: non_empty(self.model),
            page_range: non_empty(self.page_range),
            selected_pages: non_empty(self.selected_pages),
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

pub fn create_router(state: AppState, max_file_size: usize) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_response(DefaultOnResponse::new().level(Level::INFO));

    Router::new()
        .route("/health", get(health_handler))
        .route("/api/process", post(process_handler))
        .layer(DefaultBodyLimit::max(max_file_size))
        .layer(trace_layer)
        .layer(cors)
        .with_state(state)
}

async fn health_handler() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

struct Upload {
    kind: DocumentKind,
    // Deleted on drop.
    path: tempfile::TempPath,
}

async fn process_handler(
    State(state): State<AppState>,
    Query(params): Query<ProcessParams>,
    multipart: Multipart,
) -> Response {
    let request = match params.into_request() {
        Ok(r) => r,
        Err(e) => return error_response(&e),
    };

    let upload = match receive_upload(multipart, &state.upload_dir).await {
        Ok(Some(upload)) => upload,
        Ok(None) => {
            warn!("Process request without a '{}' field", DOCUMENT_FIELD);
            return (
                StatusCode::BAD_REQUEST,
                Json(DocumentResult::failure("No document was uploaded")),
            )
                .into_response();
        }
        Err(e) => return error_response(&e),
    };

    let result = state
        .extractor
        .extract_kind(&upload.path, upload.kind, &request)
        .await;
    drop(upload);

    match result {
        Ok(doc) if doc.success => (StatusCode::OK, Json(doc)).into_response(),
        Ok(doc) => (StatusCode::BAD_REQUEST, Json(doc)).into_response(),
        Err(e) => error_response(&e),
    }
}

/// Persist the `document` field, or `None` when the request carries none.
async fn receive_upload(
    mut multipart: Multipart,
    upload_dir: &std::path::Path,
) -> Result<Option<Upload>, DocExtractError> {
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => return Ok(None),
            Err(e) => {
                return Err(DocExtractError::InvalidInput {
                    input: format!("multipart body: {}", e),
                })
            }
        };
        if field.name() != Some(DOCUMENT_FIELD) {
            continue;
        }

        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let kind = DocumentKind::from_mime(&content_type)?;
        let filename = field.file_name().unwrap_or("upload").to_string();

        let data = field.bytes().await.map_err(|e| DocExtractError::InvalidInput {
            input: format!("reading '{}': {}", filename, e),
        })?;

        tokio::fs::create_dir_all(upload_dir)
            .await
            .map_err(|e| DocExtractError::Internal(format!("upload dir: {}", e)))?;
        let path = tempfile::Builder::new()
            .prefix("upload-")
            .tempfile_in(upload_dir)
            .map_err(|e| DocExtractError::Internal(format!("upload temp file: {}", e)))?
            .into_temp_path();
        tokio::fs::write(&path, &data)
            .await
            .map_err(|e| DocExtractError::Internal(format!("writing upload: {}", e)))?;

        debug!(
            "Received '{}' ({}, {} bytes) at {}",
            filename,
            content_type,
            data.len(),
            path.display()
        );
        return Ok(Some(Upload { kind, path }));
    }
}

/// Status code for a request-level error.
pub fn status_for(error: &DocExtractError) -> StatusCode {
    match error {
        e if e.is_request_error() => StatusCode::BAD_REQUEST,
        DocExtractError::ModeNotConfigured { .. } => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(error: &DocExtractError) -> Response {
    let status = status_for(error);
    if status.is_server_error() {
        error!("Request failed: {}", error);
    } else {
        warn!("Rejected request: {}", error);
    }
    (status, Json(DocumentResult::failure(error.to_string()))).into_response()
}

/// Run the HTTP service until Ctrl-C, then shut the extractors down.
pub async fn serve(
    config: ServerConfig,
    extractor: Arc<DocumentExtractor>,
) -> Result<(), DocExtractError> {
    tokio::fs::create_dir_all(&config.upload_dir)
        .await
        .map_err(|e| {
            DocExtractError::InvalidConfig(format!(
                "cannot create upload dir {}: {}",
                config.upload_dir.display(),
                e
            ))
        })?;

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|e| DocExtractError::InvalidConfig(format!("listen address: {}", e)))?;

    let state = AppState {
        extractor: Arc::clone(&extractor),
        upload_dir: config.upload_dir.clone(),
    };
    let router = create_router(state, config.max_file_size);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| DocExtractError::Internal(format!("bind {}: {}", addr, e)))?;
    info!(
        "Listening on http://{} (modes: {})",
        addr,
        extractor.extractors().modes().join(", ")
    );

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| DocExtractError::Internal(format!("server: {}", e)))?;

    extractor.shutdown().await;
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn params_parse_mode_and_parallel() {
        let params = ProcessParams {
            parallel: Some("true".into()),
            mode: Some("OCR".into()),
            ..Default::default()
        };
        let request = params.into_request().unwrap();
        assert_eq!(request.parallel, Some(true));
        assert_eq!(request.mode, Some(crate::config::ProcessingMode::Ocr));
    }

    #[test]
    fn anything_but_true_is_sequential() {
        let params = ProcessParams {
            parallel: Some("yes".into()),
            ..Default::default()
        };
        assert_eq!(params.into_request().unwrap().parallel, Some(false));
    }

    #[test]
    fn empty_params_are_absent() {
        let params = ProcessParams {
            mode: Some("".into()),
            page_range: Some("  ".into()),
            ..Default::default()
        };
        let request = params.into_request().unwrap();
        assert_eq!(request, ExtractionRequest::default());
    }

    #[test]
    fn unknown_mode_is_rejected() {
        let params = ProcessParams {
            mode: Some("tesseract".into()),
            ..Default::default()
        };
        let err = params.into_request().unwrap_err();
        assert_eq!(status_for(&err), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn status_mapping() {
        let unconfigured = DocExtractError::ModeNotConfigured {
            mode: "openai".into(),
            hint: String::new(),
        };
        assert_eq!(status_for(&unconfigured), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            status_for(&DocExtractError::Internal("x".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
