//! Local preview image server.
//!
//! Serves `GET /api/img?path=<absolute path>` so the web UI can show preview
//! images without file access of its own. Every request is confined to the
//! current mod root; nothing outside it is ever opened.

use crate::error::EngineError;
use crate::services::PathGuard;
use crate::state::SettingsState;
use anyhow::{Context, Result};
use axum::{
    Router,
    body::Body,
    extract::{Query, State},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use camino::Utf8Path;
use serde::Deserialize;
use std::fmt;
use std::future::Future;
use std::io::ErrorKind;
use std::net::SocketAddr;
use tokio::fs::File;
use tokio::net::{TcpListener, ToSocketAddrs};
use tokio_util::io::ReaderStream;
use url::Url;

/// Route of the image endpoint
pub const IMAGE_ROUTE: &str = "/api/img";

/// HTTP error with the status it maps to
#[derive(Debug)]
pub struct PreviewError {
    pub status: StatusCode,
    pub message: String,
}

impl PreviewError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn too_large(message: impl Into<String>) -> Self {
        Self::new(StatusCode::PAYLOAD_TOO_LARGE, message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl fmt::Display for PreviewError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for PreviewError {}

impl IntoResponse for PreviewError {
    fn into_response(self) -> Response {
        (
            self.status,
            [(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"))],
            self.message,
        )
            .into_response()
    }
}

impl From<EngineError> for PreviewError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::InvalidPath { .. } => Self::bad_request(err.to_string()),
            EngineError::PathEscape { .. } => Self::forbidden(err.to_string()),
            EngineError::RootUnavailable { .. } => Self::unavailable(err.to_string()),
            EngineError::NotFound { .. } => Self::not_found(err.to_string()),
            _ => Self::internal(err.to_string()),
        }
    }
}

#[derive(Clone)]
struct PreviewState {
    settings: SettingsState,
    max_bytes: u64,
}

#[derive(Debug, Deserialize)]
struct ImageQuery {
    path: Option<String>,
}

/// Build the preview router
///
/// The mod root is read from `settings` on every request, so changing it
/// takes effect immediately.
pub fn router(settings: SettingsState, max_bytes: u64) -> Router {
    Router::new()
        .route(IMAGE_ROUTE, get(serve_image))
        .with_state(PreviewState {
            settings,
            max_bytes,
        })
}

async fn serve_image(
    State(state): State<PreviewState>,
    Query(query): Query<ImageQuery>,
) -> Result<Response, PreviewError> {
    let requested = query
        .path
        .filter(|p| !p.trim().is_empty())
        .ok_or_else(|| PreviewError::bad_request("missing path parameter"))?;

    let root = state
        .settings
        .mod_root()
        .ok_or_else(|| PreviewError::unavailable("mod root is not set"))?;
    let path = PathGuard::new(&root)?.resolve(&requested)?;

    let metadata = tokio::fs::metadata(&path).await.map_err(|e| {
        if e.kind() == ErrorKind::NotFound {
            PreviewError::not_found(format!("{path} not found"))
        } else {
            tracing::warn!("Cannot stat preview {}: {}", path, e);
            PreviewError::not_found(format!("{path} is not readable"))
        }
    })?;
    if !metadata.is_file() {
        return Err(PreviewError::not_found(format!("{path} is not a file")));
    }
    if metadata.len() > state.max_bytes {
        return Err(PreviewError::too_large(format!(
            "{path} is {} bytes, limit is {}",
            metadata.len(),
            state.max_bytes
        )));
    }

    let file = File::open(&path).await.map_err(|e| {
        if e.kind() == ErrorKind::NotFound {
            PreviewError::not_found(format!("{path} not found"))
        } else {
            tracing::error!("Error opening preview {}: {}", path, e);
            PreviewError::internal("failed to open file")
        }
    })?;

    let content_type = mime_guess::from_path(path.as_std_path()).first_or_octet_stream();
    tracing::debug!("Serving preview {} ({})", path, content_type);

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type.essence_str())
        .header(header::CONTENT_LENGTH, metadata.len())
        .header(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"))
        .header(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        )
        .body(Body::from_stream(ReaderStream::new(file)))
        .map_err(|e| {
            tracing::error!("Error building response: {}", e);
            PreviewError::internal("failed to build response")
        })
}

/// URL the UI loads a preview image from
pub fn image_url(addr: SocketAddr, path: &Utf8Path) -> Result<Url, url::ParseError> {
    let mut url = Url::parse(&format!("http://{addr}{IMAGE_ROUTE}"))?;
    url.query_pairs_mut().append_pair("path", path.as_str());
    Ok(url)
}

/// Bound, not yet serving, preview server
pub struct PreviewServer {
    listener: TcpListener,
    router: Router,
    addr: SocketAddr,
}

impl PreviewServer {
    /// Bind the listener; port 0 picks a free port
    pub async fn bind<A>(addr: A, settings: SettingsState, max_bytes: u64) -> Result<Self>
    where
        A: ToSocketAddrs + fmt::Display,
    {
        let addr_display = addr.to_string();
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind preview server to {addr_display}"))?;
        let addr = listener
            .local_addr()
            .context("Failed to read preview server address")?;

        Ok(Self {
            listener,
            router: router(settings, max_bytes),
            addr,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Serve until `shutdown` resolves
    pub async fn serve<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        tracing::info!("Preview server listening on http://{}", self.addr);

        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await
            .context("Preview server failed")?;

        tracing::info!("Preview server stopped");
        Ok(())
    }
}
