//! Integration tests for the preview image server
//!
//! Router-level tests drive the axum router directly with `tower::ServiceExt::oneshot`;
//! one end-to-end test binds a real socket and speaks raw HTTP/1.1 to it.

use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use camino::{Utf8Path, Utf8PathBuf};
use modshelf::models::Settings;
use modshelf::preview::{self, PreviewServer};
use modshelf::state::SettingsState;
use std::fs;
use std::net::SocketAddr;
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tower::ServiceExt;

const MAX_BYTES: u64 = 1024;

fn create_library() -> (TempDir, Utf8PathBuf, SettingsState) {
    let temp_dir = TempDir::new().unwrap();
    let base = Utf8PathBuf::try_from(temp_dir.path().canonicalize().unwrap()).unwrap();
    let root = base.join("mods");

    fs::create_dir_all(root.join("Alice/Blue Dress")).unwrap();
    fs::write(root.join("Alice/Blue Dress/preview.png"), b"\x89PNG fake").unwrap();
    fs::write(root.join("Alice/Blue Dress/huge.jpg"), vec![0u8; 4096]).unwrap();
    fs::write(base.join("secret.png"), b"secret").unwrap();

    let settings = SettingsState::new(Settings {
        mod_root_path: root.to_string(),
        ..Settings::default()
    });

    (temp_dir, root, settings)
}

/// Request URI for `path`, percent-encoded the way the UI receives it
fn uri_for(path: &Utf8Path) -> String {
    let url = preview::image_url("127.0.0.1:1".parse().unwrap(), path).unwrap();
    format!("{}?{}", url.path(), url.query().unwrap_or_default())
}

async fn get(settings: &SettingsState, uri: &str) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
    let response = preview::router(settings.clone(), MAX_BYTES)
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let headers = response.headers().clone();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, headers, body.to_vec())
}

#[tokio::test]
async fn test_serves_image_with_headers() {
    let (_temp_dir, root, settings) = create_library();

    let (status, headers, body) =
        get(&settings, &uri_for(&root.join("Alice/Blue Dress/preview.png"))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"\x89PNG fake");
    assert_eq!(headers[header::CONTENT_TYPE], "image/png");
    assert_eq!(headers[header::CACHE_CONTROL], "no-cache");
    assert_eq!(headers[header::X_CONTENT_TYPE_OPTIONS], "nosniff");
}

#[tokio::test]
async fn test_escape_is_forbidden() {
    let (_temp_dir, root, settings) = create_library();

    let outside = root.parent().unwrap().join("secret.png");
    let (status, _, body) = get(&settings, &uri_for(&outside)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(!body.starts_with(b"secret"));

    let traversal = root.join("Alice/../../secret.png");
    let (status, _, _) = get(&settings, &uri_for(&traversal)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_missing_and_non_file_are_not_found() {
    let (_temp_dir, root, settings) = create_library();

    let (status, _, _) = get(&settings, &uri_for(&root.join("Alice/Blue Dress/gone.png"))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _, _) = get(&settings, &uri_for(&root.join("Alice/Blue Dress"))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_bad_requests() {
    let (_temp_dir, _root, settings) = create_library();

    let (status, _, _) = get(&settings, preview::IMAGE_ROUTE).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _, _) = get(&settings, &format!("{}?path=", preview::IMAGE_ROUTE)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _, _) = get(&settings, &format!("{}?path=a%00b", preview::IMAGE_ROUTE)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_oversized_file() {
    let (_temp_dir, root, settings) = create_library();

    let (status, _, _) = get(&settings, &uri_for(&root.join("Alice/Blue Dress/huge.jpg"))).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn test_root_unset_or_missing() {
    let (_temp_dir, root, settings) = create_library();
    let image = root.join("Alice/Blue Dress/preview.png");

    settings.replace(Settings::default());
    let (status, _, _) = get(&settings, &uri_for(&image)).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    settings.replace(Settings {
        mod_root_path: root.join("nope").to_string(),
        ..Settings::default()
    });
    let (status, _, _) = get(&settings, &uri_for(&image)).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_real_socket_round_trip() {
    let (_temp_dir, root, settings) = create_library();

    let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
    let server = PreviewServer::bind(addr, settings, MAX_BYTES).await.unwrap();
    let addr = server.local_addr();
    assert_ne!(addr.port(), 0);

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
    let handle = tokio::spawn(server.serve(async move {
        let _ = shutdown_rx.await;
    }));

    let uri = uri_for(&root.join("Alice/Blue Dress/preview.png"));
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream
        .write_all(format!("GET {uri} HTTP/1.1\r\nHost: {addr}\r\nConnection: close\r\n\r\n").as_bytes())
        .await
        .unwrap();

    let mut response = Vec::new();
    stream.read_to_end(&mut response).await.unwrap();
    let response = String::from_utf8_lossy(&response);

    assert!(response.starts_with("HTTP/1.1 200"), "got: {response}");
    assert!(response.to_ascii_lowercase().contains("content-type: image/png"));
    assert!(response.ends_with("\u{fffd}PNG fake"));

    shutdown_tx.send(()).unwrap();
    handle.await.unwrap().unwrap();
}
