//! Integration tests for the HTTP catalog
//!
//! Covers:
//! - Node info and peer list
//! - File listing and storage usage
//! - Upload, download and delete round trips
//! - Name validation and error responses
//! - Embedded UI

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    response::Response,
    Router,
};
use http_body_util::BodyExt;
use lanshare_api::{create_router, ApiState, FileCatalog};
use lanshare_core::config::ApiConfig;
use lanshare_discovery::{DiscoveryConfig, DiscoveryService};
use serde_json::Value;
use std::net::{Ipv4Addr, UdpSocket};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tower::ServiceExt;

const BOUNDARY: &str = "lanshare-test-boundary";

// ============================================================================
// Test Setup Helpers
// ============================================================================

struct TestNode {
    app: Router,
    discovery: Arc<DiscoveryService>,
    dir: TempDir,
}

fn discovery_config(port: u16) -> DiscoveryConfig {
    DiscoveryConfig {
        discovery_port: port,
        service_port: 8123,
        announce_interval_ms: 200,
        peer_expiry_ms: 2_000,
        receive_timeout_ms: 100,
        broadcast_addr: Some(Ipv4Addr::new(127, 255, 255, 255)),
        ..Default::default()
    }
}

fn test_node_with(api: ApiConfig, discovery: DiscoveryConfig) -> TestNode {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let discovery = Arc::new(
        DiscoveryService::with_local_address(discovery, "192.168.1.50")
            .expect("Failed to create discovery service"),
    );
    let catalog = Arc::new(FileCatalog::new(dir.path().join("uploads")));
    let app = create_router(ApiState::new(discovery.clone(), catalog), &api);

    TestNode { app, discovery, dir }
}

fn test_node() -> TestNode {
    test_node_with(ApiConfig::default(), discovery_config(47300))
}

impl TestNode {
    fn upload_path(&self, name: &str) -> std::path::PathBuf {
        self.dir.path().join("uploads").join(name)
    }

    async fn send(&self, request: Request<Body>) -> Response {
        self.app.clone().oneshot(request).await.unwrap()
    }

    async fn get(&self, uri: &str) -> Response {
        self.send(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
    }

    async fn post(&self, uri: &str) -> Response {
        self.send(
            Request::builder()
                .method("POST")
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    async fn upload(&self, field: &str, file_name: &str, contents: &[u8]) -> Response {
        self.send(multipart_request(field, file_name, contents)).await
    }
}

fn multipart_request(field: &str, file_name: &str, contents: &[u8]) -> Request<Body> {
    let mut body = format!(
        "--{BOUNDARY}\r\n\
         Content-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\n\
         Content-Type: application/octet-stream\r\n\r\n"
    )
    .into_bytes();
    body.extend_from_slice(contents);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri("/uploadfile/")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

async fn body_bytes(response: Response) -> Vec<u8> {
    response.into_body().collect().await.unwrap().to_bytes().to_vec()
}

async fn body_json(response: Response) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

fn assert_redirect_home(response: &Response) {
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers()[header::LOCATION], "/");
}

// ============================================================================
// Node Endpoints
// ============================================================================

#[tokio::test]
async fn test_info_reports_advertised_address() {
    let node = test_node();

    let response = node.get("/api/info").await;
    assert_eq!(response.status(), StatusCode::OK);

    let info = body_json(response).await;
    assert_eq!(info["local_ip"], "192.168.1.50");
    assert_eq!(info["port"], 8123);
}

#[tokio::test]
async fn test_peers_empty_while_discovery_stopped() {
    let node = test_node();

    let response = node.get("/api/peers").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, serde_json::json!([]));
}

#[tokio::test]
async fn test_discovery_status() {
    let node = test_node();

    let status = body_json(node.get("/api/discovery/status").await).await;
    assert_eq!(status["state"], "stopped");
    assert_eq!(status["local_address"], "192.168.1.50");
    assert_eq!(status["peer_count"], 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_peers_lists_announced_peer() {
    let port = 47301;
    let node = test_node_with(ApiConfig::default(), discovery_config(port));
    node.discovery.start().await.expect("discovery failed to start");

    let sender = UdpSocket::bind("127.0.0.1:0").unwrap();
    sender
        .send_to(b"PEER:192.168.7.7:9000", ("127.0.0.1", port))
        .unwrap();

    let deadline = Instant::now() + Duration::from_secs(2);
    let peers = loop {
        let peers = body_json(node.get("/api/peers").await).await;
        if peers.as_array().is_some_and(|list| !list.is_empty()) || Instant::now() > deadline {
            break peers;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    };

    // Our own loopback announcements must not show up
    assert_eq!(
        peers,
        serde_json::json!([{ "ip": "192.168.7.7", "url": "http://192.168.7.7:9000" }])
    );

    node.discovery.stop().await.unwrap();
}

// ============================================================================
// File Endpoints
// ============================================================================

#[tokio::test]
async fn test_empty_catalog() {
    let node = test_node();

    let files = body_json(node.get("/api/files").await).await;
    assert_eq!(files, serde_json::json!([]));

    let storage = body_json(node.get("/api/storage").await).await;
    assert_eq!(storage["used"], 0);
    assert_eq!(storage["used_human"], "0 B");
}

#[tokio::test]
async fn test_upload_list_download_delete() {
    let node = test_node();
    let contents = vec![b'x'; 1536];

    let response = node.upload("file", "report.bin", &contents).await;
    assert_redirect_home(&response);
    assert_eq!(std::fs::read(node.upload_path("report.bin")).unwrap(), contents);

    let files = body_json(node.get("/api/files").await).await;
    assert_eq!(files.as_array().unwrap().len(), 1);
    assert_eq!(files[0]["name"], "report.bin");
    assert_eq!(files[0]["size"], 1536);
    assert!(files[0]["mtime"].as_u64().unwrap() > 0);

    let storage = body_json(node.get("/api/storage").await).await;
    assert_eq!(storage["used"], 1536);
    assert_eq!(storage["used_human"], "1.50 KB");

    let response = node.get("/downloadfile/report.bin").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"report.bin\""
    );
    assert_eq!(response.headers()[header::CONTENT_LENGTH], "1536");
    assert_eq!(body_bytes(response).await, contents);

    let response = node.post("/deletefile/report.bin").await;
    assert_redirect_home(&response);
    assert!(!node.upload_path("report.bin").exists());

    let files = body_json(node.get("/api/files").await).await;
    assert_eq!(files, serde_json::json!([]));
}

#[tokio::test]
async fn test_upload_overwrites_existing_file() {
    let node = test_node();

    node.upload("file", "notes.txt", b"first draft").await;
    node.upload("file", "notes.txt", b"final").await;

    assert_eq!(std::fs::read(node.upload_path("notes.txt")).unwrap(), b"final");
    let files = body_json(node.get("/api/files").await).await;
    assert_eq!(files.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_upload_keeps_only_base_name() {
    let node = test_node();

    let response = node.upload("file", "../../escape.txt", b"data").await;
    assert_redirect_home(&response);

    assert!(node.upload_path("escape.txt").exists());
    assert!(!node.dir.path().join("escape.txt").exists());
}

#[tokio::test]
async fn test_upload_without_file_field() {
    let node = test_node();

    let response = node.upload("attachment", "a.txt", b"data").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let error = body_json(response).await;
    assert_eq!(error["error"], "bad_request");
}

#[tokio::test]
async fn test_upload_over_body_limit() {
    let api = ApiConfig {
        max_upload_bytes: 512,
        ..Default::default()
    };
    let node = test_node_with(api, discovery_config(47300));

    let response = node.upload("file", "big.bin", &vec![0u8; 4096]).await;
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert!(!node.upload_path("big.bin").exists());
}

#[tokio::test]
async fn test_missing_file_is_not_found() {
    let node = test_node();

    let response = node.get("/downloadfile/missing.txt").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["error"], "not_found");

    let response = node.post("/deletefile/missing.txt").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_traversal_names_are_rejected() {
    let node = test_node();
    std::fs::write(node.dir.path().join("secret.txt"), b"top secret").unwrap();

    for uri in [
        "/downloadfile/..%2Fsecret.txt",
        "/downloadfile/%2E%2E",
        "/deletefile/..%2Fsecret.txt",
    ] {
        let response = if uri.starts_with("/deletefile") {
            node.post(uri).await
        } else {
            node.get(uri).await
        };
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{uri}");
    }

    assert!(node.dir.path().join("secret.txt").exists());
}

// ============================================================================
// UI
// ============================================================================

#[tokio::test]
async fn test_index_and_assets_served() {
    let node = test_node();

    let response = node.get("/").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "text/html; charset=utf-8"
    );
    let html = String::from_utf8(body_bytes(response).await).unwrap();
    assert!(html.contains("/uploadfile/"));

    let response = node.get("/static/script.js").await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = node.get("/static/missing.js").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
