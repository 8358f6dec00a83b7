#![allow(dead_code)]

use std::io::Cursor;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use axum::{
  extract::Multipart,
  http::{HeaderMap, StatusCode},
  response::{IntoResponse, Response},
  routing::post,
  Json, Router,
};
use image::{ImageFormat, Rgba, RgbaImage};
use serde_json::{json, Value};
use skin_analysis::config::{
  AnalysisConfig, AnalyzerType, AppConfig, Config, OutputFormat, UploadDetails,
};
use tokio::net::TcpListener;

pub const API_KEY: &str = "secret";
pub const API_KEY_HEADER: &str = "ailabapi-api-key";

pub fn remote_result() -> Value {
  json!({
    "skin_type": {"skin_type": 1, "details": [{"value": 0, "confidence": 0.9}]},
    "comment": "油性偏多"
  })
}

/// Serves a few endpoints mimicking the remote analysis API.
pub async fn spawn_fake_api() -> SocketAddr {
  let router = Router::new()
    .route("/ok", post(ok))
    .route("/slow", post(slow))
    .route("/error", post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }))
    .route("/garbage", post(|| async { "not json at all" }))
    .route(
      "/no-result",
      post(|| async { Json(json!({"error_code": 1001, "error_msg": "bad image"})) }),
    );

  spawn(router).await
}

pub async fn spawn(router: Router) -> SocketAddr {
  let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
  let addr = listener.local_addr().unwrap();

  tokio::spawn(async move {
    axum::serve(listener, router).await.unwrap();
  });

  addr
}

async fn ok(headers: HeaderMap, mut multipart: Multipart) -> Response {
  if headers.get(API_KEY_HEADER).and_then(|v| v.to_str().ok()) != Some(API_KEY) {
    return (StatusCode::UNAUTHORIZED, "missing api key").into_response();
  }

  while let Ok(Some(field)) = multipart.next_field().await {
    if field.name() != Some("image") {
      continue;
    }
    if field.file_name() != Some("file") {
      return (StatusCode::BAD_REQUEST, "wrong filename").into_response();
    }
    if field.content_type() != Some("application/octet-stream") {
      return (StatusCode::BAD_REQUEST, "wrong content type").into_response();
    }

    let data = match field.bytes().await {
      Ok(data) => data,
      Err(_) => return (StatusCode::BAD_REQUEST, "unreadable").into_response(),
    };
    if !data.starts_with(&[0xFF, 0xD8]) {
      return (StatusCode::BAD_REQUEST, "not a jpeg").into_response();
    }

    return Json(json!({"error_code": 0, "result": remote_result()})).into_response();
  }

  (StatusCode::BAD_REQUEST, "no image field").into_response()
}

async fn slow() -> Response {
  tokio::time::sleep(Duration::from_secs(5)).await;
  Json(json!({"result": {}})).into_response()
}

/// A port nothing listens on.
pub async fn closed_port() -> SocketAddr {
  let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
  listener.local_addr().unwrap()
}

pub fn analysis_config(api_url: String, dir: &Path) -> AnalysisConfig {
  AnalysisConfig {
    api_url,
    api_key: API_KEY.to_string(),
    api_key_header_name: API_KEY_HEADER.to_string(),
    request_timeout: Duration::from_millis(500),
    default_image_path: dir.join("default.png"),
    upload: UploadDetails::default(),
    output: OutputFormat::default(),
  }
}

pub fn test_config(dir: &Path, analyzer: AnalyzerType, api_url: String) -> Config {
  Config {
    app: AppConfig {
      listen: "127.0.0.1:0".to_string(),
      metrics_listen: "127.0.0.1:0".to_string(),
      upload_dir: dir.join("image"),
      static_dir: dir.join("frontend"),
      max_body_size_mb: 10,
      analyzer,
      mock_seed: Some(11),
      enable_openapi: true,
    },
    analysis: analysis_config(api_url, dir),
  }
}

/// A small PNG whose right half is fully transparent.
pub fn transparent_png() -> Vec<u8> {
  let mut img = RgbaImage::new(16, 16);
  for (x, _, px) in img.enumerate_pixels_mut() {
    *px = if x < 8 {
      Rgba([180, 120, 90, 255])
    } else {
      Rgba([0, 0, 0, 0])
    };
  }

  let mut buffer = Cursor::new(Vec::new());
  img.write_to(&mut buffer, ImageFormat::Png).unwrap();
  buffer.into_inner()
}

pub fn files_in(dir: &Path) -> Vec<String> {
  let mut names: Vec<String> = std::fs::read_dir(dir)
    .map(|entries| {
      entries
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect()
    })
    .unwrap_or_default();
  names.sort();
  names
}
