mod common;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use skin_analysis::analysis::format::format_json;
use skin_analysis::analysis::remote::Orchestrator;
use skin_analysis::analysis::{AnalysisError, SkinAnalyzer};
use skin_analysis::config::OutputFormat;

use common::{analysis_config, closed_port, files_in, remote_result, spawn_fake_api, transparent_png};

fn orchestrator(url: String, dir: &Path) -> Orchestrator {
  Orchestrator::new(Arc::new(analysis_config(url, dir))).unwrap()
}

fn write_png(dir: &Path, name: &str) -> std::path::PathBuf {
  let path = dir.join(name);
  std::fs::write(&path, transparent_png()).unwrap();
  path
}

#[tokio::test]
async fn converts_sends_and_cleans_up() {
  let addr = spawn_fake_api().await;
  let tmp = tempfile::tempdir().unwrap();
  let png = write_png(tmp.path(), "face.png");

  let text = orchestrator(format!("http://{}/ok", addr), tmp.path())
    .analyze(Some(&png))
    .await
    .unwrap();

  assert_eq!(
    text,
    format_json(&remote_result(), &OutputFormat::default()).unwrap()
  );
  assert!(text.contains("油性偏多"));
  assert_eq!(files_in(tmp.path()), vec!["face.png"]);
}

#[tokio::test]
async fn falls_back_to_default_image() {
  let addr = spawn_fake_api().await;
  let tmp = tempfile::tempdir().unwrap();
  write_png(tmp.path(), "default.png");

  let value = orchestrator(format!("http://{}/ok", addr), tmp.path())
    .fetch(None)
    .await
    .unwrap();

  assert_eq!(value, remote_result());
  assert_eq!(files_in(tmp.path()), vec!["default.png"]);
}

#[tokio::test]
async fn jpeg_input_is_sent_and_kept() {
  let addr = spawn_fake_api().await;
  let tmp = tempfile::tempdir().unwrap();

  let jpg = tmp.path().join("face.JPG");
  image::RgbImage::from_pixel(8, 8, image::Rgb([90, 60, 40]))
    .save_with_format(&jpg, image::ImageFormat::Jpeg)
    .unwrap();

  let analyzer = orchestrator(format!("http://{}/ok", addr), tmp.path());
  let value = SkinAnalyzer::analyze(&analyzer, &jpg).await.unwrap();

  assert_eq!(value, remote_result());
  assert!(jpg.exists());
}

#[tokio::test]
async fn timeout_is_reported_and_temp_file_removed() {
  let addr = spawn_fake_api().await;
  let tmp = tempfile::tempdir().unwrap();
  let png = write_png(tmp.path(), "face.png");

  let err = orchestrator(format!("http://{}/slow", addr), tmp.path())
    .analyze(Some(&png))
    .await
    .unwrap_err();

  match err {
    AnalysisError::Timeout(d) => assert_eq!(d, Duration::from_millis(500)),
    other => panic!("expected timeout, got {:?}", other),
  }
  assert!(!tmp.path().join("face.jpg").exists());
  assert!(png.exists());
}

#[tokio::test]
async fn http_error_keeps_status_and_body() {
  let addr = spawn_fake_api().await;
  let tmp = tempfile::tempdir().unwrap();
  let png = write_png(tmp.path(), "face.png");

  let err = orchestrator(format!("http://{}/error", addr), tmp.path())
    .analyze(Some(&png))
    .await
    .unwrap_err();

  match err {
    AnalysisError::HttpStatus { status, body } => {
      assert_eq!(status, 500);
      assert_eq!(body, "boom");
    }
    other => panic!("expected http status error, got {:?}", other),
  }
  assert_eq!(files_in(tmp.path()), vec!["face.png"]);
}

#[tokio::test]
async fn unparsable_or_resultless_bodies_are_malformed() {
  let addr = spawn_fake_api().await;
  let tmp = tempfile::tempdir().unwrap();
  let png = write_png(tmp.path(), "face.png");

  for (route, needle) in [("garbage", "not json"), ("no-result", "error_code")] {
    let err = orchestrator(format!("http://{}/{}", addr, route), tmp.path())
      .analyze(Some(&png))
      .await
      .unwrap_err();

    match err {
      AnalysisError::MalformedResponse { status, body } => {
        assert_eq!(status, 200);
        assert!(body.contains(needle));
      }
      other => panic!("expected malformed response, got {:?}", other),
    }
  }
  assert_eq!(files_in(tmp.path()), vec!["face.png"]);
}

#[tokio::test]
async fn refused_connection_is_reported() {
  let addr = closed_port().await;
  let tmp = tempfile::tempdir().unwrap();
  let png = write_png(tmp.path(), "face.png");

  let err = orchestrator(format!("http://{}/ok", addr), tmp.path())
    .analyze(Some(&png))
    .await
    .unwrap_err();

  assert!(
    matches!(err, AnalysisError::Connection(_)),
    "unexpected error {:?}",
    err
  );
  assert_eq!(err.kind(), "connection");
  assert_eq!(files_in(tmp.path()), vec!["face.png"]);
}

#[tokio::test]
async fn missing_and_broken_images_never_reach_the_api() {
  let addr = closed_port().await;
  let tmp = tempfile::tempdir().unwrap();
  let analyzer = orchestrator(format!("http://{}/ok", addr), tmp.path());

  let err = analyzer
    .analyze(Some(&tmp.path().join("nope.png")))
    .await
    .unwrap_err();
  assert!(matches!(err, AnalysisError::NotFound(_)));

  // The default image does not exist either
  assert!(matches!(
    analyzer.analyze(None).await,
    Err(AnalysisError::NotFound(_))
  ));

  let broken = tmp.path().join("broken.webp");
  std::fs::write(&broken, b"garbage").unwrap();
  assert!(matches!(
    analyzer.analyze(Some(&broken)).await,
    Err(AnalysisError::Conversion(_))
  ));
}

#[tokio::test]
async fn output_honours_ascii_escaping() {
  let addr = spawn_fake_api().await;
  let tmp = tempfile::tempdir().unwrap();
  let png = write_png(tmp.path(), "face.png");

  let mut config = analysis_config(format!("http://{}/ok", addr), tmp.path());
  config.output.ensure_ascii = true;
  config.output.json_indent = 2;

  let text = Orchestrator::new(Arc::new(config))
    .unwrap()
    .analyze(Some(&png))
    .await
    .unwrap();

  assert!(text.is_ascii());
  assert!(text.contains("\\u6cb9"));
  assert!(text.starts_with("{\n  \""));
}
