use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::image_processing::NormalizeError;

pub mod format;
pub mod mock;
pub mod remote;

/// Why an analysis produced no result. Every variant is terminal for the
/// request; nothing is retried.
#[derive(Error, Debug)]
pub enum AnalysisError {
  #[error("image not found: {0}")]
  NotFound(PathBuf),
  #[error("image conversion failed: {0}")]
  Conversion(String),
  #[error("failed to read {path}: {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
  #[error("request timed out after {0:?}")]
  Timeout(Duration),
  #[error("connection failed: {0}")]
  Connection(String),
  #[error("remote api returned status {status}: {body}")]
  HttpStatus { status: u16, body: String },
  #[error("malformed response (status {status}): {body}")]
  MalformedResponse { status: u16, body: String },
  #[error("request failed: {0}")]
  Transport(String),
  #[error("failed to format result: {0}")]
  Format(String),
}

impl AnalysisError {
  /// Short label used for metrics and logs.
  pub fn kind(&self) -> &'static str {
    match self {
      AnalysisError::NotFound(_) => "not_found",
      AnalysisError::Conversion(_) => "conversion",
      AnalysisError::Io { .. } => "io",
      AnalysisError::Timeout(_) => "timeout",
      AnalysisError::Connection(_) => "connection",
      AnalysisError::HttpStatus { .. } => "http_status",
      AnalysisError::MalformedResponse { .. } => "malformed_response",
      AnalysisError::Transport(_) => "transport",
      AnalysisError::Format(_) => "format",
    }
  }
}

impl From<NormalizeError> for AnalysisError {
  fn from(e: NormalizeError) -> Self {
    match e {
      NormalizeError::NotFound(path) => AnalysisError::NotFound(path),
      e @ NormalizeError::Conversion { .. } => AnalysisError::Conversion(e.to_string()),
    }
  }
}

#[async_trait]
pub trait SkinAnalyzer: Send + Sync {
  async fn analyze(&self, image: &Path) -> Result<Value, AnalysisError>;
}
