use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde_json::Value;
use tracing::{error, info};

use super::format::format_json;
use super::{AnalysisError, SkinAnalyzer};
use crate::config::AnalysisConfig;
use crate::image_processing::normalize_on_pool;

/// Sends images to the remote skin analysis API.
///
/// One call runs normalize, upload, parse and cleanup in sequence. Any
/// failure ends the call with a tagged [`AnalysisError`].
pub struct Orchestrator {
  config: Arc<AnalysisConfig>,
  client: reqwest::Client,
}

impl Orchestrator {
  pub fn new(config: Arc<AnalysisConfig>) -> Result<Self> {
    let client = reqwest::Client::builder()
      .build()
      .context("failed to create HTTP client")?;

    Ok(Self::with_client(config, client))
  }

  pub fn with_client(config: Arc<AnalysisConfig>, client: reqwest::Client) -> Self {
    Self { config, client }
  }

  /// Analyzes `image`, or the configured default image, and returns the
  /// `result` document formatted per the output settings.
  pub async fn analyze(&self, image: Option<&Path>) -> Result<String, AnalysisError> {
    let result = self.fetch(image).await?;
    format_json(&result, &self.config.output).map_err(|e| AnalysisError::Format(e.to_string()))
  }

  /// Same as [`Orchestrator::analyze`] but returns the raw `result` value.
  pub async fn fetch(&self, image: Option<&Path>) -> Result<Value, AnalysisError> {
    let res = self.run(image).await;

    let outcome = match &res {
      Ok(_) => "success",
      Err(e) => e.kind(),
    };
    metrics::counter!("skin_analysis_requests_total", "outcome" => outcome).increment(1);

    res
  }

  async fn run(&self, image: Option<&Path>) -> Result<Value, AnalysisError> {
    let source = image
      .map(Path::to_path_buf)
      .unwrap_or_else(|| self.config.default_image_path.clone());
    info!("analyzing image {}", source.display());

    // Dropping `normalized` removes the converted file on every return path
    let normalized = normalize_on_pool(source).await.map_err(|e| {
      error!("failed to normalize image: {}", e);
      AnalysisError::from(e)
    })?;

    let data = tokio::fs::read(normalized.path())
      .await
      .map_err(|source| AnalysisError::Io {
        path: normalized.path().to_path_buf(),
        source,
      })?;

    let upload = &self.config.upload;
    let part = Part::bytes(data)
      .file_name(upload.filename_placeholder.clone())
      .mime_str(&upload.content_type)
      .map_err(|e| {
        error!("invalid content type {}: {}", upload.content_type, e);
        AnalysisError::Transport(e.to_string())
      })?;
    let form = Form::new().part(upload.form_field_name.clone(), part);

    info!("sending analysis request to {}", self.config.api_url);
    let response = self
      .client
      .post(&self.config.api_url)
      .header(
        self.config.api_key_header_name.as_str(),
        self.config.api_key.as_str(),
      )
      .multipart(form)
      .timeout(self.config.request_timeout)
      .send()
      .await
      .map_err(|e| self.classify(e))?;

    let status = response.status();
    let body = response.text().await.map_err(|e| self.classify(e))?;

    if status.is_client_error() || status.is_server_error() {
      error!("analysis api returned {}: {}", status, body);
      return Err(AnalysisError::HttpStatus {
        status: status.as_u16(),
        body,
      });
    }

    let result = serde_json::from_str::<Value>(&body)
      .ok()
      .and_then(|mut v| v.get_mut("result").map(Value::take));

    match result {
      Some(result) => {
        info!("analysis completed with status {}", status);
        Ok(result)
      }
      None => {
        error!(
          "could not parse analysis response (status {}): {}",
          status, body
        );
        Err(AnalysisError::MalformedResponse {
          status: status.as_u16(),
          body,
        })
      }
    }
  }

  fn classify(&self, e: reqwest::Error) -> AnalysisError {
    if e.is_timeout() {
      error!(
        "analysis request timed out after {:?}",
        self.config.request_timeout
      );
      AnalysisError::Timeout(self.config.request_timeout)
    } else if e.is_connect() {
      error!("failed to connect to analysis api: {}", e);
      AnalysisError::Connection(e.to_string())
    } else {
      error!("analysis request failed: {}", e);
      AnalysisError::Transport(e.to_string())
    }
  }
}

#[async_trait]
impl SkinAnalyzer for Orchestrator {
  async fn analyze(&self, image: &Path) -> Result<Value, AnalysisError> {
    self.fetch(Some(image)).await
  }
}
