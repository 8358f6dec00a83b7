use axum::{
  extract::{multipart::MultipartRejection, Multipart, State},
  Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info};
use utoipa::ToSchema;

use crate::http::error::AppError;
use crate::http::AppState;
use crate::image_processing::allowed_extension;

pub const IMAGE_FIELD: &str = "image";
pub const NO_FILE_PART: &str = "没有文件部分";
pub const NO_FILE_SELECTED: &str = "没有选择文件";
pub const UNSUPPORTED_FILE_TYPE: &str = "不支持的文件类型";

#[derive(Serialize, Deserialize, Debug, Clone, ToSchema)]
pub struct AnalyzeResponse {
  pub success: bool,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub message: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  #[schema(value_type = Option<Object>)]
  pub results: Option<Value>,
}

impl AnalyzeResponse {
  pub fn success(results: Value) -> Self {
    Self {
      success: true,
      message: None,
      results: Some(results),
    }
  }

  pub fn failure(message: impl Into<String>) -> Self {
    Self {
      success: false,
      message: Some(message.into()),
      results: None,
    }
  }
}

#[derive(ToSchema)]
#[allow(dead_code)]
pub struct UploadForm {
  /// PNG, JPEG or WEBP face photo
  #[schema(value_type = String, format = Binary)]
  image: Vec<u8>,
}

#[utoipa::path(
  post,
  path = "/analyze",
  request_body(content = UploadForm, content_type = "multipart/form-data"),
  responses(
    (status = 200, description = "Analysis result", body = AnalyzeResponse),
    (status = 400, description = "Missing or unsupported upload", body = AnalyzeResponse),
    (status = 500, description = "Analysis failed", body = AnalyzeResponse)
  )
)]
pub async fn analyze(
  State(state): State<AppState>,
  multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<AnalyzeResponse>, AppError> {
  let mut multipart = multipart.map_err(|e| AppError::BadRequest(e.body_text()))?;
  let mut upload: Option<(String, axum::body::Bytes)> = None;

  while let Some(field) = multipart
    .next_field()
    .await
    .map_err(|e| AppError::BadRequest(e.to_string()))?
  {
    // Parts without a filename are plain form values, not files
    if field.name() != Some(IMAGE_FIELD) {
      continue;
    }
    let Some(file_name) = field.file_name().map(str::to_owned) else {
      continue;
    };

    let data = field
      .bytes()
      .await
      .map_err(|e| AppError::BadRequest(e.to_string()))?;
    upload = Some((file_name, data));
    break;
  }

  let (file_name, data) = upload.ok_or_else(|| AppError::BadRequest(NO_FILE_PART.to_owned()))?;

  if file_name.is_empty() {
    return Err(AppError::BadRequest(NO_FILE_SELECTED.to_owned()));
  }

  let extension = allowed_extension(&file_name)
    .ok_or_else(|| AppError::BadRequest(UNSUPPORTED_FILE_TYPE.to_owned()))?;

  let uploaded = state
    .storage_client
    .save(&data, &extension)
    .await
    .map_err(|e| AppError::InternalServerError(format!("{:#}", e)))?;
  info!(
    "stored upload {} as {}",
    file_name,
    uploaded.path.display()
  );

  let results = state
    .analyzer
    .analyze(&uploaded.path)
    .await
    .map_err(|e| {
      error!(
        "analysis of {} failed ({}): {}",
        uploaded.path.display(),
        e.kind(),
        e
      );
      AppError::InternalServerError(e.to_string())
    })?;

  Ok(Json(AnalyzeResponse::success(results)))
}
