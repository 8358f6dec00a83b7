use axum::{
  http::StatusCode,
  response::{IntoResponse, Response},
  Json,
};
use thiserror::Error;
use tracing::error;

use crate::http::analyze::AnalyzeResponse;

pub const ANALYSIS_FAILED: &str = "分析过程出错";

#[derive(Error, Debug)]
pub enum AppError {
  #[error("bad request {0}")]
  BadRequest(String),
  #[error("internal server error {0}")]
  InternalServerError(String),
}

impl IntoResponse for AppError {
  fn into_response(self) -> Response {
    match self {
      AppError::BadRequest(msg) => {
        (StatusCode::BAD_REQUEST, Json(AnalyzeResponse::failure(msg))).into_response()
      }
      AppError::InternalServerError(msg) => {
        // The detail stays in the logs
        error!("request failed: {}", msg);
        (
          StatusCode::INTERNAL_SERVER_ERROR,
          Json(AnalyzeResponse::failure(ANALYSIS_FAILED)),
        )
          .into_response()
      }
    }
  }
}
