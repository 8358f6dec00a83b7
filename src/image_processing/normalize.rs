use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageReader};
use thiserror::Error;
use tracing::{debug, info};

use super::{is_jpeg_path, NormalizedImage};
use crate::image_modifier::{self, ImageModifier};

const JPEG_QUALITY: u8 = 90;

#[derive(Error, Debug)]
pub enum NormalizeError {
  #[error("image not found: {0}")]
  NotFound(PathBuf),
  #[error("failed to convert {path}: {reason}")]
  Conversion { path: PathBuf, reason: String },
}

impl NormalizeError {
  fn conversion(path: &Path, reason: impl ToString) -> Self {
    NormalizeError::Conversion {
      path: path.to_path_buf(),
      reason: reason.to_string(),
    }
  }
}

/// Turns the image at `path` into a JPEG next to it.
///
/// JPEG input is returned as is. Anything else is decoded, flattened onto
/// white if it carries transparency and written to `<stem>.jpg`.
pub fn normalize(path: &Path) -> Result<NormalizedImage, NormalizeError> {
  if !path.exists() {
    return Err(NormalizeError::NotFound(path.to_path_buf()));
  }

  if is_jpeg_path(path) {
    debug!("{} is already a jpeg", path.display());
    return Ok(NormalizedImage::original(path.to_path_buf()));
  }

  let reader = ImageReader::open(path)
    .map_err(|e| match e.kind() {
      std::io::ErrorKind::NotFound => NormalizeError::NotFound(path.to_path_buf()),
      _ => NormalizeError::conversion(path, e),
    })?
    .with_guessed_format()
    .map_err(|e| NormalizeError::conversion(path, e))?;

  let mut output_image: DynamicImage = reader
    .decode()
    .map_err(|e| NormalizeError::conversion(path, e))?;

  let modifiers: Vec<Box<dyn ImageModifier>> =
    vec![Box::new(image_modifier::flatten::FlattenModifier::white())];

  for modifier in modifiers {
    if let Some(m) = modifier
      .apply(&output_image)
      .map_err(|e| NormalizeError::conversion(path, e))?
    {
      output_image = m;
    }
  }

  let output_path = path.with_extension("jpg");
  let file = File::create(&output_path).map_err(|e| NormalizeError::conversion(path, e))?;

  // From here on the guard owns the output file and cleans it up on failure
  let normalized = NormalizedImage::converted(path.to_path_buf(), output_path);

  output_image
    .write_with_encoder(JpegEncoder::new_with_quality(
      BufWriter::new(file),
      JPEG_QUALITY,
    ))
    .map_err(|e| NormalizeError::conversion(path, e))?;

  info!(
    "converted {} to {}",
    path.display(),
    normalized.path().display()
  );

  Ok(normalized)
}

/// Runs [`normalize`] on the rayon pool so decoding never blocks the runtime.
pub async fn normalize_on_pool(path: PathBuf) -> Result<NormalizedImage, NormalizeError> {
  let (send, recv) = tokio::sync::oneshot::channel();

  let source = path.clone();
  rayon::spawn(move || {
    let _ = send.send(normalize(&path));
  });

  recv
    .await
    .map_err(|e| NormalizeError::conversion(&source, format!("normalizer dropped: {}", e)))?
}
