use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::image_processing::UploadedImage;

/// Keeps received uploads on local disk. Files are never removed.
pub struct Client {
  path: PathBuf,
}

impl Client {
  pub fn new(path: PathBuf) -> Self {
    Self { path }
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  pub fn ensure_dir(&self) -> Result<()> {
    std::fs::create_dir_all(&self.path)
      .with_context(|| format!("failed to create upload directory: {}", self.path.display()))
  }

  pub async fn save(&self, data: &[u8], extension: &str) -> Result<UploadedImage> {
    let upload = UploadedImage::new(&self.path, extension);

    tokio::fs::create_dir_all(&self.path)
      .await
      .with_context(|| format!("failed to create directory: {}", self.path.display()))?;

    tokio::fs::write(&upload.path, data)
      .await
      .with_context(|| format!("failed to write file: {}", upload.path.display()))?;

    Ok(upload)
  }
}
