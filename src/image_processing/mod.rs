use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use uuid::Uuid;

mod normalize;

pub use normalize::{normalize, normalize_on_pool, NormalizeError};

pub const ALLOWED_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "webp"];

/// An upload persisted under the upload directory with a generated name.
#[derive(Debug, Clone)]
pub struct UploadedImage {
  pub id: Uuid,
  pub extension: String,
  pub path: PathBuf,
}

impl UploadedImage {
  pub fn new(upload_dir: &Path, extension: &str) -> Self {
    let id = Uuid::new_v4();
    let extension = extension.to_ascii_lowercase();
    let path = upload_dir.join(format!("{}.{}", id, extension));

    Self {
      id,
      extension,
      path,
    }
  }
}

/// A JPEG ready to be sent for analysis.
///
/// When the JPEG had to be produced from another format, the file is a
/// temporary sibling of the source and is removed when this value is dropped.
#[derive(Debug)]
pub struct NormalizedImage {
  source: PathBuf,
  path: PathBuf,
  temporary: bool,
}

impl NormalizedImage {
  pub(crate) fn original(source: PathBuf) -> Self {
    Self {
      path: source.clone(),
      source,
      temporary: false,
    }
  }

  pub(crate) fn converted(source: PathBuf, path: PathBuf) -> Self {
    Self {
      source,
      path,
      temporary: true,
    }
  }

  pub fn source(&self) -> &Path {
    &self.source
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  pub fn is_temporary(&self) -> bool {
    self.temporary
  }
}

impl Drop for NormalizedImage {
  fn drop(&mut self) {
    if !self.temporary {
      return;
    }

    match std::fs::remove_file(&self.path) {
      Ok(()) => debug!("removed temporary image {}", self.path.display()),
      Err(e) => warn!(
        "failed to remove temporary image {}: {}",
        self.path.display(),
        e
      ),
    }
  }
}

/// Lowercased extension of `filename` if it is one we accept.
pub fn allowed_extension(filename: &str) -> Option<String> {
  let (_, extension) = filename.rsplit_once('.')?;
  let extension = extension.to_ascii_lowercase();

  ALLOWED_EXTENSIONS
    .contains(&extension.as_str())
    .then_some(extension)
}

pub fn is_jpeg_path(path: &Path) -> bool {
  path
    .extension()
    .and_then(|e| e.to_str())
    .map(|e| e.eq_ignore_ascii_case("jpg") || e.eq_ignore_ascii_case("jpeg"))
    .unwrap_or(false)
}
