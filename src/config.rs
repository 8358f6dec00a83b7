use serde::Deserialize;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info};

pub const DEFAULT_CONFIG_FILE: &str = "config.toml";
pub const DEFAULT_REPORT_FILE: &str = "skin_analysis.json";

#[derive(Error, Debug)]
pub enum ConfigError {
  #[error("failed to read config file {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
  #[error("failed to parse config file {path}: {message}")]
  Parse { path: PathBuf, message: String },
  #[error("config file {0} is empty")]
  Empty(PathBuf),
  #[error("missing required config key '{0}'")]
  MissingKey(&'static str),
  #[error("invalid value for '{key}': {message}")]
  Invalid { key: &'static str, message: String },
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AnalyzerType {
  #[default]
  Mock,
  Remote,
}

#[derive(Debug, Clone)]
pub struct Config {
  pub app: AppConfig,
  pub analysis: AnalysisConfig,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
  pub listen: String,
  pub metrics_listen: String,
  pub upload_dir: PathBuf,
  pub static_dir: PathBuf,
  pub max_body_size_mb: usize,
  pub analyzer: AnalyzerType,
  pub mock_seed: Option<u64>,
  pub enable_openapi: bool,
}

/// Everything the orchestrator needs for one remote analysis call.
///
/// Built once at startup and never mutated afterwards.
#[derive(Debug, Clone)]
pub struct AnalysisConfig {
  pub api_url: String,
  pub api_key: String,
  pub api_key_header_name: String,
  pub request_timeout: Duration,
  pub default_image_path: PathBuf,
  pub upload: UploadDetails,
  pub output: OutputFormat,
}

#[derive(Debug, Clone)]
pub struct UploadDetails {
  pub form_field_name: String,
  pub filename_placeholder: String,
  pub content_type: String,
}

impl Default for UploadDetails {
  fn default() -> Self {
    Self {
      form_field_name: "image".to_owned(),
      filename_placeholder: "file".to_owned(),
      content_type: "application/octet-stream".to_owned(),
    }
  }
}

#[derive(Debug, Clone)]
pub struct OutputFormat {
  pub json_indent: usize,
  pub ensure_ascii: bool,
}

impl Default for OutputFormat {
  fn default() -> Self {
    Self {
      json_indent: 4,
      ensure_ascii: false,
    }
  }
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct RawConfig {
  app: RawAppConfig,
  api_settings: RawApiSettings,
  default_image: RawDefaultImage,
  file_upload_details: RawUploadDetails,
  general_settings: RawGeneralSettings,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct RawAppConfig {
  listen: Option<String>,
  metrics_listen: Option<String>,
  upload_dir: Option<String>,
  static_dir: Option<String>,
  max_body_size_mb: Option<usize>,
  analyzer: Option<AnalyzerType>,
  mock_seed: Option<u64>,
  enable_openapi: Option<bool>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct RawApiSettings {
  url: Option<String>,
  key: Option<String>,
  api_key_header_name: Option<String>,
  request_timeout_seconds: Option<f64>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct RawDefaultImage {
  path: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct RawUploadDetails {
  form_field_name: Option<String>,
  sent_filename_placeholder: Option<String>,
  content_type: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct RawGeneralSettings {
  default_encoding: Option<String>,
  json_indent: Option<usize>,
  json_ensure_ascii: Option<bool>,
}

impl RawConfig {
  fn validate(self, config_dir: &Path) -> Result<Config, ConfigError> {
    let api_url = required(self.api_settings.url, "api_settings.url")?;
    let api_key = required(self.api_settings.key, "api_settings.key")?;
    let default_image = required(self.default_image.path, "default_image.path")?;

    let timeout_secs = self.api_settings.request_timeout_seconds.unwrap_or(30.0);
    if !timeout_secs.is_finite() || timeout_secs <= 0.0 {
      return Err(ConfigError::Invalid {
        key: "api_settings.request_timeout_seconds",
        message: format!("expected a positive number of seconds, got {}", timeout_secs),
      });
    }

    let encoding = self
      .general_settings
      .default_encoding
      .unwrap_or_else(|| "utf-8".to_owned());
    if !matches!(encoding.to_ascii_lowercase().as_str(), "utf-8" | "utf8") {
      return Err(ConfigError::Invalid {
        key: "general_settings.default_encoding",
        message: format!("only utf-8 output is supported, got {}", encoding),
      });
    }

    let upload_defaults = UploadDetails::default();
    let output_defaults = OutputFormat::default();

    let analysis = AnalysisConfig {
      api_url,
      api_key,
      api_key_header_name: self
        .api_settings
        .api_key_header_name
        .unwrap_or_else(|| "ailabapi-api-key".to_owned()),
      request_timeout: Duration::from_secs_f64(timeout_secs),
      default_image_path: resolve_path(config_dir, &default_image),
      upload: UploadDetails {
        form_field_name: self
          .file_upload_details
          .form_field_name
          .unwrap_or(upload_defaults.form_field_name),
        filename_placeholder: self
          .file_upload_details
          .sent_filename_placeholder
          .unwrap_or(upload_defaults.filename_placeholder),
        content_type: self
          .file_upload_details
          .content_type
          .unwrap_or(upload_defaults.content_type),
      },
      output: OutputFormat {
        json_indent: self
          .general_settings
          .json_indent
          .unwrap_or(output_defaults.json_indent),
        ensure_ascii: self
          .general_settings
          .json_ensure_ascii
          .unwrap_or(output_defaults.ensure_ascii),
      },
    };

    let app = AppConfig {
      listen: self.app.listen.unwrap_or_else(|| "0.0.0.0:5000".to_owned()),
      metrics_listen: self
        .app
        .metrics_listen
        .unwrap_or_else(|| "0.0.0.0:5001".to_owned()),
      upload_dir: resolve_path(config_dir, self.app.upload_dir.as_deref().unwrap_or("image")),
      static_dir: resolve_path(
        config_dir,
        self.app.static_dir.as_deref().unwrap_or("frontend"),
      ),
      max_body_size_mb: self.app.max_body_size_mb.unwrap_or(16),
      analyzer: self.app.analyzer.unwrap_or_default(),
      mock_seed: self.app.mock_seed,
      enable_openapi: self.app.enable_openapi.unwrap_or(false),
    };

    Ok(Config { app, analysis })
  }
}

fn required(value: Option<String>, key: &'static str) -> Result<String, ConfigError> {
  match value {
    Some(v) if !v.trim().is_empty() => Ok(v),
    _ => Err(ConfigError::MissingKey(key)),
  }
}

/// Directory holding the settings document, made absolute so relative paths
/// inside it never depend on the working directory.
fn config_dir(config_path: &Path) -> PathBuf {
  let absolute = std::path::absolute(config_path).unwrap_or_else(|_| config_path.to_path_buf());
  absolute
    .parent()
    .map(Path::to_path_buf)
    .unwrap_or_default()
}

/// Where the `analyze` command writes its result when no output is given.
pub fn default_report_path(config_path: &Path) -> PathBuf {
  config_dir(config_path).join(DEFAULT_REPORT_FILE)
}

pub fn resolve_path(base_dir: &Path, raw: &str) -> PathBuf {
  let raw = Path::new(raw);
  if raw.is_absolute() {
    normalize_path(raw)
  } else {
    normalize_path(&base_dir.join(raw))
  }
}

/// Lexically removes `.` segments and collapses `..` where a parent exists.
/// The filesystem is not consulted, so symlinks are not resolved.
pub fn normalize_path(path: &Path) -> PathBuf {
  let mut out = PathBuf::new();

  for component in path.components() {
    match component {
      Component::CurDir => {}
      Component::ParentDir => match out.components().next_back() {
        Some(Component::Normal(_)) => {
          out.pop();
        }
        Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
        _ => out.push(".."),
      },
      other => out.push(other.as_os_str()),
    }
  }

  if out.as_os_str().is_empty() {
    out.push(".");
  }

  out
}

pub fn parse(config_path: impl AsRef<Path>) -> Result<Config, ConfigError> {
  let config_path = config_path.as_ref();

  let toml_str = fs::read_to_string(config_path).map_err(|source| ConfigError::Read {
    path: config_path.to_path_buf(),
    source,
  })?;

  let table: toml::Table = toml::from_str(&toml_str).map_err(|e| ConfigError::Parse {
    path: config_path.to_path_buf(),
    message: e.to_string(),
  })?;

  // Blank files and files holding only comments parse to an empty table
  if table.is_empty() {
    return Err(ConfigError::Empty(config_path.to_path_buf()));
  }

  let raw: RawConfig = toml::Value::Table(table)
    .try_into()
    .map_err(|e: toml::de::Error| ConfigError::Parse {
      path: config_path.to_path_buf(),
      message: e.to_string(),
    })?;

  raw.validate(&config_dir(config_path))
}

/// Loads the settings document or terminates the process with status 1.
pub fn load_or_exit(config_path: impl AsRef<Path>) -> Config {
  let config_path = config_path.as_ref();
  info!("loading config from {}", config_path.display());

  match parse(config_path) {
    Ok(cfg) => cfg,
    Err(e) => {
      error!("{}", e);
      std::process::exit(1);
    }
  }
}
