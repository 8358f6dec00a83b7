use axum::{
  extract::{DefaultBodyLimit, MatchedPath, Request},
  middleware::{self, Next},
  response::IntoResponse,
  routing::{get, post},
  Router,
};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::future::ready;
use std::sync::Arc;
use tokio::signal;
use tokio::time::{Duration, Instant};
use tower_http::{
  catch_panic::CatchPanicLayer,
  services::ServeFile,
  timeout::TimeoutLayer,
  trace::{self, TraceLayer},
};
use tracing::{info, Level};
use utoipa::OpenApi;
use utoipa_redoc::{Redoc, Servable};

use crate::analysis::mock::{MockAnalyzer, SkinReport, SkinType};
use crate::analysis::remote::Orchestrator;
use crate::analysis::SkinAnalyzer;
use crate::config::{AnalyzerType, Config};
use anyhow::{Context, Result};

pub mod analyze;
mod error;
pub mod local_storage;

pub use analyze::AnalyzeResponse;

#[derive(OpenApi)]
#[openapi(
  paths(analyze::analyze),
  components(schemas(analyze::AnalyzeResponse, analyze::UploadForm, SkinReport, SkinType)),
  info(
    title = "Skin Analysis API",
    version = "0.1.0",
    description = "Accepts a face photo and returns a skin analysis report"
  )
)]
struct ApiDoc;

#[derive(Clone)]
pub struct AppState {
  storage_client: Arc<local_storage::Client>,
  analyzer: Arc<dyn SkinAnalyzer>,
}

pub fn bootstrap(cfg: &Config) -> Result<Router> {
  // Uploads land here and are never cleaned up
  let storage_client = Arc::new(local_storage::Client::new(cfg.app.upload_dir.clone()));
  storage_client.ensure_dir()?;

  let analyzer: Arc<dyn SkinAnalyzer> = match cfg.app.analyzer {
    AnalyzerType::Mock => Arc::new(MockAnalyzer::new(cfg.app.mock_seed)),
    AnalyzerType::Remote => Arc::new(Orchestrator::new(Arc::new(cfg.analysis.clone()))?),
  };
  info!(
    "using {:?} analyzer, uploads in {}",
    cfg.app.analyzer,
    storage_client.path().display()
  );

  let state = AppState {
    storage_client,
    analyzer,
  };

  // Routing
  let mut app = Router::new()
    .route("/analyze", post(analyze::analyze))
    .layer(DefaultBodyLimit::max(cfg.app.max_body_size_mb * 1000 * 1000))
    .route_service("/", ServeFile::new(cfg.app.static_dir.join("index.html")))
    .with_state(state);

  if cfg.app.enable_openapi {
    app = app.merge(Redoc::with_url("/redoc", ApiDoc::openapi())).route(
      "/api-docs/openapi.json",
      get(|| async { axum::Json(ApiDoc::openapi()) }),
    );
  }

  let app = app.layer((
    middleware::from_fn(track_metrics),
    TraceLayer::new_for_http()
      .make_span_with(trace::DefaultMakeSpan::new().level(Level::INFO))
      .on_response(trace::DefaultOnResponse::new().level(Level::INFO)),
    TimeoutLayer::new(Duration::from_secs(60)),
    CatchPanicLayer::new(),
  ));

  Ok(app)
}

pub async fn serve(router: Router, listen: &str) -> Result<()> {
  let listener = tokio::net::TcpListener::bind(listen)
    .await
    .with_context(|| format!("failed to bind to {}", listen))?;
  info!("listening on {}", listen);

  axum::serve(listener, router)
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("error running HTTP server")
}

async fn healthz() -> &'static str {
  "pong"
}

async fn shutdown_signal() {
  let ctrl_c = async {
    signal::ctrl_c()
      .await
      .expect("failed to install Ctrl+C handler");
  };

  #[cfg(unix)]
  let terminate = async {
    signal::unix::signal(signal::unix::SignalKind::terminate())
      .expect("failed to install signal handler")
      .recv()
      .await;
  };

  #[cfg(not(unix))]
  let terminate = std::future::pending::<()>();

  tokio::select! {
      _ = ctrl_c => {},
      _ = terminate => {},
  }
}

pub async fn serve_metrics(listen: &str) -> Result<()> {
  let app = metrics_app()?;

  let listener = tokio::net::TcpListener::bind(listen)
    .await
    .with_context(|| format!("failed to bind metrics listener to {}", listen))?;

  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("error running metrics HTTP server")
}

fn metrics_app() -> Result<Router> {
  let recorder_handle = setup_metrics_recorder()?;
  Ok(
    Router::new()
      .route("/metrics", get(move || ready(recorder_handle.render())))
      .route("/healthz", get(healthz)),
  )
}

fn setup_metrics_recorder() -> Result<PrometheusHandle> {
  const EXPONENTIAL_SECONDS: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0,
  ];

  let handle = PrometheusBuilder::new()
    .set_buckets_for_metric(
      Matcher::Full("http_requests_duration_seconds".to_string()),
      EXPONENTIAL_SECONDS,
    )
    .context("invalid histogram buckets")?
    .install_recorder()
    .context("failed to install metrics recorder")?;

  Ok(handle)
}

async fn track_metrics(req: Request, next: Next) -> impl IntoResponse {
  let start = Instant::now();
  let path = if let Some(matched_path) = req.extensions().get::<MatchedPath>() {
    matched_path.as_str().to_owned()
  } else {
    req.uri().path().to_owned()
  };
  let method = req.method().clone();

  let response = next.run(req).await;

  let latency = start.elapsed().as_secs_f64();
  let status = response.status().as_u16().to_string();

  let labels = [
    ("method", method.to_string()),
    ("path", path),
    ("status", status),
  ];

  metrics::counter!("http_requests_total", &labels).increment(1);
  metrics::histogram!("http_requests_duration_seconds", &labels).record(latency);

  response
}
