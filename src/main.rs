use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use skin_analysis::analysis::format::write_report;
use skin_analysis::analysis::remote::Orchestrator;
use skin_analysis::config;
use skin_analysis::http;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "skin-analysis", about = "Face photo skin analysis service")]
struct Cli {
  /// Path to the settings document
  #[arg(long, short, global = true, default_value = config::DEFAULT_CONFIG_FILE)]
  config: PathBuf,

  #[command(subcommand)]
  command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
  /// Run the HTTP service (default)
  Serve,
  /// Send one image to the remote analysis API and save the result
  Analyze {
    /// Image to analyze, defaults to `default_image.path`
    image: Option<PathBuf>,
    /// Where to write the formatted result
    #[arg(long, short)]
    output: Option<PathBuf>,
  },
}

#[tokio::main]
async fn main() -> Result<()> {
  // Initialize tracing
  tracing_subscriber::registry()
    .with(
      tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "skin_analysis=debug,tower_http=debug".into()),
    )
    .with(
      tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact(),
    )
    .init();

  let cli = Cli::parse();

  // Load config
  let cfg = config::load_or_exit(&cli.config);

  match cli.command.unwrap_or(Commands::Serve) {
    Commands::Serve => {
      let router = http::bootstrap(&cfg)?;

      tokio::try_join!(
        http::serve(router, &cfg.app.listen),
        http::serve_metrics(&cfg.app.metrics_listen),
      )?;
    }
    Commands::Analyze { image, output } => {
      let orchestrator = Orchestrator::new(Arc::new(cfg.analysis))?;

      match orchestrator.analyze(image.as_deref()).await {
        Ok(text) => {
          let output = output.unwrap_or_else(|| config::default_report_path(&cli.config));
          write_report(&text, &output).await?;
          info!("analysis result saved to {}", output.display());
          println!("{}", text);
        }
        Err(e) => {
          error!("skin analysis failed ({}): {}", e.kind(), e);
          std::process::exit(2);
        }
      }
    }
  }

  Ok(())
}
