mod api;
mod app;
mod cache;
mod config;
mod credentials;
mod net;
mod store;
mod sync;

use clap::Parser;
use color_eyre::Result;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "minbar")]
#[command(about = "Headless client daemon for masjid digital-signage screens")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/minbar/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// API base URL, overriding the config file
  #[arg(long)]
  base_url: Option<String>,

  /// Clear the response cache and exit
  #[arg(long)]
  clear_cache: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  // Load configuration
  let mut config = config::Config::load(args.config.as_deref())?;

  // Override base URL if specified on the command line
  if let Some(base_url) = args.base_url {
    config.api.base_url = base_url;
  }

  // Log to a daily-rolling file under the data directory; a signage
  // device has no terminal worth writing to.
  let log_dir = config.data_dir()?.join("logs");
  let file_appender = tracing_appender::rolling::daily(log_dir, "minbar.log");
  let (writer, _guard) = tracing_appender::non_blocking(file_appender);
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .with_writer(writer)
    .with_ansi(false)
    .init();

  // Initialize and run the daemon
  let app = app::App::new(config)?;

  if args.clear_cache {
    app.clear_cache();
    return Ok(());
  }

  app.run().await?;

  Ok(())
}
