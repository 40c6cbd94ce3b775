//! CLI entry point for RailVision.
//!
//! Provides subcommands for running the polling HTTP service, ingesting a
//! single stop, printing a live departure board, and querying delay analytics.

mod server;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use railvision::analytics::Analytics;
use railvision::config::Config;
use railvision::infra::tfnsw::TfnswClient;
use railvision::ingest::{IngestPipeline, live_departures};
use railvision::output::{append_records, to_json};
use railvision::poller::Poller;
use railvision::store::DepartureStore;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

use crate::server::AppState;

const DEFAULT_LOG_DIR: &str = "logs";
const DEFAULT_LOG_FILE: &str = "railvision.log";

#[derive(Parser)]
#[command(name = "railvision")]
#[command(about = "Tracks Sydney rail departures and their delays", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll the configured stops and serve the HTTP API
    Serve {
        /// Address to listen on (overrides BIND_ADDR)
        #[arg(short, long)]
        bind: Option<String>,

        /// Seconds between poll rounds (overrides POLL_INTERVAL_SECS)
        #[arg(short, long)]
        interval: Option<u64>,

        /// Serve the API without the background poller
        #[arg(long, default_value_t = false)]
        no_poll: bool,
    },
    /// Run a single ingestion cycle for a stop
    Ingest {
        /// Upstream stop id, e.g. 200060 for Central
        #[arg(value_name = "STOP_ID")]
        stop_id: String,
    },
    /// Print the live departure board for a stop, without storing it
    Live {
        #[arg(value_name = "STOP_ID")]
        stop_id: String,
    },
    /// Print a delay analytics view from the stored history
    Analytics {
        #[arg(value_enum)]
        view: View,

        /// Only count departures observed at this stop
        #[arg(long)]
        stop_id: Option<String>,

        /// CSV file to append results to instead of printing JSON
        #[arg(long)]
        csv: Option<String>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum View {
    ByLine,
    WorstLines,
    ByHour,
}

/// Colored stderr at `RUST_LOG` (default info) plus a daily-rolled JSON file
/// at `RUST_LOG_JSON` (default debug). Keep the guard alive to flush the file.
fn init_tracing() -> Result<WorkerGuard> {
    let log_path = std::env::var("LOG_FILE_PATH").unwrap_or_default();
    let (log_dir, log_file) = log_file_location(&log_path);

    let (file_writer, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::daily(log_dir, log_file));

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(file_writer)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    Ok(guard)
}

/// Splits `LOG_FILE_PATH` into the rolling appender's directory and file
/// prefix. A bare file name logs to the working directory.
fn log_file_location(path: &str) -> (PathBuf, OsString) {
    let path = Path::new(path);
    let Some(file_name) = path.file_name() else {
        return (PathBuf::from(DEFAULT_LOG_DIR), OsString::from(DEFAULT_LOG_FILE));
    };
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    };
    (dir, file_name.to_os_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let _log_guard = init_tracing()?;

    let cli = Cli::parse();
    let mut config = Config::from_env()?;

    match cli.command {
        Commands::Serve {
            bind,
            interval,
            no_poll,
        } => {
            if let Some(bind) = bind {
                config.bind_addr = bind;
            }
            if let Some(secs) = interval.filter(|s| *s > 0) {
                config.poll_interval = Duration::from_secs(secs);
            }
            serve(&config, no_poll).await?;
        }
        Commands::Ingest { stop_id } => {
            let store = open_store(&config).await?;
            let pipeline = build_pipeline(&config, store.clone())?;
            let inserted = pipeline.ingest(&stop_id).await?;
            info!(stop_id = %stop_id, inserted, total = store.count().await?, "Ingestion finished");
            store.close().await;
        }
        Commands::Live { stop_id } => {
            let client = tfnsw_client(&config)?;
            let departures = live_departures(&client, &stop_id).await?;
            println!("{}", to_json(&departures)?);
        }
        Commands::Analytics { view, stop_id, csv } => {
            let store = open_store(&config).await?;
            let analytics = Analytics::new(store.clone());
            let stop_id = stop_id.as_deref();

            match view {
                View::ByLine => emit(&analytics.by_line(stop_id).await?, csv.as_deref())?,
                View::WorstLines => emit(&analytics.worst_lines(stop_id).await?, csv.as_deref())?,
                View::ByHour => emit(&analytics.by_hour(stop_id).await?, csv.as_deref())?,
            }
            store.close().await;
        }
    }

    Ok(())
}

/// Starts the poller (unless disabled) and serves HTTP until Ctrl+C.
#[tracing::instrument(skip(config), fields(bind = %config.bind_addr))]
async fn serve(config: &Config, no_poll: bool) -> Result<()> {
    let store = open_store(config).await?;
    let pipeline = build_pipeline(config, store.clone())?;
    let analytics = Arc::new(Analytics::new(store.clone()));

    let poller = if no_poll || config.poll_stops.is_empty() {
        info!("Background polling disabled");
        None
    } else {
        Some(
            Poller::new(
                pipeline.clone(),
                config.poll_stops.clone(),
                config.poll_interval,
            )
            .spawn(),
        )
    };

    server::serve(&config.bind_addr, AppState::new(pipeline, analytics)).await?;

    if let Some(handle) = poller {
        handle.abort();
    }
    store.close().await;
    info!("Shut down cleanly");
    Ok(())
}

async fn open_store(config: &Config) -> Result<DepartureStore> {
    if let Some(dir) = config.database_dir() {
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("creating database directory {}", dir.display()))?;
    }
    DepartureStore::connect(&config.database_url)
        .await
        .with_context(|| format!("opening database {}", config.database_url))
}

fn tfnsw_client(config: &Config) -> Result<TfnswClient> {
    Ok(TfnswClient::new(&config.base_url, config.require_api_key()?)?)
}

fn build_pipeline(config: &Config, store: DepartureStore) -> Result<Arc<IngestPipeline>> {
    let client = tfnsw_client(config)?;
    Ok(Arc::new(IngestPipeline::new(Arc::new(client), store)))
}

fn emit<T: serde::Serialize>(rows: &[T], csv: Option<&str>) -> Result<()> {
    match csv {
        Some(path) => {
            append_records(path, rows)?;
            info!(path, rows = rows.len(), "Analytics appended to CSV");
        }
        None => println!("{}", to_json(rows)?),
    }
    Ok(())
}
