//! Streetcache: entry point.

use std::sync::Arc;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

use streetcache::{
    DiskStore, ImageRequest, Location, Pipeline, PipelineConfig, ProviderConfig, StreetViewClient,
    DEFAULT_ANGLE_TOLERANCE,
};
use streetcache_cli::config::{resolve_api_key, resolve_store_dir};
use streetcache_cli::prefetch::prefetch;
use streetcache_cli::transport::StdioTransport;

const DEFAULT_OUTPUT_QUALITY: u8 = 90;

#[derive(Parser)]
#[command(
    name = "streetcache",
    about = "Street-level panorama prefetching with a distance-pruned proximity cache",
    version
)]
struct Cli {
    /// Street View API key. Also reads STREETVIEW_API_KEY.
    #[arg(long, global = true)]
    api_key: Option<String>,

    /// Directory of persisted panoramas. Also reads STREETCACHE_DIR.
    #[arg(long, global = true)]
    store: Option<String>,

    /// Width of the heading window fetched around each request, in degrees.
    #[arg(long, global = true, default_value_t = DEFAULT_ANGLE_TOLERANCE)]
    tolerance: i32,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Read request/position lines from stdin, write image lines to stdout (default).
    Serve {
        /// JPEG quality of images written to stdout.
        #[arg(long, default_value_t = DEFAULT_OUTPUT_QUALITY)]
        quality: u8,
    },

    /// Fetch the heading window around one location into the store.
    Prefetch {
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,

        #[arg(long, allow_hyphen_values = true)]
        lng: f64,

        #[arg(long, default_value_t = 0)]
        angle: i32,
    },

    /// Generate shell completion scripts.
    Completions {
        /// Shell type (bash, zsh, fish, powershell, elvish).
        shell: Shell,
    },
}

fn spawn_pipeline(cli: &Cli) -> anyhow::Result<Pipeline> {
    let api_key = resolve_api_key(cli.api_key.as_deref())?;
    let store_dir = resolve_store_dir(cli.store.as_deref());
    tracing::info!("Panorama store: {}", store_dir.display());

    let client = Arc::new(StreetViewClient::new(ProviderConfig::new(api_key))?);
    let store = Arc::new(DiskStore::open(store_dir)?);
    let config = PipelineConfig {
        angle_tolerance: cli.tolerance,
    };
    Ok(Pipeline::spawn(config, client.clone(), client, store))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli
        .command
        .take()
        .unwrap_or(Commands::Serve {
            quality: DEFAULT_OUTPUT_QUALITY,
        }) {
        Commands::Serve { quality } => {
            let pipeline = spawn_pipeline(&cli)?;
            StdioTransport::new(pipeline)
                .with_jpeg_quality(quality)
                .run()
                .await?;
        }

        Commands::Prefetch { lat, lng, angle } => {
            let pipeline = spawn_pipeline(&cli)?;
            let report = prefetch(pipeline, ImageRequest::new(Location::new(lat, lng), angle)).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }

        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "streetcache", &mut std::io::stdout());
        }
    }

    Ok(())
}
