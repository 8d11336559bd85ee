//! Interview Forge CLI
//!
//! Main entry point for serving the question generation API.

use std::net::SocketAddr;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use forge_pipeline::{create_router, AppState, Config, GeminiClient, JobService};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

/// Interview Forge - Leveled interview question generator
///
/// Serves an HTTP API that generates question/answer sets with a language
/// model and streams progress to the browser.
#[derive(Parser, Debug)]
#[command(name = "interview-forge")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file (default: forge.json in current directory)
    #[arg(short, long, value_name = "FILE")]
    config: Option<String>,

    /// Interface to bind (overrides server.host)
    #[arg(long)]
    host: Option<String>,

    /// Port for the HTTP API server (overrides server.port)
    #[arg(short, long)]
    port: Option<u16>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if args.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt().with_env_filter(filter).init();

    tracing::info!("Interview Forge starting");
    tracing::debug!(config = ?args.config, "Config file");

    match run_server(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::from(1)
        }
    }
}

/// Loads configuration, builds the job service and serves the API until
/// Ctrl+C.
async fn run_server(args: Args) -> anyhow::Result<()> {
    let mut config = load_config(args.config.as_deref())?;

    if let Some(ref host) = args.host {
        config.server.host.clone_from(host);
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    // Re-validate after overrides
    config.validate()?;

    print_config(&config);

    let api_key = std::env::var(&config.provider.api_key_env).map_err(|_| {
        anyhow::anyhow!(
            "Environment variable {} is not set\n\nSuggestion: Export your provider API key, or point provider.apiKeyEnv at the variable that holds it",
            config.provider.api_key_env
        )
    })?;
    let client = GeminiClient::new(&config.provider, api_key)
        .map_err(|e| anyhow::anyhow!("Failed to create generation client: {e}"))?;

    let service = JobService::start(Arc::new(client), &config);
    let router = create_router(AppState::new(service.clone()));

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .map_err(|e| {
            anyhow::anyhow!(
                "Invalid listen address {}:{}: {e}\n\nSuggestion: Use an IP address for server.host",
                config.server.host,
                config.server.port
            )
        })?;

    let listener = TcpListener::bind(addr).await.map_err(|e| {
        anyhow::anyhow!(
            "Failed to bind to {addr}: {e}\n\nSuggestion: Try a different port with --port"
        )
    })?;

    println!("HTTP API server running on http://{addr}");
    println!("Press Ctrl+C to stop");

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Received Ctrl+C, shutting down");
            }
        })
        .await?;

    service.shutdown();
    Ok(())
}

/// Loads configuration from the specified path or default location.
fn load_config(config_path: Option<&str>) -> anyhow::Result<Config> {
    match config_path {
        Some(path_str) => {
            let path = Path::new(path_str);
            if !path.exists() {
                anyhow::bail!(
                    "Config file not found: '{}'\n\nSuggestion: Check the path or remove the --config flag to use defaults",
                    path.display()
                );
            }
            Config::load_from_file(path).map_err(|e| anyhow::anyhow!("{e}"))
        }
        None => Config::load().map_err(|e| anyhow::anyhow!("{e}")),
    }
}

/// Prints the loaded configuration.
fn print_config(config: &Config) {
    println!("Configuration loaded:");
    println!("  Model: {}", config.provider.model);
    println!(
        "  Max attempts per item: {}",
        config.generation.max_attempts
    );
    println!("  Max items per job: {}", config.generation.max_items);
    println!("  Keep-alive: {}s", config.stream.keep_alive_seconds);
    match config.stream.job_ttl() {
        Some(ttl) => println!("  Idle job TTL: {}s", ttl.as_secs()),
        None => println!("  Idle job TTL: disabled"),
    }
}
