//! tfmod RPC Server - JSON-RPC front end for the module index.
//!
//! Wraps `tfmod-core` behind a JSON-RPC 2.0 endpoint. Results are returned
//! as JSON records; rendering them is left to the caller.

mod handlers;
mod server;

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tfmod_core::config::AppConfig;
use tfmod_core::TfmodApi;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "tfmod-rpc")]
#[command(about = "JSON-RPC server for the Terraform module index")]
struct Args {
    /// SQLite index file
    #[arg(long, env = "TFMOD_DB", default_value = AppConfig::DEFAULT_DB_FILE)]
    db: PathBuf,

    /// GitHub organization to crawl
    #[arg(long, env = "TFMOD_ORG", default_value = AppConfig::DEFAULT_ORGANIZATION)]
    org: String,

    /// GitHub token (raises the rate limit)
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Concurrent repository workers per sync pass
    #[arg(long)]
    workers: Option<usize>,

    /// GitHub API base URL
    #[arg(long, env = "TFMOD_API_BASE")]
    api_base: Option<String>,

    /// Port to listen on (0 = auto-assign)
    #[arg(short, long, default_value = "0")]
    port: u16,

    /// Host to bind to
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,
}

fn init_logging(args: &Args) {
    let fallback = if args.debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);
    if args.log_json {
        builder.json().init();
    } else {
        builder.compact().init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args);

    info!("Starting {} RPC server", AppConfig::APP_NAME);

    let mut builder = TfmodApi::builder(&args.db)
        .org(args.org.clone())
        .token(args.token.clone());
    if let Some(workers) = args.workers {
        builder = builder.worker_count(workers);
    }
    if let Some(api_base) = &args.api_base {
        builder = builder.api_base(api_base.clone());
    }
    let api = builder.build()?;

    info!("Index: {} (organization {})", api.db_path().display(), api.org());

    let addr = server::start_server(api, &args.host, args.port).await?;

    // Read by launchers and tests to find the bound port
    println!("RPC_PORT={}", addr.port());

    info!("RPC server running on {}", addr);

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received, exiting");

    Ok(())
}
