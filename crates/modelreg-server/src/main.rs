//! Modelreg Server - model registry and allow-listed search over HTTP.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use modelreg_core::config::ServerConfig;
use modelreg_core::search::AllowList;
use modelreg_core::storage::{
    database_path_from_url, run_migrations, ConnectionPool, PoolOptions,
};
use modelreg_server::auth::mint_token;
use modelreg_server::{start_server, AppState};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "modelreg-server")]
#[command(about = "Model registry and allow-listed search server")]
struct Args {
    /// SQLite database path (`sqlite://` prefix accepted)
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// Address to bind to
    #[arg(long, env = "SERVER_ADDRESS", default_value = ServerConfig::DEFAULT_ADDRESS)]
    address: String,

    /// Secret for admin bearer tokens
    #[arg(long, env = "JWT_SECRET", hide_env_values = true)]
    jwt_secret: Option<String>,

    /// JSON allow-list file (defaults to the built-in catalog)
    #[arg(long, env = "ALLOW_LIST_PATH")]
    allow_list: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Mint an admin bearer token and print it
    Token {
        /// Signing secret
        #[arg(long, env = "JWT_SECRET", hide_env_values = true)]
        secret: String,

        /// Token subject
        #[arg(long, default_value = ServerConfig::TOKEN_SUBJECT)]
        subject: String,

        /// Hours until the token expires
        #[arg(long, default_value_t = ServerConfig::TOKEN_TTL_HOURS)]
        ttl_hours: i64,
    },
}

fn init_logging(debug: bool, json: bool) {
    let default_level = if debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false);
    if json {
        builder.json().init();
    } else {
        builder.compact().init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is fine; the environment may already be set.
    let _ = dotenvy::dotenv();
    let args = Args::parse();

    if let Some(Command::Token {
        secret,
        subject,
        ttl_hours,
    }) = args.command
    {
        let token = mint_token(&secret, &subject, ttl_hours).context("failed to sign token")?;
        // Intentional stdout so the token can be captured by scripts
        println!("{}", token);
        return Ok(());
    }

    init_logging(args.debug, args.log_json);
    info!("Starting Modelreg Server");

    let database_url = args
        .database_url
        .context("DATABASE_URL must be set (or pass --database-url)")?;
    let db_path = database_path_from_url(&database_url)?;
    info!("Database: {}", db_path.display());

    let allow_list = match &args.allow_list {
        Some(path) => {
            info!("Loading allow-list from {}", path.display());
            AllowList::from_json_file(path)?
        }
        None => AllowList::default_catalog(),
    };
    info!("Allow-list covers {} models", allow_list.len());

    let pool = ConnectionPool::open(db_path, PoolOptions::default())?;
    pool.ping().await.context("database is unreachable")?;
    let status = run_migrations(&pool).await?;
    info!("Schema at version {}", status.version);

    if args.jwt_secret.as_deref().map_or(true, str::is_empty) {
        warn!("JWT_SECRET is not set; admin routes will refuse every request");
    }

    let state = Arc::new(AppState::new(pool, allow_list, args.jwt_secret));
    let addr = start_server(state, &args.address).await?;
    info!("Server running on {}", addr);

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received, exiting");

    Ok(())
}
