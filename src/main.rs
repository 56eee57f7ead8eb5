// src/main.rs
//! Account session server entry point
use account_session::auth::{
    create_router, AppState, CloudinaryHost, MediaHost, MemoryMediaHost, MemoryUserStore,
    SessionManager, SqliteUserStore, UserStore,
};
use account_session::config::AppConfig;
use account_session::logging;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "account_session")]
#[command(about = "Account session server")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Args {
    /// TOML configuration file (defaults to $CONFIG_PATH, then built-in defaults)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the API server
    Serve {
        /// Port to bind, overriding the configuration
        #[arg(long)]
        port: Option<u16>,
    },
    /// Load and validate the configuration, then exit
    CheckConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    logging::init_logging()?;

    info!("Starting account session service v{}", env!("CARGO_PKG_VERSION"));

    let mut config =
        AppConfig::load(args.config.as_deref()).context("configuration is invalid")?;

    match args.command {
        Some(Commands::CheckConfig) => {
            info!("configuration ok: {:?}", config);
            return Ok(());
        }
        Some(Commands::Serve { port: Some(port) }) => config.port = port,
        Some(Commands::Serve { port: None }) | None => {}
    }

    serve(config).await
}

async fn serve(config: AppConfig) -> Result<()> {
    let store = open_store(&config).await?;
    let media = open_media_host(&config)?;

    let sessions = Arc::new(
        SessionManager::from_config(&config.auth, store, media)
            .context("failed to initialize session manager")?,
    );
    info!("media host: {}", sessions.media_host());

    let state = Arc::new(AppState::new(sessions, &config));
    let app = create_router(state);

    let addr = config.bind_address();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("Server listening on {}", addr);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn open_store(config: &AppConfig) -> Result<Arc<dyn UserStore>> {
    if config.uses_memory_store() {
        warn!("using in-memory user store; accounts are lost on restart");
        return Ok(Arc::new(MemoryUserStore::new()));
    }

    let store = SqliteUserStore::connect(&config.database_url)
        .await
        .context("failed to open user database")?;
    Ok(Arc::new(store))
}

fn open_media_host(config: &AppConfig) -> Result<Arc<dyn MediaHost>> {
    match CloudinaryHost::from_config(&config.media)? {
        Some(host) => Ok(Arc::new(host)),
        None => {
            warn!("Cloudinary is not configured; images are kept in memory only");
            Ok(Arc::new(MemoryMediaHost::new()))
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
