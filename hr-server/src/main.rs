//! hr-server - HonestReviews REST API
//!
//! `serve` (the default) runs the HTTP API; `backfill` recomputes every
//! denormalized review and membership counter and exits.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use hr_common::config::default_config_dir;
use hr_common::db::{init_database, recompute_aggregates};
use hr_server::config::{ConfigOverrides, FileConfig, ServerConfig};
use hr_server::{build_router, AppState};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for hr-server
#[derive(Parser, Debug)]
#[command(name = "hr-server")]
#[command(about = "HonestReviews REST API server")]
#[command(version)]
struct Args {
    /// Address to bind
    #[arg(long, env = "APP_HOST")]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long, env = "APP_PORT")]
    port: Option<u16>,

    /// SQLite database path (or sqlite:// URL)
    #[arg(long, env = "DATABASE_URL")]
    database: Option<String>,

    /// TOML config file
    #[arg(long, env = "HR_CONFIG")]
    config: Option<PathBuf>,

    /// Secret for signing access tokens
    #[arg(long, env = "APP_JWT_SECRET", hide_env_values = true)]
    jwt_secret: Option<String>,

    /// Pepper for refresh-token and recovery-code hashes
    #[arg(long, env = "REFRESH_TOKEN_PEPPER", hide_env_values = true)]
    refresh_pepper: Option<String>,

    /// Access token lifetime in minutes
    #[arg(long, env = "ACCESS_TOKEN_EXPIRES_MINUTES")]
    access_token_expires_minutes: Option<u64>,

    /// Refresh token lifetime in days
    #[arg(long, env = "REFRESH_TOKEN_EXPIRES_DAYS")]
    refresh_token_expires_days: Option<u64>,

    /// Recovery codes issued at registration
    #[arg(long, env = "RECOVERY_CODE_COUNT")]
    recovery_code_count: Option<usize>,

    /// Random bytes per recovery code
    #[arg(long, env = "RECOVERY_CODE_BYTES")]
    recovery_code_bytes: Option<usize>,

    /// Comma-separated CORS origins
    #[arg(long, env = "ALLOWED_ORIGINS")]
    allowed_origins: Option<String>,

    /// Built frontend to serve alongside the API
    #[arg(long, env = "FRONTEND_DIST")]
    frontend_dist: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    /// Run the HTTP API (default)
    Serve,
    /// Recompute review and membership counters, then exit
    Backfill,
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            host: self.host.clone(),
            port: self.port,
            database: self.database.clone(),
            jwt_secret: self.jwt_secret.clone(),
            refresh_pepper: self.refresh_pepper.clone(),
            access_token_expires_minutes: self.access_token_expires_minutes,
            refresh_token_expires_days: self.refresh_token_expires_days,
            recovery_code_count: self.recovery_code_count,
            recovery_code_bytes: self.recovery_code_bytes,
            allowed_origins: self.allowed_origins.clone(),
            frontend_dist: self.frontend_dist.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "hr_server=info,hr_common=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    info!("Starting HonestReviews server (hr-server) v{}", env!("CARGO_PKG_VERSION"));

    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| default_config_dir().join("server.toml"));
    let file = FileConfig::load(&config_path).context("Failed to load config file")?;
    let config = ServerConfig::resolve(args.overrides(), file).context("Invalid configuration")?;

    info!("Database path: {}", config.database_path.display());
    let pool = match init_database(&config.database_path).await {
        Ok(pool) => {
            info!("✓ Database ready");
            pool
        }
        Err(e) => {
            error!("Failed to open database: {}", e);
            return Err(e.into());
        }
    };

    if args.command == Some(Command::Backfill) {
        let report = recompute_aggregates(&pool).await?;
        info!(
            "✓ Backfill complete: {} personalities, {} organizations corrected",
            report.personalities_fixed, report.organizations_fixed
        );
        return Ok(());
    }

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .with_context(|| format!("Invalid listen address {}:{}", config.host, config.port))?;
    info!("Allowed origins: {}", config.http.allowed_origins.join(", "));
    info!(
        "✓ Access tokens valid for {} min, refresh tokens for {} days",
        config.auth.access_ttl.as_secs() / 60,
        config.auth.refresh_ttl.as_secs() / 86_400
    );

    let app = build_router(AppState::new(pool, config));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("hr-server listening on http://{}", addr);
    info!("Health check: http://{}/api/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
