use anyhow::Context;
use kidsgames::api::{ApiServer, PKG_NAME, VERSION};
use kidsgames::client::GamesClient;
use kidsgames::config::Config;
use kidsgames::db::{default_catalog, Database, GameStore};
use kidsgames::portal::PortalSource;
use kidsgames::registry::GameRegistry;
use kidsgames::views::LocalSource;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("kidsgames=debug".parse().expect("valid log directive")),
        )
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("kidsgames.toml"));

    let mut config = Config::load_or_default(&config_path).map_err(|e| {
        error!(path = %config_path.display(), error = %e, "Failed to load configuration");
        e
    })?;
    config.apply_env(std::env::var("PORT").ok().as_deref())?;

    print_startup_banner(&config);

    // Open the catalog and seed it
    let db = Database::open(&config.database.path).with_context(|| {
        format!("Failed to open database at {}", config.database.path.display())
    })?;

    let mut catalog = default_catalog();
    catalog.extend(config.games.iter().cloned());
    let inserted = db.seed_if_empty(&catalog).context("Failed to seed catalog")?;
    info!(inserted, total = db.count_games()?, "Catalog ready");

    // Check every catalog entry has a game unit
    let registry = GameRegistry::with_builtin_games();
    info!(games = ?registry.keys().collect::<Vec<_>>(), "Registered game units");

    let records = db.list_games().context("Failed to read catalog")?;
    let unavailable = registry.check_catalog(&records, config.registry.strict)?;
    if !unavailable.is_empty() {
        warn!(count = unavailable.len(), "Starting with unavailable games");
    }

    let store: Arc<dyn GameStore> = Arc::new(db);

    let source = match &config.portal.api_base_url {
        Some(url) => {
            info!(api_base_url = %url, "Portal pages read from remote games API");
            PortalSource::Remote(GamesClient::new(url.as_str(), config.portal.request_timeout())?)
        }
        None => PortalSource::Local(LocalSource::new(Arc::clone(&store))),
    };

    // Create shutdown channel
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let bind_addr: SocketAddr = format!("{}:{}", config.server.bind, config.server.port)
        .parse()
        .map_err(|e| {
            error!(bind = %config.server.bind, port = config.server.port, error = %e, "Invalid bind address");
            anyhow::anyhow!("Invalid bind address: {}", e)
        })?;

    let server = Arc::new(
        ApiServer::new(bind_addr, store, Arc::new(registry), source, shutdown_rx)
            .with_assets_dir(config.portal.assets_dir.clone())
            .with_shutdown_grace(config.server.shutdown_grace()),
    );

    let mut server_handle = tokio::spawn(async move { server.run().await });

    tokio::select! {
        _ = shutdown_signal() => {}
        result = &mut server_handle => {
            return match result {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) => {
                    error!(error = %e, "API server error");
                    Err(e)
                }
                Err(e) => Err(anyhow::anyhow!("API server task failed: {}", e)),
            };
        }
    }

    // Signal shutdown
    let _ = shutdown_tx.send(true);

    // The server drains connections for up to the grace period itself
    let stop_timeout = config.server.shutdown_grace() + Duration::from_secs(1);
    if tokio::time::timeout(stop_timeout, server_handle).await.is_err() {
        warn!(timeout_secs = stop_timeout.as_secs(), "API server did not stop in time");
    }

    info!("Shutdown complete");
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate()).expect("Failed to install SIGTERM handler");

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Received SIGINT (Ctrl+C), shutting down...");
            }
            _ = sigterm.recv() => {
                info!("Received SIGTERM, shutting down...");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await.expect("Failed to listen for Ctrl+C");
        info!("Received Ctrl+C, shutting down...");
    }
}

fn print_startup_banner(config: &Config) {
    info!(name = PKG_NAME, version = VERSION, "Starting kids games portal");
    info!(
        bind = %config.server.bind,
        port = config.server.port,
        shutdown_grace_secs = config.server.shutdown_grace_secs,
        "Server configuration"
    );
    info!(
        database = %config.database.path.display(),
        assets_dir = %config.portal.assets_dir.display(),
        remote_api = ?config.portal.api_base_url,
        strict_registry = config.registry.strict,
        extra_games = config.games.len(),
        "Portal settings"
    );
}
