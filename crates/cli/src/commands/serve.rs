use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use compass_core::auth::{ensure_bootstrap_admin, purge_expired_sessions};
use compass_core::config::CompassConfig;
use compass_core::db::sqlite::SqliteRepository;
use compass_core::db::DatabasePool;
use compass_portal::AppState;
use tokio::net::TcpListener;
use tracing::{info, warn};

const SESSION_PURGE_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Run the `serve` command: start the portal web server.
pub async fn run(config_path: &str, port: u16) -> anyhow::Result<()> {
    let mut config = CompassConfig::load(Path::new(config_path))?;
    config.apply_env_overrides();
    config.validate()?;
    info!("Loaded configuration from {}", config_path);

    let database = &config.portal.database;
    let pool = DatabasePool::new_sqlite(&database.path, database.max_connections).await?;
    let repo = SqliteRepository::new(pool.into_sqlite());

    if let Some(ref admin) = config.bootstrap_admin {
        ensure_bootstrap_admin(&repo, admin).await?;
    }
    if !config.odoo.enabled {
        info!("Odoo webhook disabled");
    }

    spawn_session_purge(repo.clone());

    let state = Arc::new(AppState { repo, config });
    let app = compass_portal::router(state);

    let addr = format!("0.0.0.0:{}", port);
    let listener = TcpListener::bind(&addr).await?;

    println!("Compass portal listening on http://{}", addr);
    info!("Starting server on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shut down gracefully");
    Ok(())
}

fn spawn_session_purge(repo: SqliteRepository) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(SESSION_PURGE_INTERVAL);
        loop {
            ticker.tick().await;
            if let Err(e) = purge_expired_sessions(&repo).await {
                warn!(error = %e, "session purge failed");
            }
        }
    });
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("failed to install CTRL+C handler");
    info!("Received shutdown signal");
}
