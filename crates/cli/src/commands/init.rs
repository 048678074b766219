use std::path::Path;

use compass_core::config::CompassConfig;
use compass_core::db::DatabasePool;
use tracing::info;

/// Run the `init` command: create the data directory, write a default config,
/// and set up the database.
pub async fn run(output: &str, data_dir: &str) -> anyhow::Result<()> {
    let config_path = Path::new(output);
    if config_path.exists() {
        anyhow::bail!(
            "{} already exists; remove it or pass --output",
            config_path.display()
        );
    }

    let data_path = Path::new(data_dir);
    if !data_path.exists() {
        std::fs::create_dir_all(data_path)?;
        info!("Created data directory: {}", data_dir);
    }

    let db_path = data_path.join("compass.db").to_string_lossy().to_string();
    let mut config = CompassConfig::generate_default();
    config.portal.data_dir = data_dir.to_string();
    config.portal.database.path = db_path.clone();

    let toml_str = toml::to_string_pretty(&config)?;
    std::fs::write(config_path, &toml_str)?;
    info!("Wrote configuration to {}", config_path.display());

    DatabasePool::new_sqlite(&db_path, config.portal.database.max_connections).await?;
    info!("Database initialized at {}", db_path);

    println!("Compass initialized successfully!");
    println!("  Configuration: {}", config_path.display());
    println!("  Database:      {}", db_path);
    println!();
    println!("Next steps:");
    println!("  1. Run `compass hash-password` and add a [bootstrap_admin] section");
    println!("  2. Set [odoo] enabled and webhook_token to accept CRM pushes");
    println!("  3. Run `compass serve`");

    Ok(())
}
