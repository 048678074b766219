use clap::Parser;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "compass", about = "Education consulting student portal", version)]
struct Cli {
    /// Path to configuration file
    #[arg(long, default_value = "compass.toml")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Write a default configuration and create the database
    Init {
        /// Where to write the configuration file
        #[arg(long, default_value = "compass.toml")]
        output: String,
        /// Data directory path
        #[arg(long, default_value = "/var/lib/compass")]
        data_dir: String,
    },
    /// Start the portal web server
    Serve {
        /// Port to listen on
        #[arg(long, default_value = "8080")]
        port: u16,
    },
    /// Hash a password read from stdin for the bootstrap admin
    HashPassword,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init { output, data_dir } => {
            commands::init::run(&output, &data_dir).await?;
        }
        Commands::Serve { port } => {
            commands::serve::run(&cli.config, port).await?;
        }
        Commands::HashPassword => {
            commands::hash_password::run()?;
        }
    }

    Ok(())
}
