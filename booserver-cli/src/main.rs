//! BooServer CLI - command-line entry point.

use std::path::PathBuf;
use std::sync::Arc;

use booserver_core::{
    CliLogLevel, FfmpegConverter, MediaFileManager, ServerConfig, init_tracing,
};
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "booserver")]
#[command(about = "Media library server for the BooServer protocol")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, default_value = "booserver.toml")]
    config: PathBuf,

    /// Console log level
    #[arg(long, default_value = "info")]
    log_level: CliLogLevel,
}

#[derive(Subcommand)]
enum Commands {
    /// Index the configured sources and serve them over HTTP
    Serve {
        /// Host to bind to (overrides the configuration)
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to (overrides the configuration)
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Reconcile the metadata store with the filesystem and exit
    Scan,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.log_level.as_tracing_level(), None)?;

    let mut config = ServerConfig::load(&cli.config)?;
    let converter = Arc::new(FfmpegConverter::from_config(&config.ffmpeg));

    match cli.command {
        Commands::Serve { host, port } => {
            if let Some(host) = host {
                config.http.host = host;
            }
            if let Some(port) = port {
                config.http.port = port;
            }

            let manager = Arc::new(MediaFileManager::create(&config, converter.clone()).await?);

            tokio::select! {
                result = booserver_web::run_server(&config.http, manager.clone(), converter) => {
                    result?;
                }
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("shutting down");
                    manager.stop_watching().await;
                    manager.shutdown().await;
                }
            }
        }
        Commands::Scan => {
            let manager = MediaFileManager::create(&config, converter).await?;
            let records = manager.all_files().await?;
            println!("{} records in sync with the filesystem", records.len());
            manager.stop_watching().await;
            manager.shutdown().await;
        }
    }

    Ok(())
}
