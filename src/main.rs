use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use treesync::cli::{Cli, Command, ServeArgs, SyncArgs};
use treesync::config::{ConfigFile, StoreKind};
use treesync::gateway::{self, HttpEndpoint, LocalStore, ObjectStore, ResourceStore};
use treesync::SyncEngine;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.debug);

    let config = ConfigFile::load_or_default(cli.config.as_deref())
        .context("Failed to load configuration")?;

    match &cli.command {
        Command::Sync(args) => run_sync(config, args).await,
        Command::Serve(args) => run_serve(config, args).await,
    }
}

async fn run_sync(config: ConfigFile, args: &SyncArgs) -> Result<()> {
    let mut config = config.sync;
    args.apply(&mut config);
    config.validate()?;

    let source = HttpEndpoint::new(&config.source_url).context("Invalid source URL")?;
    let target = HttpEndpoint::new(&config.target_url).context("Invalid target URL")?;

    let engine = SyncEngine::new(Arc::new(source), Arc::new(target), config.options());
    // Individual failures are only logged; a finished run always succeeds.
    let report = engine.run().await;
    info!("synchro exiting: {}", report.summary());
    Ok(())
}

async fn run_serve(config: ConfigFile, args: &ServeArgs) -> Result<()> {
    let mut config = config.serve;
    args.apply(&mut config);
    config.validate()?;

    let store: Arc<dyn ResourceStore> = match config.store {
        StoreKind::Fs => {
            let root = config.root_dir.clone().context("Missing root directory")?;
            Arc::new(LocalStore::new(root))
        }
        StoreKind::S3 => {
            let bucket = config.bucket.as_deref().context("Missing bucket")?;
            let region = config.region.as_deref().unwrap_or("us-east-1");
            Arc::new(
                ObjectStore::new_s3(bucket, region, config.endpoint.as_deref())
                    .context("Failed to configure object storage")?,
            )
        }
    };

    gateway::serve(&config.addr, store).await
}

fn init_logging(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
