// src/main.rs

mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use cli::Cli;
use riddler::docker::{DaemonClient, DaemonSource, InspectFiles};
use riddler::spec::{CONFIG_FILE, RUNTIME_FILE};
use riddler::{ConvertOptions, convert};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // -d wins over RUST_LOG
    let filter = if cli.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let source: Box<dyn DaemonSource> = match &cli.inspect_file {
        Some(path) => {
            debug!("Reading container from {}", path.display());
            Box::new(InspectFiles::new(path, cli.info_file.clone()))
        }
        None => Box::new(DaemonClient::from_host(&cli.host)?),
    };

    let options = ConvertOptions {
        rootfs: cli.rootfs.clone(),
        bundle: Some(cli.bundle.clone()),
    };

    info!("Converting container {}", cli.container);
    let bundle = convert(source.as_ref(), &cli.container, &cli.hooks, &options)
        .with_context(|| format!("Failed to convert container {}", cli.container))?;

    bundle
        .write(&cli.bundle, cli.force)
        .with_context(|| format!("Failed to write bundle to {}", cli.bundle.display()))?;

    println!("{} and {} have been saved.", CONFIG_FILE, RUNTIME_FILE);
    Ok(())
}
