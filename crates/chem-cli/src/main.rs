mod cli;
mod commands;

use std::sync::Arc;

use chem_core::InMemoryRunStore;
use chem_persistence::{build_pool_from_env, PgRunRepository, PoolProvider};
use chemflow_discovery::{DiscoveryService, CONFIG};
use clap::Parser;
use log::warn;
use tracing_subscriber::EnvFilter;

use crate::cli::Cli;
use crate::commands::{dispatch, CommandFailure};

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    tracing_subscriber::fmt().with_writer(std::io::stderr)
                             .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
                             .init();
}

async fn run(cli: Cli) -> Result<(), CommandFailure> {
    let config = CONFIG.clone();
    let library = Arc::new(config.load_library().map_err(|e| CommandFailure { code: 3,
                                                                              message: e.to_string() })?);
    if std::env::var("DATABASE_URL").is_ok() {
        let pool = tokio::task::spawn_blocking(build_pool_from_env).await
                                                                   .map_err(|e| CommandFailure { code: 5,
                                                                                                 message: e.to_string() })?
                                                                   .map_err(|e| CommandFailure { code: 5,
                                                                                                 message: e.to_string() })?;
        let repo = PgRunRepository::new(PoolProvider { pool });
        let (service, _worker) = DiscoveryService::start(repo, Arc::clone(&library), &config);
        dispatch(&service, &library, cli.command).await
    } else {
        warn!("DATABASE_URL no definido: almacén en memoria, las ejecuciones no sobreviven al proceso");
        let (service, _worker) = DiscoveryService::start(Arc::new(InMemoryRunStore::new()), Arc::clone(&library), &config);
        dispatch(&service, &library, cli.command).await
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    if let Err(failure) = run(cli).await {
        eprintln!("error: {}", failure.message);
        std::process::exit(failure.code);
    }
}
