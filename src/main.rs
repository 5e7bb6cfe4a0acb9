//! chemflow-worker: proceso worker contra Postgres.
//!
//! Al arrancar encola toda ejecución no terminal (redelivery tras caída) y
//! luego sondea el almacén cada `CHEMFLOW_POLL_INTERVAL_MS` en busca de
//! ejecuciones PENDING enviadas por otros procesos (p. ej. `chem-cli`).

use std::sync::Arc;
use std::time::Duration;

use chem_persistence::{build_pool_from_env, PgRunRepository, PoolProvider};
use chemflow_discovery::{DiscoveryService, CONFIG};
use log::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
                             .init();

    let config = CONFIG.clone();
    let library = match config.load_library() {
        Ok(lib) => Arc::new(lib),
        Err(e) => {
            error!("No se pudo cargar el catálogo de mutaciones: {e}");
            std::process::exit(5);
        }
    };
    let pool = match tokio::task::spawn_blocking(build_pool_from_env).await {
        Ok(Ok(pool)) => pool,
        Ok(Err(e)) => {
            error!("Postgres no disponible: {e}");
            std::process::exit(5);
        }
        Err(e) => {
            error!("Fallo construyendo el pool: {e}");
            std::process::exit(5);
        }
    };

    let repo = PgRunRepository::new(PoolProvider { pool });
    let (service, worker) = DiscoveryService::start(repo, library, &config);
    let mut ticker = tokio::time::interval(Duration::from_millis(config.poll_interval_ms));
    info!("Worker escuchando (poll cada {} ms)", config.poll_interval_ms);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match service.recover_pending().await {
                    Ok(0) => {}
                    Ok(n) => info!("{n} ejecuciones encoladas"),
                    Err(e) => error!("No se pudieron listar ejecuciones: {e}"),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Señal de parada recibida, esperando entregas en curso");
                break;
            }
        }
    }
    drop(service);
    if let Err(e) = worker.await {
        error!("Worker terminó con error: {e}");
    }
}
