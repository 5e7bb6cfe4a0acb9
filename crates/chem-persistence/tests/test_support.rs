#![allow(dead_code)]

use chem_persistence::config::DbConfig;
use chem_persistence::pg::{build_pool, PgPool, PgRunRepository, PoolProvider};
use once_cell::sync::Lazy;

pub static TEST_POOL: Lazy<Option<PgPool>> = Lazy::new(|| {
    let cfg = DbConfig::from_env().ok()?;
    match build_pool(&cfg.url, 1, 4) {
        Ok(p) => Some(p),
        Err(e) => {
            eprintln!("No se pudo construir pool de test: {e}");
            None
        }
    }
});

/// Repositorio sobre el pool compartido, o `None` sin `DATABASE_URL`.
pub fn repository() -> Option<PgRunRepository<PoolProvider>> {
    TEST_POOL.as_ref()
             .map(|pool| PgRunRepository::new(PoolProvider { pool: pool.clone() }))
}
