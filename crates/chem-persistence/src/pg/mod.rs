//! Implementación Postgres (Diesel) de `RunRepository`.
//!
//! - Cada `RoundCommit` se aplica en una única transacción `read_write` que
//!   bloquea la fila de la ejecución (`FOR UPDATE`), comprueba el estado
//!   esperado, inserta moléculas y trazas y actualiza la ejecución.
//! - `agent_traces` es append-only; `seq` es por ejecución, empieza en 0 y
//!   se calcula dentro de la transacción.
//! - Errores transitorios (pool, serialización) se reintentan con backoff.

mod repository;
mod rows;

pub use repository::PgRunRepository;

use diesel::prelude::*;
use diesel::r2d2::{self, ConnectionManager};
use log::warn;
use std::time::Duration;

use crate::error::PersistenceError;
use crate::migrations::run_pending_migrations;

/// Alias de tipo para el pool r2d2 de conexiones Postgres.
pub type PgPool = r2d2::Pool<ConnectionManager<PgConnection>>;
pub type PgPooledConnection = r2d2::PooledConnection<ConnectionManager<PgConnection>>;

/// Proveedor abstracto de conexiones.
///
/// Contrato: devuelve una conexión válida o
/// `PersistenceError::TransientIo` en caso de error.
pub trait ConnectionProvider: Send + Sync + 'static {
    fn connection(&self) -> Result<PgPooledConnection, PersistenceError>;
}

/// `ConnectionProvider` respaldado por un `PgPool`.
#[derive(Clone)]
pub struct PoolProvider {
    pub pool: PgPool,
}

impl ConnectionProvider for PoolProvider {
    fn connection(&self) -> Result<PgPooledConnection, PersistenceError> {
        self.pool
            .get()
            .map_err(|e| PersistenceError::TransientIo(format!("pool error: {e}")))
    }
}

/// Reintentos ante errores transitorios: backoff que se duplica en cada
/// intento, empezando en `base_delay_ms`.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_retries: 3,
               base_delay_ms: 20 }
    }
}

impl RetryPolicy {
    fn delay(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.base_delay_ms.saturating_mul(1u64 << attempt.min(10)))
    }

    pub fn run<F, T>(&self, mut op: F) -> Result<T, PersistenceError>
        where F: FnMut() -> Result<T, PersistenceError>
    {
        let mut attempt = 0;
        loop {
            match op() {
                Err(e) if e.is_transient() && attempt < self.max_retries => {
                    let delay = self.delay(attempt);
                    warn!("Error transitorio en Postgres ({}), reintento {}/{} en {:?}",
                          e,
                          attempt + 1,
                          self.max_retries,
                          delay);
                    std::thread::sleep(delay);
                    attempt += 1;
                }
                outcome => return outcome,
            }
        }
    }
}

pub(crate) fn with_retry<F, T>(op: F) -> Result<T, PersistenceError>
    where F: FnMut() -> Result<T, PersistenceError>
{
    RetryPolicy::default().run(op)
}

/// Construye un pool Postgres r2d2 y corre las migraciones pendientes.
///
/// Si `min_size > max_size` se usa `min_size = max_size`.
pub fn build_pool(database_url: &str, min_size: u32, max_size: u32) -> Result<PgPool, PersistenceError> {
    let validated_max = max_size.max(1);
    let validated_min = min_size.max(1);
    if validated_min > validated_max {
        warn!("min_size > max_size ({} > {}), ajustando min=max", validated_min, validated_max);
    }
    let manager = ConnectionManager::<PgConnection>::new(database_url);
    let pool = r2d2::Pool::builder().min_idle(Some(validated_min.min(validated_max)))
                                    .max_size(validated_max)
                                    .build(manager)
                                    .map_err(|e| PersistenceError::TransientIo(format!("pool build: {e}")))?;
    {
        let mut conn = pool.get()
                           .map_err(|e| PersistenceError::TransientIo(format!("pool get for migrations: {e}")))?;
        run_pending_migrations(&mut conn)?;
    }
    Ok(pool)
}

/// Carga `.env`, lee `DbConfig` y construye un pool ya migrado.
pub fn build_pool_from_env() -> Result<PgPool, PersistenceError> {
    crate::config::init_dotenv();
    let cfg = crate::config::DbConfig::from_env()?;
    build_pool(&cfg.url, cfg.min_connections, cfg.max_connections)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn transient_errors_are_retried_then_surface() {
        let calls = Cell::new(0);
        let result: Result<(), PersistenceError> = with_retry(|| {
            calls.set(calls.get() + 1);
            Err(PersistenceError::TransientIo("pool timeout".into()))
        });
        assert!(result.is_err());
        assert_eq!(calls.get(), 4, "1 intento + 3 reintentos");
    }

    #[test]
    fn permanent_errors_are_not_retried() {
        let calls = Cell::new(0);
        let result: Result<(), PersistenceError> = with_retry(|| {
            calls.set(calls.get() + 1);
            Err(PersistenceError::UniqueViolation("dup".into()))
        });
        assert!(matches!(result, Err(PersistenceError::UniqueViolation(_))));
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn backoff_doubles_per_attempt() {
        let policy = RetryPolicy { max_retries: 2,
                                   base_delay_ms: 0 };
        assert_eq!(policy.delay(3), Duration::ZERO);
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay(0), Duration::from_millis(20));
        assert_eq!(policy.delay(2), Duration::from_millis(80));
    }

    #[test]
    fn recovers_after_a_transient_failure() {
        let calls = Cell::new(0);
        let result = with_retry(|| {
            calls.set(calls.get() + 1);
            if calls.get() < 2 {
                Err(PersistenceError::SerializationConflict)
            } else {
                Ok(7)
            }
        });
        assert_eq!(result.expect("segundo intento"), 7);
    }
}
