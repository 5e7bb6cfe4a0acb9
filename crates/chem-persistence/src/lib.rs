//! chem-persistence
//!
//! Implementación Postgres (Diesel) del repositorio de ejecuciones de
//! descubrimiento, más utilidades de conexión y migraciones.
//!
//! Módulos:
//! - `pg`: `PgRunRepository` sobre `discovery_runs`, `molecules` y
//!   `agent_traces`.
//! - `migrations`: runner embebido de migraciones Diesel.
//! - `config`: carga de configuración desde .env.
//! - `schema`: tablas Diesel.

pub mod config;
pub mod error;
pub mod migrations;
pub mod pg;
pub mod schema;

pub use config::{init_dotenv, DbConfig};
pub use error::PersistenceError;
pub use pg::{build_pool, build_pool_from_env, ConnectionProvider, PgPool, PgRunRepository, PoolProvider, RetryPolicy};
