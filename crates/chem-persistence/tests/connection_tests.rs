//! Pruebas básicas de configuración y pool (requiere DATABASE_URL válido en entorno).

use chem_persistence::{build_pool, init_dotenv, DbConfig, PersistenceError};
use diesel::connection::SimpleConnection;

#[test]
fn create_pool_from_env_and_see_schema() {
    let Ok(cfg) = DbConfig::from_env() else {
        eprintln!("DATABASE_URL no definido: omitiendo test");
        return;
    };
    let pool = build_pool(&cfg.url, cfg.min_connections, cfg.max_connections).expect("pool");
    let mut conn = pool.get().expect("conn");
    conn.batch_execute("SELECT 1 FROM discovery_runs LIMIT 1; SELECT 1 FROM molecules LIMIT 1; SELECT 1 FROM agent_traces LIMIT 1;")
        .expect("tablas migradas");
}

#[test]
fn missing_url_is_a_config_error() {
    init_dotenv();
    if std::env::var("DATABASE_URL").is_ok() {
        return;
    }
    assert!(matches!(DbConfig::from_env(), Err(PersistenceError::MissingConfig(_))));
}
