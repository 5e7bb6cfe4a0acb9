//! Configuración del servicio de descubrimiento.
//! Carga variables de entorno (.env) una sola vez y expone `CONFIG`.

use std::env;
use std::path::PathBuf;

use chem_core::{OrchestratorOptions, DEFAULT_MAX_MATCHES_PER_RULE};
use chem_domain::{LibraryError, MutationLibrary};
use log::warn;
use once_cell::sync::Lazy;

static DOTENV_LOADED: Lazy<()> = Lazy::new(|| {
    let _ = dotenvy::dotenv(); // ignora error si no existe .env
});

/// Instancia global perezosa, evaluada una sola vez.
pub static CONFIG: Lazy<DiscoveryConfig> = Lazy::new(DiscoveryConfig::from_env);

pub const DEFAULT_WORKER_RETRIES: u32 = 3;
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryConfig {
    /// `CHEMFLOW_PARALLEL_EVAL`: evalúa candidatos en el pool de rayon.
    pub parallel_eval: bool,
    /// `CHEMFLOW_MAX_MATCHES_PER_RULE`
    pub max_matches_per_rule: usize,
    /// `CHEMFLOW_MUTATION_LIBRARY`: catálogo JSON alternativo.
    pub mutation_library: Option<PathBuf>,
    /// `CHEMFLOW_WORKER_RETRIES`: reintentos de una unidad de trabajo que
    /// no pudo ni registrar su fallo.
    pub worker_retries: u32,
    /// `CHEMFLOW_POLL_INTERVAL_MS`: cada cuánto el worker busca ejecuciones
    /// pendientes en el almacén.
    pub poll_interval_ms: u64,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self { parallel_eval: true,
               max_matches_per_rule: DEFAULT_MAX_MATCHES_PER_RULE,
               mutation_library: None,
               worker_retries: DEFAULT_WORKER_RETRIES,
               poll_interval_ms: DEFAULT_POLL_INTERVAL_MS }
    }
}

impl DiscoveryConfig {
    pub fn from_env() -> Self {
        Lazy::force(&DOTENV_LOADED);
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Construye la configuración desde cualquier fuente clave → valor.
    /// Valores inválidos se ignoran con un aviso y quedan en su default.
    pub fn from_lookup<F>(lookup: F) -> Self
        where F: Fn(&str) -> Option<String>
    {
        let defaults = Self::default();
        let parsed = |key: &str| lookup(key).map(|raw| (key.to_string(), raw));
        Self { parallel_eval: parsed("CHEMFLOW_PARALLEL_EVAL").and_then(|(k, v)| parse_bool(&k, &v))
                                                              .unwrap_or(defaults.parallel_eval),
               max_matches_per_rule: parsed("CHEMFLOW_MAX_MATCHES_PER_RULE").and_then(|(k, v)| parse_positive(&k, &v))
                                                                            .unwrap_or(defaults.max_matches_per_rule),
               mutation_library: lookup("CHEMFLOW_MUTATION_LIBRARY").filter(|p| !p.trim().is_empty())
                                                                    .map(PathBuf::from),
               worker_retries: parsed("CHEMFLOW_WORKER_RETRIES").and_then(|(k, v)| parse_number(&k, &v))
                                                                .unwrap_or(defaults.worker_retries),
               poll_interval_ms: parsed("CHEMFLOW_POLL_INTERVAL_MS").and_then(|(k, v)| parse_positive(&k, &v))
                                                                    .unwrap_or(defaults.poll_interval_ms) }
    }

    pub fn orchestrator_options(&self) -> OrchestratorOptions {
        OrchestratorOptions { parallel_eval: self.parallel_eval,
                              max_matches_per_rule: self.max_matches_per_rule }
    }

    /// Catálogo configurado, o el incluido en el binario.
    pub fn load_library(&self) -> Result<MutationLibrary, LibraryError> {
        match &self.mutation_library {
            Some(path) => MutationLibrary::from_path(path),
            None => MutationLibrary::builtin(),
        }
    }
}

fn parse_bool(key: &str, raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => {
            warn!("{key}={raw} no es booleano, se usa el valor por defecto");
            None
        }
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, raw: &str) -> Option<T> {
    let value = raw.trim().parse().ok();
    if value.is_none() {
        warn!("{key}={raw} no es numérico, se usa el valor por defecto");
    }
    value
}

fn parse_positive<T>(key: &str, raw: &str) -> Option<T>
    where T: std::str::FromStr + PartialOrd + Default
{
    parse_number(key, raw).filter(|v: &T| *v > T::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> DiscoveryConfig {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        DiscoveryConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        assert_eq!(config(&[]), DiscoveryConfig::default());
        assert_eq!(config(&[]).orchestrator_options(), OrchestratorOptions::default());
    }

    #[test]
    fn reads_every_key() {
        let c = config(&[("CHEMFLOW_PARALLEL_EVAL", "off"),
                         ("CHEMFLOW_MAX_MATCHES_PER_RULE", "8"),
                         ("CHEMFLOW_MUTATION_LIBRARY", "/etc/chemflow/rules.json"),
                         ("CHEMFLOW_WORKER_RETRIES", "0"),
                         ("CHEMFLOW_POLL_INTERVAL_MS", "250")]);
        assert!(!c.parallel_eval);
        assert_eq!(c.max_matches_per_rule, 8);
        assert_eq!(c.mutation_library, Some(PathBuf::from("/etc/chemflow/rules.json")));
        assert_eq!(c.worker_retries, 0);
        assert_eq!(c.poll_interval_ms, 250);
    }

    #[test]
    fn invalid_values_fall_back_to_defaults() {
        let c = config(&[("CHEMFLOW_PARALLEL_EVAL", "quizás"),
                         ("CHEMFLOW_MAX_MATCHES_PER_RULE", "0"),
                         ("CHEMFLOW_WORKER_RETRIES", "-1")]);
        assert_eq!(c, DiscoveryConfig::default());
    }

    #[test]
    fn missing_library_file_is_an_error() {
        let c = config(&[("CHEMFLOW_MUTATION_LIBRARY", "/nonexistent/rules.json")]);
        assert!(matches!(c.load_library(), Err(LibraryError::Io { .. })));
        assert!(config(&[]).load_library().is_ok());
    }
}
