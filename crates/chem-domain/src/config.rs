// config.rs
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::canonical_json::to_canonical_json;
use crate::ConfigValidationError;

pub const DEFAULT_OBJECTIVE: &str = "Generate drug-like molecules; maximize QED; minimize violations";

/// Umbrales de filtrado. Valores por defecto orientados a SNC (TPSA 140).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterThresholds {
    pub max_mw: f64,
    pub max_logp: f64,
    pub max_hbd: u32,
    pub max_hba: u32,
    pub max_tpsa: f64,
    pub max_rotb: u32,
    pub max_violations: u32,
}

impl Default for FilterThresholds {
    fn default() -> Self {
        Self { max_mw: 500.0,
               max_logp: 5.0,
               max_hbd: 5,
               max_hba: 10,
               max_tpsa: 140.0,
               max_rotb: 10,
               max_violations: 1 }
    }
}

/// Qué hacer cuando una ronda no produce ningún candidato nuevo.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyRoundPolicy {
    /// Avanza a la siguiente ronda con los mismos supervivientes.
    #[default]
    Continue,
    /// Completa la ejecución tras confirmar la ronda vacía.
    Stop,
}

impl EmptyRoundPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmptyRoundPolicy::Continue => "continue",
            EmptyRoundPolicy::Stop => "stop",
        }
    }
}

impl FilterThresholds {
    fn to_value(self) -> Value {
        let mut map = Map::new();
        map.insert("max_mw".into(), Value::from(self.max_mw));
        map.insert("max_logp".into(), Value::from(self.max_logp));
        map.insert("max_hbd".into(), Value::from(self.max_hbd));
        map.insert("max_hba".into(), Value::from(self.max_hba));
        map.insert("max_tpsa".into(), Value::from(self.max_tpsa));
        map.insert("max_rotb".into(), Value::from(self.max_rotb));
        map.insert("max_violations".into(), Value::from(self.max_violations));
        Value::Object(map)
    }
}

/// Configuración inmutable de una ejecución de descubrimiento.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    pub seeds: Vec<String>,
    pub num_rounds: u32,
    pub candidates_per_round: u32,
    pub top_k: u32,
    #[serde(default)]
    pub filters: FilterThresholds,
    #[serde(default)]
    pub empty_round_policy: EmptyRoundPolicy,
    #[serde(default = "default_objective")]
    pub objective: String,
}

fn default_objective() -> String {
    DEFAULT_OBJECTIVE.to_string()
}

impl RunConfig {
    pub fn new(seeds: Vec<String>, num_rounds: u32, candidates_per_round: u32, top_k: u32) -> Self {
        Self { seeds,
               num_rounds,
               candidates_per_round,
               top_k,
               filters: FilterThresholds::default(),
               empty_round_policy: EmptyRoundPolicy::default(),
               objective: default_objective() }
    }

    pub fn with_filters(mut self, filters: FilterThresholds) -> Self {
        self.filters = filters;
        self
    }

    pub fn with_empty_round_policy(mut self, policy: EmptyRoundPolicy) -> Self {
        self.empty_round_policy = policy;
        self
    }

    /// Valida las restricciones estructurales. La validez química de las
    /// semillas la comprueba el orquestador.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        let mut violations = Vec::new();
        if self.seeds.is_empty() {
            violations.push("seeds must not be empty".to_string());
        }
        for (index, seed) in self.seeds.iter().enumerate() {
            if seed.trim().is_empty() {
                violations.push(format!("seed {index} is blank"));
            }
        }
        if self.num_rounds < 1 {
            violations.push("num_rounds must be >= 1".to_string());
        }
        if self.candidates_per_round < 1 {
            violations.push("candidates_per_round must be >= 1".to_string());
        }
        if self.top_k < 1 {
            violations.push("top_k must be >= 1".to_string());
        }
        if self.top_k > self.candidates_per_round {
            violations.push(format!("top_k ({}) must be <= candidates_per_round ({})",
                                    self.top_k, self.candidates_per_round));
        }
        let f = &self.filters;
        for (name, value) in [("max_mw", f.max_mw), ("max_logp", f.max_logp), ("max_tpsa", f.max_tpsa)] {
            if !value.is_finite() || value < 0.0 {
                violations.push(format!("{name} must be finite and non-negative"));
            }
        }
        if violations.is_empty() {
            Ok(())
        } else {
            Err(ConfigValidationError { violations })
        }
    }

    /// Misma forma que la serialización serde, construida campo a campo.
    pub fn canonical_value(&self) -> Value {
        let mut map = Map::new();
        map.insert("seeds".into(), Value::from(self.seeds.clone()));
        map.insert("num_rounds".into(), Value::from(self.num_rounds));
        map.insert("candidates_per_round".into(), Value::from(self.candidates_per_round));
        map.insert("top_k".into(), Value::from(self.top_k));
        map.insert("filters".into(), self.filters.to_value());
        map.insert("empty_round_policy".into(), Value::from(self.empty_round_policy.as_str()));
        map.insert("objective".into(), Value::from(self.objective.as_str()));
        Value::Object(map)
    }

    /// SHA-256 hex del JSON canónico de la configuración.
    pub fn config_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(to_canonical_json(&self.canonical_value()).as_bytes());
        format!("{:x}", hasher.finalize())
    }
}
