// errors.rs
use chemengine::{ComputeError, ParseError, ReactionError};
use thiserror::Error;

/// Fallo de química sobre una estructura concreta. Nunca cruza el límite
/// del evaluador como pánico: el llamador recibe siempre este valor.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ChemistryError {
    #[error("cannot parse '{structure}': {reason}")]
    Parse { structure: String, reason: String },
    #[error("cannot compute descriptors for '{structure}': {reason}")]
    Compute { structure: String, reason: String },
}

impl ChemistryError {
    pub(crate) fn parse(structure: &str, source: &ParseError) -> Self {
        ChemistryError::Parse { structure: structure.to_string(),
                                reason: source.to_string() }
    }

    pub(crate) fn compute(structure: &str, source: &ComputeError) -> Self {
        ChemistryError::Compute { structure: structure.to_string(),
                                  reason: source.to_string() }
    }

    /// Etiqueta corta usada en las trazas de descarte.
    pub fn kind(&self) -> &'static str {
        match self {
            ChemistryError::Parse { .. } => "parse",
            ChemistryError::Compute { .. } => "compute",
        }
    }

    pub fn structure(&self) -> &str {
        match self {
            ChemistryError::Parse { structure, .. } | ChemistryError::Compute { structure, .. } => structure,
        }
    }
}

/// Una regla produjo un producto inválido.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MutationError {
    #[error("rule {rule} on '{parent}' failed: {reason}")]
    Rewrite { rule: String, parent: String, reason: String },
    #[error("rule {rule} on '{parent}' produced invalid '{product}': {reason}")]
    InvalidProduct { rule: String, parent: String, product: String, reason: String },
}

impl MutationError {
    pub(crate) fn rewrite(rule: &str, parent: &str, source: &ReactionError) -> Self {
        MutationError::Rewrite { rule: rule.to_string(),
                                 parent: parent.to_string(),
                                 reason: source.to_string() }
    }

    pub fn invalid_product(rule: &str, parent: &str, product: &str, source: &ChemistryError) -> Self {
        MutationError::InvalidProduct { rule: rule.to_string(),
                                        parent: parent.to_string(),
                                        product: product.to_string(),
                                        reason: source.to_string() }
    }

    pub fn rule(&self) -> &str {
        match self {
            MutationError::Rewrite { rule, .. } | MutationError::InvalidProduct { rule, .. } => rule,
        }
    }

    pub fn parent(&self) -> &str {
        match self {
            MutationError::Rewrite { parent, .. } | MutationError::InvalidProduct { parent, .. } => parent,
        }
    }

    /// Producto crudo, si la reescritura llegó a generarlo.
    pub fn product(&self) -> Option<&str> {
        match self {
            MutationError::Rewrite { .. } => None,
            MutationError::InvalidProduct { product, .. } => Some(product),
        }
    }
}

/// Lista de todas las restricciones que incumple una configuración.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid run config: {}", .violations.join("; "))]
pub struct ConfigValidationError {
    pub violations: Vec<String>,
}

#[derive(Debug, Error)]
pub enum LibraryError {
    #[error("cannot read mutation library {path}: {source}")]
    Io { path: String, source: std::io::Error },
    #[error("malformed mutation library: {0}")]
    Json(#[from] serde_json::Error),
    #[error("mutation library is empty")]
    Empty,
    #[error("duplicate rule label '{0}'")]
    DuplicateLabel(String),
    #[error("rule '{label}' has an invalid pattern: {source}")]
    Pattern { label: String, source: ReactionError },
}
