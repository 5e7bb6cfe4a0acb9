//! Errores del núcleo de orquestación.

use chem_domain::RunStatus;
use thiserror::Error;
use uuid::Uuid;

/// Fallos del almacenamiento de ejecuciones.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum StoreError {
    #[error("run {0} not found")]
    NotFound(Uuid),
    /// La unidad de trabajo se construyó sobre un estado que ya no es el
    /// persistido (redelivery concurrente o cancelación).
    #[error("stale commit for run {run_id}: expected {expected}, found {found}")]
    Conflict { run_id: Uuid, expected: String, found: String },
    #[error("integrity violation: {0}")]
    Integrity(String),
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict { .. })
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum OrchestrationError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("invalid transition {from} -> {to}")]
    InvalidTransition { from: RunStatus, to: RunStatus },
}
