use chem_core::{OrchestrationError, StoreError};
use chem_domain::LibraryError;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("run {0} not found")]
    NotFound(Uuid),
    #[error(transparent)]
    Orchestration(OrchestrationError),
    #[error(transparent)]
    Library(#[from] LibraryError),
    #[error("task queue closed")]
    QueueClosed,
    #[error("worker task failed: {0}")]
    Join(String),
    #[error("timed out waiting for run {0}")]
    Timeout(Uuid),
}

impl ServiceError {
    /// Código de salida para binarios (4: no encontrado, 5: resto).
    pub fn exit_code(&self) -> i32 {
        match self {
            ServiceError::NotFound(_) => 4,
            _ => 5,
        }
    }
}

impl From<OrchestrationError> for ServiceError {
    fn from(err: OrchestrationError) -> Self {
        match err {
            OrchestrationError::Store(StoreError::NotFound(id)) => ServiceError::NotFound(id),
            other => ServiceError::Orchestration(other),
        }
    }
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        OrchestrationError::from(err).into()
    }
}

impl From<tokio::task::JoinError> for ServiceError {
    fn from(err: tokio::task::JoinError) -> Self {
        ServiceError::Join(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_runs_are_not_found() {
        let id = Uuid::new_v4();
        let err: ServiceError = StoreError::NotFound(id).into();
        assert!(matches!(err, ServiceError::NotFound(x) if x == id));
        assert_eq!(err.exit_code(), 4);
        assert_eq!(err.to_string(), format!("run {id} not found"));
    }

    #[test]
    fn storage_failures_keep_their_message() {
        let err: ServiceError = StoreError::Unavailable("pool timeout".into()).into();
        assert_eq!(err.to_string(), "storage unavailable: pool timeout");
        assert_eq!(err.exit_code(), 5);
    }
}
