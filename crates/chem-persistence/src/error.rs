//! Errores de persistencia.
//! Mapea errores de Diesel / conexión a variantes semánticas y, hacia el
//! núcleo, a `StoreError`.

use chem_core::StoreError;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("unique violation: {0}")]
    UniqueViolation(String),
    #[error("check violation: {0}")]
    CheckViolation(String),
    #[error("foreign key violation: {0}")]
    ForeignKeyViolation(String),
    #[error("run {0} not found")]
    RunNotFound(Uuid),
    #[error("not found")]
    NotFound,
    #[error("serialization conflict (retryable)")]
    SerializationConflict,
    #[error("transient IO / connection pool error: {0}")]
    TransientIo(String),
    #[error("missing configuration: {0}")]
    MissingConfig(String),
    /// Fila que no se puede convertir al tipo de dominio.
    #[error("row mapping error: {0}")]
    Mapping(String),
    /// Rechazo del propio contrato de commit (estado obsoleto, transición).
    #[error(transparent)]
    Store(StoreError),
    #[error("unknown database error: {0}")]
    Unknown(String),
}

impl From<DieselError> for PersistenceError {
    fn from(err: DieselError) -> Self {
        match err {
            DieselError::NotFound => Self::NotFound,
            DieselError::DatabaseError(kind, info) => match kind {
                DatabaseErrorKind::UniqueViolation => Self::UniqueViolation(info.message().to_string()),
                DatabaseErrorKind::CheckViolation => Self::CheckViolation(info.message().to_string()),
                DatabaseErrorKind::ForeignKeyViolation => Self::ForeignKeyViolation(info.message().to_string()),
                DatabaseErrorKind::SerializationFailure => Self::SerializationConflict,
                DatabaseErrorKind::ClosedConnection => Self::TransientIo(info.message().to_string()),
                other => Self::Unknown(format!("db error kind {:?}: {}", other, info.message())),
            },
            DieselError::DeserializationError(e) => Self::Mapping(format!("deser: {e}")),
            DieselError::SerializationError(e) => Self::Mapping(format!("ser: {e}")),
            DieselError::BrokenTransactionManager => Self::TransientIo("broken transaction manager".into()),
            other => Self::Unknown(format!("unhandled diesel error: {other:?}")),
        }
    }
}

impl PersistenceError {
    /// Errores que pueden desaparecer reintentando la misma operación.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::SerializationConflict | Self::TransientIo(_) => true,
            Self::Unknown(msg) => {
                let msg = msg.to_lowercase();
                ["deadlock detected", "could not serialize access", "terminating connection", "connection refused", "timeout"]
                    .iter()
                    .any(|needle| msg.contains(needle))
            }
            _ => false,
        }
    }
}

impl From<StoreError> for PersistenceError {
    fn from(err: StoreError) -> Self {
        Self::Store(err)
    }
}

impl From<PersistenceError> for StoreError {
    fn from(err: PersistenceError) -> Self {
        match err {
            PersistenceError::Store(e) => e,
            PersistenceError::RunNotFound(id) => StoreError::NotFound(id),
            e @ (PersistenceError::UniqueViolation(_)
                 | PersistenceError::CheckViolation(_)
                 | PersistenceError::ForeignKeyViolation(_)
                 | PersistenceError::NotFound
                 | PersistenceError::Mapping(_)) => StoreError::Integrity(e.to_string()),
            e => StoreError::Unavailable(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commit_rejections_keep_their_meaning() {
        let id = Uuid::new_v4();
        let conflict = StoreError::Conflict { run_id: id,
                                              expected: "RUNNING@1".into(),
                                              found: "FAILED@1".into() };
        let mapped: StoreError = PersistenceError::from(conflict.clone()).into();
        assert_eq!(mapped, conflict);
        assert_eq!(StoreError::from(PersistenceError::RunNotFound(id)), StoreError::NotFound(id));
    }

    #[test]
    fn constraint_violations_are_integrity_and_io_is_transient() {
        let unique: StoreError = PersistenceError::UniqueViolation("molecules_run_id_structure_key".into()).into();
        assert!(matches!(unique, StoreError::Integrity(_)));
        let io: StoreError = PersistenceError::TransientIo("pool timeout".into()).into();
        assert!(io.is_transient());
        assert!(StoreError::from(PersistenceError::SerializationConflict).is_transient());
    }

    #[test]
    fn driver_messages_are_classified() {
        assert!(PersistenceError::Unknown("ERROR: deadlock detected".into()).is_transient());
        assert!(!PersistenceError::Unknown("syntax error at or near".into()).is_transient());
        assert!(!PersistenceError::MissingConfig("DATABASE_URL".into()).is_transient());
    }
}
