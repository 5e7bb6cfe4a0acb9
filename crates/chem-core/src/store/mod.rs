//! Abstracción de almacenamiento de ejecuciones.
//!
//! Todo lo que persiste una ronda viaja en un único `RoundCommit` que el
//! almacén aplica de forma atómica: o entran las moléculas, las trazas y el
//! nuevo estado de la ejecución, o no entra nada.

mod memory;

pub use memory::InMemoryRunStore;

use std::sync::Arc;

use chem_domain::{Molecule, Run, RunStatus, TraceEntry, TraceEvent};
use uuid::Uuid;

use crate::errors::StoreError;

/// Unidad de escritura de una ronda (o de una transición de estado).
///
/// `expected_status` y `expected_round` describen el estado sobre el que
/// se calculó; si el persistido difiere, el almacén rechaza el commit con
/// `StoreError::Conflict` sin escribir nada.
#[derive(Debug, Clone, PartialEq)]
pub struct RoundCommit {
    pub run_id: Uuid,
    pub expected_status: RunStatus,
    pub expected_round: u32,
    pub status: RunStatus,
    pub current_round: u32,
    pub molecules: Vec<Molecule>,
    pub traces: Vec<TraceEvent>,
    pub result_set: Option<Vec<String>>,
    pub result_fingerprint: Option<String>,
    pub error_message: Option<String>,
}

impl RoundCommit {
    /// Comprobación común del control optimista.
    pub fn check_expected(&self, run: &Run) -> Result<(), StoreError> {
        if run.status != self.expected_status || run.current_round != self.expected_round {
            return Err(StoreError::Conflict { run_id: run.id,
                                              expected: format!("{}@{}", self.expected_status, self.expected_round),
                                              found: format!("{}@{}", run.status, run.current_round) });
        }
        if run.status != self.status && !run.status.can_transition_to(self.status) {
            return Err(StoreError::Integrity(format!("transition {} -> {} not allowed", run.status, self.status)));
        }
        Ok(())
    }
}

/// Repositorio de ejecuciones, moléculas y trazas.
pub trait RunRepository: Send + Sync {
    fn insert_run(&self, run: &Run) -> Result<(), StoreError>;
    fn load_run(&self, run_id: Uuid) -> Result<Run, StoreError>;
    /// Moléculas en orden de inserción.
    fn molecules(&self, run_id: Uuid) -> Result<Vec<Molecule>, StoreError>;
    /// Trazas ordenadas por `seq` ascendente.
    fn trace(&self, run_id: Uuid) -> Result<Vec<TraceEntry>, StoreError>;
    /// Aplica el commit atómicamente y devuelve la ejecución actualizada.
    fn commit(&self, commit: RoundCommit) -> Result<Run, StoreError>;
    /// Ejecuciones conocidas, más recientes primero.
    fn list_runs(&self) -> Result<Vec<Run>, StoreError>;
}

impl<T: RunRepository + ?Sized> RunRepository for Arc<T> {
    fn insert_run(&self, run: &Run) -> Result<(), StoreError> {
        (**self).insert_run(run)
    }

    fn load_run(&self, run_id: Uuid) -> Result<Run, StoreError> {
        (**self).load_run(run_id)
    }

    fn molecules(&self, run_id: Uuid) -> Result<Vec<Molecule>, StoreError> {
        (**self).molecules(run_id)
    }

    fn trace(&self, run_id: Uuid) -> Result<Vec<TraceEntry>, StoreError> {
        (**self).trace(run_id)
    }

    fn commit(&self, commit: RoundCommit) -> Result<Run, StoreError> {
        (**self).commit(commit)
    }

    fn list_runs(&self) -> Result<Vec<Run>, StoreError> {
        (**self).list_runs()
    }
}
