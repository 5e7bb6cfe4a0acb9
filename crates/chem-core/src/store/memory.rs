use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};

use chem_domain::{Molecule, Run, TraceEntry};
use chrono::Utc;
use dashmap::DashMap;
use log::debug;
use uuid::Uuid;

use super::{RoundCommit, RunRepository};
use crate::errors::StoreError;
use crate::ledger;

#[derive(Debug, Clone)]
struct RunRecord {
    run: Run,
    molecules: Vec<Molecule>,
    traces: Vec<TraceEntry>,
}

/// Almacén en memoria. Cada ejecución vive en su propia entrada del mapa,
/// así que ejecuciones distintas no comparten bloqueo.
#[derive(Debug, Default)]
pub struct InMemoryRunStore {
    inner: DashMap<Uuid, RunRecord>,
    passing_commits: AtomicUsize,
    failing_commits: AtomicUsize,
}

impl InMemoryRunStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Los próximos `n` commits fallan con `Unavailable` sin escribir nada.
    pub fn fail_next_commits(&self, n: usize) {
        self.fail_commits_after(0, n);
    }

    /// Deja pasar `skip` commits y hace fallar los `n` siguientes.
    pub fn fail_commits_after(&self, skip: usize, n: usize) {
        self.passing_commits.store(skip, Ordering::SeqCst);
        self.failing_commits.store(n, Ordering::SeqCst);
    }

    fn take_failure(&self) -> bool {
        let decrement = |n: usize| n.checked_sub(1);
        if self.passing_commits
               .fetch_update(Ordering::SeqCst, Ordering::SeqCst, decrement)
               .is_ok()
        {
            return false;
        }
        self.failing_commits
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, decrement)
            .is_ok()
    }
}

impl RunRepository for InMemoryRunStore {
    fn insert_run(&self, run: &Run) -> Result<(), StoreError> {
        if self.inner.contains_key(&run.id) {
            return Err(StoreError::Integrity(format!("run {} already exists", run.id)));
        }
        self.inner.insert(run.id,
                          RunRecord { run: run.clone(),
                                      molecules: Vec::new(),
                                      traces: Vec::new() });
        Ok(())
    }

    fn load_run(&self, run_id: Uuid) -> Result<Run, StoreError> {
        self.inner
            .get(&run_id)
            .map(|r| r.run.clone())
            .ok_or(StoreError::NotFound(run_id))
    }

    fn molecules(&self, run_id: Uuid) -> Result<Vec<Molecule>, StoreError> {
        self.inner
            .get(&run_id)
            .map(|r| r.molecules.clone())
            .ok_or(StoreError::NotFound(run_id))
    }

    fn trace(&self, run_id: Uuid) -> Result<Vec<TraceEntry>, StoreError> {
        self.inner
            .get(&run_id)
            .map(|r| r.traces.clone())
            .ok_or(StoreError::NotFound(run_id))
    }

    fn commit(&self, commit: RoundCommit) -> Result<Run, StoreError> {
        if self.take_failure() {
            return Err(StoreError::Unavailable("injected commit failure".to_string()));
        }
        let mut record = self.inner
                             .get_mut(&commit.run_id)
                             .ok_or(StoreError::NotFound(commit.run_id))?;
        commit.check_expected(&record.run)?;

        let mut structures: HashSet<&str> = record.molecules.iter().map(|m| m.structure.as_str()).collect();
        for molecule in &commit.molecules {
            if !structures.insert(molecule.structure.as_str()) {
                return Err(StoreError::Integrity(format!("duplicate structure {} in run {}", molecule.structure, commit.run_id)));
            }
        }

        let now = Utc::now();
        let next_seq = record.traces.len() as u64;
        let entries = ledger::stamp(commit.run_id, next_seq, now, commit.traces);
        debug!("Commit run {} ronda {}: {} moléculas, {} trazas",
               commit.run_id,
               commit.current_round,
               commit.molecules.len(),
               entries.len());
        record.molecules.extend(commit.molecules);
        record.traces.extend(entries);
        let run = &mut record.run;
        run.status = commit.status;
        run.current_round = commit.current_round;
        if commit.result_set.is_some() {
            run.result_set = commit.result_set;
        }
        if commit.result_fingerprint.is_some() {
            run.result_fingerprint = commit.result_fingerprint;
        }
        if commit.error_message.is_some() {
            run.error_message = commit.error_message;
        }
        run.updated_at = now;
        Ok(run.clone())
    }

    fn list_runs(&self) -> Result<Vec<Run>, StoreError> {
        let mut runs: Vec<Run> = self.inner.iter().map(|r| r.run.clone()).collect();
        runs.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(runs)
    }
}
