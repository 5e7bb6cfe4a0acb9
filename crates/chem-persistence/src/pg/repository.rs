use chem_core::ledger;
use chem_core::{RoundCommit, RunRepository, StoreError};
use chem_domain::{Molecule, Run, TraceEntry};
use chrono::Utc;
use diesel::dsl::{count_star, max};
use diesel::prelude::*;
use log::debug;
use uuid::Uuid;

use super::rows::{to_db_int, MoleculeRow, NewMoleculeRow, NewRunRow, RunChanges, RunRow, TraceRow};
use super::{with_retry, ConnectionProvider};
use crate::error::PersistenceError;
use crate::schema::{agent_traces, discovery_runs, molecules};

/// Repositorio Postgres de ejecuciones, moléculas y trazas.
pub struct PgRunRepository<P: ConnectionProvider> {
    pub provider: P,
}

impl<P: ConnectionProvider> PgRunRepository<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    fn find_run(&self, run_id: Uuid) -> Result<Run, PersistenceError> {
        let row: Option<RunRow> = with_retry(|| {
            let mut conn = self.provider.connection()?;
            discovery_runs::table.find(run_id)
                                 .select(RunRow::as_select())
                                 .first(&mut conn)
                                 .optional()
                                 .map_err(PersistenceError::from)
        })?;
        row.ok_or(PersistenceError::RunNotFound(run_id))?.into_run()
    }

    fn apply(&self, commit: &RoundCommit) -> Result<Run, PersistenceError> {
        with_retry(|| {
            let mut conn = self.provider.connection()?;
            conn.build_transaction()
                .read_write()
                .run(|tx| apply_in_tx(tx, commit))
        })
    }
}

/// Cuerpo transaccional del commit. Cualquier error revierte todo.
fn apply_in_tx(tx: &mut PgConnection, commit: &RoundCommit) -> Result<Run, PersistenceError> {
    let run_id = commit.run_id;
    let locked: RunRow = discovery_runs::table.find(run_id)
                                              .select(RunRow::as_select())
                                              .for_update()
                                              .first(tx)
                                              .optional()?
                                              .ok_or(PersistenceError::RunNotFound(run_id))?;
    commit.check_expected(&locked.into_run()?)?;

    let existing: i64 = molecules::table.filter(molecules::run_id.eq(run_id))
                                        .select(count_star())
                                        .first(tx)?;
    let base = i32::try_from(existing).map_err(|e| PersistenceError::Mapping(format!("position: {e}")))?;
    let rows = commit.molecules
                     .iter()
                     .zip(base..)
                     .map(|(m, position)| NewMoleculeRow::new(run_id, position, m))
                     .collect::<Result<Vec<_>, _>>()?;
    if !rows.is_empty() {
        diesel::insert_into(molecules::table).values(&rows).execute(tx)?;
    }

    let last_seq: Option<i64> = agent_traces::table.filter(agent_traces::run_id.eq(run_id))
                                                   .select(max(agent_traces::seq))
                                                   .first(tx)?;
    let next_seq = last_seq.map_or(0, |s| s as u64 + 1);
    let now = Utc::now();
    let traces = ledger::stamp(run_id, next_seq, now, commit.traces.clone()).into_iter()
                                                                           .map(TraceRow::from_entry)
                                                                           .collect::<Result<Vec<_>, _>>()?;
    if !traces.is_empty() {
        diesel::insert_into(agent_traces::table).values(&traces).execute(tx)?;
    }

    let result_set = commit.result_set
                           .as_ref()
                           .map(serde_json::to_value)
                           .transpose()
                           .map_err(|e| PersistenceError::Mapping(format!("result_set: {e}")))?;
    let changes = RunChanges { status: commit.status.as_str(),
                               current_round: to_db_int(commit.current_round, "current_round")?,
                               result_set,
                               result_fingerprint: commit.result_fingerprint.as_deref(),
                               error_message: commit.error_message.as_deref(),
                               updated_at: now };
    let updated: RunRow = diesel::update(discovery_runs::table.find(run_id)).set(&changes)
                                                                            .returning(RunRow::as_returning())
                                                                            .get_result(tx)?;
    debug!("Commit run {} ronda {}: {} moléculas, {} trazas desde seq {}",
           run_id,
           commit.current_round,
           rows.len(),
           traces.len(),
           next_seq);
    updated.into_run()
}

impl<P: ConnectionProvider> RunRepository for PgRunRepository<P> {
    fn insert_run(&self, run: &Run) -> Result<(), StoreError> {
        let row = NewRunRow::from_run(run)?;
        with_retry(|| {
            let mut conn = self.provider.connection()?;
            diesel::insert_into(discovery_runs::table).values(&row)
                                                      .execute(&mut conn)
                                                      .map_err(PersistenceError::from)
        })?;
        Ok(())
    }

    fn load_run(&self, run_id: Uuid) -> Result<Run, StoreError> {
        Ok(self.find_run(run_id)?)
    }

    fn molecules(&self, run_id: Uuid) -> Result<Vec<Molecule>, StoreError> {
        self.find_run(run_id)?;
        let rows: Vec<MoleculeRow> = with_retry(|| {
            let mut conn = self.provider.connection()?;
            molecules::table.filter(molecules::run_id.eq(run_id))
                            .order(molecules::position.asc())
                            .select(MoleculeRow::as_select())
                            .load(&mut conn)
                            .map_err(PersistenceError::from)
        })?;
        Ok(rows.into_iter()
               .map(MoleculeRow::into_molecule)
               .collect::<Result<Vec<_>, _>>()?)
    }

    fn trace(&self, run_id: Uuid) -> Result<Vec<TraceEntry>, StoreError> {
        self.find_run(run_id)?;
        let rows: Vec<TraceRow> = with_retry(|| {
            let mut conn = self.provider.connection()?;
            agent_traces::table.filter(agent_traces::run_id.eq(run_id))
                               .order(agent_traces::seq.asc())
                               .select(TraceRow::as_select())
                               .load(&mut conn)
                               .map_err(PersistenceError::from)
        })?;
        Ok(rows.into_iter()
               .map(TraceRow::into_entry)
               .collect::<Result<Vec<_>, _>>()?)
    }

    fn commit(&self, commit: RoundCommit) -> Result<Run, StoreError> {
        Ok(self.apply(&commit)?)
    }

    fn list_runs(&self) -> Result<Vec<Run>, StoreError> {
        let rows: Vec<RunRow> = with_retry(|| {
            let mut conn = self.provider.connection()?;
            discovery_runs::table.order((discovery_runs::created_at.desc(), discovery_runs::id.asc()))
                                 .select(RunRow::as_select())
                                 .load(&mut conn)
                                 .map_err(PersistenceError::from)
        })?;
        Ok(rows.into_iter()
               .map(RunRow::into_run)
               .collect::<Result<Vec<_>, _>>()?)
    }
}
