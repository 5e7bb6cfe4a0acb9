//! Filas Diesel y su mapeo a tipos de dominio.

use chem_domain::{Agent, DescriptorSet, Molecule, Run, RunConfig, RunStatus, TraceEntry, TraceOutcome};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde_json::Value;
use uuid::Uuid;

use crate::error::PersistenceError;
use crate::schema::{agent_traces, discovery_runs, molecules};

fn mapping<E: std::fmt::Display>(field: &str) -> impl FnOnce(E) -> PersistenceError + '_ {
    move |e| PersistenceError::Mapping(format!("{field}: {e}"))
}

pub(crate) fn to_db_int(value: u32, field: &str) -> Result<i32, PersistenceError> {
    i32::try_from(value).map_err(mapping(field))
}

fn from_db_int(value: i32, field: &str) -> Result<u32, PersistenceError> {
    u32::try_from(value).map_err(mapping(field))
}

#[derive(Queryable, Selectable, Debug)]
#[diesel(table_name = discovery_runs, check_for_backend(diesel::pg::Pg))]
pub(crate) struct RunRow {
    pub id: Uuid,
    pub config: Value,
    pub config_hash: String,
    pub status: String,
    pub current_round: i32,
    pub result_set: Option<Value>,
    pub result_fingerprint: Option<String>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RunRow {
    pub fn into_run(self) -> Result<Run, PersistenceError> {
        let config: RunConfig = serde_json::from_value(self.config).map_err(mapping("config"))?;
        let status: RunStatus = self.status.parse().map_err(mapping("status"))?;
        let result_set = self.result_set
                             .map(serde_json::from_value::<Vec<String>>)
                             .transpose()
                             .map_err(mapping("result_set"))?;
        Ok(Run { id: self.id,
                 config,
                 config_hash: self.config_hash,
                 status,
                 current_round: from_db_int(self.current_round, "current_round")?,
                 result_set,
                 result_fingerprint: self.result_fingerprint,
                 error_message: self.error_message,
                 created_at: self.created_at,
                 updated_at: self.updated_at })
    }
}

#[derive(Insertable, Debug)]
#[diesel(table_name = discovery_runs)]
pub(crate) struct NewRunRow<'a> {
    pub id: Uuid,
    pub config: Value,
    pub config_hash: &'a str,
    pub status: &'a str,
    pub current_round: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl<'a> NewRunRow<'a> {
    pub fn from_run(run: &'a Run) -> Result<Self, PersistenceError> {
        Ok(Self { id: run.id,
                  config: serde_json::to_value(&run.config).map_err(mapping("config"))?,
                  config_hash: &run.config_hash,
                  status: run.status.as_str(),
                  current_round: to_db_int(run.current_round, "current_round")?,
                  created_at: run.created_at,
                  updated_at: run.updated_at })
    }
}

/// Cambios de estado de una ejecución. Los `None` no se tocan.
#[derive(AsChangeset, Debug)]
#[diesel(table_name = discovery_runs)]
pub(crate) struct RunChanges<'a> {
    pub status: &'a str,
    pub current_round: i32,
    pub result_set: Option<Value>,
    pub result_fingerprint: Option<&'a str>,
    pub error_message: Option<&'a str>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Queryable, Selectable, Debug)]
#[diesel(table_name = molecules, check_for_backend(diesel::pg::Pg))]
pub(crate) struct MoleculeRow {
    pub structure: String,
    pub origin_round: i32,
    pub parent: Option<String>,
    pub rule: Option<String>,
    pub descriptors: Value,
    pub score: f64,
    pub violations: i32,
    pub discard_reason: Option<String>,
}

impl MoleculeRow {
    pub fn into_molecule(self) -> Result<Molecule, PersistenceError> {
        let descriptors: DescriptorSet = serde_json::from_value(self.descriptors).map_err(mapping("descriptors"))?;
        Ok(Molecule { structure: self.structure,
                      origin_round: from_db_int(self.origin_round, "origin_round")?,
                      parent: self.parent,
                      rule: self.rule,
                      descriptors,
                      score: self.score,
                      violations: from_db_int(self.violations, "violations")?,
                      discard_reason: self.discard_reason })
    }
}

#[derive(Insertable, Debug)]
#[diesel(table_name = molecules)]
pub(crate) struct NewMoleculeRow<'a> {
    pub run_id: Uuid,
    pub position: i32,
    pub structure: &'a str,
    pub origin_round: i32,
    pub parent: Option<&'a str>,
    pub rule: Option<&'a str>,
    pub descriptors: Value,
    pub score: f64,
    pub violations: i32,
    pub discard_reason: Option<&'a str>,
}

impl<'a> NewMoleculeRow<'a> {
    pub fn new(run_id: Uuid, position: i32, m: &'a Molecule) -> Result<Self, PersistenceError> {
        Ok(Self { run_id,
                  position,
                  structure: &m.structure,
                  origin_round: to_db_int(m.origin_round, "origin_round")?,
                  parent: m.parent.as_deref(),
                  rule: m.rule.as_deref(),
                  descriptors: serde_json::to_value(m.descriptors).map_err(mapping("descriptors"))?,
                  score: m.score,
                  violations: to_db_int(m.violations, "violations")?,
                  discard_reason: m.discard_reason.as_deref() })
    }
}

#[derive(Queryable, Selectable, Insertable, Debug)]
#[diesel(table_name = agent_traces, check_for_backend(diesel::pg::Pg))]
pub(crate) struct TraceRow {
    pub run_id: Uuid,
    pub seq: i64,
    pub ts: DateTime<Utc>,
    pub round: i32,
    pub agent: String,
    pub action: String,
    pub outcome: String,
    pub payload: Value,
}

impl TraceRow {
    pub fn from_entry(entry: TraceEntry) -> Result<Self, PersistenceError> {
        Ok(Self { run_id: entry.run_id,
                  seq: i64::try_from(entry.seq).map_err(mapping("seq"))?,
                  ts: entry.timestamp,
                  round: to_db_int(entry.round, "round")?,
                  agent: entry.agent.as_str().to_string(),
                  action: entry.action,
                  outcome: entry.outcome.as_str().to_string(),
                  payload: entry.payload })
    }

    pub fn into_entry(self) -> Result<TraceEntry, PersistenceError> {
        let agent: Agent = self.agent.parse().map_err(mapping("agent"))?;
        let outcome: TraceOutcome = self.outcome.parse().map_err(mapping("outcome"))?;
        Ok(TraceEntry { run_id: self.run_id,
                        seq: u64::try_from(self.seq).map_err(mapping("seq"))?,
                        timestamp: self.ts,
                        round: from_db_int(self.round, "round")?,
                        agent,
                        action: self.action,
                        outcome,
                        payload: self.payload })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chem_domain::TraceEvent;
    use serde_json::json;

    #[test]
    fn run_row_round_trips_through_domain() {
        let mut run = Run::new(RunConfig::new(vec!["CCO".into()], 2, 5, 3));
        run.result_set = Some(vec!["CO".into()]);
        let new_row = NewRunRow::from_run(&run).expect("fila");
        let row = RunRow { id: new_row.id,
                           config: new_row.config.clone(),
                           config_hash: new_row.config_hash.to_string(),
                           status: new_row.status.to_string(),
                           current_round: new_row.current_round,
                           result_set: Some(json!(["CO"])),
                           result_fingerprint: None,
                           error_message: None,
                           created_at: run.created_at,
                           updated_at: run.updated_at };
        assert_eq!(row.into_run().expect("run"), run);
    }

    #[test]
    fn unknown_agent_is_a_mapping_error() {
        let entry = TraceEntry::stamp(Uuid::nil(), 0, Utc::now(), TraceEvent::ok(1, Agent::RankerAgent, "rank", json!({})));
        let mut row = TraceRow::from_entry(entry.clone()).expect("fila");
        assert_eq!(row.agent, "RankerAgent");
        row.agent = "Oracle".into();
        assert!(matches!(row.into_entry(), Err(PersistenceError::Mapping(_))));
    }
}
