//! TraceLedger: registro append-only de invocaciones de agentes.
//!
//! Durante una unidad de trabajo los eventos se acumulan en memoria en el
//! orden en que ocurren. El almacén les asigna `seq` al confirmar la ronda,
//! dentro de la misma transacción que las moléculas, de modo que una ronda
//! abortada no deja trazas parciales.

use chem_domain::{Agent, TraceEntry, TraceEvent, TraceOutcome};
use chrono::{DateTime, Utc};
use uuid::Uuid;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TraceLedger {
    events: Vec<TraceEvent>,
}

impl TraceLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, event: TraceEvent) {
        self.events.push(event);
    }

    pub fn ok(&mut self, round: u32, agent: Agent, action: &str, payload: serde_json::Value) {
        self.record(TraceEvent::ok(round, agent, action, payload));
    }

    pub fn discarded(&mut self, round: u32, agent: Agent, action: &str, payload: serde_json::Value) {
        self.record(TraceEvent::discarded(round, agent, action, payload));
    }

    pub fn failed(&mut self, round: u32, agent: Agent, action: &str, payload: serde_json::Value) {
        self.record(TraceEvent::failed(round, agent, action, payload));
    }

    pub fn events(&self) -> &[TraceEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn discard_count(&self) -> usize {
        self.events.iter().filter(|e| e.outcome == TraceOutcome::Discarded).count()
    }

    pub fn into_events(self) -> Vec<TraceEvent> {
        self.events
    }
}

/// Asigna números de secuencia consecutivos a partir de `next_seq`.
pub fn stamp(run_id: Uuid, next_seq: u64, at: DateTime<Utc>, events: Vec<TraceEvent>) -> Vec<TraceEntry> {
    events.into_iter()
          .zip(next_seq..)
          .map(|(event, seq)| TraceEntry::stamp(run_id, seq, at, event))
          .collect()
}

/// Comprueba que las secuencias empiezan en 0 y crecen sin huecos.
pub fn verify_sequence(entries: &[TraceEntry]) -> Result<(), String> {
    for (expected, entry) in entries.iter().enumerate() {
        if entry.seq != expected as u64 {
            return Err(format!("seq {} found at position {}", entry.seq, expected));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn stamping_continues_from_next_seq() {
        let mut ledger = TraceLedger::new();
        ledger.ok(1, Agent::PlannerAgent, "plan", json!({}));
        ledger.discarded(1, Agent::ChemistryEvaluator, "discard", json!({"kind": "parse"}));
        assert_eq!(ledger.discard_count(), 1);
        let entries = stamp(Uuid::nil(), 3, Utc::now(), ledger.into_events());
        let seqs: Vec<u64> = entries.iter().map(|e| e.seq).collect();
        assert_eq!(seqs, vec![3, 4]);
        assert_eq!(entries[1].outcome, TraceOutcome::Discarded);
    }

    proptest! {
        #[test]
        fn appended_batches_stay_contiguous(batches in proptest::collection::vec(0usize..6, 0..8)) {
            let mut entries: Vec<TraceEntry> = Vec::new();
            for size in batches {
                let events = (0..size).map(|_| TraceEvent::ok(1, Agent::RankerAgent, "rank", json!({}))).collect();
                let next_seq = entries.len() as u64;
                entries.extend(stamp(Uuid::nil(), next_seq, Utc::now(), events));
            }
            prop_assert!(verify_sequence(&entries).is_ok());
        }
    }

    #[test]
    fn gaps_are_detected() {
        let now = Utc::now();
        let events = vec![TraceEvent::ok(1, Agent::PlannerAgent, "plan", json!({})),
                          TraceEvent::ok(1, Agent::RankerAgent, "rank", json!({}))];
        let entries = stamp(Uuid::nil(), 0, now, events.clone());
        assert!(verify_sequence(&entries).is_ok());
        let shifted = stamp(Uuid::nil(), 1, now, events);
        assert!(verify_sequence(&shifted).is_err());
    }
}
