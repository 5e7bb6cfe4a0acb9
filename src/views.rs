//! Respuestas de la fachada: estado de ejecución, moléculas y trazas.

use chem_domain::{DescriptorSet, Molecule, Run, RunStatus, TraceEntry, TraceOutcome};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunStatusView {
    pub run_id: Uuid,
    pub status: RunStatus,
    pub current_round: u32,
    pub num_rounds: u32,
    pub config_hash: String,
    pub result_set: Option<Vec<String>>,
    pub result_fingerprint: Option<String>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Run> for RunStatusView {
    fn from(run: Run) -> Self {
        Self { run_id: run.id,
               status: run.status,
               current_round: run.current_round,
               num_rounds: run.config.num_rounds,
               config_hash: run.config_hash,
               result_set: run.result_set,
               result_fingerprint: run.result_fingerprint,
               error_message: run.error_message,
               created_at: run.created_at,
               updated_at: run.updated_at }
    }
}

/// Fila del listado de moléculas (orden de descubrimiento).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoleculeView {
    pub structure: String,
    pub score: f64,
    pub violations: u32,
    pub descriptors: DescriptorSet,
    pub round: u32,
    pub parent: Option<String>,
    pub rule: Option<String>,
    pub discard_reason: Option<String>,
}

impl From<Molecule> for MoleculeView {
    fn from(m: Molecule) -> Self {
        Self { structure: m.structure,
               score: m.score,
               violations: m.violations,
               descriptors: m.descriptors,
               round: m.origin_round,
               parent: m.parent,
               rule: m.rule,
               discard_reason: m.discard_reason }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceView {
    pub seq: u64,
    pub timestamp: DateTime<Utc>,
    pub round: u32,
    pub agent: String,
    pub action: String,
    pub outcome: TraceOutcome,
    /// Una línea legible con lo esencial del payload.
    pub summary: String,
    pub payload: serde_json::Value,
}

impl From<TraceEntry> for TraceView {
    fn from(entry: TraceEntry) -> Self {
        let summary = summarize(&entry);
        Self { seq: entry.seq,
               timestamp: entry.timestamp,
               round: entry.round,
               agent: entry.agent.to_string(),
               action: entry.action,
               outcome: entry.outcome,
               summary,
               payload: entry.payload }
    }
}

fn summarize(entry: &TraceEntry) -> String {
    let p = &entry.payload;
    let text = |key: &str| p[key].as_str().unwrap_or("?").to_string();
    match entry.action.as_str() {
        "start" => format!("started with {} valid seed(s) for {} round(s)", p["valid_seeds"], p["num_rounds"]),
        "complete" => format!("completed ({}) with {} result(s)",
                              text("reason"),
                              p["result_set"].as_array().map_or(0, Vec::len)),
        "fail" => format!("failed: {}", text("cause")),
        "plan" => format!("{} strategy over {} parent(s), breadth {}", text("strategy"), p["parents"], p["breadth"]),
        "generate" => format!("{} candidate(s), {} duplicate(s), {} invalid product(s)",
                              p["candidates"], p["duplicates"], p["discards"]),
        "evaluate" => match p["discard_reason"].as_str() {
            Some(reason) => format!("{} scored {} ({})", text("structure"), p["score"], reason),
            None => format!("{} scored {}", text("structure"), p["score"]),
        },
        "duplicate" => format!("{} already known", text("structure")),
        "discard" => format!("{} discarded ({}): {}", text("structure"), text("kind"), text("reason")),
        "rank" => format!("top {} of {} eligible", p["ranking"].as_array().map_or(0, Vec::len), p["eligible"]),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chem_domain::{Agent, RunConfig, TraceEvent};
    use serde_json::json;

    #[test]
    fn discard_summary_names_kind_and_reason() {
        let event = TraceEvent::discarded(1,
                                          Agent::ChemistryEvaluator,
                                          "discard",
                                          json!({"structure": "C1CC(", "kind": "parse", "reason": "unclosed ring"}));
        let view = TraceView::from(TraceEntry::stamp(Uuid::nil(), 4, Utc::now(), event));
        assert_eq!(view.seq, 4);
        assert_eq!(view.agent, "ChemistryEvaluator");
        assert_eq!(view.summary, "C1CC( discarded (parse): unclosed ring");
    }

    #[test]
    fn status_view_exposes_round_progress() {
        let run = Run::new(RunConfig::new(vec!["CCO".into()], 4, 5, 3));
        let view = RunStatusView::from(run.clone());
        assert_eq!((view.current_round, view.num_rounds), (0, 4));
        assert_eq!(view.status, RunStatus::Pending);
        assert_eq!(serde_json::to_value(&view).expect("json")["status"], "PENDING");
    }
}
