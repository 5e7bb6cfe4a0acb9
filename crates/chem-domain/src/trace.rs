// trace.rs
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Componente que origina una entrada de traza.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Agent {
    RunStateMachine,
    PlannerAgent,
    GeneratorAgent,
    ChemistryEvaluator,
    RankerAgent,
}

impl Agent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Agent::RunStateMachine => "RunStateMachine",
            Agent::PlannerAgent => "PlannerAgent",
            Agent::GeneratorAgent => "GeneratorAgent",
            Agent::ChemistryEvaluator => "ChemistryEvaluator",
            Agent::RankerAgent => "RankerAgent",
        }
    }
}

impl fmt::Display for Agent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Agent {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [Agent::RunStateMachine,
         Agent::PlannerAgent,
         Agent::GeneratorAgent,
         Agent::ChemistryEvaluator,
         Agent::RankerAgent].into_iter()
                            .find(|a| a.as_str() == s)
                            .ok_or_else(|| format!("unknown agent '{s}'"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TraceOutcome {
    Ok,
    Discarded,
    Failed,
}

impl TraceOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            TraceOutcome::Ok => "ok",
            TraceOutcome::Discarded => "discarded",
            TraceOutcome::Failed => "failed",
        }
    }
}

impl FromStr for TraceOutcome {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ok" => Ok(TraceOutcome::Ok),
            "discarded" => Ok(TraceOutcome::Discarded),
            "failed" => Ok(TraceOutcome::Failed),
            other => Err(format!("unknown trace outcome '{other}'")),
        }
    }
}

/// Invocación de agente aún sin número de secuencia.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceEvent {
    pub round: u32,
    pub agent: Agent,
    pub action: String,
    pub outcome: TraceOutcome,
    pub payload: serde_json::Value,
}

impl TraceEvent {
    pub fn ok(round: u32, agent: Agent, action: &str, payload: serde_json::Value) -> Self {
        Self { round,
               agent,
               action: action.to_string(),
               outcome: TraceOutcome::Ok,
               payload }
    }

    pub fn discarded(round: u32, agent: Agent, action: &str, payload: serde_json::Value) -> Self {
        Self { outcome: TraceOutcome::Discarded,
               ..Self::ok(round, agent, action, payload) }
    }

    pub fn failed(round: u32, agent: Agent, action: &str, payload: serde_json::Value) -> Self {
        Self { outcome: TraceOutcome::Failed,
               ..Self::ok(round, agent, action, payload) }
    }

    pub fn is_discard(&self) -> bool {
        self.outcome == TraceOutcome::Discarded
    }
}

/// Entrada confirmada del ledger. Solo se añade; nunca se modifica.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceEntry {
    pub run_id: Uuid,
    pub seq: u64,
    pub timestamp: DateTime<Utc>,
    pub round: u32,
    pub agent: Agent,
    pub action: String,
    pub outcome: TraceOutcome,
    pub payload: serde_json::Value,
}

impl TraceEntry {
    pub fn stamp(run_id: Uuid, seq: u64, timestamp: DateTime<Utc>, event: TraceEvent) -> Self {
        Self { run_id,
               seq,
               timestamp,
               round: event.round,
               agent: event.agent,
               action: event.action,
               outcome: event.outcome,
               payload: event.payload }
    }
}
