// run.rs
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::RunConfig;

/// Estado del ciclo de vida. El orden es monótono:
/// PENDING → RUNNING → {COMPLETED, FAILED}.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Pending => "PENDING",
            RunStatus::Running => "RUNNING",
            RunStatus::Completed => "COMPLETED",
            RunStatus::Failed => "FAILED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Failed)
    }

    /// Transiciones permitidas. PENDING puede fallar directamente (config
    /// inválida); los estados terminales no salen nunca.
    pub fn can_transition_to(&self, next: RunStatus) -> bool {
        matches!((self, next),
                 (RunStatus::Pending, RunStatus::Running)
                 | (RunStatus::Pending, RunStatus::Failed)
                 | (RunStatus::Running, RunStatus::Completed)
                 | (RunStatus::Running, RunStatus::Failed))
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(RunStatus::Pending),
            "RUNNING" => Ok(RunStatus::Running),
            "COMPLETED" => Ok(RunStatus::Completed),
            "FAILED" => Ok(RunStatus::Failed),
            other => Err(format!("unknown run status '{other}'")),
        }
    }
}

/// Ejecución de descubrimiento. `current_round` es la última ronda
/// confirmada (0 = ninguna).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Run {
    pub id: Uuid,
    pub config: RunConfig,
    pub config_hash: String,
    pub status: RunStatus,
    pub current_round: u32,
    pub result_set: Option<Vec<String>>,
    pub result_fingerprint: Option<String>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Run {
    pub fn new(config: RunConfig) -> Self {
        Self::with_id(Uuid::new_v4(), config)
    }

    pub fn with_id(id: Uuid, config: RunConfig) -> Self {
        let now = Utc::now();
        let config_hash = config.config_hash();
        Self { id,
               config,
               config_hash,
               status: RunStatus::Pending,
               current_round: 0,
               result_set: None,
               result_fingerprint: None,
               error_message: None,
               created_at: now,
               updated_at: now }
    }

    /// Rondas que quedan por ejecutar.
    pub fn remaining_rounds(&self) -> u32 {
        self.config.num_rounds.saturating_sub(self.current_round)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transitions_are_monotonic() {
        use RunStatus::*;
        assert!(Pending.can_transition_to(Running));
        assert!(Pending.can_transition_to(Failed));
        assert!(Running.can_transition_to(Completed));
        assert!(!Running.can_transition_to(Pending));
        assert!(!Completed.can_transition_to(Failed));
        assert!(!Failed.can_transition_to(Running));
        assert!(!Pending.can_transition_to(Completed));
    }

    #[test]
    fn status_round_trips_through_text() {
        for status in [RunStatus::Pending, RunStatus::Running, RunStatus::Completed, RunStatus::Failed] {
            assert_eq!(status.as_str().parse::<RunStatus>(), Ok(status));
            assert_eq!(serde_json::to_value(status).expect("json"), status.as_str());
        }
        assert!("DONE".parse::<RunStatus>().is_err());
    }

    #[test]
    fn new_run_is_pending_at_round_zero() {
        let run = Run::new(RunConfig::new(vec!["CCO".into()], 2, 5, 3));
        assert_eq!(run.status, RunStatus::Pending);
        assert_eq!(run.current_round, 0);
        assert_eq!(run.remaining_rounds(), 2);
        assert_eq!(run.config_hash, run.config.config_hash());
    }
}
