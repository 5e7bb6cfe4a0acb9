//! RunStateMachine: único punto que construye cambios de estado de una
//! ejecución. Cada transición sale como un `RoundCommit` con su traza.

use chem_domain::{Agent, Molecule, Run, RunStatus, TraceEvent};
use serde_json::json;

use crate::errors::OrchestrationError;
use crate::store::RoundCommit;

/// Qué hacer con una ejecución recogida de la cola.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pickup {
    /// COMPLETED o FAILED: no se ejecuta nada ni se añade traza.
    AlreadyTerminal(RunStatus),
    /// PENDING: validar y arrancar.
    Start,
    /// RUNNING: continuar tras la última ronda confirmada.
    Resume { next_round: u32 },
}

pub struct RunStateMachine;

impl RunStateMachine {
    pub fn pickup(run: &Run) -> Pickup {
        match run.status {
            RunStatus::Completed | RunStatus::Failed => Pickup::AlreadyTerminal(run.status),
            RunStatus::Pending => Pickup::Start,
            RunStatus::Running => Pickup::Resume { next_round: run.current_round + 1 },
        }
    }

    fn transition(run: &Run, to: RunStatus) -> Result<RoundCommit, OrchestrationError> {
        if run.status != to && !run.status.can_transition_to(to) {
            return Err(OrchestrationError::InvalidTransition { from: run.status, to });
        }
        Ok(RoundCommit { run_id: run.id,
                         expected_status: run.status,
                         expected_round: run.current_round,
                         status: to,
                         current_round: run.current_round,
                         molecules: Vec::new(),
                         traces: Vec::new(),
                         result_set: None,
                         result_fingerprint: None,
                         error_message: None })
    }

    /// PENDING → RUNNING.
    pub fn start(run: &Run, valid_seeds: usize) -> Result<RoundCommit, OrchestrationError> {
        let mut commit = Self::transition(run, RunStatus::Running)?;
        commit.traces.push(TraceEvent::ok(0,
                                          Agent::RunStateMachine,
                                          "start",
                                          json!({
                                              "from": run.status,
                                              "config_hash": run.config_hash,
                                              "seeds": run.config.seeds.len(),
                                              "valid_seeds": valid_seeds,
                                              "num_rounds": run.config.num_rounds,
                                          })));
        Ok(commit)
    }

    /// Confirma la ronda `round` con sus moléculas nuevas y trazas.
    pub fn advance(run: &Run,
                   round: u32,
                   molecules: Vec<Molecule>,
                   traces: Vec<TraceEvent>)
                   -> Result<RoundCommit, OrchestrationError> {
        if run.status != RunStatus::Running || round != run.current_round + 1 {
            return Err(OrchestrationError::InvalidTransition { from: run.status,
                                                               to: RunStatus::Running });
        }
        let mut commit = Self::transition(run, RunStatus::Running)?;
        commit.current_round = round;
        commit.molecules = molecules;
        commit.traces = traces;
        Ok(commit)
    }

    /// RUNNING → COMPLETED con el ranking final persistido.
    pub fn complete(run: &Run,
                    result_set: Vec<String>,
                    fingerprint: String,
                    reason: &str)
                    -> Result<RoundCommit, OrchestrationError> {
        let mut commit = Self::transition(run, RunStatus::Completed)?;
        commit.traces.push(TraceEvent::ok(run.current_round,
                                          Agent::RunStateMachine,
                                          "complete",
                                          json!({
                                              "reason": reason,
                                              "rounds": run.current_round,
                                              "result_set": result_set,
                                              "result_fingerprint": fingerprint,
                                          })));
        commit.result_set = Some(result_set);
        commit.result_fingerprint = Some(fingerprint);
        Ok(commit)
    }

    /// PENDING/RUNNING → FAILED con la causa en la traza.
    pub fn fail(run: &Run, cause: &str, detail: serde_json::Value) -> Result<RoundCommit, OrchestrationError> {
        let mut commit = Self::transition(run, RunStatus::Failed)?;
        commit.traces.push(TraceEvent::failed(run.current_round,
                                              Agent::RunStateMachine,
                                              "fail",
                                              json!({
                                                  "from": run.status,
                                                  "cause": cause,
                                                  "detail": detail,
                                              })));
        commit.error_message = Some(cause.to_string());
        Ok(commit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chem_domain::{RunConfig, TraceOutcome};

    fn run(status: RunStatus, round: u32) -> Run {
        let mut run = Run::new(RunConfig::new(vec!["CCO".into()], 2, 5, 3));
        run.status = status;
        run.current_round = round;
        run
    }

    #[test]
    fn pickup_follows_status() {
        assert_eq!(RunStateMachine::pickup(&run(RunStatus::Pending, 0)), Pickup::Start);
        assert_eq!(RunStateMachine::pickup(&run(RunStatus::Running, 1)), Pickup::Resume { next_round: 2 });
        assert_eq!(RunStateMachine::pickup(&run(RunStatus::Completed, 2)),
                   Pickup::AlreadyTerminal(RunStatus::Completed));
        assert_eq!(RunStateMachine::pickup(&run(RunStatus::Failed, 0)), Pickup::AlreadyTerminal(RunStatus::Failed));
    }

    #[test]
    fn commits_carry_expected_state() {
        let r = run(RunStatus::Running, 1);
        let commit = RunStateMachine::advance(&r, 2, Vec::new(), Vec::new()).expect("avance");
        assert_eq!((commit.expected_status, commit.expected_round), (RunStatus::Running, 1));
        assert_eq!((commit.status, commit.current_round), (RunStatus::Running, 2));
        assert!(RunStateMachine::advance(&r, 3, Vec::new(), Vec::new()).is_err());
    }

    #[test]
    fn terminal_states_cannot_move() {
        let done = run(RunStatus::Completed, 2);
        assert!(RunStateMachine::fail(&done, "late", json!(null)).is_err());
        assert!(RunStateMachine::start(&done, 1).is_err());
        let pending = run(RunStatus::Pending, 0);
        assert!(RunStateMachine::complete(&pending, vec![], String::new(), "x").is_err());
    }

    #[test]
    fn failure_records_cause() {
        let commit = RunStateMachine::fail(&run(RunStatus::Pending, 0), "invalid config", json!(["top_k"])).expect("fallo");
        assert_eq!(commit.status, RunStatus::Failed);
        assert_eq!(commit.error_message.as_deref(), Some("invalid config"));
        assert_eq!(commit.traces[0].outcome, TraceOutcome::Failed);
        assert_eq!(commit.traces[0].action, "fail");
    }
}
