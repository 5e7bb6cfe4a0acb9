//! PipelineOrchestrator: bucle de rondas ejecutado como unidad de trabajo.
//!
//! Cada ronda se calcula a partir de lo persistido (moléculas y estado de
//! la ejecución), nunca de estado en memoria de una invocación anterior.
//! Así una entrega repetida de la misma tarea reanuda exactamente donde
//! quedó el último commit.

use std::collections::HashSet;
use std::sync::Arc;

use chem_agents::{Candidate, GenerationOutput, GeneratorAgent, PlannerAgent, RankerAgent, RoundSummary};
use chem_domain::{Agent, ChemistryError, ChemistryEvaluator, EmptyRoundPolicy, Evaluation, Molecule, MutationLibrary,
                  Run, RunConfig, RunStatus, ScoringService};
use log::{debug, error, info, warn};
use rayon::prelude::*;
use serde_json::json;
use uuid::Uuid;

use crate::errors::OrchestrationError;
use crate::ledger::TraceLedger;
use crate::state_machine::{Pickup, RunStateMachine};
use crate::store::{RoundCommit, RunRepository};
use crate::summary::{fingerprint_results, RunSummary};

pub const DEFAULT_MAX_MATCHES_PER_RULE: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrchestratorOptions {
    /// Evalúa los candidatos de una ronda en el pool de rayon.
    pub parallel_eval: bool,
    /// Sitios de coincidencia máximos por regla y padre.
    pub max_matches_per_rule: usize,
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self { parallel_eval: true,
               max_matches_per_rule: DEFAULT_MAX_MATCHES_PER_RULE }
    }
}

pub struct PipelineOrchestrator<R>
    where R: RunRepository
{
    repo: R,
    evaluator: ChemistryEvaluator,
    library: Arc<MutationLibrary>,
    options: OrchestratorOptions,
}

impl<R> PipelineOrchestrator<R> where R: RunRepository
{
    pub fn new(repo: R, library: Arc<MutationLibrary>) -> Self {
        Self { repo,
               evaluator: ChemistryEvaluator::new(),
               library,
               options: OrchestratorOptions::default() }
    }

    pub fn with_options(mut self, options: OrchestratorOptions) -> Self {
        self.options = options;
        self
    }

    pub fn repository(&self) -> &R {
        &self.repo
    }

    pub fn library(&self) -> &MutationLibrary {
        &self.library
    }

    /// Registra una ejecución PENDING. No ejecuta nada.
    pub fn submit(&self, config: RunConfig) -> Result<Run, OrchestrationError> {
        let run = Run::new(config);
        self.repo.insert_run(&run)?;
        info!("Run {} registrada (config {})", run.id, run.config_hash);
        Ok(run)
    }

    /// Unidad de trabajo idempotente.
    ///
    /// - COMPLETED/FAILED: no-op, devuelve el estado existente.
    /// - PENDING: valida y arranca; una configuración inválida pasa a FAILED
    ///   sin entrar en RUNNING.
    /// - RUNNING: reanuda en `current_round + 1`.
    ///
    /// Un error de almacenamiento irrecuperable lleva la ejecución a FAILED.
    /// Solo devuelve `Err` si ni siquiera ese fallo se pudo registrar.
    pub fn execute(&self, run_id: Uuid) -> Result<RunStatus, OrchestrationError> {
        loop {
            let run = self.repo.load_run(run_id)?;
            let step = match RunStateMachine::pickup(&run) {
                Pickup::AlreadyTerminal(status) => {
                    debug!("Run {} ya terminal ({}), nada que hacer", run_id, status);
                    return Ok(status);
                }
                Pickup::Start => self.start(&run),
                Pickup::Resume { next_round } => self.step(&run, next_round),
            };
            match step {
                Ok(()) => {}
                Err(OrchestrationError::Store(e)) if e.is_conflict() => {
                    warn!("Commit obsoleto en run {}: {}. Releyendo estado", run_id, e);
                }
                Err(e) => return self.abort(run_id, e),
            }
        }
    }

    /// Marca FAILED una ejecución no terminal. No interrumpe una ronda en
    /// curso: su commit será rechazado por obsoleto.
    pub fn cancel(&self, run_id: Uuid, reason: &str) -> Result<RunStatus, OrchestrationError> {
        loop {
            let run = self.repo.load_run(run_id)?;
            if run.status.is_terminal() {
                return Ok(run.status);
            }
            let commit = RunStateMachine::fail(&run, &format!("cancelled: {reason}"), json!({ "cancelled": true }))?;
            match self.repo.commit(commit) {
                Ok(updated) => {
                    info!("Run {} cancelada: {}", run_id, reason);
                    return Ok(updated.status);
                }
                Err(e) if e.is_conflict() => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }

    pub fn summary(&self, run_id: Uuid) -> Result<RunSummary, OrchestrationError> {
        let run = self.repo.load_run(run_id)?;
        let molecules = self.repo.molecules(run_id)?;
        let trace = self.repo.trace(run_id)?;
        Ok(RunSummary::build(&run, &molecules, &trace))
    }

    fn commit(&self, commit: RoundCommit) -> Result<(), OrchestrationError> {
        self.repo.commit(commit)?;
        Ok(())
    }

    fn start(&self, run: &Run) -> Result<(), OrchestrationError> {
        if let Err(e) = run.config.validate() {
            warn!("Run {} con configuración inválida: {}", run.id, e);
            return self.commit(RunStateMachine::fail(run, "invalid run config", json!(e.violations))?);
        }
        let failures: Vec<ChemistryError> = run.config
                                               .seeds
                                               .iter()
                                               .filter_map(|s| self.evaluator.evaluate(s).err())
                                               .collect();
        let valid = run.config.seeds.len() - failures.len();
        if valid == 0 {
            let detail: Vec<String> = failures.iter().map(|e| e.to_string()).collect();
            warn!("Run {} sin semillas válidas", run.id);
            return self.commit(RunStateMachine::fail(run, "no valid seed structure", json!(detail))?);
        }
        info!("Run {} arrancando: {} semillas válidas de {}", run.id, valid, run.config.seeds.len());
        self.commit(RunStateMachine::start(run, valid)?)
    }

    fn step(&self, run: &Run, round: u32) -> Result<(), OrchestrationError> {
        let molecules = self.repo.molecules(run.id)?;
        let config = &run.config;
        if run.current_round >= config.num_rounds {
            return self.complete(run, &molecules, "all rounds finished");
        }
        let last_round_empty = run.current_round >= 1
                               && !molecules.iter().any(|m| m.origin_round == run.current_round);
        if last_round_empty && config.empty_round_policy == EmptyRoundPolicy::Stop {
            return self.complete(run, &molecules, "empty round");
        }
        let commit = self.run_round(run, round, &molecules)?;
        let produced = commit.molecules.len();
        self.commit(commit)?;
        info!("Run {} ronda {}/{} confirmada: {} moléculas nuevas", run.id, round, config.num_rounds, produced);
        Ok(())
    }

    fn complete(&self, run: &Run, molecules: &[Molecule], reason: &str) -> Result<(), OrchestrationError> {
        let ranked = RankerAgent::rank(molecules, run.config.top_k as usize);
        let result_set: Vec<String> = ranked.into_iter().map(|m| m.structure).collect();
        let fingerprint = fingerprint_results(&result_set, molecules);
        info!("Run {} completada ({}): {} resultados, fingerprint {}", run.id, reason, result_set.len(), fingerprint);
        self.commit(RunStateMachine::complete(run, result_set, fingerprint, reason)?)
    }

    fn abort(&self, run_id: Uuid, cause: OrchestrationError) -> Result<RunStatus, OrchestrationError> {
        error!("Run {} abortada: {}", run_id, cause);
        let run = match self.repo.load_run(run_id) {
            Ok(run) => run,
            Err(e) => {
                error!("No se pudo releer run {} para marcarla FAILED: {}", run_id, e);
                return Err(cause);
            }
        };
        if run.status.is_terminal() {
            return Ok(run.status);
        }
        let commit = RunStateMachine::fail(&run,
                                           &format!("orchestration error: {cause}"),
                                           json!({ "round": run.current_round + 1 }))?;
        match self.repo.commit(commit) {
            Ok(updated) => Ok(updated.status),
            Err(e) => {
                error!("No se pudo registrar el fallo de run {}: {}", run_id, e);
                Err(cause)
            }
        }
    }

    /// Calcula la ronda completa sin escribir nada.
    fn run_round(&self, run: &Run, round: u32, persisted: &[Molecule]) -> Result<RoundCommit, OrchestrationError> {
        let config = &run.config;
        let top_k = config.top_k as usize;
        let mut ledger = TraceLedger::new();
        let mut seen: HashSet<String> = persisted.iter().map(|m| m.structure.clone()).collect();
        let mut fresh: Vec<Molecule> = Vec::new();

        if round == 1 {
            self.ingest_seeds(config, &mut seen, &mut fresh, &mut ledger);
        }

        let previous = (round > 1).then(|| RoundSummary { round: round - 1,
                                                           survivors: RankerAgent::rank(persisted, top_k).into_iter()
                                                                                                         .map(|m| m.structure)
                                                                                                         .collect(),
                                                           novel_count: persisted.iter()
                                                                                 .filter(|m| m.origin_round == round - 1)
                                                                                 .count() });
        let strategy = PlannerAgent::plan(round, config, previous.as_ref());
        let mut plan_payload = strategy.summary();
        plan_payload["previous_novel"] = json!(previous.as_ref().map(|p| p.novel_count));
        ledger.ok(round, Agent::PlannerAgent, "plan", plan_payload);

        let generation = GeneratorAgent::generate(&self.evaluator,
                                                  &self.library,
                                                  &strategy,
                                                  &seen,
                                                  self.options.max_matches_per_rule);
        self.trace_generation(round, &generation, &mut ledger);

        let evaluations = self.evaluate_all(&generation.candidates);
        for (candidate, result) in generation.candidates.iter().zip(evaluations) {
            match result {
                Ok(evaluation) => {
                    if !seen.insert(evaluation.structure.clone()) {
                        ledger.ok(round,
                                  Agent::ChemistryEvaluator,
                                  "duplicate",
                                  json!({ "origin": "candidate", "structure": evaluation.structure,
                                          "parent": candidate.parent, "rule": candidate.rule }));
                        continue;
                    }
                    let molecule = score(evaluation, round, Some(candidate), config);
                    ledger.ok(round, Agent::ChemistryEvaluator, "evaluate", evaluation_payload("candidate", &molecule));
                    fresh.push(molecule);
                }
                Err(e) => {
                    ledger.discarded(round,
                                     Agent::ChemistryEvaluator,
                                     "discard",
                                     json!({ "origin": "candidate", "kind": e.kind(), "structure": candidate.structure,
                                             "parent": candidate.parent, "rule": candidate.rule,
                                             "reason": e.to_string() }));
                }
            }
        }

        let pool: Vec<&Molecule> = persisted.iter().chain(fresh.iter()).collect();
        let eligible = pool.iter().filter(|m| RankerAgent::is_eligible(m)).count();
        let ranked = RankerAgent::rank(pool, top_k);
        ledger.ok(round,
                  Agent::RankerAgent,
                  "rank",
                  json!({
                      "eligible": eligible,
                      "top_k": top_k,
                      "ranking": ranked.iter()
                                       .map(|m| json!({ "structure": m.structure, "score": m.score }))
                                       .collect::<Vec<_>>(),
                  }));

        debug!("Run {} ronda {}: {} trazas, {} descartes", run.id, round, ledger.len(), ledger.discard_count());
        RunStateMachine::advance(run, round, fresh, ledger.into_events())
    }

    fn ingest_seeds(&self, config: &RunConfig, seen: &mut HashSet<String>, fresh: &mut Vec<Molecule>, ledger: &mut TraceLedger) {
        for seed in &config.seeds {
            match self.evaluator.evaluate(seed) {
                Ok(evaluation) => {
                    if !seen.insert(evaluation.structure.clone()) {
                        ledger.ok(1,
                                  Agent::ChemistryEvaluator,
                                  "duplicate",
                                  json!({ "origin": "seed", "input": seed, "structure": evaluation.structure }));
                        continue;
                    }
                    let molecule = score(evaluation, 0, None, config);
                    ledger.ok(1, Agent::ChemistryEvaluator, "evaluate", evaluation_payload("seed", &molecule));
                    fresh.push(molecule);
                }
                Err(e) => ledger.discarded(1,
                                           Agent::ChemistryEvaluator,
                                           "discard",
                                           json!({ "origin": "seed", "kind": e.kind(), "structure": seed,
                                                   "reason": e.to_string() })),
            }
        }
    }

    fn trace_generation(&self, round: u32, generation: &GenerationOutput, ledger: &mut TraceLedger) {
        ledger.ok(round, Agent::GeneratorAgent, "generate", generation.summary());
        for lineage in &generation.duplicates {
            ledger.ok(round,
                      Agent::ChemistryEvaluator,
                      "duplicate",
                      json!({ "origin": "candidate", "structure": lineage.structure,
                              "parent": lineage.parent, "rule": lineage.rule }));
        }
        for discard in &generation.discards {
            ledger.discarded(round,
                             Agent::ChemistryEvaluator,
                             "discard",
                             json!({ "origin": "mutation", "kind": "mutation", "rule": discard.rule(),
                                     "parent": discard.parent(), "structure": discard.product(),
                                     "reason": discard.to_string() }));
        }
    }

    /// Resultados en el mismo orden que los candidatos.
    fn evaluate_all(&self, candidates: &[Candidate]) -> Vec<Result<Evaluation, ChemistryError>> {
        if self.options.parallel_eval {
            candidates.par_iter()
                      .map(|c| self.evaluator.evaluate(&c.structure))
                      .collect()
        } else {
            candidates.iter()
                      .map(|c| self.evaluator.evaluate(&c.structure))
                      .collect()
        }
    }
}

fn score(evaluation: Evaluation, round: u32, origin: Option<&Candidate>, config: &RunConfig) -> Molecule {
    let card = ScoringService::score(&evaluation.descriptors, &config.filters);
    Molecule { structure: evaluation.structure,
               origin_round: round,
               parent: origin.map(|c| c.parent.clone()),
               rule: origin.map(|c| c.rule.clone()),
               descriptors: evaluation.descriptors,
               score: card.score,
               violations: card.violations,
               discard_reason: card.screening_discard(&config.filters) }
}

fn evaluation_payload(origin: &str, molecule: &Molecule) -> serde_json::Value {
    json!({
        "origin": origin,
        "structure": molecule.structure,
        "parent": molecule.parent,
        "rule": molecule.rule,
        "qed": molecule.descriptors.qed,
        "score": molecule.score,
        "violations": molecule.violations,
        "discard_reason": molecule.discard_reason,
    })
}
