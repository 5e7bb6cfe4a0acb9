//! Resumen de una ejecución y fingerprint de resultados.

use chem_agents::RankerAgent;
use chem_domain::{Agent, Molecule, Run, RunStatus, ScoringService, TraceEntry, TraceOutcome};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::hashing::hash_value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub status: RunStatus,
    pub current_round: u32,
    /// Productos generados: válidos, rechazados por el evaluador y
    /// descartados por la propia regla.
    pub total_generated: usize,
    /// Candidatos con descriptores calculados.
    pub total_valid: usize,
    pub total_passed_screening: usize,
    pub result_count: usize,
    /// Descartes por tipo (`parse`, `compute`, `mutation`) y umbrales
    /// superados por los candidatos válidos.
    pub failure_breakdown: IndexMap<String, usize>,
    pub top_molecules: Vec<Molecule>,
}

impl RunSummary {
    pub fn build(run: &Run, molecules: &[Molecule], trace: &[TraceEntry]) -> Self {
        let generated: Vec<&Molecule> = molecules.iter().filter(|m| !m.is_seed()).collect();
        let discards: Vec<&TraceEntry> = trace.iter()
                                              .filter(|e| e.agent == Agent::ChemistryEvaluator && e.outcome == TraceOutcome::Discarded)
                                              .collect();
        let generated_discards = discards.iter()
                                         .filter(|e| e.payload["origin"] == "candidate" || e.payload["origin"] == "mutation")
                                         .count();

        let mut failure_breakdown: IndexMap<String, usize> = IndexMap::new();
        for kind in ["parse", "compute", "mutation"] {
            let count = discards.iter().filter(|e| e.payload["kind"] == kind).count();
            if count > 0 {
                failure_breakdown.insert(kind.to_string(), count);
            }
        }
        for molecule in &generated {
            let card = ScoringService::score(&molecule.descriptors, &run.config.filters);
            for threshold in card.exceeded {
                *failure_breakdown.entry(threshold.as_str().to_string()).or_insert(0) += 1;
            }
        }

        let top_molecules = match &run.result_set {
            Some(result_set) => result_set.iter()
                                          .filter_map(|s| molecules.iter().find(|m| &m.structure == s).cloned())
                                          .collect(),
            None => RankerAgent::rank(molecules, run.config.top_k as usize),
        };

        Self { run_id: run.id,
               status: run.status,
               current_round: run.current_round,
               total_generated: generated.len() + generated_discards,
               total_valid: generated.len(),
               total_passed_screening: generated.iter().filter(|m| !m.is_discarded()).count(),
               result_count: run.result_set.as_ref().map_or(0, Vec::len),
               failure_breakdown,
               top_molecules }
    }
}

/// Fingerprint reproducible del resultado: ranking final más todas las
/// filas de moléculas (sin marcas de tiempo).
pub fn fingerprint_results(result_set: &[String], molecules: &[Molecule]) -> String {
    hash_value(&json!({
        "result_set": result_set,
        "molecules": molecules,
    }))
}
