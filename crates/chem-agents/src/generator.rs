use std::collections::HashSet;

use chem_domain::{ChemistryError, ChemistryEvaluator, MutationError, MutationLibrary};
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::Strategy;

/// Estructura nueva, válida y canónica, con su linaje.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Candidate {
    pub structure: String,
    pub parent: String,
    pub rule: String,
}

/// Producto ya conocido en la ejecución o en el lote: se registra el
/// linaje pero no genera una molécula nueva.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct LineageRef {
    pub structure: String,
    pub parent: String,
    pub rule: String,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct GenerationOutput {
    pub candidates: Vec<Candidate>,
    pub duplicates: Vec<LineageRef>,
    pub discards: Vec<MutationError>,
    pub invalid_parents: Vec<ChemistryError>,
    /// Productos idénticos a su padre.
    pub unchanged: usize,
    /// Candidatos nuevos recortados por la amplitud de la estrategia.
    pub truncated: usize,
}

impl GenerationOutput {
    pub fn summary(&self) -> serde_json::Value {
        json!({
            "candidates": self.candidates.len(),
            "duplicates": self.duplicates.len(),
            "discards": self.discards.len(),
            "invalid_parents": self.invalid_parents.len(),
            "unchanged": self.unchanged,
            "truncated": self.truncated,
        })
    }
}

pub struct GeneratorAgent;

impl GeneratorAgent {
    /// Aplica las reglas seleccionadas a cada padre.
    ///
    /// Los productos se validan con el evaluador y se deduplican por forma
    /// canónica contra `seen` y contra el propio lote. Los candidatos nuevos
    /// se intercalan entre padres (uno de cada padre por turno) y se
    /// recortan a `strategy.breadth`. Nunca calcula puntuaciones.
    pub fn generate(evaluator: &ChemistryEvaluator,
                    library: &MutationLibrary,
                    strategy: &Strategy,
                    seen: &HashSet<String>,
                    max_matches: usize)
                    -> GenerationOutput {
        let mut output = GenerationOutput::default();
        let mut batch: HashSet<String> = HashSet::new();
        let mut visited_parents: HashSet<String> = HashSet::new();
        let mut per_parent: Vec<Vec<Candidate>> = Vec::new();

        for raw_parent in &strategy.parents {
            let graph = match evaluator.structure(raw_parent) {
                Ok(graph) => graph,
                Err(e) => {
                    debug!("Padre inválido {}: {}", raw_parent, e);
                    output.invalid_parents.push(e);
                    continue;
                }
            };
            let parent = evaluator.engine().to_smiles(&graph);
            if !visited_parents.insert(parent.clone()) {
                continue;
            }

            let mut novel = Vec::new();
            for rule in library.select(&strategy.categories) {
                for product in rule.apply(&parent, &graph, max_matches) {
                    let raw = match product {
                        Ok(raw) => raw,
                        Err(e) => {
                            output.discards.push(e);
                            continue;
                        }
                    };
                    let structure = match evaluator.canonicalize(&raw) {
                        Ok(s) => s,
                        Err(e) => {
                            output.discards.push(MutationError::invalid_product(rule.label(), &parent, &raw, &e));
                            continue;
                        }
                    };
                    if structure == parent {
                        output.unchanged += 1;
                    } else if seen.contains(&structure) || !batch.insert(structure.clone()) {
                        output.duplicates.push(LineageRef { structure,
                                                            parent: parent.clone(),
                                                            rule: rule.label().to_string() });
                    } else {
                        novel.push(Candidate { structure,
                                               parent: parent.clone(),
                                               rule: rule.label().to_string() });
                    }
                }
            }
            per_parent.push(novel);
        }

        let total: usize = per_parent.iter().map(Vec::len).sum();
        output.candidates = interleave(per_parent, strategy.breadth);
        output.truncated = total - output.candidates.len();
        output
    }
}

/// Reparte los candidatos por turnos entre padres hasta `limit`.
fn interleave(groups: Vec<Vec<Candidate>>, limit: usize) -> Vec<Candidate> {
    let mut iters: Vec<_> = groups.into_iter().map(Vec::into_iter).collect();
    let mut out = Vec::new();
    loop {
        let mut progressed = false;
        for it in iters.iter_mut() {
            if out.len() >= limit {
                return out;
            }
            if let Some(c) = it.next() {
                out.push(c);
                progressed = true;
            }
        }
        if !progressed {
            return out;
        }
    }
}
