use chem_domain::{RuleCategory, RunConfig};
use serde::{Deserialize, Serialize};
use serde_json::json;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// Ronda 1: todas las reglas sobre todas las semillas.
    Exploratory,
    /// Supervivientes top-k con reglas conservadoras (sin saltos de esqueleto).
    Refinement,
    /// La ronda anterior no aportó nada nuevo: supervivientes con todas las reglas.
    Widened,
    /// Sin supervivientes: vuelta a las semillas.
    Fallback,
}

/// Resumen de la ronda anterior que el orquestador entrega al planificador.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoundSummary {
    pub round: u32,
    /// Ranking vigente (top-k acumulado) en orden.
    pub survivors: Vec<String>,
    /// Moléculas nuevas que produjo la ronda.
    pub novel_count: usize,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Strategy {
    pub round: u32,
    pub kind: StrategyKind,
    pub parents: Vec<String>,
    pub categories: Vec<RuleCategory>,
    pub breadth: usize,
}

impl Strategy {
    /// Resumen para la traza (sin volcar todos los padres).
    pub fn summary(&self) -> serde_json::Value {
        json!({
            "strategy": self.kind,
            "parents": self.parents.len(),
            "categories": self.categories,
            "breadth": self.breadth,
        })
    }
}

pub struct PlannerAgent;

impl PlannerAgent {
    /// Estrategia para `round`. Entradas idénticas dan siempre la misma
    /// estrategia.
    pub fn plan(round: u32, config: &RunConfig, previous: Option<&RoundSummary>) -> Strategy {
        let breadth = config.candidates_per_round as usize;
        let all = RuleCategory::ALL.to_vec();
        let (kind, parents, categories) = match previous {
            None => (StrategyKind::Exploratory, config.seeds.clone(), all),
            Some(summary) if summary.survivors.is_empty() => (StrategyKind::Fallback, config.seeds.clone(), all),
            Some(summary) if summary.novel_count == 0 => (StrategyKind::Widened, summary.survivors.clone(), all),
            Some(summary) => {
                let conservative = all.into_iter()
                                      .filter(|c| *c != RuleCategory::ScaffoldHop)
                                      .collect();
                (StrategyKind::Refinement, summary.survivors.clone(), conservative)
            }
        };
        Strategy { round,
                   kind,
                   parents,
                   categories,
                   breadth }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> RunConfig {
        RunConfig::new(vec!["CCO".into(), "c1ccccc1".into()], 3, 8, 2)
    }

    fn summary(survivors: &[&str], novel_count: usize) -> RoundSummary {
        RoundSummary { round: 1,
                       survivors: survivors.iter().map(|s| s.to_string()).collect(),
                       novel_count }
    }

    #[test]
    fn first_round_explores_all_seeds_with_every_rule() {
        let s = PlannerAgent::plan(1, &config(), None);
        assert_eq!(s.kind, StrategyKind::Exploratory);
        assert_eq!(s.parents, config().seeds);
        assert_eq!(s.categories, RuleCategory::ALL.to_vec());
        assert_eq!(s.breadth, 8);
    }

    #[test]
    fn later_rounds_refine_survivors_without_scaffold_hops() {
        let s = PlannerAgent::plan(2, &config(), Some(&summary(&["CCOC", "CO"], 4)));
        assert_eq!(s.kind, StrategyKind::Refinement);
        assert_eq!(s.parents, vec!["CCOC".to_string(), "CO".to_string()]);
        assert!(!s.categories.contains(&RuleCategory::ScaffoldHop));
    }

    #[test]
    fn empty_previous_round_widens_and_no_survivors_falls_back() {
        let widened = PlannerAgent::plan(3, &config(), Some(&summary(&["CO"], 0)));
        assert_eq!(widened.kind, StrategyKind::Widened);
        assert!(widened.categories.contains(&RuleCategory::ScaffoldHop));
        let fallback = PlannerAgent::plan(2, &config(), Some(&summary(&[], 0)));
        assert_eq!(fallback.kind, StrategyKind::Fallback);
        assert_eq!(fallback.parents, config().seeds);
    }

    #[test]
    fn planning_is_pure() {
        let prev = summary(&["CCOC"], 2);
        assert_eq!(PlannerAgent::plan(2, &config(), Some(&prev)), PlannerAgent::plan(2, &config(), Some(&prev)));
        assert_eq!(PlannerAgent::plan(2, &config(), Some(&prev)).summary()["strategy"], "refinement");
    }
}
