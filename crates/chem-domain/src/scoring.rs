// scoring.rs
use serde::{Deserialize, Serialize};

use crate::evaluator::round_to;
use crate::{DescriptorSet, FilterThresholds};

/// Umbral individual que un conjunto de descriptores puede superar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Threshold {
    MaxMw,
    MaxLogp,
    MaxHbd,
    MaxHba,
    MaxTpsa,
    MaxRotb,
}

impl Threshold {
    pub const ALL: [Threshold; 6] = [Threshold::MaxMw,
                                     Threshold::MaxLogp,
                                     Threshold::MaxHbd,
                                     Threshold::MaxHba,
                                     Threshold::MaxTpsa,
                                     Threshold::MaxRotb];

    pub fn as_str(&self) -> &'static str {
        match self {
            Threshold::MaxMw => "max_mw",
            Threshold::MaxLogp => "max_logp",
            Threshold::MaxHbd => "max_hbd",
            Threshold::MaxHba => "max_hba",
            Threshold::MaxTpsa => "max_tpsa",
            Threshold::MaxRotb => "max_rotb",
        }
    }

    /// Comparación estricta: igualar el umbral no es violación.
    pub fn exceeded_by(&self, d: &DescriptorSet, t: &FilterThresholds) -> bool {
        match self {
            Threshold::MaxMw => d.mw > t.max_mw,
            Threshold::MaxLogp => d.logp > t.max_logp,
            Threshold::MaxHbd => d.hbd > t.max_hbd,
            Threshold::MaxHba => d.hba > t.max_hba,
            Threshold::MaxTpsa => d.tpsa > t.max_tpsa,
            Threshold::MaxRotb => d.rotb > t.max_rotb,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreCard {
    pub score: f64,
    pub violations: u32,
    pub exceeded: Vec<Threshold>,
    pub passed_screening: bool,
}

impl ScoreCard {
    /// Motivo de descarte por cribado, si supera `max_violations`.
    pub fn screening_discard(&self, thresholds: &FilterThresholds) -> Option<String> {
        (!self.passed_screening).then(|| format!("screening: {} violations > {}", self.violations, thresholds.max_violations))
    }
}

/// Puntuación pura: `score = qed - 0.1 * violaciones`, sin recorte.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScoringService;

impl ScoringService {
    pub const PENALTY_PER_VIOLATION: f64 = 0.1;

    pub fn score(descriptors: &DescriptorSet, thresholds: &FilterThresholds) -> ScoreCard {
        let exceeded: Vec<Threshold> = Threshold::ALL.into_iter()
                                                     .filter(|t| t.exceeded_by(descriptors, thresholds))
                                                     .collect();
        let violations = exceeded.len() as u32;
        let score = round_to(descriptors.qed - Self::PENALTY_PER_VIOLATION * f64::from(violations), 4);
        ScoreCard { score,
                    violations,
                    exceeded,
                    passed_screening: violations <= thresholds.max_violations }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn descriptors(mw: f64, logp: f64, hbd: u32, hba: u32, tpsa: f64, rotb: u32, qed: f64) -> DescriptorSet {
        DescriptorSet { mw,
                        logp,
                        hbd,
                        hba,
                        tpsa,
                        rotb,
                        qed,
                        aromatic_rings: 0,
                        heavy_atoms: 10 }
    }

    #[test]
    fn threshold_equality_is_not_a_violation() {
        let t = FilterThresholds::default();
        let card = ScoringService::score(&descriptors(500.0, 5.0, 5, 10, 140.0, 10, 0.5), &t);
        assert_eq!(card.violations, 0);
        assert_eq!(card.score, 0.5);
        assert!(card.passed_screening);
        assert_eq!(card.screening_discard(&t), None);
    }

    #[test]
    fn every_exceeded_threshold_costs_a_tenth() {
        let t = FilterThresholds::default();
        let card = ScoringService::score(&descriptors(612.3, 6.1, 2, 4, 150.0, 3, 0.21), &t);
        assert_eq!(card.exceeded, vec![Threshold::MaxMw, Threshold::MaxLogp, Threshold::MaxTpsa]);
        assert_eq!(card.violations, 3);
        assert_eq!(card.score, -0.09);
        assert!(!card.passed_screening);
        assert_eq!(card.screening_discard(&t).as_deref(), Some("screening: 3 violations > 1"));
    }

    fn any_descriptors() -> impl Strategy<Value = DescriptorSet> {
        (0.0..2000.0f64, -10.0..15.0f64, 0u32..20, 0u32..30, 0.0..400.0f64, 0u32..40, 0.0..1.0f64)
            .prop_map(|(mw, logp, hbd, hba, tpsa, rotb, qed)| descriptors(mw, logp, hbd, hba, tpsa, rotb, qed))
    }

    proptest! {
        #[test]
        fn violations_stay_in_range(d in any_descriptors()) {
            let card = ScoringService::score(&d, &FilterThresholds::default());
            prop_assert!(card.violations <= 6);
            prop_assert_eq!(card.violations as usize, card.exceeded.len());
            prop_assert!((card.score - (d.qed - 0.1 * f64::from(card.violations))).abs() < 1e-4);
        }

        #[test]
        fn scoring_is_deterministic(d in any_descriptors()) {
            let t = FilterThresholds::default();
            prop_assert_eq!(ScoringService::score(&d, &t), ScoringService::score(&d, &t));
        }
    }
}
