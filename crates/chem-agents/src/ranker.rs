use std::cmp::Ordering;

use chem_domain::Molecule;

pub struct RankerAgent;

impl RankerAgent {
    /// Orden total: score desc, violaciones asc, peso molecular asc,
    /// estructura canónica asc.
    pub fn compare(a: &Molecule, b: &Molecule) -> Ordering {
        b.score
         .total_cmp(&a.score)
         .then_with(|| a.violations.cmp(&b.violations))
         .then_with(|| a.descriptors.mw.total_cmp(&b.descriptors.mw))
         .then_with(|| a.structure.cmp(&b.structure))
    }

    /// Solo compiten moléculas generadas que pasaron el cribado.
    pub fn is_eligible(molecule: &Molecule) -> bool {
        !molecule.is_seed() && !molecule.is_discarded()
    }

    /// Selección top-k ordenada; longitud ≤ `top_k`.
    pub fn rank<'a, I>(molecules: I, top_k: usize) -> Vec<Molecule>
        where I: IntoIterator<Item = &'a Molecule>
    {
        let mut eligible: Vec<&Molecule> = molecules.into_iter().filter(|m| Self::is_eligible(m)).collect();
        eligible.sort_by(|a, b| Self::compare(a, b));
        eligible.into_iter().take(top_k).cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chem_domain::DescriptorSet;
    use proptest::prelude::*;

    fn molecule(structure: &str, score: f64, violations: u32, mw: f64) -> Molecule {
        Molecule { structure: structure.into(),
                   origin_round: 1,
                   parent: Some("CCO".into()),
                   rule: Some("demethylation".into()),
                   descriptors: DescriptorSet { mw,
                                                logp: 0.0,
                                                hbd: 0,
                                                hba: 0,
                                                tpsa: 0.0,
                                                rotb: 0,
                                                qed: score,
                                                aromatic_rings: 0,
                                                heavy_atoms: 3 },
                   score,
                   violations,
                   discard_reason: None }
    }

    #[test]
    fn tie_breaks_apply_in_order() {
        let ms = vec![molecule("CCC", 0.5, 1, 44.1),
                      molecule("CCN", 0.5, 0, 45.08),
                      molecule("CO", 0.5, 0, 32.04),
                      molecule("OC", 0.5, 0, 32.04),
                      molecule("CCCl", 0.7, 1, 64.51)];
        let ranked: Vec<String> = RankerAgent::rank(&ms, 10).into_iter().map(|m| m.structure).collect();
        assert_eq!(ranked, vec!["CCCl", "CO", "OC", "CCN", "CCC"]);
    }

    #[test]
    fn seeds_and_discards_are_not_eligible() {
        let mut seed = molecule("CCO", 0.9, 0, 46.07);
        seed.origin_round = 0;
        seed.parent = None;
        let mut discarded = molecule("CCCCCCCCCCCCCCCCCCCC", 0.8, 2, 282.56);
        discarded.discard_reason = Some("screening: 2 violations > 1".into());
        let kept = molecule("CO", 0.3, 0, 32.04);
        let ranked = RankerAgent::rank(&[seed, discarded, kept.clone()], 3);
        assert_eq!(ranked, vec![kept]);
    }

    fn any_molecule() -> impl Strategy<Value = Molecule> {
        ("[CNO]{1,4}", -0.6..1.0f64, 0u32..7, 10.0..600.0f64).prop_map(|(s, score, v, mw)| molecule(&s, score, v, mw))
    }

    proptest! {
        #[test]
        fn output_is_bounded_and_sorted(ms in prop::collection::vec(any_molecule(), 0..30), k in 1usize..12) {
            let ranked = RankerAgent::rank(&ms, k);
            prop_assert!(ranked.len() <= k);
            prop_assert_eq!(ranked.len(), ms.len().min(k));
            for pair in ranked.windows(2) {
                prop_assert_ne!(RankerAgent::compare(&pair[0], &pair[1]), Ordering::Greater);
            }
        }
    }
}
