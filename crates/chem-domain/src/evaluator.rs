// evaluator.rs
use chemengine::{ChemEngine, MolGraph};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::{ChemistryError, DescriptorSet};

/// Estructura canónica con sus descriptores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub structure: String,
    pub descriptors: DescriptorSet,
}

/// Punto único de contacto con el motor químico. Sin estado: cada llamada
/// es una función pura de la cadena de entrada.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChemistryEvaluator {
    engine: ChemEngine,
}

impl ChemistryEvaluator {
    pub fn new() -> Self {
        Self { engine: ChemEngine::new() }
    }

    pub fn engine(&self) -> &ChemEngine {
        &self.engine
    }

    /// Grafo saneado de una estructura.
    pub fn structure(&self, structure: &str) -> Result<MolGraph, ChemistryError> {
        self.engine
            .parse(structure)
            .map_err(|e| ChemistryError::parse(structure, &e))
    }

    /// Forma canónica, clave de deduplicación en todo el pipeline.
    pub fn canonicalize(&self, structure: &str) -> Result<String, ChemistryError> {
        let graph = self.structure(structure)?;
        Ok(self.engine.to_smiles(&graph))
    }

    /// Canonicaliza y calcula el conjunto de descriptores redondeado.
    pub fn evaluate(&self, structure: &str) -> Result<Evaluation, ChemistryError> {
        let graph = self.structure(structure)?;
        let canonical = self.engine.to_smiles(&graph);
        let raw = self.engine.descriptors(&graph).map_err(|e| {
                                                     debug!("Descriptores fallidos para {}: {}", canonical, e);
                                                     ChemistryError::compute(structure, &e)
                                                 })?;
        let descriptors = DescriptorSet { mw: round_to(raw.mol_weight, 2),
                                          logp: round_to(raw.logp, 2),
                                          hbd: raw.h_donors,
                                          hba: raw.h_acceptors,
                                          tpsa: round_to(raw.tpsa, 2),
                                          rotb: raw.rotatable_bonds,
                                          qed: round_to(raw.qed, 4),
                                          aromatic_rings: raw.aromatic_rings,
                                          heavy_atoms: raw.heavy_atoms };
        Ok(Evaluation { structure: canonical,
                        descriptors })
    }
}

/// Redondeo decimal half-away-from-zero.
pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equivalent_spellings_share_a_canonical_form() {
        let evaluator = ChemistryEvaluator::new();
        let a = evaluator.canonicalize("OCC").expect("etanol");
        let b = evaluator.canonicalize("C(O)C").expect("etanol");
        assert_eq!(a, b);
        assert_eq!(evaluator.canonicalize("C1=CC=CC=C1").expect("benceno"),
                   evaluator.canonicalize("c1ccccc1").expect("benceno"));
    }

    #[test]
    fn ethanol_descriptors_are_rounded() {
        let evaluation = ChemistryEvaluator::new().evaluate("CCO").expect("etanol");
        assert_eq!(evaluation.structure, "CCO");
        assert_eq!(evaluation.descriptors.mw, 46.07);
        assert_eq!(evaluation.descriptors.hbd, 1);
        assert_eq!(evaluation.descriptors.hba, 1);
        assert_eq!(evaluation.descriptors.tpsa, 20.23);
        assert_eq!(evaluation.descriptors.rotb, 0);
        let q = evaluation.descriptors.qed;
        assert!(q > 0.0 && q < 1.0);
        assert_eq!(round_to(q, 4), q);
    }

    #[test]
    fn parse_and_compute_failures_are_distinct() {
        let evaluator = ChemistryEvaluator::new();
        let parse = evaluator.evaluate("C1CC(").expect_err("sintaxis");
        assert_eq!(parse.kind(), "parse");
        let empty = evaluator.evaluate("").expect_err("vacía");
        assert_eq!(empty.kind(), "parse");
        let compute = evaluator.evaluate("[Na+].[Cl-]").expect_err("sin parámetros");
        assert_eq!(compute.kind(), "compute");
        assert_eq!(compute.structure(), "[Na+].[Cl-]");
    }

    #[test]
    fn bare_separator_is_a_parse_failure() {
        let evaluator = ChemistryEvaluator::new();
        assert_eq!(evaluator.evaluate(".").expect_err("solo separador").kind(), "parse");
        assert_eq!(evaluator.canonicalize(".").expect_err("solo separador").kind(), "parse");
    }

    #[test]
    fn huge_seed_fails_inside_the_evaluator() {
        let failure = std::thread::Builder::new().stack_size(2 * 1024 * 1024)
                                                 .spawn(|| ChemistryEvaluator::new().evaluate(&"C".repeat(20_000)))
                                                 .expect("hilo")
                                                 .join()
                                                 .expect("el hilo no aborta")
                                                 .expect_err("demasiado grande");
        assert_eq!(failure.kind(), "parse");
    }

    #[test]
    fn salts_canonicalize_the_same_in_any_order() {
        let evaluator = ChemistryEvaluator::new();
        assert_eq!(evaluator.canonicalize("C1CCCCC1.C1CCCCCCCCCCC1").expect("mezcla"),
                   evaluator.canonicalize("C1CCCCCCCCCCC1.C1CCCCC1").expect("mezcla"));
    }

    #[test]
    fn repeated_evaluation_is_bit_identical() {
        let evaluator = ChemistryEvaluator::new();
        let first = evaluator.evaluate("CN1C=NC2=C1C(=O)N(C)C(=O)N2C").expect("cafeína");
        for _ in 0..3 {
            let again = evaluator.evaluate("CN1C=NC2=C1C(=O)N(C)C(=O)N2C").expect("cafeína");
            assert_eq!(again.descriptors.qed.to_bits(), first.descriptors.qed.to_bits());
            assert_eq!(again, first);
        }
    }
}
