//! Motor químico nativo.
//!
//! Cubre lo que el pipeline necesita de un toolkit: lectura y saneado de
//! SMILES, percepción de aromaticidad, SMILES canónico, descriptores
//! fisicoquímicos con QED y aplicación de patrones de reacción.

pub mod aromaticity;
pub mod canon;
pub mod descriptors;
pub mod elements;
pub mod errors;
pub mod graph;
pub mod reaction;
pub mod rings;
pub mod smiles;

pub use descriptors::Descriptors;
pub use errors::{ComputeError, EngineError, ParseError, ReactionError};
pub use graph::{Atom, Bond, BondOrder, MolGraph};
pub use reaction::Reaction;

/// Fachada sin estado sobre el motor. Clonable y `Send + Sync`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChemEngine {
    _private: (),
}

impl ChemEngine {
    pub fn new() -> Self {
        Self { _private: () }
    }

    /// Lee y sanea una estructura.
    pub fn parse(&self, smiles: &str) -> Result<MolGraph, ParseError> {
        smiles::parse(smiles)
    }

    /// Forma canónica de una cadena SMILES.
    pub fn canonical_smiles(&self, smiles: &str) -> Result<String, ParseError> {
        let graph = smiles::parse(smiles)?;
        Ok(canon::write_smiles(&graph))
    }

    /// Escribe un grafo ya saneado como SMILES canónico.
    pub fn to_smiles(&self, graph: &MolGraph) -> String {
        canon::write_smiles(graph)
    }

    pub fn descriptors(&self, graph: &MolGraph) -> Result<Descriptors, ComputeError> {
        descriptors::compute(graph)
    }

    /// Aplica una regla y devuelve cada producto re-saneado en forma
    /// canónica. Los productos que no se pueden sanear se devuelven como
    /// error.
    pub fn transform(&self, reaction: &Reaction, graph: &MolGraph, max_matches: usize) -> Vec<Result<String, EngineError>> {
        reaction.apply(graph, max_matches)
                .into_iter()
                .map(|product| {
                    let raw = canon::write_smiles(&product?);
                    Ok(self.canonical_smiles(&raw)?)
                })
                .collect()
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn facade_canonicalizes_and_describes() {
        let engine = ChemEngine::new();
        assert_eq!(engine.canonical_smiles("OCC").expect("etanol"), "CCO");
        let graph = engine.parse("CCO").expect("etanol");
        let d = engine.descriptors(&graph).expect("descriptores");
        assert_eq!(d.h_donors, 1);
        assert!(engine.canonical_smiles("C1CC").is_err());
    }

    #[test]
    fn transform_yields_canonical_products() {
        let engine = ChemEngine::new();
        let reaction = Reaction::parse("[#6:1][OH1:2]>>[#6:1][O:2]C").expect("regla");
        let graph = engine.parse("OCC").expect("etanol");
        let products: Vec<String> = engine.transform(&reaction, &graph, 32)
                                          .into_iter()
                                          .collect::<Result<_, _>>()
                                          .expect("productos");
        assert_eq!(products, vec![engine.canonical_smiles("COCC").expect("eter")]);
    }

    fn chain() -> impl Strategy<Value = String> {
        prop::collection::vec(prop::sample::select(vec!["C", "N", "O", "C(C)", "C(=O)", "c1ccccc1", "Cl"]), 1..6)
            .prop_map(|parts| parts.concat())
    }

    const MIXTURES: [&str; 8] = ["CC(=O)Oc1ccccc1C(=O)O",
                                 "CN1C=NC2=C1C(=O)N(C)C(=O)N2C",
                                 "CC(C)Cc1ccc(cc1)C(C)C(=O)O",
                                 "c1ccc2ccccc2c1",
                                 "C1CCCCC1.C1CCCCCCCCCCC1",
                                 "C1CC1.C1CCCC1",
                                 "c1ccncc1.O.CCN",
                                 "[NH4+].[Cl-].CC(=O)[O-]"];

    /// Reconstruye el grafo con los átomos y enlaces en otro orden.
    fn relabel(graph: &MolGraph, atom_order: &[usize], bond_order: &[usize]) -> MolGraph {
        let mut out = MolGraph::new();
        let mut position = vec![0usize; graph.atom_count()];
        for old in atom_order {
            position[*old] = out.add_atom(graph.atom(*old).clone());
        }
        for index in bond_order {
            let bond = graph.bond(*index);
            out.add_bond(position[bond.b], position[bond.a], bond.order);
        }
        out
    }

    fn shuffled_molecule() -> impl Strategy<Value = (MolGraph, Vec<usize>, Vec<usize>)> {
        prop::sample::select(MIXTURES.to_vec()).prop_flat_map(|smiles| {
                                                   let graph = smiles::parse(smiles).expect(smiles);
                                                   let atoms: Vec<usize> = (0..graph.atom_count()).collect();
                                                   let bonds: Vec<usize> = (0..graph.bonds().len()).collect();
                                                   (Just(graph), Just(atoms).prop_shuffle(), Just(bonds).prop_shuffle())
                                               })
    }

    #[test]
    fn mixtures_have_a_single_canonical_form() {
        for smiles in MIXTURES {
            let graph = smiles::parse(smiles).expect(smiles);
            let atoms: Vec<usize> = (0..graph.atom_count()).rev().collect();
            let bonds: Vec<usize> = (0..graph.bonds().len()).rev().collect();
            assert_eq!(canon::write_smiles(&relabel(&graph, &atoms, &bonds)), canon::write_smiles(&graph), "{smiles}");
        }
    }

    proptest! {
        #[test]
        fn canonical_form_ignores_atom_and_bond_order((graph, atoms, bonds) in shuffled_molecule()) {
            let expected = canon::write_smiles(&graph);
            prop_assert_eq!(canon::write_smiles(&relabel(&graph, &atoms, &bonds)), expected);
        }

        #[test]
        fn canonical_form_is_idempotent(smiles in chain()) {
            let engine = ChemEngine::new();
            if let Ok(once) = engine.canonical_smiles(&smiles) {
                prop_assert_eq!(engine.canonical_smiles(&once).expect("reparse"), once);
            }
        }
    }
}
