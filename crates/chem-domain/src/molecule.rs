// molecule.rs
use serde::{Deserialize, Serialize};
use std::fmt;

/// Descriptores redondeados de una estructura canónica.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DescriptorSet {
    pub mw: f64,
    pub logp: f64,
    pub hbd: u32,
    pub hba: u32,
    pub tpsa: f64,
    pub rotb: u32,
    pub qed: f64,
    pub aromatic_rings: u32,
    pub heavy_atoms: u32,
}

/// Molécula puntuada dentro de una ejecución. `structure` es la forma
/// canónica y es única por ejecución; las semillas tienen ronda 0 y sin
/// padre. Solo la anotación de descarte puede cambiar tras crearse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Molecule {
    pub structure: String,
    pub origin_round: u32,
    pub parent: Option<String>,
    pub rule: Option<String>,
    pub descriptors: DescriptorSet,
    pub score: f64,
    pub violations: u32,
    pub discard_reason: Option<String>,
}

impl Molecule {
    pub fn is_seed(&self) -> bool {
        self.origin_round == 0
    }

    pub fn is_discarded(&self) -> bool {
        self.discard_reason.is_some()
    }
}

impl fmt::Display for Molecule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{} score={:.4} violations={} round={}>", self.structure, self.score, self.violations, self.origin_round)
    }
}
