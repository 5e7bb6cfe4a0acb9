//! Descriptores fisicoquímicos sobre un grafo saneado (forma aromática).
//!
//! - Peso molecular con masas atómicas promedio.
//! - LogP por contribuciones atómicas estilo Wildman–Crippen (tipado
//!   reducido).
//! - Donadores/aceptores de Lipinski.
//! - TPSA de Ertl (sólo N y O).
//! - Enlaces rotables: simples, fuera de anillo, entre átomos no
//!   terminales y sin triples.
//! - QED con funciones de deseabilidad asimétricas y pesos medios (sin
//!   alertas estructurales).

use serde::{Deserialize, Serialize};

use crate::elements;
use crate::errors::ComputeError;
use crate::graph::{BondOrder, MolGraph};
use crate::rings::{ring_bonds, smallest_rings, Ring};

const HYDROGEN_WEIGHT: f64 = 1.008;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Descriptors {
    pub mol_weight: f64,
    pub logp: f64,
    pub h_donors: u32,
    pub h_acceptors: u32,
    pub tpsa: f64,
    pub rotatable_bonds: u32,
    pub aromatic_rings: u32,
    pub heavy_atoms: u32,
    pub qed: f64,
}

pub fn compute(graph: &MolGraph) -> Result<Descriptors, ComputeError> {
    let heavy_atoms = graph.atoms().iter().filter(|a| a.element != 1).count() as u32;
    if heavy_atoms == 0 {
        return Err(ComputeError::NoHeavyAtoms);
    }
    if let Some(atom) = graph.atoms()
                             .iter()
                             .find(|a| !elements::has_descriptor_parameters(a.element))
    {
        return Err(ComputeError::UnsupportedElement(atom.symbol()));
    }

    let ring_bond = ring_bonds(graph);
    let rings = smallest_rings(graph);

    let mol_weight = molecular_weight(graph);
    let logp = (0..graph.atom_count()).map(|i| atom_logp(graph, i)).sum::<f64>();
    let h_donors = (0..graph.atom_count()).filter(|i| is_donor(graph, *i)).count() as u32;
    let h_acceptors = (0..graph.atom_count()).filter(|i| is_acceptor(graph, *i)).count() as u32;
    let tpsa = (0..graph.atom_count()).map(|i| polar_surface(graph, i, &rings)).sum::<f64>();
    let rotatable_bonds = rotatable_bonds(graph, &ring_bond);
    let aromatic_rings = rings.iter()
                              .filter(|r| r.bonds.iter().all(|b| graph.bond(*b).order == BondOrder::Aromatic))
                              .count() as u32;

    for (name, value) in [("mol_weight", mol_weight), ("logp", logp), ("tpsa", tpsa)] {
        if !value.is_finite() {
            return Err(ComputeError::NonFinite(name));
        }
    }

    let qed = qed(&QedInputs { mol_weight,
                               logp,
                               acceptors: h_acceptors,
                               donors: h_donors,
                               psa: tpsa,
                               rotatable: rotatable_bonds,
                               aromatic: aromatic_rings })?;

    Ok(Descriptors { mol_weight,
                     logp,
                     h_donors,
                     h_acceptors,
                     tpsa,
                     rotatable_bonds,
                     aromatic_rings,
                     heavy_atoms,
                     qed })
}

fn molecular_weight(graph: &MolGraph) -> f64 {
    graph.atoms()
         .iter()
         .map(|a| {
             let own = match a.isotope {
                 Some(isotope) => f64::from(isotope),
                 None => elements::by_number(a.element).map(|e| e.weight).unwrap_or_default(),
             };
             own + f64::from(a.hydrogens) * HYDROGEN_WEIGHT
         })
         .sum()
}

fn orders(graph: &MolGraph, index: usize) -> impl Iterator<Item = (usize, BondOrder)> + '_ {
    graph.neighbors(index)
         .iter()
         .map(move |(v, b)| (*v, graph.bond(*b).order))
}

fn has_order(graph: &MolGraph, index: usize, order: BondOrder) -> bool {
    orders(graph, index).any(|(_, o)| o == order)
}

fn double_partner(graph: &MolGraph, index: usize) -> Option<usize> {
    orders(graph, index).find(|(_, o)| *o == BondOrder::Double).map(|(v, _)| v)
}

fn heavy_degree(graph: &MolGraph, index: usize) -> usize {
    graph.neighbors(index)
         .iter()
         .filter(|(v, _)| graph.atom(*v).element != 1)
         .count()
}

fn is_heteroatom(element: u8) -> bool {
    matches!(element, 7 | 8 | 9 | 15 | 16 | 17 | 35 | 53)
}

/// Átomo con doble enlace a O, N, P o S.
fn has_double_to_heteroatom(graph: &MolGraph, index: usize) -> bool {
    orders(graph, index).any(|(v, o)| o == BondOrder::Double && matches!(graph.atom(v).element, 7 | 8 | 15 | 16))
}

fn valence(graph: &MolGraph, index: usize) -> u8 {
    graph.bond_order_sum(index) + graph.atom(index).hydrogens
}

// ---------------------------------------------------------------- LogP

fn atom_logp(graph: &MolGraph, index: usize) -> f64 {
    let atom = graph.atom(index);
    let heavy = match atom.element {
        6 => carbon_logp(graph, index),
        7 => nitrogen_logp(graph, index),
        8 => oxygen_logp(graph, index),
        9 => 0.4202,
        17 => 0.6895,
        35 => 0.8456,
        53 => 0.8857,
        15 => 0.8612,
        16 if atom.aromatic => 0.6237,
        16 if atom.charge != 0 => -0.0024,
        16 => 0.6482,
        34 => 0.6,
        1 => 0.123,
        _ => 0.0,
    };
    heavy + f64::from(atom.hydrogens) * hydrogen_logp(graph, index)
}

fn carbon_logp(graph: &MolGraph, index: usize) -> f64 {
    let atom = graph.atom(index);
    if atom.aromatic {
        let exocyclic_double = orders(graph, index).any(|(v, o)| {
                                                       o == BondOrder::Double && matches!(graph.atom(v).element, 6 | 7 | 8)
                                                   });
        if exocyclic_double {
            return -0.8186;
        }
        if atom.hydrogens > 0 {
            return 0.1581;
        }
        return match orders(graph, index).find(|(_, o)| *o != BondOrder::Aromatic) {
            None => 0.2955,
            Some((v, _)) => {
                let sub = graph.atom(v);
                match sub.element {
                    9 | 53 => 0.0,
                    17 => 0.245,
                    35 => 0.198,
                    _ if sub.aromatic => 0.2713,
                    6 => 0.136,
                    7 => 0.4619,
                    8 => 0.5437,
                    16 => 0.1893,
                    _ => -0.5443,
                }
            }
        };
    }
    if has_order(graph, index, BondOrder::Triple) {
        return 0.0017;
    }
    if let Some(partner) = double_partner(graph, index) {
        if graph.atom(partner).element != 6 {
            return -0.2783;
        }
        let aromatic_neighbor = orders(graph, index).any(|(v, o)| o == BondOrder::Single && graph.atom(v).aromatic);
        return if aromatic_neighbor { 0.264 } else { 0.1551 };
    }
    let h = atom.hydrogens;
    if orders(graph, index).any(|(v, _)| graph.atom(v).aromatic) {
        return match h {
            3.. => 0.08452,
            2 => -0.0516,
            1 => 0.1193,
            0 => -0.0967,
        };
    }
    if orders(graph, index).any(|(v, _)| is_heteroatom(graph.atom(v).element)) {
        return if h >= 2 { -0.2035 } else { -0.2051 };
    }
    if orders(graph, index).any(|(v, _)| !matches!(graph.atom(v).element, 1 | 6)) {
        return 0.2148;
    }
    if h >= 2 {
        0.1441
    } else {
        0.0
    }
}

fn nitrogen_logp(graph: &MolGraph, index: usize) -> f64 {
    let atom = graph.atom(index);
    let h = atom.hydrogens;
    if atom.aromatic {
        return if atom.charge > 0 { -1.119 } else { -0.3239 };
    }
    if atom.charge > 0 {
        return if h > 0 { -1.950 } else { -0.3396 };
    }
    if has_order(graph, index, BondOrder::Triple) {
        return 0.01508;
    }
    if double_partner(graph, index).is_some() {
        return if h > 0 { 0.08387 } else { 0.1836 };
    }
    if atom.charge < 0 {
        return -0.4806;
    }
    let aromatic_neighbor = orders(graph, index).any(|(v, _)| graph.atom(v).aromatic);
    match (h, aromatic_neighbor) {
        (2.., false) => -1.019,
        (2.., true) => -1.027,
        (1, false) => -0.7096,
        (1, true) => -0.5188,
        (0, false) => -0.3187,
        (0, true) => -0.4458,
    }
}

fn oxygen_logp(graph: &MolGraph, index: usize) -> f64 {
    let atom = graph.atom(index);
    if atom.aromatic {
        return 0.1552;
    }
    if atom.charge < 0 {
        let Some((neighbor, _)) = orders(graph, index).next() else {
            return -0.1188;
        };
        return match graph.atom(neighbor).element {
            7 => 0.0335,
            16 => -0.3339,
            15 => -1.189,
            6 if has_double_to_heteroatom(graph, neighbor) => -1.326,
            _ => -0.1188,
        };
    }
    if let Some(partner) = double_partner(graph, index) {
        let carbon = graph.atom(partner);
        return match carbon.element {
            7 | 8 => 0.0335,
            6 if carbon.aromatic => 0.1788,
            6 => {
                let others: Vec<usize> = orders(graph, partner).map(|(v, _)| v).filter(|v| *v != index).collect();
                let heteros = others.iter()
                                    .filter(|v| !matches!(graph.atom(**v).element, 1 | 6))
                                    .count();
                if others.iter().any(|v| graph.atom(*v).aromatic) {
                    0.1129
                } else if heteros >= 2 {
                    0.4833
                } else {
                    -0.1526
                }
            }
            _ => -0.1188,
        };
    }
    if atom.hydrogens >= 1 {
        return -0.2893;
    }
    if heavy_degree(graph, index) == 2 {
        return if orders(graph, index).any(|(v, _)| graph.atom(v).aromatic) {
            -0.4195
        } else {
            -0.0684
        };
    }
    -0.1188
}

fn hydrogen_logp(graph: &MolGraph, index: usize) -> f64 {
    match graph.atom(index).element {
        7 => 0.2142,
        8 => {
            if orders(graph, index).any(|(v, _)| graph.atom(v).element == 7) {
                0.2142
            } else if orders(graph, index).any(|(v, _)| {
                                                 orders(graph, v).any(|(w, o)| {
                                                                     o == BondOrder::Double
                                                                     && matches!(graph.atom(w).element, 6 | 7 | 8 | 16)
                                                                 })
                                             })
            {
                0.298
            } else {
                -0.2677
            }
        }
        16 => 0.1125,
        _ => 0.123,
    }
}

// ------------------------------------------------------ Donors / acceptors

fn is_donor(graph: &MolGraph, index: usize) -> bool {
    let atom = graph.atom(index);
    if atom.hydrogens == 0 {
        return false;
    }
    let v = valence(graph, index);
    match (atom.element, atom.aromatic, atom.charge) {
        (7, false, 0) => v == 3,
        (7, false, 1) => v == 4,
        (7, true, 0) => atom.hydrogens == 1,
        (8 | 16, _, 0) => atom.hydrogens == 1,
        _ => false,
    }
}

fn is_acceptor(graph: &MolGraph, index: usize) -> bool {
    let atom = graph.atom(index);
    match (atom.element, atom.aromatic) {
        (8 | 16, false) => {
            if atom.charge < 0 {
                return true;
            }
            if atom.charge != 0 || valence(graph, index) != 2 {
                return false;
            }
            match atom.hydrogens {
                0 => true,
                1 => !orders(graph, index).any(|(v, o)| o == BondOrder::Single && has_double_to_heteroatom(graph, v)),
                _ => false,
            }
        }
        (7, false) => {
            atom.charge == 0
            && valence(graph, index) == 3
            && !orders(graph, index).any(|(v, o)| o == BondOrder::Single && has_double_to_heteroatom(graph, v))
        }
        (7, true) => atom.charge == 0 && atom.hydrogens == 0,
        (8 | 16, true) => {
            atom.charge == 0
            && !orders(graph, index).any(|(v, _)| {
                                        let n = graph.atom(v);
                                        (n.element == 7 && n.aromatic)
                                        || (n.element == 6
                                            && n.aromatic
                                            && orders(graph, v).any(|(w, _)| {
                                                                   w != index
                                                                   && graph.atom(w).element == 7
                                                                   && graph.atom(w).aromatic
                                                               }))
                                    })
        }
        _ => false,
    }
}

// ------------------------------------------------------------------ TPSA

#[derive(Default)]
struct BondCounts {
    single: u8,
    double: u8,
    triple: u8,
    aromatic: u8,
}

impl BondCounts {
    fn total(&self) -> u8 {
        self.single + self.double + self.triple + self.aromatic
    }
}

fn polar_surface(graph: &MolGraph, index: usize, rings: &[Ring]) -> f64 {
    let atom = graph.atom(index);
    if !matches!(atom.element, 7 | 8) {
        return 0.0;
    }
    let mut c = BondCounts::default();
    for (_, order) in orders(graph, index) {
        match order {
            BondOrder::Single => c.single += 1,
            BondOrder::Double => c.double += 1,
            BondOrder::Triple => c.triple += 1,
            BondOrder::Aromatic => c.aromatic += 1,
        }
    }
    let in_three_ring = rings.iter().any(|r| r.len() == 3 && r.contains_atom(index));
    let h = atom.hydrogens;
    let tabulated = if atom.element == 7 {
        nitrogen_psa(&c, h, atom.charge, in_three_ring)
    } else {
        oxygen_psa(&c, h, atom.charge, in_three_ring)
    };
    tabulated.unwrap_or_else(|| {
                 let (base, step) = if atom.element == 7 { (30.5, 8.2) } else { (28.5, 8.6) };
                 (base - step * f64::from(c.total()) + 1.5 * f64::from(h)).max(0.0)
             })
}

fn nitrogen_psa(c: &BondCounts, h: u8, charge: i8, in_three_ring: bool) -> Option<f64> {
    let key = (charge, h, c.single, c.double, c.triple, c.aromatic);
    let value = match key {
        (0, 0, 3, 0, 0, 0) if in_three_ring => 3.01,
        (0, 0, 3, 0, 0, 0) => 3.24,
        (0, 0, 1, 1, 0, 0) => 12.36,
        (0, 0, 0, 0, 1, 0) => 23.79,
        (0, 0, 1, 2, 0, 0) => 11.68,
        (0, 0, 0, 1, 1, 0) => 13.60,
        (0, 1, 2, 0, 0, 0) if in_three_ring => 21.94,
        (0, 1, 2, 0, 0, 0) => 12.03,
        (0, 1, 0, 1, 0, 0) => 23.85,
        (0, 2, 1, 0, 0, 0) => 26.02,
        (0, 0, 0, 0, 0, 2) => 12.89,
        (0, 0, 0, 0, 0, 3) => 4.41,
        (0, 0, 1, 0, 0, 2) => 4.93,
        (0, 0, 0, 1, 0, 2) => 8.39,
        (0, 1, 0, 0, 0, 2) => 15.79,
        (1, 0, 4, 0, 0, 0) => 0.0,
        (1, 0, 2, 1, 0, 0) => 3.01,
        (1, 0, 1, 0, 1, 0) => 4.36,
        (1, 1, 3, 0, 0, 0) => 4.44,
        (1, 1, 1, 1, 0, 0) => 13.97,
        (1, 2, 2, 0, 0, 0) => 16.61,
        (1, 2, 0, 1, 0, 0) => 25.59,
        (1, 3, 1, 0, 0, 0) => 27.64,
        (1, 0, 0, 0, 0, 3) => 4.10,
        (1, 0, 1, 0, 0, 2) => 3.88,
        (1, 1, 0, 0, 0, 2) => 14.14,
        _ => return None,
    };
    Some(value)
}

fn oxygen_psa(c: &BondCounts, h: u8, charge: i8, in_three_ring: bool) -> Option<f64> {
    let key = (charge, h, c.single, c.double, c.aromatic);
    let value = match key {
        (0, 0, 2, 0, 0) if in_three_ring => 12.53,
        (0, 0, 2, 0, 0) => 9.23,
        (0, 0, 0, 1, 0) => 17.07,
        (0, 1, 1, 0, 0) => 20.23,
        (-1, 0, 1, 0, 0) => 23.06,
        (0, 0, 0, 0, 2) => 13.14,
        _ => return None,
    };
    Some(value)
}

// ------------------------------------------------------------- Rotables

fn rotatable_bonds(graph: &MolGraph, ring_bond: &[bool]) -> u32 {
    graph.bonds()
         .iter()
         .enumerate()
         .filter(|(index, bond)| {
             bond.order == BondOrder::Single
             && !ring_bond[*index]
             && heavy_degree(graph, bond.a) > 1
             && heavy_degree(graph, bond.b) > 1
             && !has_order(graph, bond.a, BondOrder::Triple)
             && !has_order(graph, bond.b, BondOrder::Triple)
         })
         .count() as u32
}

// ------------------------------------------------------------------- QED

struct Desirability {
    a: f64,
    b: f64,
    c: f64,
    d: f64,
    e: f64,
    f: f64,
    dmax: f64,
}

impl Desirability {
    const fn new(a: f64, b: f64, c: f64, d: f64, e: f64, f: f64, dmax: f64) -> Self {
        Self { a, b, c, d, e, f, dmax }
    }

    fn at(&self, x: f64) -> f64 {
        let rise = 1.0 + (-(x - self.c + self.d / 2.0) / self.e).exp();
        let fall = 1.0 + (-(x - self.c - self.d / 2.0) / self.f).exp();
        (self.a + self.b / rise * (1.0 - 1.0 / fall)) / self.dmax
    }
}

const MW: Desirability =
    Desirability::new(2.817065973, 392.5754953, 290.7489764, 2.419764353, 49.22325677, 65.37051707, 104.9805561);
const ALOGP: Desirability =
    Desirability::new(3.172690585, 137.8624751, 2.534937431, 4.581497897, 0.822739154, 0.576295591, 131.3186604);
const HBA: Desirability =
    Desirability::new(2.948620388, 160.4605972, 3.615294657, 4.435986202, 0.290141953, 1.300669958, 148.7763046);
const HBD: Desirability =
    Desirability::new(1.618662227, 1010.051101, 0.985094388, 0.000000001, 0.713820843, 0.920922555, 258.1632616);
const PSA: Desirability =
    Desirability::new(1.876861559, 125.2232657, 62.90773554, 87.83366614, 12.01999824, 28.51324732, 104.5686167);
const ROTB: Desirability =
    Desirability::new(0.010000000, 272.4121427, 2.558379970, 1.566872179, 1.271567166, 2.758063707, 105.4420403);
const AROM: Desirability =
    Desirability::new(3.217788970, 957.7374108, 2.274627939, 0.000000001, 1.317690384, 0.375760881, 312.3372610);

/// Pesos medios de QED para MW, ALOGP, HBA, HBD, PSA, ROTB, AROM.
const WEIGHTS: [f64; 7] = [0.66, 0.46, 0.05, 0.61, 0.06, 0.65, 0.48];

pub struct QedInputs {
    pub mol_weight: f64,
    pub logp: f64,
    pub acceptors: u32,
    pub donors: u32,
    pub psa: f64,
    pub rotatable: u32,
    pub aromatic: u32,
}

/// Media geométrica ponderada de las deseabilidades, en (0, 1].
pub fn qed(inputs: &QedInputs) -> Result<f64, ComputeError> {
    let desirabilities = [MW.at(inputs.mol_weight),
                          ALOGP.at(inputs.logp),
                          HBA.at(f64::from(inputs.acceptors)),
                          HBD.at(f64::from(inputs.donors)),
                          PSA.at(inputs.psa),
                          ROTB.at(f64::from(inputs.rotatable)),
                          AROM.at(f64::from(inputs.aromatic))];
    let mut weighted = 0.0;
    for (d, w) in desirabilities.iter().zip(WEIGHTS) {
        if !d.is_finite() || *d <= 0.0 {
            return Err(ComputeError::NonFinite("qed"));
        }
        weighted += w * d.ln();
    }
    let value = (weighted / WEIGHTS.iter().sum::<f64>()).exp();
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ComputeError::NonFinite("qed"))
    }
}
