//! Kekulización y percepción de aromaticidad (regla 4n+2 por anillo).

use crate::elements;
use crate::errors::ParseError;
use crate::graph::{BondOrder, MolGraph};
use crate::rings::{ring_bonds, smallest_rings, Ring};

/// Límite de pasos del emparejamiento; sistemas patológicos fallan en vez
/// de explotar combinatoriamente.
const MATCHING_BUDGET: usize = 100_000;

/// Reemplaza los enlaces aromáticos por simples/dobles alternados.
///
/// Los átomos que necesitan un doble enlace se emparejan de forma perfecta
/// por backtracking, eligiendo siempre el átomo con menos opciones.
pub fn kekulize(graph: &mut MolGraph) -> Result<(), ParseError> {
    let n = graph.atom_count();
    let aromatic_bond: Vec<bool> = graph.bonds()
                                        .iter()
                                        .map(|b| b.order == BondOrder::Aromatic)
                                        .collect();
    for (index, is_aromatic) in aromatic_bond.iter().enumerate() {
        if *is_aromatic {
            let bond = *graph.bond(index);
            graph.atom_mut(bond.a).aromatic = true;
            graph.atom_mut(bond.b).aromatic = true;
        }
    }

    let mut needs = vec![false; n];
    for index in 0..n {
        let atom = graph.atom(index);
        if !atom.aromatic {
            continue;
        }
        if !graph.neighbors(index).iter().any(|(_, b)| aromatic_bond[*b]) {
            return Err(ParseError::AromaticOutsideRing(index));
        }
        let allowed = elements::allowed_valences(atom.element, atom.charge);
        let Some(lowest) = allowed.first() else {
            return Err(ParseError::Kekulize);
        };
        let used = i16::from(graph.bond_order_sum(index)) + i16::from(atom.hydrogens);
        match i16::from(*lowest) - used {
            0 => {}
            1 => needs[index] = true,
            _ => return Err(ParseError::Kekulize),
        }
    }

    let mut mate: Vec<Option<usize>> = vec![None; n];
    let mut budget = MATCHING_BUDGET;
    if !perfect_matching(graph, &needs, &aromatic_bond, &mut mate, &mut budget) {
        return Err(ParseError::Kekulize);
    }

    for (index, is_aromatic) in aromatic_bond.iter().enumerate() {
        if !*is_aromatic {
            continue;
        }
        let bond = *graph.bond(index);
        let order = if mate[bond.a] == Some(bond.b) {
            BondOrder::Double
        } else {
            BondOrder::Single
        };
        graph.set_bond_order(index, order);
    }
    for index in 0..n {
        graph.atom_mut(index).aromatic = false;
    }
    Ok(())
}

fn perfect_matching(graph: &MolGraph,
                    needs: &[bool],
                    aromatic_bond: &[bool],
                    mate: &mut [Option<usize>],
                    budget: &mut usize)
                    -> bool {
    let mut best: Option<(usize, Vec<usize>)> = None;
    for atom in 0..graph.atom_count() {
        if !needs[atom] || mate[atom].is_some() {
            continue;
        }
        let options: Vec<usize> = graph.neighbors(atom)
                                       .iter()
                                       .filter(|(v, b)| aromatic_bond[*b] && needs[*v] && mate[*v].is_none())
                                       .map(|(v, _)| *v)
                                       .collect();
        if options.is_empty() {
            return false;
        }
        if best.as_ref().map_or(true, |(_, o)| options.len() < o.len()) {
            best = Some((atom, options));
        }
    }
    let Some((atom, options)) = best else {
        return true;
    };
    for partner in options {
        if *budget == 0 {
            return false;
        }
        *budget -= 1;
        mate[atom] = Some(partner);
        mate[partner] = Some(atom);
        if perfect_matching(graph, needs, aromatic_bond, mate, budget) {
            return true;
        }
        mate[atom] = None;
        mate[partner] = None;
    }
    false
}

/// Marca como aromáticos los anillos con 4n+2 electrones π.
///
/// Debe llamarse sobre un grafo kekulizado.
pub fn perceive(graph: &mut MolGraph) {
    let rings = smallest_rings(graph);
    if rings.is_empty() {
        return;
    }
    let ring_bond = ring_bonds(graph);
    let view: &MolGraph = graph;
    let aromatic: Vec<Ring> = rings.into_iter()
                                   .filter(|ring| pi_electrons(view, ring, &ring_bond).is_some_and(|e| e % 4 == 2))
                                   .collect();
    for ring in aromatic {
        for atom in &ring.atoms {
            graph.atom_mut(*atom).aromatic = true;
        }
        for bond in &ring.bonds {
            graph.set_bond_order(*bond, BondOrder::Aromatic);
        }
    }
}

fn pi_electrons(graph: &MolGraph, ring: &Ring, ring_bond: &[bool]) -> Option<u32> {
    let mut total = 0;
    for &index in &ring.atoms {
        let mut doubles = Vec::new();
        for &(neighbor, bond) in graph.neighbors(index) {
            match graph.bond(bond).order {
                BondOrder::Triple => return None,
                BondOrder::Double => doubles.push((neighbor, bond)),
                _ => {}
            }
        }
        total += match doubles.as_slice() {
            [] => lone_pair_electrons(graph, index)?,
            [(_, bond)] if ring_bond[*bond] => 1,
            [(neighbor, _)] => {
                let exocyclic_heteroatom = matches!(graph.atom(*neighbor).element, 7 | 8 | 16);
                if graph.atom(index).element == 6 && exocyclic_heteroatom {
                    0
                } else {
                    return None;
                }
            }
            _ => return None,
        };
    }
    Some(total)
}

fn lone_pair_electrons(graph: &MolGraph, index: usize) -> Option<u32> {
    let atom = graph.atom(index);
    let connections = graph.degree(index) + usize::from(atom.hydrogens);
    match (atom.element, atom.charge) {
        (7 | 15 | 33, 0) if connections == 3 => Some(2),
        (7, -1) if connections == 2 => Some(2),
        (8 | 16 | 34, 0) if connections == 2 => Some(2),
        (6, -1) => Some(2),
        (6, 1) => Some(0),
        (5, 0) if connections == 3 => Some(0),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use crate::smiles::{parse, parse_raw};

    use super::*;

    #[test]
    fn benzene_kekulizes_to_alternating_bonds() {
        let mut g = parse_raw("c1ccccc1").expect("benceno");
        kekulize(&mut g).expect("kekule");
        let doubles = g.bonds().iter().filter(|b| b.order == BondOrder::Double).count();
        assert_eq!(doubles, 3);
        assert!(g.atoms().iter().all(|a| !a.aromatic));
    }

    #[test]
    fn kekule_input_is_perceived_aromatic() {
        let g = parse("C1=CC=CC=C1").expect("benceno kekule");
        assert!(g.atoms().iter().all(|a| a.aromatic));
    }

    #[test]
    fn fused_and_heteroaromatic_systems_are_aromatic() {
        for smiles in ["c1ccc2ccccc2c1", "c1ccc2[nH]ccc2c1", "c1ccncc1", "c1ccoc1", "Cn1cnc2c1c(=O)n(C)c(=O)n2C"] {
            let g = parse(smiles).unwrap_or_else(|e| panic!("{smiles}: {e}"));
            assert!(g.atoms().iter().filter(|a| a.element == 6).any(|a| a.aromatic),
                    "sin aromaticidad en {smiles}");
        }
    }

    #[test]
    fn quinone_and_cyclohexadiene_are_not_aromatic() {
        for smiles in ["O=C1C=CC(=O)C=C1", "C1=CCC=CC1"] {
            let g = parse(smiles).expect(smiles);
            assert!(g.atoms().iter().all(|a| !a.aromatic), "{smiles} no debe ser aromático");
        }
    }

    #[test]
    fn impossible_aromatic_system_fails() {
        assert!(matches!(parse("c1cccc1"), Err(ParseError::Kekulize)));
    }
}
