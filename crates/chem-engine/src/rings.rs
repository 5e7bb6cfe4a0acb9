//! Percepción de anillos: enlaces de anillo (no puente) y un conjunto
//! mínimo de anillos más pequeños construido a partir del ciclo más corto
//! por enlace, filtrado por independencia lineal sobre GF(2).

use std::collections::{HashSet, VecDeque};

use crate::graph::MolGraph;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ring {
    /// Átomos en orden de recorrido del ciclo.
    pub atoms: Vec<usize>,
    pub bonds: Vec<usize>,
}

impl Ring {
    pub fn len(&self) -> usize {
        self.atoms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }

    pub fn contains_atom(&self, atom: usize) -> bool {
        self.atoms.contains(&atom)
    }

    pub fn contains_bond(&self, bond: usize) -> bool {
        self.bonds.contains(&bond)
    }
}

/// `true` para cada enlace que pertenece a algún ciclo.
///
/// Un enlace es de anillo si no es puente (Tarjan, con pila explícita).
pub fn ring_bonds(graph: &MolGraph) -> Vec<bool> {
    let n = graph.atom_count();
    let mut disc = vec![usize::MAX; n];
    let mut low = vec![0usize; n];
    let mut bridge = vec![false; graph.bonds().len()];
    let mut timer = 0usize;
    for start in 0..n {
        if disc[start] != usize::MAX {
            continue;
        }
        disc[start] = timer;
        low[start] = timer;
        timer += 1;
        // (átomo, enlace por el que se llegó, siguiente vecino a mirar)
        let mut stack: Vec<(usize, Option<usize>, usize)> = vec![(start, None, 0)];
        while let Some((u, parent_bond, cursor)) = stack.last_mut() {
            let u = *u;
            let parent_bond = *parent_bond;
            let Some(&(v, b)) = graph.neighbors(u).get(*cursor) else {
                stack.pop();
                if let (Some(pb), Some((parent, _, _))) = (parent_bond, stack.last()) {
                    let parent = *parent;
                    low[parent] = low[parent].min(low[u]);
                    if low[u] > disc[parent] {
                        bridge[pb] = true;
                    }
                }
                continue;
            };
            *cursor += 1;
            if Some(b) == parent_bond {
                continue;
            }
            if disc[v] == usize::MAX {
                disc[v] = timer;
                low[v] = timer;
                timer += 1;
                stack.push((v, Some(b), 0));
            } else {
                low[u] = low[u].min(disc[v]);
            }
        }
    }
    bridge.into_iter().map(|b| !b).collect()
}

/// `true` para cada átomo que participa en algún enlace de anillo.
pub fn ring_atoms(graph: &MolGraph, ring_bond: &[bool]) -> Vec<bool> {
    let mut out = vec![false; graph.atom_count()];
    for (index, bond) in graph.bonds().iter().enumerate() {
        if ring_bond[index] {
            out[bond.a] = true;
            out[bond.b] = true;
        }
    }
    out
}

/// Conjunto de anillos más pequeños, ordenado por tamaño y luego por
/// índices de enlace. Su cardinalidad es a lo sumo el número ciclomático.
pub fn smallest_rings(graph: &MolGraph) -> Vec<Ring> {
    let bond_count = graph.bonds().len();
    let cyclomatic = (bond_count + graph.components().len()).saturating_sub(graph.atom_count());
    if cyclomatic == 0 {
        return Vec::new();
    }
    let ring_bond = ring_bonds(graph);

    let mut seen: HashSet<Vec<usize>> = HashSet::new();
    let mut candidates: Vec<(Vec<usize>, Ring)> = Vec::new();
    for (index, bond) in graph.bonds().iter().enumerate() {
        if !ring_bond[index] {
            continue;
        }
        let Some((atoms, mut bonds)) = shortest_path(graph, bond.b, bond.a, index, &ring_bond) else {
            continue;
        };
        bonds.push(index);
        let mut key = bonds.clone();
        key.sort_unstable();
        if seen.insert(key.clone()) {
            candidates.push((key, Ring { atoms, bonds }));
        }
    }
    candidates.sort_by(|(ka, _), (kb, _)| ka.len().cmp(&kb.len()).then_with(|| ka.cmp(kb)));

    let words = bond_count.div_ceil(64);
    let mut basis: Vec<(usize, Vec<u64>)> = Vec::new();
    let mut rings = Vec::new();
    for (key, ring) in candidates {
        let mut row = vec![0u64; words];
        for b in &key {
            row[b / 64] |= 1u64 << (b % 64);
        }
        for (pivot, existing) in &basis {
            if row[pivot / 64] >> (pivot % 64) & 1 == 1 {
                for (w, e) in row.iter_mut().zip(existing) {
                    *w ^= e;
                }
            }
        }
        let Some(pivot) = first_bit(&row) else {
            continue;
        };
        for (_, existing) in basis.iter_mut() {
            if existing[pivot / 64] >> (pivot % 64) & 1 == 1 {
                for (e, w) in existing.iter_mut().zip(&row) {
                    *e ^= w;
                }
            }
        }
        basis.push((pivot, row));
        rings.push(ring);
        if rings.len() == cyclomatic {
            break;
        }
    }
    rings
}

fn first_bit(row: &[u64]) -> Option<usize> {
    row.iter()
       .enumerate()
       .find(|(_, w)| **w != 0)
       .map(|(i, w)| i * 64 + w.trailing_zeros() as usize)
}

/// BFS de `from` a `to` sin usar `skip` y sólo por enlaces de anillo.
fn shortest_path(graph: &MolGraph,
                 from: usize,
                 to: usize,
                 skip: usize,
                 ring_bond: &[bool])
                 -> Option<(Vec<usize>, Vec<usize>)> {
    let n = graph.atom_count();
    let mut prev: Vec<Option<(usize, usize)>> = vec![None; n];
    let mut visited = vec![false; n];
    let mut queue = VecDeque::new();
    visited[from] = true;
    queue.push_back(from);
    while let Some(u) = queue.pop_front() {
        if u == to {
            break;
        }
        for &(v, b) in graph.neighbors(u) {
            if b == skip || !ring_bond[b] || visited[v] {
                continue;
            }
            visited[v] = true;
            prev[v] = Some((u, b));
            queue.push_back(v);
        }
    }
    if !visited[to] {
        return None;
    }
    let mut atoms = vec![to];
    let mut bonds = Vec::new();
    let mut cursor = to;
    while let Some((p, b)) = prev[cursor] {
        atoms.push(p);
        bonds.push(b);
        cursor = p;
    }
    atoms.reverse();
    bonds.reverse();
    Some((atoms, bonds))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Atom, BondOrder};

    fn cycle(n: usize) -> MolGraph {
        let mut g = MolGraph::new();
        for _ in 0..n {
            g.add_atom(Atom::new(6));
        }
        for i in 0..n {
            g.add_bond(i, (i + 1) % n, BondOrder::Single);
        }
        g
    }

    #[test]
    fn single_ring_is_found_once() {
        let g = cycle(6);
        let rings = smallest_rings(&g);
        assert_eq!(rings.len(), 1);
        assert_eq!(rings[0].len(), 6);
        assert!(ring_bonds(&g).iter().all(|b| *b));
    }

    #[test]
    fn fused_rings_yield_two_six_membered() {
        // decalina: dos anillos de 6 compartiendo el enlace 0-5
        let mut g = cycle(6);
        let extra: Vec<usize> = (0..4).map(|_| g.add_atom(Atom::new(6))).collect();
        g.add_bond(5, extra[0], BondOrder::Single);
        g.add_bond(extra[0], extra[1], BondOrder::Single);
        g.add_bond(extra[1], extra[2], BondOrder::Single);
        g.add_bond(extra[2], extra[3], BondOrder::Single);
        g.add_bond(extra[3], 0, BondOrder::Single);
        let rings = smallest_rings(&g);
        assert_eq!(rings.len(), 2);
        assert!(rings.iter().all(|r| r.len() == 6));
    }

    #[test]
    fn long_chain_closed_into_a_ring_is_all_ring_bonds() {
        let ring = cycle(5000);
        assert!(ring_bonds(&ring).iter().all(|b| *b));
    }

    #[test]
    fn chain_has_no_ring_bonds() {
        let mut g = MolGraph::new();
        let a = g.add_atom(Atom::new(6));
        let b = g.add_atom(Atom::new(6));
        g.add_bond(a, b, BondOrder::Single);
        assert!(smallest_rings(&g).is_empty());
        assert_eq!(ring_bonds(&g), vec![false]);
    }
}
