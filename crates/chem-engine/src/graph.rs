//! Grafo molecular: átomos pesados con hidrógenos como conteo, enlaces con
//! orden explícito y lista de adyacencia indexada.

use std::collections::BTreeSet;

use crate::elements;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BondOrder {
    Single,
    Double,
    Triple,
    Aromatic,
}

impl BondOrder {
    /// Contribución a la suma de valencia; el aromático cuenta como simple y
    /// el electrón π se suma aparte por átomo.
    pub fn valence(self) -> u8 {
        match self {
            BondOrder::Single | BondOrder::Aromatic => 1,
            BondOrder::Double => 2,
            BondOrder::Triple => 3,
        }
    }

    pub(crate) fn code(self) -> u8 {
        match self {
            BondOrder::Single => 1,
            BondOrder::Double => 2,
            BondOrder::Triple => 3,
            BondOrder::Aromatic => 4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Atom {
    pub element: u8,
    pub aromatic: bool,
    pub charge: i8,
    pub hydrogens: u8,
    pub isotope: Option<u16>,
}

impl Atom {
    pub fn new(element: u8) -> Self {
        Self { element,
               aromatic: false,
               charge: 0,
               hydrogens: 0,
               isotope: None }
    }

    pub fn symbol(&self) -> &'static str {
        elements::symbol(self.element)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bond {
    pub a: usize,
    pub b: usize,
    pub order: BondOrder,
}

impl Bond {
    pub fn other(&self, atom: usize) -> usize {
        if self.a == atom {
            self.b
        } else {
            self.a
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MolGraph {
    atoms: Vec<Atom>,
    bonds: Vec<Bond>,
    adjacency: Vec<Vec<(usize, usize)>>,
}

impl MolGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_atom(&mut self, atom: Atom) -> usize {
        self.atoms.push(atom);
        self.adjacency.push(Vec::new());
        self.atoms.len() - 1
    }

    /// Agrega un enlace; devuelve `None` si es un lazo o ya existe.
    pub fn add_bond(&mut self, a: usize, b: usize, order: BondOrder) -> Option<usize> {
        if a == b || a >= self.atoms.len() || b >= self.atoms.len() || self.bond_between(a, b).is_some() {
            return None;
        }
        let index = self.bonds.len();
        self.bonds.push(Bond { a, b, order });
        self.adjacency[a].push((b, index));
        self.adjacency[b].push((a, index));
        Some(index)
    }

    pub fn atoms(&self) -> &[Atom] {
        &self.atoms
    }

    pub fn atom(&self, index: usize) -> &Atom {
        &self.atoms[index]
    }

    pub fn atom_mut(&mut self, index: usize) -> &mut Atom {
        &mut self.atoms[index]
    }

    pub fn bonds(&self) -> &[Bond] {
        &self.bonds
    }

    pub fn bond(&self, index: usize) -> &Bond {
        &self.bonds[index]
    }

    pub fn set_bond_order(&mut self, index: usize, order: BondOrder) {
        self.bonds[index].order = order;
    }

    /// Vecinos como pares `(átomo, índice de enlace)` en orden de inserción.
    pub fn neighbors(&self, atom: usize) -> &[(usize, usize)] {
        &self.adjacency[atom]
    }

    pub fn degree(&self, atom: usize) -> usize {
        self.adjacency[atom].len()
    }

    pub fn bond_between(&self, a: usize, b: usize) -> Option<usize> {
        self.adjacency
            .get(a)?
            .iter()
            .find(|(n, _)| *n == b)
            .map(|(_, bond)| *bond)
    }

    pub fn atom_count(&self) -> usize {
        self.atoms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }

    /// Suma de órdenes de enlace (aromático = 1).
    pub fn bond_order_sum(&self, atom: usize) -> u8 {
        self.adjacency[atom]
            .iter()
            .map(|(_, b)| self.bonds[*b].order.valence())
            .sum()
    }

    /// Hidrógenos implícitos según las valencias por defecto.
    ///
    /// Para átomos aromáticos se suma un electrón π y sólo se considera la
    /// valencia más baja. `None` si la suma excede toda valencia permitida.
    pub fn default_hydrogens(&self, atom: usize) -> Option<u8> {
        let a = &self.atoms[atom];
        let allowed = elements::allowed_valences(a.element, a.charge);
        if allowed.is_empty() {
            return Some(0);
        }
        let used = self.bond_order_sum(atom) + u8::from(a.aromatic);
        if a.aromatic {
            return Some(allowed[0].saturating_sub(used));
        }
        allowed.iter().find(|v| **v >= used).map(|v| v - used)
    }

    /// Componentes conexas, cada una ordenada por índice de átomo.
    pub fn components(&self) -> Vec<Vec<usize>> {
        let mut seen = vec![false; self.atoms.len()];
        let mut out = Vec::new();
        for start in 0..self.atoms.len() {
            if seen[start] {
                continue;
            }
            let mut stack = vec![start];
            let mut component = Vec::new();
            seen[start] = true;
            while let Some(u) = stack.pop() {
                component.push(u);
                for (v, _) in &self.adjacency[u] {
                    if !seen[*v] {
                        seen[*v] = true;
                        stack.push(*v);
                    }
                }
            }
            component.sort_unstable();
            out.push(component);
        }
        out
    }

    /// Copia el grafo sin los átomos indicados, preservando el orden relativo
    /// de los restantes. Devuelve el nuevo grafo y el mapa viejo → nuevo.
    pub fn without_atoms(&self, removed: &BTreeSet<usize>) -> (MolGraph, Vec<Option<usize>>) {
        let mut graph = MolGraph::new();
        let mut mapping = vec![None; self.atoms.len()];
        for (index, atom) in self.atoms.iter().enumerate() {
            if !removed.contains(&index) {
                mapping[index] = Some(graph.add_atom(atom.clone()));
            }
        }
        for bond in &self.bonds {
            if let (Some(a), Some(b)) = (mapping[bond.a], mapping[bond.b]) {
                graph.add_bond(a, b, bond.order);
            }
        }
        (graph, mapping)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ethanol() -> MolGraph {
        let mut g = MolGraph::new();
        let c1 = g.add_atom(Atom::new(6));
        let c2 = g.add_atom(Atom::new(6));
        let o = g.add_atom(Atom::new(8));
        g.add_bond(c1, c2, BondOrder::Single);
        g.add_bond(c2, o, BondOrder::Single);
        g
    }

    #[test]
    fn default_hydrogens_fill_lowest_valence() {
        let g = ethanol();
        assert_eq!(g.default_hydrogens(0), Some(3));
        assert_eq!(g.default_hydrogens(1), Some(2));
        assert_eq!(g.default_hydrogens(2), Some(1));
    }

    #[test]
    fn duplicate_and_self_bonds_are_rejected() {
        let mut g = ethanol();
        assert!(g.add_bond(0, 1, BondOrder::Double).is_none());
        assert!(g.add_bond(2, 2, BondOrder::Single).is_none());
    }

    #[test]
    fn removing_atoms_splits_components() {
        let g = ethanol();
        let removed: BTreeSet<usize> = [1].into_iter().collect();
        let (h, mapping) = g.without_atoms(&removed);
        assert_eq!(h.atom_count(), 2);
        assert_eq!(mapping, vec![Some(0), None, Some(1)]);
        assert_eq!(h.components().len(), 2);
    }
}
