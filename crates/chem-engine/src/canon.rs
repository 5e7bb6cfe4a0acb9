//! SMILES canónico.
//!
//! Los átomos se ordenan por invariantes refinados iterativamente con las
//! clases de sus vecinos; los empates que sobreviven se rompen eligiendo
//! el primer átomo del rango empatado más bajo y se vuelve a refinar. El
//! escritor recorre en profundidad visitando vecinos por rango, con pila
//! explícita.
//!
//! Cada componente conexa se canoniza por separado y las cadenas se unen
//! con `.` en orden lexicográfico.

use std::collections::BTreeSet;

use crate::elements;
use crate::graph::{BondOrder, MolGraph};
use crate::rings;

/// Rango canónico (0 = primero) de cada átomo. Todos los rangos son
/// distintos.
pub fn canonical_ranks(graph: &MolGraph) -> Vec<usize> {
    let ring_atom = rings::ring_atoms(graph, &rings::ring_bonds(graph));
    let invariants: Vec<_> = graph.atoms()
                                  .iter()
                                  .enumerate()
                                  .map(|(i, a)| {
                                      (graph.degree(i),
                                       a.element,
                                       a.isotope.unwrap_or(0),
                                       a.charge,
                                       a.hydrogens,
                                       a.aromatic,
                                       ring_atom[i])
                                  })
                                  .collect();
    let mut ranks = refine(graph, dense_ranks(&invariants));
    while let Some(tied) = first_tie(&ranks) {
        let mut split: Vec<usize> = ranks.iter().map(|r| r * 2 + 1).collect();
        split[tied] -= 1;
        ranks = refine(graph, dense_ranks(&split));
    }
    ranks
}

fn dense_ranks<T: Ord + Clone>(keys: &[T]) -> Vec<usize> {
    let mut sorted = keys.to_vec();
    sorted.sort();
    sorted.dedup();
    keys.iter()
        .map(|k| sorted.binary_search(k).unwrap_or_default())
        .collect()
}

fn class_count(ranks: &[usize]) -> usize {
    ranks.iter().collect::<BTreeSet<_>>().len()
}

fn refine(graph: &MolGraph, mut ranks: Vec<usize>) -> Vec<usize> {
    loop {
        let classes = class_count(&ranks);
        let keys: Vec<(usize, Vec<(usize, u8)>)> =
            (0..graph.atom_count()).map(|i| {
                                       let mut around: Vec<(usize, u8)> =
                                           graph.neighbors(i)
                                                .iter()
                                                .map(|(v, b)| (ranks[*v], graph.bond(*b).order.code()))
                                                .collect();
                                       around.sort_unstable();
                                       (ranks[i], around)
                                   })
                                   .collect();
        let next = dense_ranks(&keys);
        if class_count(&next) == classes {
            return ranks;
        }
        ranks = next;
    }
}

fn first_tie(ranks: &[usize]) -> Option<usize> {
    let mut counts = vec![0usize; ranks.len()];
    for r in ranks {
        counts[*r] += 1;
    }
    let rank = counts.iter().position(|c| *c > 1)?;
    ranks.iter().position(|r| *r == rank)
}

/// Escribe el grafo como SMILES canónico.
pub fn write_smiles(graph: &MolGraph) -> String {
    let components = graph.components();
    if components.len() <= 1 {
        return write_connected(graph);
    }
    let mut parts: Vec<String> = components.iter()
                                           .map(|keep| {
                                               let removed: BTreeSet<usize> = (0..graph.atom_count()).filter(|i| keep.binary_search(i).is_err())
                                                                                                     .collect();
                                               write_connected(&graph.without_atoms(&removed).0)
                                           })
                                           .collect();
    parts.sort();
    parts.join(".")
}

fn write_connected(graph: &MolGraph) -> String {
    if graph.is_empty() {
        return String::new();
    }
    let ranks = canonical_ranks(graph);
    let mut writer = Writer::new(graph, &ranks);
    writer.write()
}

struct Writer<'a> {
    graph: &'a MolGraph,
    ranks: &'a [usize],
    visited: Vec<bool>,
    bond_used: Vec<bool>,
    children: Vec<Vec<(usize, usize)>>,
    ring_open: Vec<Vec<usize>>,
    ring_close: Vec<Vec<usize>>,
}

#[derive(Default)]
struct Digits {
    in_use: BTreeSet<u32>,
    by_bond: Vec<Option<u32>>,
}

impl Digits {
    fn open(&mut self, bond: usize) -> u32 {
        let digit = (1..).find(|d| !self.in_use.contains(d)).unwrap_or(1);
        self.in_use.insert(digit);
        self.by_bond[bond] = Some(digit);
        digit
    }

    fn close(&mut self, bond: usize) -> Option<u32> {
        let digit = self.by_bond[bond].take()?;
        self.in_use.remove(&digit);
        Some(digit)
    }
}

/// Trabajo pendiente del escritor.
enum Emit {
    Atom { atom: usize, via: Option<usize> },
    Text(&'static str),
}

impl<'a> Writer<'a> {
    fn new(graph: &'a MolGraph, ranks: &'a [usize]) -> Self {
        let n = graph.atom_count();
        Self { graph,
               ranks,
               visited: vec![false; n],
               bond_used: vec![false; graph.bonds().len()],
               children: vec![Vec::new(); n],
               ring_open: vec![Vec::new(); n],
               ring_close: vec![Vec::new(); n] }
    }

    fn write(&mut self) -> String {
        let Some(root) = (0..self.graph.atom_count()).min_by_key(|i| self.ranks[*i]) else {
            return String::new();
        };
        self.explore(root);
        let mut out = String::new();
        let mut digits = Digits { in_use: BTreeSet::new(),
                                  by_bond: vec![None; self.graph.bonds().len()] };
        self.emit(root, &mut out, &mut digits);
        out
    }

    fn ranked_neighbors(&self, atom: usize, parent_bond: Option<usize>) -> Vec<(usize, usize)> {
        let mut around: Vec<(usize, usize)> = self.graph
                                                  .neighbors(atom)
                                                  .iter()
                                                  .filter(|(_, b)| Some(*b) != parent_bond)
                                                  .copied()
                                                  .collect();
        around.sort_by_key(|(v, _)| self.ranks[*v]);
        around
    }

    /// Árbol de recorrido y cierres de anillo.
    fn explore(&mut self, root: usize) {
        self.visited[root] = true;
        let mut stack = vec![(root, self.ranked_neighbors(root, None), 0usize)];
        while let Some((atom, around, next_index)) = stack.last_mut() {
            let Some(&(next, bond)) = around.get(*next_index) else {
                stack.pop();
                continue;
            };
            *next_index += 1;
            let atom = *atom;
            if self.bond_used[bond] {
                continue;
            }
            self.bond_used[bond] = true;
            if self.visited[next] {
                self.ring_open[next].push(bond);
                self.ring_close[atom].push(bond);
            } else {
                self.children[atom].push((next, bond));
                self.visited[next] = true;
                let frame = (next, self.ranked_neighbors(next, Some(bond)), 0);
                stack.push(frame);
            }
        }
    }

    fn emit(&self, root: usize, out: &mut String, digits: &mut Digits) {
        let mut pending = vec![Emit::Atom { atom: root, via: None }];
        while let Some(task) = pending.pop() {
            let (atom, via) = match task {
                Emit::Text(text) => {
                    out.push_str(text);
                    continue;
                }
                Emit::Atom { atom, via } => (atom, via),
            };
            if let Some(bond) = via {
                out.push_str(self.bond_symbol(bond));
            }
            out.push_str(&self.atom_symbol(atom));
            for bond in &self.ring_close[atom] {
                if let Some(digit) = digits.close(*bond) {
                    push_digit(out, digit);
                }
            }
            for bond in &self.ring_open[atom] {
                let digit = digits.open(*bond);
                out.push_str(self.bond_symbol(*bond));
                push_digit(out, digit);
            }
            // En orden inverso: la pila saca primero la primera rama.
            let kids = &self.children[atom];
            for (i, (child, bond)) in kids.iter().enumerate().rev() {
                if i + 1 < kids.len() {
                    pending.push(Emit::Text(")"));
                    pending.push(Emit::Atom { atom: *child, via: Some(*bond) });
                    pending.push(Emit::Text("("));
                } else {
                    pending.push(Emit::Atom { atom: *child, via: Some(*bond) });
                }
            }
        }
    }

    fn bond_symbol(&self, bond: usize) -> &'static str {
        let b = self.graph.bond(bond);
        let both_aromatic = self.graph.atom(b.a).aromatic && self.graph.atom(b.b).aromatic;
        match b.order {
            BondOrder::Single if both_aromatic => "-",
            BondOrder::Single => "",
            BondOrder::Double => "=",
            BondOrder::Triple => "#",
            BondOrder::Aromatic if both_aromatic => "",
            BondOrder::Aromatic => ":",
        }
    }

    fn atom_symbol(&self, index: usize) -> String {
        let atom = self.graph.atom(index);
        let symbol = if atom.aromatic {
            atom.symbol().to_ascii_lowercase()
        } else {
            atom.symbol().to_string()
        };
        let bare_aromatic_ok = !atom.aromatic || matches!(atom.element, 5 | 6 | 7 | 8 | 15 | 16);
        let bare = atom.charge == 0
                   && atom.isotope.is_none()
                   && elements::in_organic_subset(atom.element)
                   && bare_aromatic_ok
                   && self.graph.default_hydrogens(index) == Some(atom.hydrogens);
        if bare {
            return symbol;
        }
        let mut text = String::from("[");
        if let Some(isotope) = atom.isotope {
            text.push_str(&isotope.to_string());
        }
        text.push_str(&symbol);
        match atom.hydrogens {
            0 => {}
            1 => text.push('H'),
            n => text.push_str(&format!("H{n}")),
        }
        match atom.charge {
            0 => {}
            1 => text.push('+'),
            -1 => text.push('-'),
            c if c > 0 => text.push_str(&format!("+{c}")),
            c => text.push_str(&format!("-{}", c.unsigned_abs())),
        }
        text.push(']');
        text
    }
}

fn push_digit(out: &mut String, digit: u32) {
    if digit < 10 {
        out.push_str(&digit.to_string());
    } else {
        out.push_str(&format!("%{digit:02}"));
    }
}
