//! Patrones de reacción `reactivo>>producto` (subconjunto de SMARTS).
//!
//! Primitivas de átomo: símbolo (la caja indica aromaticidad), `#n`, `Hn`,
//! carga y `:mapa`. Enlaces: `- = # : ~`; sin símbolo significa "simple o
//! aromático". Los átomos mapeados se conservan, los no mapeados del
//! reactivo se eliminan y los no mapeados del producto se crean.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::str::FromStr;

use crate::elements;
use crate::errors::ReactionError;
use crate::graph::{Atom, BondOrder, MolGraph};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct QueryAtom {
    element: Option<u8>,
    aromatic: Option<bool>,
    hydrogens: Option<u8>,
    charge: Option<i8>,
    map: Option<u32>,
}

impl QueryAtom {
    fn matches(&self, atom: &Atom) -> bool {
        self.element.is_none_or_eq(atom.element)
        && self.aromatic.is_none_or_eq(atom.aromatic)
        && self.hydrogens.is_none_or_eq(atom.hydrogens)
        && self.charge.is_none_or_eq(atom.charge)
    }
}

trait OptionalConstraint<T> {
    fn is_none_or_eq(&self, value: T) -> bool;
}

impl<T: PartialEq + Copy> OptionalConstraint<T> for Option<T> {
    fn is_none_or_eq(&self, value: T) -> bool {
        self.map_or(true, |expected| expected == value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QueryBond {
    Single,
    Double,
    Triple,
    Aromatic,
    Any,
    Unspecified,
}

impl QueryBond {
    fn matches(self, order: BondOrder) -> bool {
        match self {
            QueryBond::Single => order == BondOrder::Single,
            QueryBond::Double => order == BondOrder::Double,
            QueryBond::Triple => order == BondOrder::Triple,
            QueryBond::Aromatic => order == BondOrder::Aromatic,
            QueryBond::Any => true,
            QueryBond::Unspecified => matches!(order, BondOrder::Single | BondOrder::Aromatic),
        }
    }

    fn explicit_order(self) -> Option<BondOrder> {
        match self {
            QueryBond::Single => Some(BondOrder::Single),
            QueryBond::Double => Some(BondOrder::Double),
            QueryBond::Triple => Some(BondOrder::Triple),
            QueryBond::Aromatic => Some(BondOrder::Aromatic),
            QueryBond::Any | QueryBond::Unspecified => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
struct Pattern {
    atoms: Vec<QueryAtom>,
    bonds: Vec<(usize, usize, QueryBond)>,
}

impl Pattern {
    fn bond_between(&self, a: usize, b: usize) -> Option<QueryBond> {
        self.bonds
            .iter()
            .find(|(x, y, _)| (*x == a && *y == b) || (*x == b && *y == a))
            .map(|(_, _, q)| *q)
    }

    /// Enlaces hacia átomos de índice menor, usados para anclar la búsqueda.
    fn earlier_bonds(&self, atom: usize) -> Vec<(usize, QueryBond)> {
        self.bonds
            .iter()
            .filter_map(|(a, b, q)| match (*a, *b) {
                (x, y) if x == atom && y < atom => Some((y, *q)),
                (x, y) if y == atom && x < atom => Some((x, *q)),
                _ => None,
            })
            .collect()
    }

    fn maps(&self) -> Result<HashSet<u32>, String> {
        let mut seen = HashSet::new();
        for map in self.atoms.iter().filter_map(|a| a.map) {
            if !seen.insert(map) {
                return Err(format!("map number {map} used twice"));
            }
        }
        Ok(seen)
    }
}

struct PatternParser<'a> {
    chars: Vec<char>,
    pos: usize,
    source: &'a str,
    pattern: Pattern,
    prev: Option<usize>,
    pending: Option<QueryBond>,
    branches: Vec<usize>,
    open_rings: HashMap<u32, (usize, Option<QueryBond>)>,
}

impl<'a> PatternParser<'a> {
    fn parse(text: &str, source: &'a str) -> Result<Pattern, ReactionError> {
        let mut parser = PatternParser { chars: text.trim().chars().collect(),
                                         pos: 0,
                                         source,
                                         pattern: Pattern::default(),
                                         prev: None,
                                         pending: None,
                                         branches: Vec::new(),
                                         open_rings: HashMap::new() };
        parser.run()?;
        if parser.pattern.atoms.is_empty() {
            return Err(parser.fail("empty side"));
        }
        if parser.pending.is_some() || !parser.branches.is_empty() || !parser.open_rings.is_empty() {
            return Err(parser.fail("unterminated bond, branch or ring"));
        }
        Ok(parser.pattern)
    }

    fn fail(&self, reason: impl Into<String>) -> ReactionError {
        ReactionError::pattern(self.source, reason)
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn run(&mut self) -> Result<(), ReactionError> {
        while let Some(ch) = self.peek() {
            match ch {
                '(' => {
                    let prev = self.prev.ok_or_else(|| self.fail("branch without atom"))?;
                    self.branches.push(prev);
                    self.pos += 1;
                }
                ')' => {
                    let top = self.branches.pop().ok_or_else(|| self.fail("unbalanced ')'"))?;
                    self.prev = Some(top);
                    self.pos += 1;
                }
                '-' | '=' | '#' | ':' | '~' => {
                    if self.pending.is_some() {
                        return Err(self.fail(format!("double bond symbol at {}", self.pos)));
                    }
                    self.pending = Some(match ch {
                                            '-' => QueryBond::Single,
                                            '=' => QueryBond::Double,
                                            '#' => QueryBond::Triple,
                                            ':' => QueryBond::Aromatic,
                                            _ => QueryBond::Any,
                                        });
                    self.pos += 1;
                }
                '0'..='9' => {
                    let number = ch.to_digit(10).unwrap_or_default();
                    self.pos += 1;
                    self.ring_closure(number)?;
                }
                '[' => {
                    let atom = self.bracket()?;
                    self.attach(atom)?;
                }
                _ => {
                    let atom = self.bare()?;
                    self.attach(atom)?;
                }
            }
        }
        Ok(())
    }

    fn attach(&mut self, atom: QueryAtom) -> Result<(), ReactionError> {
        let index = self.pattern.atoms.len();
        self.pattern.atoms.push(atom);
        let bond = self.pending.take().unwrap_or(QueryBond::Unspecified);
        if let Some(prev) = self.prev {
            self.pattern.bonds.push((prev, index, bond));
        } else if bond != QueryBond::Unspecified {
            return Err(self.fail("bond without preceding atom"));
        }
        self.prev = Some(index);
        Ok(())
    }

    fn ring_closure(&mut self, number: u32) -> Result<(), ReactionError> {
        let current = self.prev.ok_or_else(|| self.fail("ring closure without atom"))?;
        let pending = self.pending.take();
        match self.open_rings.remove(&number) {
            Some((open, opened)) => {
                let bond = opened.or(pending).unwrap_or(QueryBond::Unspecified);
                self.pattern.bonds.push((open, current, bond));
            }
            None => {
                self.open_rings.insert(number, (current, pending));
            }
        }
        Ok(())
    }

    fn bare(&mut self) -> Result<QueryAtom, ReactionError> {
        let ch = self.peek().ok_or_else(|| self.fail("unexpected end"))?;
        let next = self.chars.get(self.pos + 1).copied();
        let (symbol, aromatic, width) = match (ch, next) {
            ('C', Some('l')) => ("Cl".to_string(), false, 2),
            ('B', Some('r')) => ("Br".to_string(), false, 2),
            ('B' | 'C' | 'N' | 'O' | 'P' | 'S' | 'F' | 'I', _) => (ch.to_string(), false, 1),
            ('b' | 'c' | 'n' | 'o' | 'p' | 's', _) => (ch.to_ascii_uppercase().to_string(), true, 1),
            _ => return Err(self.fail(format!("unexpected '{ch}' at {}", self.pos))),
        };
        let element = elements::by_symbol(&symbol).ok_or_else(|| self.fail(format!("unknown element {symbol}")))?;
        self.pos += width;
        Ok(QueryAtom { element: Some(element.number),
                       aromatic: Some(aromatic),
                       ..QueryAtom::default() })
    }

    fn number(&mut self) -> Option<u32> {
        let start = self.pos;
        let mut value = 0u32;
        while let Some(d) = self.peek().and_then(|c| c.to_digit(10)) {
            if self.pos - start >= 4 {
                break;
            }
            value = value * 10 + d;
            self.pos += 1;
        }
        (self.pos > start).then_some(value)
    }

    fn bracket(&mut self) -> Result<QueryAtom, ReactionError> {
        self.pos += 1;
        let mut atom = QueryAtom::default();

        match self.peek() {
            Some('#') => {
                self.pos += 1;
                let number = self.number().ok_or_else(|| self.fail("'#' without atomic number"))?;
                let element = u8::try_from(number).ok()
                                                  .and_then(elements::by_number)
                                                  .ok_or_else(|| self.fail(format!("unknown atomic number {number}")))?;
                atom.element = Some(element.number);
            }
            Some(c) if c.is_ascii_lowercase() => {
                let symbol = c.to_ascii_uppercase().to_string();
                let element = elements::by_symbol(&symbol).filter(|e| elements::aromatic_capable(e.number))
                                                          .ok_or_else(|| self.fail(format!("bad aromatic symbol {c}")))?;
                atom.element = Some(element.number);
                atom.aromatic = Some(true);
                self.pos += 1;
            }
            Some(c) if c.is_ascii_uppercase() => {
                let two: Option<String> = self.chars
                                              .get(self.pos + 1)
                                              .filter(|n| n.is_ascii_lowercase())
                                              .map(|n| [c, *n].iter().collect());
                let element = match two.as_deref().and_then(elements::by_symbol) {
                    Some(e) => {
                        self.pos += 2;
                        e
                    }
                    None => {
                        let e = elements::by_symbol(&c.to_string()).ok_or_else(|| self.fail(format!("unknown element {c}")))?;
                        self.pos += 1;
                        e
                    }
                };
                atom.element = Some(element.number);
                atom.aromatic = Some(false);
            }
            _ => return Err(self.fail("bracket atom without element")),
        }

        if self.peek() == Some('H') {
            self.pos += 1;
            let count = self.number().unwrap_or(1);
            atom.hydrogens = Some(u8::try_from(count).map_err(|_| self.fail("hydrogen count too large"))?);
        }
        if let Some(sign @ ('+' | '-')) = self.peek() {
            self.pos += 1;
            let magnitude = self.number().unwrap_or(1) as i32;
            let signed = if sign == '+' { magnitude } else { -magnitude };
            atom.charge = Some(i8::try_from(signed).map_err(|_| self.fail("charge out of range"))?);
        }
        if self.peek() == Some(':') {
            self.pos += 1;
            atom.map = Some(self.number().ok_or_else(|| self.fail("':' without map number"))?);
        }
        if self.peek() != Some(']') {
            return Err(self.fail(format!("unsupported primitive at {}", self.pos)));
        }
        self.pos += 1;
        Ok(atom)
    }
}

/// Regla de reescritura compilada. Inmutable y compartible entre hilos.
#[derive(Debug, Clone)]
pub struct Reaction {
    source: String,
    reactant: Pattern,
    product: Pattern,
}

impl FromStr for Reaction {
    type Err = ReactionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Reaction::parse(s)
    }
}

impl Reaction {
    pub fn parse(text: &str) -> Result<Self, ReactionError> {
        let (lhs, rhs) = text.split_once(">>")
                             .ok_or_else(|| ReactionError::pattern(text, "missing '>>'"))?;
        let reactant = PatternParser::parse(lhs, text)?;
        let product = PatternParser::parse(rhs, text)?;

        let reactant_maps = reactant.maps().map_err(|e| ReactionError::pattern(text, e))?;
        let product_maps = product.maps().map_err(|e| ReactionError::pattern(text, e))?;
        if let Some(orphan) = product_maps.iter().find(|m| !reactant_maps.contains(m)) {
            return Err(ReactionError::pattern(text, format!("product map {orphan} missing in reactant")));
        }
        Ok(Self { source: text.to_string(),
                  reactant,
                  product })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Asignaciones patrón → átomo, únicas por conjunto de átomos, en orden
    /// determinista y a lo sumo `limit`.
    pub fn matches(&self, mol: &MolGraph, limit: usize) -> Vec<Vec<usize>> {
        let mut search = Search { pattern: &self.reactant,
                                  mol,
                                  limit,
                                  assignment: vec![usize::MAX; self.reactant.atoms.len()],
                                  used: vec![false; mol.atom_count()],
                                  seen: HashSet::new(),
                                  found: Vec::new() };
        if limit > 0 {
            search.extend(0);
        }
        search.found
    }

    /// Aplica la regla en cada coincidencia. Cada producto es independiente.
    pub fn apply(&self, mol: &MolGraph, limit: usize) -> Vec<Result<MolGraph, ReactionError>> {
        self.matches(mol, limit)
            .iter()
            .map(|m| self.rewrite(mol, m))
            .collect()
    }

    fn rewrite(&self, mol: &MolGraph, matched: &[usize]) -> Result<MolGraph, ReactionError> {
        let product_maps: HashSet<u32> = self.product.atoms.iter().filter_map(|a| a.map).collect();
        let by_map: HashMap<u32, usize> = self.reactant
                                              .atoms
                                              .iter()
                                              .enumerate()
                                              .filter_map(|(i, q)| q.map.map(|m| (m, matched[i])))
                                              .collect();
        let removed: BTreeSet<usize> = self.reactant
                                           .atoms
                                           .iter()
                                           .enumerate()
                                           .filter(|(_, q)| !q.map.is_some_and(|m| product_maps.contains(&m)))
                                           .map(|(i, _)| matched[i])
                                           .collect();

        let mut atoms: Vec<Atom> = mol.atoms().to_vec();
        let mut bonds: BTreeMap<(usize, usize), BondOrder> =
            mol.bonds().iter().map(|b| (ordered(b.a, b.b), b.order)).collect();
        let mut dirty = BTreeSet::new();
        let mut placed = Vec::with_capacity(self.product.atoms.len());

        for query in &self.product.atoms {
            let index = match query.map.and_then(|m| by_map.get(&m).copied()) {
                Some(existing) => {
                    let atom = &mut atoms[existing];
                    if let Some(element) = query.element {
                        atom.element = element;
                    }
                    if let Some(aromatic) = query.aromatic {
                        atom.aromatic = aromatic;
                    }
                    if let Some(charge) = query.charge {
                        atom.charge = charge;
                    }
                    existing
                }
                None => {
                    let element = query.element
                                       .ok_or_else(|| ReactionError::pattern(&self.source, "new atom without element"))?;
                    let mut atom = Atom::new(element);
                    atom.aromatic = query.aromatic.unwrap_or(false);
                    atom.charge = query.charge.unwrap_or(0);
                    atoms.push(atom);
                    atoms.len() - 1
                }
            };
            match query.hydrogens {
                Some(h) => atoms[index].hydrogens = h,
                None => {
                    dirty.insert(index);
                }
            }
            placed.push(index);
        }

        let position: HashMap<usize, usize> = placed.iter().enumerate().map(|(p, i)| (*i, p)).collect();
        for (a, b, _) in &self.reactant.bonds {
            let (ia, ib) = (matched[*a], matched[*b]);
            if let (Some(pa), Some(pb)) = (position.get(&ia), position.get(&ib)) {
                if self.product.bond_between(*pa, *pb).is_none() {
                    bonds.remove(&ordered(ia, ib));
                    dirty.insert(ia);
                    dirty.insert(ib);
                }
            }
        }
        for (pa, pb, query) in &self.product.bonds {
            let (ia, ib) = (placed[*pa], placed[*pb]);
            let key = ordered(ia, ib);
            let order = query.explicit_order().unwrap_or_else(|| {
                                                  bonds.get(&key).copied().unwrap_or(if atoms[ia].aromatic
                                                                                        && atoms[ib].aromatic
                                                                                     {
                                                                                         BondOrder::Aromatic
                                                                                     } else {
                                                                                         BondOrder::Single
                                                                                     })
                                              });
            bonds.insert(key, order);
        }

        let mut graph = MolGraph::new();
        let mut remap = vec![None; atoms.len()];
        for (index, atom) in atoms.into_iter().enumerate() {
            if !removed.contains(&index) {
                remap[index] = Some(graph.add_atom(atom));
            }
        }
        for ((a, b), order) in bonds {
            if let (Some(x), Some(y)) = (remap[a], remap[b]) {
                graph.add_bond(x, y, order);
            }
        }
        for index in dirty {
            let Some(x) = remap[index] else { continue };
            let hydrogens = graph.default_hydrogens(x)
                                 .ok_or_else(|| ReactionError::Valence(x, graph.atom(x).symbol()))?;
            graph.atom_mut(x).hydrogens = hydrogens;
        }
        if graph.components().len() > mol.components().len() {
            return Err(ReactionError::Fragmented);
        }
        Ok(graph)
    }
}

fn ordered(a: usize, b: usize) -> (usize, usize) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

struct Search<'a> {
    pattern: &'a Pattern,
    mol: &'a MolGraph,
    limit: usize,
    assignment: Vec<usize>,
    used: Vec<bool>,
    seen: HashSet<Vec<usize>>,
    found: Vec<Vec<usize>>,
}

impl Search<'_> {
    fn extend(&mut self, depth: usize) {
        if self.found.len() >= self.limit {
            return;
        }
        if depth == self.pattern.atoms.len() {
            let mut key = self.assignment.clone();
            key.sort_unstable();
            if self.seen.insert(key) {
                self.found.push(self.assignment.clone());
            }
            return;
        }
        let earlier = self.pattern.earlier_bonds(depth);
        let candidates: Vec<usize> = match earlier.iter().map(|(j, _)| *j).min() {
            Some(anchor) => self.mol
                                .neighbors(self.assignment[anchor])
                                .iter()
                                .map(|(v, _)| *v)
                                .collect(),
            None => (0..self.mol.atom_count()).collect(),
        };
        for candidate in candidates {
            if self.used[candidate] || !self.pattern.atoms[depth].matches(self.mol.atom(candidate)) {
                continue;
            }
            let bonded = earlier.iter().all(|(j, query)| {
                                           self.mol
                                               .bond_between(candidate, self.assignment[*j])
                                               .is_some_and(|b| query.matches(self.mol.bond(b).order))
                                       });
            if !bonded {
                continue;
            }
            self.assignment[depth] = candidate;
            self.used[candidate] = true;
            self.extend(depth + 1);
            self.used[candidate] = false;
            if self.found.len() >= self.limit {
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canon::write_smiles;
    use crate::smiles::parse;

    fn run(rule: &str, smiles: &str) -> Vec<String> {
        let reaction = Reaction::parse(rule).expect(rule);
        let mol = parse(smiles).expect(smiles);
        reaction.apply(&mol, 32)
                .into_iter()
                .map(|r| {
                    let g = r.expect("producto");
                    write_smiles(&parse(&write_smiles(&g)).expect("reparse"))
                })
                .collect()
    }

    fn canon(smiles: &str) -> String {
        write_smiles(&parse(smiles).expect(smiles))
    }

    #[test]
    fn halogen_swap_keeps_the_scaffold() {
        assert_eq!(run("[#6:1]F>>[#6:1]Cl", "Fc1ccccc1"), vec![canon("Clc1ccccc1")]);
    }

    #[test]
    fn hydroxyl_to_methyl_ether() {
        assert_eq!(run("[#6:1][OH1:2]>>[#6:1][O:2]C", "CCO"), vec![canon("CCOC")]);
    }

    #[test]
    fn demethylation_removes_terminal_methyl() {
        assert_eq!(run("[C:1][CH3]>>[C:1]", "CCO"), vec![canon("CO")]);
        assert!(run("[C:1][CH3]>>[C:1]", "Cc1ccccc1").is_empty());
    }

    #[test]
    fn ring_nitrogen_hop_produces_pyridine() {
        let products = run("[cH:1]>>[n:1]", "c1ccccc1");
        assert_eq!(products.len(), 6);
        assert!(products.iter().all(|p| *p == canon("c1ccncc1")));
    }

    #[test]
    fn aromatic_methylation_consumes_ring_hydrogen() {
        let products = run("[cH:1]>>[c:1]C", "c1ccncc1");
        assert!(products.contains(&canon("Cc1ccncc1")));
        assert!(products.contains(&canon("Cc1ccccn1")));
    }

    #[test]
    fn match_limit_is_respected() {
        let reaction = Reaction::parse("[cH:1]>>[c:1]C").expect("regla");
        let mol = parse("c1ccccc1").expect("benceno");
        assert_eq!(reaction.matches(&mol, 2).len(), 2);
        assert!(reaction.matches(&parse("CCO").expect("etanol"), 32).is_empty());
    }

    #[test]
    fn invalid_patterns_are_rejected() {
        assert!(Reaction::parse("[#6:1]F").is_err());
        assert!(Reaction::parse("[#6:1]F>>[#6:2]Cl").is_err());
        assert!(Reaction::parse("[#6:1][Q]>>[#6:1]").is_err());
        assert!(Reaction::parse("[C:1][C:1]>>[C:1]").is_err());
    }

    #[test]
    fn overloaded_product_is_a_valence_error() {
        let reaction = Reaction::parse("[#6:1]>>[#6:1](C)(C)(C)(C)C").expect("regla");
        let mol = parse("C").expect("metano");
        let results = reaction.apply(&mol, 4);
        assert!(matches!(results[0], Err(ReactionError::Valence(..))));
    }
}
