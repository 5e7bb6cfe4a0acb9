//! Lector de SMILES.
//!
//! Produce un `MolGraph` "crudo": enlaces aromáticos tal como se
//! escribieron, hidrógenos implícitos asignados y átomos `[H]` plegados
//! en su vecino pesado. El saneado (kekulización, valencias y percepción
//! de aromaticidad) vive en `sanitize`.

use std::collections::{BTreeSet, HashMap};

use crate::aromaticity;
use crate::elements;
use crate::errors::ParseError;
use crate::graph::{Atom, BondOrder, MolGraph};
use crate::rings;

/// Máximo de átomos (hidrógenos explícitos incluidos) que acepta el lector.
pub const MAX_ATOMS: usize = 1000;

/// Interpreta `input` y devuelve el grafo ya saneado.
pub fn parse(input: &str) -> Result<MolGraph, ParseError> {
    sanitize(parse_raw(input)?)
}

/// Interpreta `input` sin kekulizar ni verificar valencias.
pub fn parse_raw(input: &str) -> Result<MolGraph, ParseError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(ParseError::Empty);
    }
    let mut parser = Parser::new(trimmed);
    parser.run()?;
    parser.finish()
}

/// Kekuliza, comprueba valencias y vuelve a percibir aromaticidad.
pub fn sanitize(mut graph: MolGraph) -> Result<MolGraph, ParseError> {
    aromaticity::kekulize(&mut graph)?;
    check_valences(&graph)?;
    aromaticity::perceive(&mut graph);
    Ok(graph)
}

fn check_valences(graph: &MolGraph) -> Result<(), ParseError> {
    for (index, atom) in graph.atoms().iter().enumerate() {
        let allowed = elements::allowed_valences(atom.element, atom.charge);
        if allowed.is_empty() {
            continue;
        }
        let total = graph.bond_order_sum(index) + atom.hydrogens;
        if !allowed.contains(&total) {
            return Err(ParseError::Valence { index,
                                             symbol: atom.symbol(),
                                             valence: total });
        }
    }
    Ok(())
}

struct Parser {
    chars: Vec<char>,
    pos: usize,
    graph: MolGraph,
    organic: Vec<bool>,
    prev: Option<usize>,
    pending: Option<(BondOrder, usize)>,
    branches: Vec<usize>,
    open_rings: HashMap<u32, (usize, Option<BondOrder>)>,
}

impl Parser {
    fn new(input: &str) -> Self {
        Self { chars: input.chars().collect(),
               pos: 0,
               graph: MolGraph::new(),
               organic: Vec::new(),
               prev: None,
               pending: None,
               branches: Vec::new(),
               open_rings: HashMap::new() }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn unexpected(&self) -> ParseError {
        match self.peek() {
            Some(ch) => ParseError::UnexpectedChar { ch, pos: self.pos },
            None => ParseError::UnexpectedEnd,
        }
    }

    fn run(&mut self) -> Result<(), ParseError> {
        while let Some(ch) = self.peek() {
            match ch {
                '(' => {
                    let Some(prev) = self.prev else {
                        return Err(self.unexpected());
                    };
                    if self.pending.is_some() {
                        return Err(self.unexpected());
                    }
                    self.branches.push(prev);
                    self.pos += 1;
                }
                ')' => {
                    if let Some((_, at)) = self.pending {
                        return Err(ParseError::DanglingBond(at));
                    }
                    let Some(top) = self.branches.pop() else {
                        return Err(ParseError::UnbalancedBranch(self.pos));
                    };
                    self.prev = Some(top);
                    self.pos += 1;
                }
                '.' => {
                    if let Some((_, at)) = self.pending {
                        return Err(ParseError::DanglingBond(at));
                    }
                    self.prev = None;
                    self.pos += 1;
                }
                '-' | '=' | '#' | ':' | '/' | '\\' => {
                    if self.pending.is_some() || self.prev.is_none() {
                        return Err(self.unexpected());
                    }
                    let order = match ch {
                        '=' => BondOrder::Double,
                        '#' => BondOrder::Triple,
                        ':' => BondOrder::Aromatic,
                        _ => BondOrder::Single,
                    };
                    self.pending = Some((order, self.pos));
                    self.pos += 1;
                }
                '$' => return Err(ParseError::Unsupported("quadruple bond".into())),
                '*' => return Err(ParseError::Unsupported("wildcard atom".into())),
                '0'..='9' => {
                    let number = ch.to_digit(10).unwrap_or_default();
                    self.pos += 1;
                    self.ring_closure(number)?;
                }
                '%' => {
                    let (Some(d1), Some(d2)) = (self.peek_at(1).and_then(|c| c.to_digit(10)),
                                                self.peek_at(2).and_then(|c| c.to_digit(10)))
                    else {
                        return Err(self.unexpected());
                    };
                    self.pos += 3;
                    self.ring_closure(d1 * 10 + d2)?;
                }
                '[' => {
                    let atom = self.bracket_atom()?;
                    self.attach(atom, false)?;
                }
                _ => {
                    let atom = self.organic_atom()?;
                    self.attach(atom, true)?;
                }
            }
        }
        Ok(())
    }

    fn default_order(&self, a: usize, b: usize) -> BondOrder {
        if self.graph.atom(a).aromatic && self.graph.atom(b).aromatic {
            BondOrder::Aromatic
        } else {
            BondOrder::Single
        }
    }

    fn attach(&mut self, atom: Atom, organic: bool) -> Result<(), ParseError> {
        let index = self.graph.add_atom(atom);
        self.organic.push(organic);
        match (self.prev, self.pending.take()) {
            (Some(prev), pending) => {
                let order = pending.map(|(o, _)| o)
                                   .unwrap_or_else(|| self.default_order(prev, index));
                self.graph
                    .add_bond(prev, index, order)
                    .ok_or(ParseError::DuplicateBond(prev, index))?;
            }
            (None, Some((_, at))) => return Err(ParseError::DanglingBond(at)),
            (None, None) => {}
        }
        self.prev = Some(index);
        Ok(())
    }

    fn ring_closure(&mut self, number: u32) -> Result<(), ParseError> {
        let Some(current) = self.prev else {
            return Err(ParseError::UnexpectedChar { ch: '%', pos: self.pos });
        };
        let pending = self.pending.take().map(|(o, _)| o);
        match self.open_rings.remove(&number) {
            Some((open_atom, opened)) => {
                let order = match (opened, pending) {
                    (Some(a), Some(b)) if a != b => return Err(ParseError::RingBondConflict(number)),
                    (Some(a), _) => a,
                    (None, Some(b)) => b,
                    (None, None) => self.default_order(open_atom, current),
                };
                self.graph
                    .add_bond(open_atom, current, order)
                    .ok_or(ParseError::DuplicateBond(open_atom, current))?;
            }
            None => {
                self.open_rings.insert(number, (current, pending));
            }
        }
        Ok(())
    }

    fn organic_atom(&mut self) -> Result<Atom, ParseError> {
        let ch = self.peek().ok_or(ParseError::UnexpectedEnd)?;
        let two: String = [Some(ch), self.peek_at(1)].iter().flatten().collect();
        if two == "Cl" || two == "Br" {
            self.pos += 2;
            let element = elements::by_symbol(&two).ok_or_else(|| ParseError::UnknownElement(two.clone()))?;
            return Ok(Atom::new(element.number));
        }
        let (symbol, aromatic) = match ch {
            'B' | 'C' | 'N' | 'O' | 'P' | 'S' | 'F' | 'I' => (ch.to_string(), false),
            'b' | 'c' | 'n' | 'o' | 'p' | 's' => (ch.to_ascii_uppercase().to_string(), true),
            _ => return Err(self.unexpected()),
        };
        let element = elements::by_symbol(&symbol).ok_or(ParseError::UnknownElement(symbol))?;
        self.pos += 1;
        let mut atom = Atom::new(element.number);
        atom.aromatic = aromatic;
        Ok(atom)
    }

    fn number(&mut self) -> Option<u32> {
        let start = self.pos;
        let mut value: u32 = 0;
        while let Some(d) = self.peek().and_then(|c| c.to_digit(10)) {
            if self.pos - start >= 6 {
                break;
            }
            value = value * 10 + d;
            self.pos += 1;
        }
        (self.pos > start).then_some(value)
    }

    fn bracket_atom(&mut self) -> Result<Atom, ParseError> {
        self.pos += 1;
        let isotope = match self.number() {
            Some(n) => Some(u16::try_from(n).map_err(|_| ParseError::Unsupported(format!("isotope {n}")))?),
            None => None,
        };
        let (element, aromatic) = self.bracket_symbol()?;

        // estereoquímica: se lee y se descarta
        let mut chiral = false;
        while self.peek() == Some('@') {
            chiral = true;
            self.pos += 1;
        }
        if let (true, Some(a), Some(b)) = (chiral, self.peek_at(0), self.peek_at(1)) {
            let tag: String = [a, b].iter().collect();
            if ["TH", "AL", "SP", "TB", "OH"].contains(&tag.as_str()) {
                self.pos += 2;
                self.number();
            }
        }

        let mut hydrogens = 0u8;
        if self.peek() == Some('H') {
            self.pos += 1;
            let count = self.number().unwrap_or(1);
            hydrogens = u8::try_from(count).map_err(|_| ParseError::Unsupported(format!("H{count}")))?;
        }

        let mut charge: i32 = 0;
        if let Some(sign @ ('+' | '-')) = self.peek() {
            let unit = if sign == '+' { 1 } else { -1 };
            self.pos += 1;
            match self.number() {
                Some(n) => charge = unit * n as i32,
                None => {
                    charge = unit;
                    while self.peek() == Some(sign) {
                        charge += unit;
                        self.pos += 1;
                    }
                }
            }
        }
        let charge = i8::try_from(charge).map_err(|_| ParseError::Unsupported(format!("charge {charge}")))?;

        if self.peek() == Some(':') {
            self.pos += 1;
            if self.number().is_none() {
                return Err(self.unexpected());
            }
        }
        if self.peek() != Some(']') {
            return Err(self.unexpected());
        }
        self.pos += 1;

        Ok(Atom { element,
                  aromatic,
                  charge,
                  hydrogens,
                  isotope })
    }

    fn bracket_symbol(&mut self) -> Result<(u8, bool), ParseError> {
        let first = self.peek().ok_or(ParseError::UnexpectedEnd)?;
        if first.is_ascii_lowercase() {
            for candidate in ["se", "as", "b", "c", "n", "o", "p", "s"] {
                let matches = candidate.chars()
                                       .enumerate()
                                       .all(|(i, c)| self.peek_at(i) == Some(c));
                if matches {
                    let mut upper = candidate.to_string();
                    upper[..1].make_ascii_uppercase();
                    let element = elements::by_symbol(&upper).ok_or_else(|| ParseError::UnknownElement(upper.clone()))?;
                    self.pos += candidate.len();
                    return Ok((element.number, true));
                }
            }
            return Err(self.unexpected());
        }
        if !first.is_ascii_uppercase() {
            return Err(self.unexpected());
        }
        if let Some(second) = self.peek_at(1).filter(|c| c.is_ascii_lowercase()) {
            let symbol: String = [first, second].iter().collect();
            if let Some(element) = elements::by_symbol(&symbol) {
                self.pos += 2;
                return Ok((element.number, false));
            }
        }
        let symbol = first.to_string();
        let element = elements::by_symbol(&symbol).ok_or(ParseError::UnknownElement(symbol))?;
        self.pos += 1;
        Ok((element.number, false))
    }

    fn finish(self) -> Result<MolGraph, ParseError> {
        if let Some((_, at)) = self.pending {
            return Err(ParseError::DanglingBond(at));
        }
        if let Some(number) = self.open_rings.keys().min() {
            return Err(ParseError::UnclosedRing(*number));
        }
        if !self.branches.is_empty() {
            return Err(ParseError::UnbalancedBranch(self.pos));
        }
        let atoms = self.graph.atom_count();
        if atoms == 0 {
            return Err(ParseError::Empty);
        }
        if atoms > MAX_ATOMS {
            return Err(ParseError::TooLarge { atoms,
                                              limit: MAX_ATOMS });
        }
        let mut graph = self.graph;
        for (index, organic) in self.organic.iter().enumerate() {
            if *organic {
                let hydrogens = graph.default_hydrogens(index).unwrap_or(0);
                graph.atom_mut(index).hydrogens = hydrogens;
            }
        }
        let mut graph = fold_hydrogens(graph);
        let ring_bond = rings::ring_bonds(&graph);
        for (index, is_ring) in ring_bond.iter().enumerate() {
            if !is_ring && graph.bond(index).order == BondOrder::Aromatic {
                graph.set_bond_order(index, BondOrder::Single);
            }
        }
        Ok(graph)
    }
}

/// Pliega átomos `[H]` neutros unidos por enlace simple a un átomo pesado.
fn fold_hydrogens(mut graph: MolGraph) -> MolGraph {
    let mut removed = BTreeSet::new();
    for index in 0..graph.atom_count() {
        let atom = graph.atom(index);
        let candidate = atom.element == 1
                        && atom.isotope.is_none()
                        && atom.charge == 0
                        && atom.hydrogens == 0
                        && graph.degree(index) == 1;
        if !candidate {
            continue;
        }
        let (neighbor, bond) = graph.neighbors(index)[0];
        if graph.atom(neighbor).element != 1 && graph.bond(bond).order == BondOrder::Single {
            removed.insert(index);
            graph.atom_mut(neighbor).hydrogens += 1;
        }
    }
    if removed.is_empty() {
        return graph;
    }
    graph.without_atoms(&removed).0
}
