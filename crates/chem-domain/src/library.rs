// library.rs
use std::collections::HashSet;
use std::fmt;
use std::path::Path;

use chemengine::{canon, MolGraph, Reaction};
use log::info;
use serde::{Deserialize, Serialize};

use crate::{LibraryError, MutationError};

/// Catálogo incluido en el binario.
const BUILTIN_CATALOG: &str = include_str!("../data/mutation_library.json");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleCategory {
    Substitution,
    Addition,
    Removal,
    ScaffoldHop,
}

impl RuleCategory {
    pub const ALL: [RuleCategory; 4] = [RuleCategory::Substitution,
                                        RuleCategory::Addition,
                                        RuleCategory::Removal,
                                        RuleCategory::ScaffoldHop];

    pub fn as_str(&self) -> &'static str {
        match self {
            RuleCategory::Substitution => "substitution",
            RuleCategory::Addition => "addition",
            RuleCategory::Removal => "removal",
            RuleCategory::ScaffoldHop => "scaffold_hop",
        }
    }
}

impl fmt::Display for RuleCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Entrada del catálogo tal como se escribe en JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleEntry {
    pub label: String,
    pub reaction: String,
    pub purpose: String,
    pub category: RuleCategory,
}

/// Regla compilada. Todas las reglas se tratan igual: patrón + etiqueta.
#[derive(Debug, Clone)]
pub struct MutationRule {
    entry: RuleEntry,
    reaction: Reaction,
}

impl MutationRule {
    pub fn compile(entry: RuleEntry) -> Result<Self, LibraryError> {
        let reaction = Reaction::parse(&entry.reaction).map_err(|source| LibraryError::Pattern { label: entry.label.clone(),
                                                                                                   source })?;
        Ok(Self { entry, reaction })
    }

    pub fn label(&self) -> &str {
        &self.entry.label
    }

    pub fn purpose(&self) -> &str {
        &self.entry.purpose
    }

    pub fn category(&self) -> RuleCategory {
        self.entry.category
    }

    pub fn pattern(&self) -> &str {
        &self.entry.reaction
    }

    pub fn entry(&self) -> &RuleEntry {
        &self.entry
    }

    /// Productos crudos (sin sanear) de aplicar la regla a `parent`, uno por
    /// sitio de coincidencia, en orden determinista.
    pub fn apply(&self, parent_structure: &str, parent: &MolGraph, max_matches: usize) -> Vec<Result<String, MutationError>> {
        self.reaction
            .apply(parent, max_matches)
            .into_iter()
            .map(|product| {
                product.map(|graph| canon::write_smiles(&graph))
                       .map_err(|e| MutationError::rewrite(self.label(), parent_structure, &e))
            })
            .collect()
    }
}

/// Catálogo de reglas de solo lectura, compartible entre hilos.
#[derive(Debug, Clone)]
pub struct MutationLibrary {
    rules: Vec<MutationRule>,
}

impl MutationLibrary {
    pub fn builtin() -> Result<Self, LibraryError> {
        Self::from_json(BUILTIN_CATALOG)
    }

    pub fn from_json(json: &str) -> Result<Self, LibraryError> {
        let entries: Vec<RuleEntry> = serde_json::from_str(json)?;
        Self::from_entries(entries)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, LibraryError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| LibraryError::Io { path: path.display().to_string(),
                                                                                     source })?;
        let library = Self::from_json(&json)?;
        info!("Biblioteca de mutaciones cargada desde {} ({} reglas)", path.display(), library.len());
        Ok(library)
    }

    pub fn from_entries(entries: Vec<RuleEntry>) -> Result<Self, LibraryError> {
        if entries.is_empty() {
            return Err(LibraryError::Empty);
        }
        let mut labels = HashSet::new();
        let mut rules = Vec::with_capacity(entries.len());
        for entry in entries {
            if !labels.insert(entry.label.clone()) {
                return Err(LibraryError::DuplicateLabel(entry.label));
            }
            rules.push(MutationRule::compile(entry)?);
        }
        Ok(Self { rules })
    }

    pub fn rules(&self) -> &[MutationRule] {
        &self.rules
    }

    pub fn get(&self, label: &str) -> Option<&MutationRule> {
        self.rules.iter().find(|r| r.label() == label)
    }

    /// Reglas de las categorías dadas, en orden de catálogo.
    pub fn select<'a>(&'a self, categories: &'a [RuleCategory]) -> impl Iterator<Item = &'a MutationRule> + 'a {
        self.rules.iter().filter(move |r| categories.contains(&r.category()))
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ChemistryEvaluator;

    fn products(library: &MutationLibrary, label: &str, smiles: &str) -> Vec<String> {
        let evaluator = ChemistryEvaluator::new();
        let graph = evaluator.structure(smiles).expect(smiles);
        let rule = library.get(label).expect(label);
        rule.apply(smiles, &graph, 32)
            .into_iter()
            .map(|p| evaluator.canonicalize(&p.expect("producto")).expect("canónico"))
            .collect()
    }

    #[test]
    fn builtin_catalog_loads_every_rule() {
        let library = MutationLibrary::builtin().expect("catálogo");
        assert_eq!(library.len(), 12);
        for category in RuleCategory::ALL {
            assert!(library.select(&[category]).next().is_some(), "sin reglas de {category}");
        }
        assert_eq!(library.get("ring_nitrogen_hop").map(|r| r.category()), Some(RuleCategory::ScaffoldHop));
    }

    #[test]
    fn ethanol_yields_methanol_and_ether() {
        let library = MutationLibrary::builtin().expect("catálogo");
        assert_eq!(products(&library, "demethylation", "CCO"), vec!["CO".to_string()]);
        assert_eq!(products(&library, "OH_to_OCH3", "CCO"), vec!["CCOC".to_string()]);
        assert!(products(&library, "F_to_Cl", "CCO").is_empty());
    }

    #[test]
    fn demethylation_leaves_aryl_methyls_alone() {
        let library = MutationLibrary::builtin().expect("catálogo");
        assert!(products(&library, "demethylation", "Cc1ccccc1").is_empty());
        let toluene = ChemistryEvaluator::new().canonicalize("Cc1ccccc1").expect("tolueno");
        assert_eq!(products(&library, "demethylation", "CCc1ccccc1"), vec![toluene]);
    }

    #[test]
    fn reverse_rules_undo_forward_rules() {
        let library = MutationLibrary::builtin().expect("catálogo");
        assert_eq!(products(&library, "OCH3_to_OH", "CCOC"), vec!["CCO".to_string()]);
        assert_eq!(products(&library, "NHCH3_to_NH2", "CCNC"), vec!["CCN".to_string()]);
        assert_eq!(products(&library, "Cl_to_Br", "Clc1ccccc1"), vec!["Brc1ccccc1".to_string()]);
    }

    #[test]
    fn malformed_catalogs_are_rejected() {
        assert!(matches!(MutationLibrary::from_json("[]"), Err(LibraryError::Empty)));
        assert!(matches!(MutationLibrary::from_json("{"), Err(LibraryError::Json(_))));
        let dup = r#"[{"label":"a","reaction":"[#6:1]F>>[#6:1]Cl","purpose":"x","category":"substitution"},
                      {"label":"a","reaction":"[#6:1]Cl>>[#6:1]F","purpose":"y","category":"substitution"}]"#;
        assert!(matches!(MutationLibrary::from_json(dup), Err(LibraryError::DuplicateLabel(l)) if l == "a"));
        let bad = r#"[{"label":"b","reaction":"[#6:1]F","purpose":"x","category":"removal"}]"#;
        assert!(matches!(MutationLibrary::from_json(bad), Err(LibraryError::Pattern { .. })));
    }
}
