use thiserror::Error;

/// Fallos al interpretar o sanear una cadena SMILES.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("empty structure")]
    Empty,
    #[error("structure has {atoms} atoms, limit is {limit}")]
    TooLarge { atoms: usize, limit: usize },
    #[error("unexpected character '{ch}' at position {pos}")]
    UnexpectedChar { ch: char, pos: usize },
    #[error("unexpected end of input")]
    UnexpectedEnd,
    #[error("unknown element '{0}'")]
    UnknownElement(String),
    #[error("element '{0}' cannot be aromatic")]
    NonAromaticElement(String),
    #[error("unsupported feature '{0}'")]
    Unsupported(String),
    #[error("unclosed ring bond {0}")]
    UnclosedRing(u32),
    #[error("conflicting bond orders on ring closure {0}")]
    RingBondConflict(u32),
    #[error("unbalanced branch at position {0}")]
    UnbalancedBranch(usize),
    #[error("bond symbol without a following atom at position {0}")]
    DanglingBond(usize),
    #[error("duplicate bond between atoms {0} and {1}")]
    DuplicateBond(usize, usize),
    #[error("aromatic atom {0} is not in a ring")]
    AromaticOutsideRing(usize),
    #[error("cannot kekulize aromatic system")]
    Kekulize,
    #[error("invalid valence {valence} on atom {index} ({symbol})")]
    Valence { index: usize, symbol: &'static str, valence: u8 },
}

/// Fallos al calcular descriptores sobre una estructura ya saneada.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ComputeError {
    #[error("structure has no heavy atoms")]
    NoHeavyAtoms,
    #[error("no descriptor parameters for element {0}")]
    UnsupportedElement(&'static str),
    #[error("non-finite value for descriptor {0}")]
    NonFinite(&'static str),
}

/// Fallos al compilar o aplicar un patrón de reacción.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReactionError {
    #[error("invalid reaction pattern '{pattern}': {reason}")]
    Pattern { pattern: String, reason: String },
    #[error("product exceeds valence on atom {0} ({1})")]
    Valence(usize, &'static str),
    #[error("product is fragmented")]
    Fragmented,
}

impl ReactionError {
    pub(crate) fn pattern(pattern: &str, reason: impl Into<String>) -> Self {
        ReactionError::Pattern { pattern: pattern.to_string(),
                                 reason: reason.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),
    #[error("compute error: {0}")]
    Compute(#[from] ComputeError),
    #[error("reaction error: {0}")]
    Reaction(#[from] ReactionError),
}
