// chem-domain library entry point
pub mod canonical_json;
pub mod config;
pub mod errors;
pub mod evaluator;
pub mod library;
pub mod molecule;
pub mod run;
pub mod scoring;
pub mod trace;

pub use config::{EmptyRoundPolicy, FilterThresholds, RunConfig};
pub use errors::{ChemistryError, ConfigValidationError, LibraryError, MutationError};
pub use evaluator::{ChemistryEvaluator, Evaluation};
pub use library::{MutationLibrary, MutationRule, RuleCategory};
pub use molecule::{DescriptorSet, Molecule};
pub use run::{Run, RunStatus};
pub use scoring::{ScoreCard, ScoringService, Threshold};
pub use trace::{Agent, TraceEntry, TraceEvent, TraceOutcome};
