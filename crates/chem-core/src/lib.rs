//! chem-core: orquestación determinista del pipeline de descubrimiento.
//!
//! Compone los agentes sin estado en el bucle de rondas, mantiene el ledger
//! append-only de trazas y gobierna el ciclo de vida de cada ejecución.
pub mod errors;
pub mod hashing;
pub mod ledger;
pub mod orchestrator;
pub mod state_machine;
pub mod store;
pub mod summary;

pub use errors::{OrchestrationError, StoreError};
pub use ledger::TraceLedger;
pub use orchestrator::{OrchestratorOptions, PipelineOrchestrator, DEFAULT_MAX_MATCHES_PER_RULE};
pub use state_machine::{Pickup, RunStateMachine};
pub use store::{InMemoryRunStore, RoundCommit, RunRepository};
pub use summary::{fingerprint_results, RunSummary};
