//! chem-agents – agentes sin estado del pipeline de descubrimiento.
//!
//! Cada agente es una función pura sobre una entrada explícita: no lee ni
//! escribe almacenamiento y no guarda estado entre llamadas. El orquestador
//! les entrega todo lo que necesitan y persiste lo que devuelven.

pub mod generator;
pub mod planner;
pub mod ranker;

pub use generator::{Candidate, GenerationOutput, GeneratorAgent, LineageRef};
pub use planner::{PlannerAgent, RoundSummary, Strategy, StrategyKind};
pub use ranker::RankerAgent;
