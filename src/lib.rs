//! chemflow-discovery
//!
//! Fachada de servicio del pipeline de descubrimiento:
//! - `service`: envío de ejecuciones (devuelve el id al instante) y
//!   consultas de estado, moléculas, trazas y resumen.
//! - `worker`: cola en proceso al-menos-una-vez y worker tokio.
//! - `views`: respuestas serializables.
//! - `config`: configuración desde entorno (.env).

pub mod config;
pub mod errors;
pub mod service;
pub mod views;
pub mod worker;

pub use config::{DiscoveryConfig, CONFIG};
pub use errors::ServiceError;
pub use service::DiscoveryService;
pub use views::{MoleculeView, RunStatusView, TraceView};
pub use worker::{deliver, spawn_worker, TaskQueue};
