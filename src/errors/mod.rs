//! Errores de la fachada de servicio.

mod service_error;

pub use service_error::ServiceError;
