//! Módulo de hashing y canonicalización JSON.

pub mod hash;

pub use chem_domain::canonical_json::to_canonical_json;
pub use hash::{hash_serializable, hash_str, hash_value};
