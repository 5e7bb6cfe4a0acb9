//! Hash helpers sobre blake3.

use blake3::Hasher;
use serde::Serialize;

use super::to_canonical_json;

/// Hashea un string y devuelve hex.
pub fn hash_str(input: &str) -> String {
    let mut h = Hasher::new();
    h.update(input.as_bytes());
    h.finalize().to_hex().to_string()
}

/// Hash del JSON canónico de un valor.
pub fn hash_value(value: &serde_json::Value) -> String {
    hash_str(&to_canonical_json(value))
}

/// Hash canónico de cualquier valor serializable. Un valor que no se puede
/// serializar hashea como `null`.
pub fn hash_serializable<T: Serialize + ?Sized>(value: &T) -> String {
    hash_value(&serde_json::to_value(value).unwrap_or_default())
}
