use chem_core::hashing::{hash_serializable, hash_str, hash_value, to_canonical_json};
use chem_core::fingerprint_results;
use serde_json::json;

#[test]
fn hash_value_ignores_key_order() {
    let h = hash_value(&json!({"rank": [1, 2], "run": "a"}));
    // blake3 hex length is 64
    assert_eq!(h.len(), 64);
    assert_eq!(h, hash_value(&json!({"run": "a", "rank": [1, 2]})));
    assert_ne!(h, hash_value(&json!({"run": "a", "rank": [2, 1]})));
}

#[test]
fn canonical_json_sorts_nested_keys() {
    let canonical = to_canonical_json(&json!({"z": {"b": 1, "a": null}, "m": [{"y": 1, "x": 2}]}));
    assert_eq!(canonical, r#"{"m":[{"x":2,"y":1}],"z":{"a":null,"b":1}}"#);
    assert_eq!(hash_str(&canonical), hash_value(&json!({"m": [{"x": 2, "y": 1}], "z": {"b": 1, "a": null}})));
}

#[test]
fn serializable_hash_matches_value_hash() {
    let config = chem_domain::RunConfig::new(vec!["CCO".into()], 2, 5, 3);
    let via_value = hash_value(&serde_json::to_value(&config).expect("json"));
    assert_eq!(hash_serializable(&config), via_value);
}

#[test]
fn empty_result_set_still_has_a_fingerprint() {
    let a = fingerprint_results(&[], &[]);
    assert_eq!(a.len(), 64);
    assert_eq!(a, fingerprint_results(&[], &[]));
}
