//! Canonical Serializer (spec.md §4.F).
//!
//! Turns a finished `Payload` into the exact JSON bytes the pipeline
//! emits: object keys in ascending codepoint order at every level, a
//! compact encoding with no incidental whitespace, and a `checksum`
//! field covering the rest of `provenance` plus `files`/`notes`.
//!
//! Key ordering falls out of `serde_json`'s default `Map` backing
//! (`BTreeMap`, since this crate does not enable `preserve_order`), but
//! only once a value has actually passed through `serde_json::Value`:
//! serializing a struct straight to a string instead writes its fields
//! in declaration order. So every canonical encode here goes through
//! `to_value` first; `to_string` on the resulting `Value::Object` then
//! walks its `BTreeMap` in codepoint order at every level for free.

use sha2::{Digest, Sha256};

use crate::model::Payload;

/// Canonicalize `payload` into a key-sorted `serde_json::Value` (spec.md
/// §4.F.2).
fn to_canonical_value(payload: &Payload) -> serde_json::Result<serde_json::Value> {
    serde_json::to_value(payload)
}

/// Hash the canonical JSON bytes of `payload` as it stands (spec.md
/// §4.F.6's first pass). The caller is responsible for blanking
/// `provenance.checksum` beforehand.
pub fn compute_checksum(payload: &Payload) -> serde_json::Result<String> {
    let json = serde_json::to_string(&to_canonical_value(payload)?)?;
    Ok(hex::encode(Sha256::digest(json.as_bytes())))
}

/// Serialize `payload` to its final canonical JSON, computing and
/// filling in `provenance.checksum` via the two-pass algorithm spec.md
/// §4.F.6 describes: serialize once with a blank checksum, hash those
/// bytes, then serialize again with the real checksum in place.
pub fn serialize_payload(mut payload: Payload) -> serde_json::Result<String> {
    payload.provenance.checksum = String::new();
    payload.provenance.checksum = compute_checksum(&payload)?;
    serde_json::to_string(&to_canonical_value(&payload)?)
}

/// Canonically serialize any already-finalized `Serialize` value. In
/// practice, the top-level `Envelope` the CLI and HTTP collaborators
/// emit. Routes through `Value` for the same reason `to_canonical_value`
/// does: the envelope's own `{ok, data}`/`{ok, error}` keys are subject
/// to spec.md §4.F's ordering rule just as much as `Payload`'s are.
pub fn serialize_canonical<T: serde::Serialize>(value: &T) -> serde_json::Result<String> {
    serde_json::to_string(&serde_json::to_value(value)?)
}
