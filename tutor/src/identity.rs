//! Stable, key-safe identifiers for partitioning conversation history.
//!
//! The identifier is URL-safe base64 (no padding) of the UTF-8 bytes of the
//! trimmed input, prefixed with `u_`. Encoding the bytes rather than the
//! characters keeps Arabic and Hebrew names safe; the prefix keeps every
//! encoded id distinct from [`GUEST_IDENTITY`].

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;

pub const GUEST_IDENTITY: &str = "guest";
const IDENTITY_PREFIX: &str = "u_";

/// Derive the partition key for an optional authenticated e-mail or name.
///
/// Input that looks like an e-mail address is lower-cased first so one
/// account always maps to one identifier.
#[must_use]
pub fn resolve_identity(input: Option<&str>) -> String {
    let Some(trimmed) = input.map(str::trim).filter(|s| !s.is_empty()) else {
        return GUEST_IDENTITY.to_owned();
    };
    let canonical = if trimmed.contains('@') { trimmed.to_lowercase() } else { trimmed.to_owned() };
    format!("{IDENTITY_PREFIX}{}", URL_SAFE_NO_PAD.encode(canonical.as_bytes()))
}

/// Recover the input an identifier was derived from. `None` for the guest
/// identity and for anything not produced by [`resolve_identity`].
#[must_use]
pub fn decode_identity(identity: &str) -> Option<String> {
    let encoded = identity.strip_prefix(IDENTITY_PREFIX)?;
    let bytes = URL_SAFE_NO_PAD.decode(encoded).ok()?;
    String::from_utf8(bytes).ok()
}

#[cfg(test)]
#[path = "identity_test.rs"]
mod tests;
