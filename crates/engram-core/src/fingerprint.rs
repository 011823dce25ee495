//! Content normalization and hashing shared by the dedup gate and the
//! embedding cache, so both agree on what "the same text" means.

use crate::constants::NODE_TEXT_SEPARATOR;
use crate::models::AuthScope;

/// Lower-case, collapse runs of whitespace, and trim.
pub fn normalize_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for word in text.split_whitespace() {
        if !out.is_empty() {
            out.push(' ');
        }
        out.extend(word.chars().flat_map(char::to_lowercase));
    }
    out
}

/// blake3 hex digest of the normalized text.
pub fn text_hash(text: &str) -> String {
    blake3::hash(normalize_text(text).as_bytes())
        .to_hex()
        .to_string()
}

/// Fingerprint of an exchange, used by the dedup gate.
pub fn content_fingerprint(prompt: &str, response: &str) -> String {
    text_hash(&format!("{prompt}{NODE_TEXT_SEPARATOR}{response}"))
}

/// Dedup key: the content fingerprint qualified by the owning scope, so
/// identical text from two tenants stays two records.
pub fn scoped_fingerprint(scope: &AuthScope, content_hash: &str) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(b"o:");
    hasher.update(scope.owner_id().unwrap_or("").as_bytes());
    hasher.update(b"|t:");
    hasher.update(scope.tenant_id().unwrap_or("").as_bytes());
    hasher.update(b"|");
    hasher.update(content_hash.as_bytes());
    hasher.finalize().to_hex().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scoped_fingerprint_separates_tenants() {
        let content = content_fingerprint("reset my password", "");
        let a = AuthScope::tenant("acme").unwrap();
        let b = AuthScope::tenant("globex").unwrap();
        assert_ne!(scoped_fingerprint(&a, &content), scoped_fingerprint(&b, &content));
        assert_eq!(
            scoped_fingerprint(&a, &content),
            scoped_fingerprint(&AuthScope::tenant("acme").unwrap(), &content)
        );
    }

    #[test]
    fn normalization_ignores_case_and_spacing() {
        assert_eq!(normalize_text("  Reset   MY\tpassword \n"), "reset my password");
        assert_eq!(text_hash("Reset my password"), text_hash("reset  my password"));
    }

    #[test]
    fn different_text_different_hash() {
        assert_ne!(
            content_fingerprint("reset my password", ""),
            content_fingerprint("reset my email", "")
        );
    }

    #[test]
    fn fingerprint_is_hex_blake3() {
        let fp = content_fingerprint("a", "b");
        assert_eq!(fp.len(), 64);
        assert!(fp.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
