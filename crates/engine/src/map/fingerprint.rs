use std::fmt::Write as _;

use sha2::{Digest, Sha256};

/// Lowercase sha256 of a map source, logged at startup so session files can
/// be matched against the layout they were placed on.
pub fn fingerprint_source(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    to_hex_lower(&digest)
}

fn to_hex_lower(bytes: &[u8]) -> String {
    let mut output = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        let _ = write!(&mut output, "{byte:02x}");
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_is_stable_hex_and_content_sensitive() {
        let first = fingerprint_source(b"<map/>");
        assert_eq!(first.len(), 64);
        assert!(first.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_eq!(first, fingerprint_source(b"<map/>"));
        assert_ne!(first, fingerprint_source(b"<map />"));
    }

    #[test]
    fn empty_input_matches_known_digest() {
        assert_eq!(
            fingerprint_source(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
