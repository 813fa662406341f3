//! Subresource integrity (SRI) metadata.
//!
//! An integrity string is a whitespace-separated list of
//! `<algorithm>-<base64 digest>` tokens. A body verifies when it matches any
//! token using a supported algorithm. Tokens with unknown algorithms are
//! ignored; a string with no usable token fails verification.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use sha2::{Digest, Sha256, Sha384, Sha512};

/// Supported SRI hash algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntegrityAlgorithm {
    /// `sha256`
    Sha256,
    /// `sha384`
    Sha384,
    /// `sha512`
    Sha512,
}

impl IntegrityAlgorithm {
    /// Parse an algorithm prefix
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "sha256" => Some(IntegrityAlgorithm::Sha256),
            "sha384" => Some(IntegrityAlgorithm::Sha384),
            "sha512" => Some(IntegrityAlgorithm::Sha512),
            _ => None,
        }
    }

    /// Token prefix of this algorithm
    pub fn as_str(&self) -> &'static str {
        match self {
            IntegrityAlgorithm::Sha256 => "sha256",
            IntegrityAlgorithm::Sha384 => "sha384",
            IntegrityAlgorithm::Sha512 => "sha512",
        }
    }

    /// Base64 digest of `body`.
    pub fn digest(&self, body: &[u8]) -> String {
        match self {
            IntegrityAlgorithm::Sha256 => STANDARD.encode(Sha256::digest(body)),
            IntegrityAlgorithm::Sha384 => STANDARD.encode(Sha384::digest(body)),
            IntegrityAlgorithm::Sha512 => STANDARD.encode(Sha512::digest(body)),
        }
    }
}

/// Build an integrity token for `body`.
pub fn integrity_for(algorithm: IntegrityAlgorithm, body: &[u8]) -> String {
    format!("{}-{}", algorithm.as_str(), algorithm.digest(body))
}

/// Whether `body` satisfies the integrity metadata.
pub fn verify_integrity(metadata: &str, body: &[u8]) -> bool {
    metadata.split_whitespace().any(|token| {
        let Some((name, expected)) = token.split_once('-') else {
            return false;
        };
        // Options such as `?ct=...` trail the digest
        let expected = expected.split('?').next().unwrap_or_default();
        match IntegrityAlgorithm::parse(name) {
            Some(algorithm) => algorithm.digest(body) == expected,
            None => false,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const HELLO_SHA256: &str = "sha256-LPJNul+wow4m6DsqxbninhsWHlwfp0JecwQzYpOLmCQ=";

    #[test]
    fn test_known_digest() {
        assert_eq!(integrity_for(IntegrityAlgorithm::Sha256, b"hello"), HELLO_SHA256);
    }

    #[test]
    fn test_verify_matches_any_token() {
        assert!(verify_integrity(HELLO_SHA256, b"hello"));
        assert!(verify_integrity(&format!("md5-abc {}", HELLO_SHA256), b"hello"));
        assert!(!verify_integrity(HELLO_SHA256, b"hello!"));
    }

    #[test]
    fn test_unusable_metadata_fails() {
        assert!(!verify_integrity("", b"hello"));
        assert!(!verify_integrity("md5-XUFAKrxLKna5cZ2REBfFkg==", b"hello"));
        assert!(!verify_integrity("garbage", b"hello"));
    }

    #[test]
    fn test_sha384_and_sha512() {
        for algorithm in [IntegrityAlgorithm::Sha384, IntegrityAlgorithm::Sha512] {
            let token = integrity_for(algorithm, b"body");
            assert!(verify_integrity(&token, b"body"));
        }
    }
}
