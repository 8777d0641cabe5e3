use clap::ValueEnum;
use serde::Deserialize;
use sha1::{Digest, Sha1};
use sha2::Sha256;

/// Digest used to turn a feature's canonical byte encoding into a hex
/// lookup key. No security property is needed; collisions are how
/// candidates are found. SHA-1 is the default for its shorter keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    Sha1,
    Sha256,
}

impl Default for HashAlgorithm {
    fn default() -> Self {
        Self::Sha1
    }
}

impl HashAlgorithm {
    /// Hex digest of `input`.
    pub fn digest(&self, input: &[u8]) -> String {
        match self {
            Self::Sha1 => hex::encode(Sha1::digest(input)),
            Self::Sha256 => hex::encode(Sha256::digest(input)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digest_is_deterministic() {
        let a = HashAlgorithm::Sha1.digest(b"12:34:5");
        let b = HashAlgorithm::Sha1.digest(b"12:34:5");
        assert_eq!(a, b);
        assert_eq!(a.len(), 40);
    }

    #[test]
    fn test_algorithms_disagree() {
        let sha1 = HashAlgorithm::Sha1.digest(b"12:34:5");
        let sha256 = HashAlgorithm::Sha256.digest(b"12:34:5");
        assert_ne!(sha1, sha256);
        assert_eq!(sha256.len(), 64);
    }

    #[test]
    fn test_distinct_inputs_distinct_keys() {
        let a = HashAlgorithm::Sha1.digest(b"12:34:5");
        let b = HashAlgorithm::Sha1.digest(b"12:34:6");
        assert_ne!(a, b);
    }
}
