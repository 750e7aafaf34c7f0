// Copyright (c) 2024 The image-attestor Authors
//
// SPDX-License-Identifier: Apache-2.0

//! Content digests over raw manifest bytes.

use std::str::FromStr;

use sha2::Digest;
use strum::{Display, EnumString};

use crate::{Error, Result};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum DigestAlgorithm {
    #[default]
    Sha256,
    Sha512,
}

impl DigestAlgorithm {
    /// Get the algorithm named by the `<algorithm>:` prefix of a digest
    /// string such as `sha256:deadbeef`.
    pub fn from_digest(digest: &str) -> Result<Self> {
        let (algorithm, _) = digest
            .split_once(':')
            .ok_or_else(|| Error::UnsupportedDigestAlgorithm(digest.to_string()))?;
        DigestAlgorithm::from_str(algorithm)
            .map_err(|_| Error::UnsupportedDigestAlgorithm(algorithm.to_string()))
    }
}

pub trait DigestHasher {
    fn digest_update(&mut self, buf: &[u8]);
    fn digest_finalize(self) -> String;
}

#[derive(Clone, Debug)]
pub enum ManifestDigestHasher {
    Sha256(sha2::Sha256),
    Sha512(sha2::Sha512),
}

impl From<DigestAlgorithm> for ManifestDigestHasher {
    fn from(algorithm: DigestAlgorithm) -> Self {
        match algorithm {
            DigestAlgorithm::Sha256 => ManifestDigestHasher::Sha256(sha2::Sha256::new()),
            DigestAlgorithm::Sha512 => ManifestDigestHasher::Sha512(sha2::Sha512::new()),
        }
    }
}

impl DigestHasher for ManifestDigestHasher {
    fn digest_update(&mut self, buf: &[u8]) {
        match self {
            ManifestDigestHasher::Sha256(hasher) => {
                hasher.update(buf);
            }
            ManifestDigestHasher::Sha512(hasher) => {
                hasher.update(buf);
            }
        }
    }

    fn digest_finalize(self) -> String {
        match self {
            ManifestDigestHasher::Sha256(hasher) => {
                format!("{}:{:x}", DigestAlgorithm::Sha256, hasher.finalize())
            }
            ManifestDigestHasher::Sha512(hasher) => {
                format!("{}:{:x}", DigestAlgorithm::Sha512, hasher.finalize())
            }
        }
    }
}

/// Compute the `<algorithm>:<hex>` digest of a manifest.
pub fn manifest_digest(algorithm: DigestAlgorithm, manifest: &[u8]) -> String {
    let mut hasher = ManifestDigestHasher::from(algorithm);
    hasher.digest_update(manifest);
    hasher.digest_finalize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(
        DigestAlgorithm::Sha256,
        "sha256:e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
    )]
    #[case(
        DigestAlgorithm::Sha512,
        "sha512:cf83e1357eefb8bdf1542850d66d8007d620e4050b5715dc83f4a921d36ce9ce47d0d13c5d85f2b0ff8318d2877eec2f63b931bd47417a81a538327af927da3e"
    )]
    fn test_empty_manifest_digest(#[case] algorithm: DigestAlgorithm, #[case] expected: &str) {
        assert_eq!(manifest_digest(algorithm, b""), expected);
    }

    #[rstest]
    #[case("sha256:abcd", Some(DigestAlgorithm::Sha256))]
    #[case("sha512:abcd", Some(DigestAlgorithm::Sha512))]
    #[case("md5:abcd", None)]
    #[case("sha256abcd", None)]
    fn test_algorithm_from_digest(#[case] digest: &str, #[case] expected: Option<DigestAlgorithm>) {
        assert_eq!(DigestAlgorithm::from_digest(digest).ok(), expected);
    }

    #[test]
    fn test_incremental_update() {
        let mut hasher = ManifestDigestHasher::from(DigestAlgorithm::Sha256);
        hasher.digest_update(b"{\"schemaVersion\":");
        hasher.digest_update(b"2}");
        assert_eq!(
            hasher.digest_finalize(),
            manifest_digest(DigestAlgorithm::Sha256, b"{\"schemaVersion\":2}")
        );
    }
}
