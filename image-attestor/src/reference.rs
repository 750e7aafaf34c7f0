// Copyright (c) 2024 The image-attestor Authors
//
// SPDX-License-Identifier: Apache-2.0
//

//! Image reference parsing and manifest digest validation.

use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, info};

use crate::digest::{manifest_digest, DigestAlgorithm};
use crate::{Error, Result};

pub use oci_spec::distribution::Reference as ImageReference;

/// Parse an image locator such as `quay.io/org/app@sha256:<hex>`.
pub fn parse_reference(image: &str) -> Result<ImageReference> {
    ImageReference::try_from(image).map_err(|e| Error::ReferenceParse {
        source: e.into(),
        reference: image.to_string(),
    })
}

/// Access to the raw manifest bytes a registry serves for a reference.
#[async_trait]
pub trait ManifestFetcher: Send + Sync {
    async fn get_manifest(&self, reference: &ImageReference) -> anyhow::Result<Vec<u8>>;
}

/// Checks that a reference names the manifest the registry actually serves.
pub struct DigestValidator {
    fetcher: Arc<dyn ManifestFetcher>,

    /// Reject tag-only references instead of pinning them.
    require_digest: bool,
}

impl DigestValidator {
    pub fn new(fetcher: Arc<dyn ManifestFetcher>, require_digest: bool) -> Self {
        Self {
            fetcher,
            require_digest,
        }
    }

    /// Validate `reference` against the registry and return the
    /// digest-qualified reference that may be handed to the verifier.
    ///
    /// A digest reference is returned unchanged once the hash of the fetched
    /// manifest equals its digest. A tag-only reference fails with
    /// [`Error::NotADigestReference`] unless digests are not required, in
    /// which case it is pinned to the digest of the served manifest.
    pub async fn validate(&self, reference: &ImageReference) -> Result<ImageReference> {
        let algorithm = match reference.digest() {
            Some(digest) => DigestAlgorithm::from_digest(digest)?,
            None if self.require_digest => {
                return Err(Error::NotADigestReference(reference.whole()))
            }
            None => DigestAlgorithm::default(),
        };

        let manifest =
            self.fetcher
                .get_manifest(reference)
                .await
                .map_err(|source| Error::ManifestFetch {
                    source,
                    reference: reference.whole(),
                })?;
        let actual = manifest_digest(algorithm, &manifest);

        match reference.digest() {
            Some(expected) if expected == actual => {
                debug!("manifest digest of {} verified", reference.whole());
                Ok(reference.clone())
            }
            Some(expected) => Err(Error::DigestMismatch {
                expected: expected.to_string(),
                actual,
            }),
            None => {
                info!("pinned {} to digest {actual}", reference.whole());
                Ok(ImageReference::with_digest(
                    reference.registry().to_string(),
                    reference.repository().to_string(),
                    actual,
                ))
            }
        }
    }
}
