// Copyright (c) 2024 The image-attestor Authors
//
// SPDX-License-Identifier: Apache-2.0
//

//! Fetching verified signatures for an image.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use log::{debug, warn};

use super::Signatures;
use crate::reference::{parse_reference, DigestValidator, ImageReference};
use crate::rekor::RekorEndpoint;
use crate::{Error, Result};

/// Certificate authorities that keyless signing certificates must chain to.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TrustRoots {
    /// PEM encoded Fulcio root and intermediate certificates.
    pub fulcio_certs: Vec<Vec<u8>>,
}

impl TrustRoots {
    /// Read PEM bundles from the given files.
    pub async fn from_files<P: AsRef<Path>>(paths: &[P]) -> Result<Self> {
        let mut fulcio_certs = Vec::with_capacity(paths.len());
        for path in paths {
            let path = path.as_ref();
            let pem = tokio::fs::read(path)
                .await
                .with_context(|| format!("read trust root {}", path.display()))
                .map_err(|source| Error::Config { source })?;
            fulcio_certs.push(pem);
        }

        Ok(Self { fulcio_certs })
    }
}

/// Everything the verifier needs besides the image itself.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerifyOptions {
    pub rekor: RekorEndpoint,
    pub trust_roots: TrustRoots,
}

/// The external signature verification engine.
///
/// Returns the signatures found for a digest reference and whether the
/// bundle as a whole passed transparency log verification.
#[async_trait]
pub trait SignatureVerifier: Send + Sync {
    async fn verify(
        &self,
        reference: &ImageReference,
        options: &VerifyOptions,
    ) -> anyhow::Result<(Signatures, bool)>;
}

pub struct SignatureFetcher {
    validator: DigestValidator,
    verifier: Arc<dyn SignatureVerifier>,
    trust_roots: TrustRoots,
}

impl SignatureFetcher {
    pub fn new(
        validator: DigestValidator,
        verifier: Arc<dyn SignatureVerifier>,
        trust_roots: TrustRoots,
    ) -> Self {
        Self {
            validator,
            verifier,
            trust_roots,
        }
    }

    /// Retrieve the verified signatures of `image` using the given transparency
    /// log. The reference is checked against the registry before the verifier
    /// is called, and an unverified bundle is an error even when signatures
    /// were returned.
    pub async fn fetch(&self, image: &str, rekor: &RekorEndpoint) -> Result<Signatures> {
        let reference = parse_reference(image)?;
        rekor.validate()?;

        let reference = self.validator.validate(&reference).await?;

        let options = VerifyOptions {
            rekor: rekor.clone(),
            trust_roots: self.trust_roots.clone(),
        };
        let (signatures, verified) = self
            .verifier
            .verify(&reference, &options)
            .await
            .map_err(|source| {
                warn!("verify signatures of {image} failed: {source:#}");
                Error::VerificationFailed {
                    source,
                    image: image.to_string(),
                }
            })?;

        if !verified {
            warn!("bundle not verified for {image}");
            return Err(Error::BundleNotVerified(image.to_string()));
        }

        debug!("fetched {} verified signature(s) for {image}", signatures.len());
        Ok(signatures)
    }
}
