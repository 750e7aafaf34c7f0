// Copyright (c) 2024 The image-attestor Authors
//
// SPDX-License-Identifier: Apache-2.0
//

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use image_attestor::{
    digest::{manifest_digest, DigestAlgorithm},
    reference::{ImageReference, ManifestFetcher},
    signature::{
        SignatureVerifier, SignerCertificate, Signatures, TransparencyLogBundle,
        VerifiedSignature, VerifyOptions,
    },
};

/// A signature as the verifier would hand it out.
#[derive(Clone, Default)]
pub struct FakeSignature {
    pub payload: Vec<u8>,
    pub certificate: Option<SignerCertificate>,
    pub bundle: Option<TransparencyLogBundle>,
}

impl FakeSignature {
    pub fn signed_by(email: &str) -> Self {
        Self {
            payload: br#"{"critical":{"type":"cosign container image signature"},"optional":null}"#
                .to_vec(),
            certificate: Some(SignerCertificate {
                email_addresses: vec![email.into()],
                uris: vec![],
            }),
            bundle: None,
        }
    }
}

impl VerifiedSignature for FakeSignature {
    fn payload(&self) -> &[u8] {
        &self.payload
    }

    fn certificate(&self) -> Option<SignerCertificate> {
        self.certificate.clone()
    }

    fn bundle(&self) -> Option<TransparencyLogBundle> {
        self.bundle.clone()
    }
}

/// What the verifier answers for one repository.
#[derive(Clone)]
pub enum Verdict {
    Signed(Vec<FakeSignature>),
    NotVerified,
    Error,
}

/// Verifier that answers per repository and counts its invocations.
#[derive(Default)]
pub struct CountingVerifier {
    verdicts: Mutex<HashMap<String, Verdict>>,
    calls: AtomicUsize,
}

impl CountingVerifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set(&self, repository: &str, verdict: Verdict) {
        self.verdicts
            .lock()
            .unwrap()
            .insert(repository.to_string(), verdict);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SignatureVerifier for CountingVerifier {
    async fn verify(
        &self,
        reference: &ImageReference,
        _options: &VerifyOptions,
    ) -> anyhow::Result<(Signatures, bool)> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let verdict = self
            .verdicts
            .lock()
            .unwrap()
            .get(reference.repository())
            .cloned();

        match verdict {
            Some(Verdict::Signed(signatures)) => Ok((
                signatures
                    .into_iter()
                    .map(|s| Box::new(s) as Box<dyn VerifiedSignature>)
                    .collect(),
                true,
            )),
            Some(Verdict::NotVerified) => Ok((vec![Box::new(FakeSignature::default())], false)),
            Some(Verdict::Error) | None => anyhow::bail!("no matching signatures"),
        }
    }
}

/// Serves a manifest derived from the repository name.
pub struct FakeRegistry;

impl FakeRegistry {
    pub fn manifest(repository: &str) -> Vec<u8> {
        format!(r#"{{"schemaVersion":2,"annotations":{{"repo":"{repository}"}}}}"#).into_bytes()
    }

    /// A digest qualified image ID whose digest matches what is served.
    pub fn image_id(repository: &str) -> String {
        format!(
            "registry.example.com/{repository}@{}",
            manifest_digest(DigestAlgorithm::Sha256, &Self::manifest(repository))
        )
    }
}

#[async_trait]
impl ManifestFetcher for FakeRegistry {
    async fn get_manifest(&self, reference: &ImageReference) -> anyhow::Result<Vec<u8>> {
        Ok(Self::manifest(reference.repository()))
    }
}
