// Copyright (c) 2024 The image-attestor Authors
//
// SPDX-License-Identifier: Apache-2.0
//

//! Cosign verification

use std::collections::HashMap;
use std::future::Future;
use std::str::FromStr;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use log::{debug, info};
use rustls_pki_types::{pem::PemObject, CertificateDer, SubjectPublicKeyInfoDer};
use sigstore::{
    cosign::{
        bundle::Bundle,
        signature_layers::{CertificateSubject, SignatureLayer},
        ClientBuilder, CosignCapabilities,
    },
    registry::{Auth, OciReference},
    rekor::apis::{configuration::Configuration, pubkey_api},
    trust::{sigstore::SigstoreTrustRoot, ManualTrustRoot, TrustRoot},
};
use tokio::sync::{Mutex, OnceCell};

use super::{
    SignatureVerifier, SignerCertificate, Signatures, TransparencyLogBundle, VerifiedSignature,
    VerifyOptions,
};
use crate::reference::ImageReference;
use crate::rekor::RekorEndpoint;

impl VerifiedSignature for SignatureLayer {
    fn payload(&self) -> &[u8] {
        &self.raw_data
    }

    fn certificate(&self) -> Option<SignerCertificate> {
        self.certificate_signature
            .as_ref()
            .map(|certificate| signer_certificate(&certificate.subject))
    }

    fn bundle(&self) -> Option<TransparencyLogBundle> {
        self.bundle.as_ref().map(transparency_log_bundle)
    }
}

fn signer_certificate(subject: &CertificateSubject) -> SignerCertificate {
    let mut signer = SignerCertificate::default();
    match subject {
        CertificateSubject::Email(email) => signer.email_addresses.push(email.clone()),
        CertificateSubject::Uri(uri) => signer.uris.push(uri.clone()),
    }
    signer
}

fn transparency_log_bundle(bundle: &Bundle) -> TransparencyLogBundle {
    TransparencyLogBundle {
        body: bundle.payload.body.clone(),
        log_id: bundle.payload.log_id.clone(),
        log_index: bundle.payload.log_index,
        integrated_time: bundle.payload.integrated_time,
    }
}

/// DER encoded Rekor public keys, resolved once per endpoint.
#[derive(Default)]
struct RekorKeys {
    keys: Mutex<HashMap<RekorEndpoint, Vec<u8>>>,
}

impl RekorKeys {
    /// Return the key of `endpoint`, calling `fetch` only when it is not
    /// known yet. A failed fetch is not remembered.
    async fn get_or_fetch<F, Fut>(&self, endpoint: &RekorEndpoint, fetch: F) -> Result<Vec<u8>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<u8>>>,
    {
        if let Some(key) = self.keys.lock().await.get(endpoint) {
            return Ok(key.clone());
        }

        let key = fetch().await?;
        self.keys
            .lock()
            .await
            .insert(endpoint.clone(), key.clone());
        Ok(key)
    }
}

/// [`SignatureVerifier`] backed by the sigstore cosign client.
///
/// Signature layers are checked against the Fulcio roots and the public key
/// of the configured Rekor instance. Without configured Fulcio roots, the
/// Sigstore public-good trust root is fetched from its TUF repository on
/// first use. The bundle counts as verified only when every trusted layer
/// carries a Rekor bundle.
pub struct CosignVerifier {
    auth: Auth,
    rekor_keys: RekorKeys,
    public_fulcio_certs: OnceCell<Vec<CertificateDer<'static>>>,
}

impl CosignVerifier {
    pub fn new(auth: Auth) -> Self {
        Self {
            auth,
            rekor_keys: RekorKeys::default(),
            public_fulcio_certs: OnceCell::new(),
        }
    }

    async fn fulcio_certs(&self, configured: &[Vec<u8>]) -> Result<Vec<CertificateDer<'static>>> {
        if !configured.is_empty() {
            return fulcio_certificates(configured);
        }

        let certs = self
            .public_fulcio_certs
            .get_or_try_init(|| async {
                info!("No Fulcio roots configured, fetch the Sigstore public-good trust root");
                let trust_root = SigstoreTrustRoot::new(None).await?;
                let certs = trust_root
                    .fulcio_certs()?
                    .into_iter()
                    .map(CertificateDer::into_owned)
                    .collect::<Vec<_>>();
                anyhow::Ok(certs)
            })
            .await?;
        Ok(certs.clone())
    }
}

impl Default for CosignVerifier {
    fn default() -> Self {
        Self::new(Auth::Anonymous)
    }
}

#[async_trait]
impl SignatureVerifier for CosignVerifier {
    async fn verify(
        &self,
        reference: &ImageReference,
        options: &VerifyOptions,
    ) -> Result<(Signatures, bool)> {
        let rekor_key = self
            .rekor_keys
            .get_or_fetch(&options.rekor, || rekor_public_key(&options.rekor))
            .await?;
        let fulcio_certs = self
            .fulcio_certs(&options.trust_roots.fulcio_certs)
            .await?;

        let mut client = {
            let trust_root = ManualTrustRoot {
                fulcio_certs,
                rekor_keys: vec![rekor_key],
                ..Default::default()
            };
            ClientBuilder::default()
                .with_trust_repository(&trust_root)?
                .build()?
        };

        let image_ref = OciReference::from_str(&reference.whole())?;

        // Get the cosign signature "image"'s uri and the signed image's digest
        let (cosign_image, source_image_digest) =
            client.triangulate(&image_ref, &self.auth).await?;

        let layers = client
            .trusted_signature_layers(&self.auth, &source_image_digest, &cosign_image)
            .await?;
        debug!("{} trusted signature layer(s) for {image_ref}", layers.len());

        let verified = !layers.is_empty() && layers.iter().all(|layer| layer.bundle.is_some());
        let signatures = layers
            .into_iter()
            .map(|layer| Box::new(layer) as Box<dyn VerifiedSignature>)
            .collect();

        Ok((signatures, verified))
    }
}

/// Fetch the DER encoded public key of a Rekor instance.
async fn rekor_public_key(rekor: &RekorEndpoint) -> Result<Vec<u8>> {
    let configuration = Configuration {
        base_path: rekor.base_url(),
        ..Default::default()
    };

    let pem = pubkey_api::get_public_key(&configuration, None)
        .await
        .map_err(|e| anyhow!("get public key of rekor {rekor}: {e}"))?;
    debug!("fetched public key of rekor {rekor}");

    public_key_der(&pem)
}

fn public_key_der(pem: &str) -> Result<Vec<u8>> {
    let key = SubjectPublicKeyInfoDer::from_pem_slice(pem.as_bytes())
        .map_err(|e| anyhow!("parse rekor public key: {e}"))?;
    Ok(key.as_ref().to_vec())
}

/// Collect the certificates of every PEM bundle.
fn fulcio_certificates(bundles: &[Vec<u8>]) -> Result<Vec<CertificateDer<'static>>> {
    let mut certs = Vec::new();
    for bundle in bundles {
        for cert in CertificateDer::pem_slice_iter(bundle) {
            certs.push(cert.map_err(|e| anyhow!("parse Fulcio root certificate: {e}"))?);
        }
    }

    if certs.is_empty() {
        bail!("no certificate in the configured Fulcio roots");
    }
    Ok(certs)
}
