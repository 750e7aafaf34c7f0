// Copyright (c) 2024 The image-attestor Authors
//
// SPDX-License-Identifier: Apache-2.0
//

//! Container image signature attestation.

use std::sync::Arc;

use log::{debug, info, warn};
use serde::Deserialize;
use tokio::sync::RwLock;

use crate::{
    builder::AttestorBuilder,
    cache::SignatureCache,
    config::AttestorConfig,
    policy::PolicySets,
    reference::ManifestFetcher,
    rekor::RekorEndpoint,
    signature::{
        selector::extract_selectors, SignatureFetcher, SignatureSelector, SignatureVerifier,
        Signatures, VerifiedSignature,
    },
    Result,
};

/// Emitted once per attestation whose image passed signature validation.
pub const SIGNATURE_VERIFIED_SELECTOR: &str = "sigstore-validation:passed";

/// The part of a container's runtime status the attestor needs.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
pub struct ContainerStatus {
    #[serde(rename = "imageID")]
    pub image_id: String,
    #[serde(rename = "containerID")]
    pub container_id: String,
}

/// Turns container images into signature selectors.
///
/// One instance is shared by all concurrent attestations. It owns the policy
/// sets and the selector cache; no lock is held while the registry or the
/// verifier is contacted.
pub struct SigstoreAttestor {
    fetcher: SignatureFetcher,
    policy: PolicySets,
    cache: Arc<dyn SignatureCache>,
    rekor: RwLock<RekorEndpoint>,
}

impl SigstoreAttestor {
    pub fn new(
        fetcher: SignatureFetcher,
        policy: PolicySets,
        cache: Arc<dyn SignatureCache>,
        rekor: RekorEndpoint,
    ) -> Self {
        Self {
            fetcher,
            policy,
            cache,
            rekor: RwLock::new(rekor),
        }
    }

    pub fn builder() -> AttestorBuilder {
        AttestorBuilder::default()
    }

    pub async fn from_config(
        config: AttestorConfig,
        verifier: Arc<dyn SignatureVerifier>,
        manifests: Arc<dyn ManifestFetcher>,
    ) -> Result<Self> {
        AttestorBuilder::from_config(config)
            .build(verifier, manifests)
            .await
    }

    /// Produce the selectors for one container.
    ///
    /// Skip-listed images yield only [`SIGNATURE_VERIFIED_SELECTOR`]. Otherwise
    /// the selectors come from the cache or from a fresh fetch, are filtered
    /// by the allow list, and are scoped by the container ID. A fetch error
    /// fails the call and caches nothing.
    pub async fn attest_container_signatures(
        &self,
        status: &ContainerStatus,
    ) -> Result<Vec<String>> {
        let image_id = &status.image_id;

        match self.policy.should_skip(image_id).await {
            Ok(true) => {
                info!("image {image_id} is in the skip list, signature verification bypassed");
                return Ok(vec![SIGNATURE_VERIFIED_SELECTOR.to_string()]);
            }
            Ok(false) => {}
            Err(e) => warn!("check skip list failed: {e}"),
        }

        let selectors = match self.cache.get_signature(image_id).await {
            Some(selectors) => {
                debug!("Found cached signature for image {image_id}");
                selectors
            }
            None => {
                let signatures = self
                    .fetch_image_signatures(image_id)
                    .await
                    .inspect_err(|e| warn!("fetch signatures of image {image_id} failed: {e}"))?;
                let selectors = self.extract_selectors_from_signatures(&signatures);

                debug!("Caching signature for image {image_id}");
                self.cache
                    .put_signature(image_id.clone(), selectors.clone())
                    .await;
                selectors
            }
        };

        let verified = selectors.len();
        let selectors = self
            .policy
            .retain_allowed(selectors, |selector| selector.subject.as_str())
            .await;
        if selectors.len() < verified {
            debug!(
                "{} signature subject(s) of image {image_id} not in the allow list",
                verified - selectors.len()
            );
        }

        Ok(render_selectors(&selectors, &status.container_id))
    }

    /// Validate `image` against its registry and fetch its verified
    /// signatures using the configured transparency log.
    pub async fn fetch_image_signatures(&self, image: &str) -> Result<Signatures> {
        let rekor = self.rekor.read().await.clone();
        self.fetcher.fetch(image, &rekor).await
    }

    /// Selectors of the signatures that yield a subject.
    pub fn extract_selectors_from_signatures(
        &self,
        signatures: &[Box<dyn VerifiedSignature>],
    ) -> Vec<SignatureSelector> {
        extract_selectors(signatures)
    }

    /// Replace the transparency log endpoint. On error the previous endpoint
    /// stays in effect.
    pub async fn set_rekor_url(&self, rekor_url: &str) -> Result<()> {
        let endpoint = RekorEndpoint::parse(rekor_url)?;
        info!("rekor endpoint set to {endpoint}");
        *self.rekor.write().await = endpoint;
        Ok(())
    }

    pub async fn rekor_endpoint(&self) -> RekorEndpoint {
        self.rekor.read().await.clone()
    }

    pub fn policy(&self) -> &PolicySets {
        &self.policy
    }

    pub async fn should_skip_image(&self, image_id: &str) -> Result<bool> {
        self.policy.should_skip(image_id).await
    }

    pub async fn add_skipped_image(&self, image_id: &str) {
        self.policy.add_skipped_image(image_id).await
    }

    pub async fn clear_skip_list(&self) {
        self.policy.clear_skip_list().await
    }

    pub async fn add_allowed_subject(&self, subject: &str) {
        self.policy.add_allowed_subject(subject).await
    }

    pub async fn clear_allowed_subjects(&self) {
        self.policy.clear_allowed_subjects().await
    }

    pub async fn enable_allowed_subjects_list(&self, enabled: bool) {
        self.policy.enable_allowed_subjects_list(enabled).await
    }
}

/// Expand selectors into scoped strings, followed by the validation marker
/// when at least one selector is present.
pub fn render_selectors(selectors: &[SignatureSelector], container_id: &str) -> Vec<String> {
    if selectors.is_empty() {
        return Vec::new();
    }

    let mut rendered: Vec<String> = selectors
        .iter()
        .flat_map(|selector| selector.to_selector_strings(container_id))
        .collect();
    rendered.push(SIGNATURE_VERIFIED_SELECTOR.to_string());
    rendered
}
