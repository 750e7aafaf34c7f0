// Copyright (c) 2024 The image-attestor Authors
//
// SPDX-License-Identifier: Apache-2.0
//

use std::{path::PathBuf, sync::Arc};

use log::info;

use crate::{
    attestor::SigstoreAttestor,
    cache::{LruSignatureCache, SignatureCache},
    config::AttestorConfig,
    policy::PolicySets,
    reference::{DigestValidator, ManifestFetcher},
    rekor::RekorEndpoint,
    signature::{SignatureFetcher, SignatureVerifier, TrustRoots},
    Result,
};

#[derive(Default)]
pub struct AttestorBuilder {
    config: AttestorConfig,
    cache: Option<Arc<dyn SignatureCache>>,
}

macro_rules! __impl_config {
    ($name: ident, $type: ty) => {
        pub fn $name(mut self, $name: $type) -> Self {
            self.config.$name = $name;
            self
        }
    };
}

impl AttestorBuilder {
    __impl_config!(rekor_url, String);
    __impl_config!(cache_size, usize);
    __impl_config!(skip_images, Vec<String>);
    __impl_config!(allowed_subjects, Vec<String>);
    __impl_config!(enable_allowed_subjects_list, bool);
    __impl_config!(require_digest_reference, bool);
    __impl_config!(fulcio_roots, Vec<PathBuf>);

    pub fn from_config(config: AttestorConfig) -> Self {
        Self {
            config,
            cache: None,
        }
    }

    /// Share an existing cache instead of creating one of `cache_size`.
    pub fn cache(mut self, cache: Arc<dyn SignatureCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub async fn build(
        self,
        verifier: Arc<dyn SignatureVerifier>,
        manifests: Arc<dyn ManifestFetcher>,
    ) -> Result<SigstoreAttestor> {
        let rekor = RekorEndpoint::parse(&self.config.rekor_url)?;
        info!("using rekor endpoint {rekor}");

        let trust_roots = TrustRoots::from_files(&self.config.fulcio_roots).await?;

        let validator = DigestValidator::new(manifests, self.config.require_digest_reference);
        let fetcher = SignatureFetcher::new(validator, verifier, trust_roots);

        let cache = match self.cache {
            Some(cache) => cache,
            None => Arc::new(LruSignatureCache::new(self.config.cache_size)),
        };

        let policy = PolicySets::new();
        for image in self.config.skip_images {
            policy.add_skipped_image(image).await;
        }
        for subject in self.config.allowed_subjects {
            policy.add_allowed_subject(subject).await;
        }
        policy
            .enable_allowed_subjects_list(self.config.enable_allowed_subjects_list)
            .await;

        Ok(SigstoreAttestor::new(fetcher, policy, cache, rekor))
    }
}
