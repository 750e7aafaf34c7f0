// Copyright (c) 2024 The image-attestor Authors
//
// SPDX-License-Identifier: Apache-2.0
//

//! Manifest access over the OCI distribution API.

use async_trait::async_trait;
use log::debug;
use oci_client::{
    client::{ClientConfig, ClientProtocol},
    manifest::{
        IMAGE_MANIFEST_LIST_MEDIA_TYPE, IMAGE_MANIFEST_MEDIA_TYPE, OCI_IMAGE_INDEX_MEDIA_TYPE,
        OCI_IMAGE_MEDIA_TYPE,
    },
    secrets::RegistryAuth,
    Client, Reference,
};

use crate::reference::{ImageReference, ManifestFetcher};

const ACCEPTED_MANIFEST_TYPES: &[&str] = &[
    OCI_IMAGE_MEDIA_TYPE,
    OCI_IMAGE_INDEX_MEDIA_TYPE,
    IMAGE_MANIFEST_MEDIA_TYPE,
    IMAGE_MANIFEST_LIST_MEDIA_TYPE,
];

/// Fetches the exact manifest bytes a registry serves, so that their
/// digest can be compared with the one in the image reference.
pub struct RegistryManifestFetcher {
    client: Client,
    auth: RegistryAuth,
}

impl RegistryManifestFetcher {
    pub fn new(auth: RegistryAuth) -> Self {
        let config = ClientConfig {
            protocol: ClientProtocol::Https,
            ..Default::default()
        };

        Self {
            client: Client::new(config),
            auth,
        }
    }
}

impl Default for RegistryManifestFetcher {
    fn default() -> Self {
        Self::new(RegistryAuth::Anonymous)
    }
}

#[async_trait]
impl ManifestFetcher for RegistryManifestFetcher {
    async fn get_manifest(&self, reference: &ImageReference) -> anyhow::Result<Vec<u8>> {
        debug!("pull manifest of {}", reference.whole());
        let reference = Reference::try_from(reference.whole())?;
        let (manifest, _digest) = self
            .client
            .pull_manifest_raw(&reference, &self.auth, ACCEPTED_MANIFEST_TYPES)
            .await?;
        Ok(manifest.to_vec())
    }
}
