// Copyright (c) 2024 The image-attestor Authors
//
// SPDX-License-Identifier: Apache-2.0

//! Sigstore based image signature attestation.
//!
//! Given the image ID of a running container, [`SigstoreAttestor`] checks the
//! image digest against its registry, obtains the verified signatures of the
//! image, derives the signer subjects and renders them as workload selectors.
//! Results are cached per image ID in a bounded LRU cache.

pub mod attestor;
pub mod builder;
pub mod cache;
pub mod config;
pub mod digest;
pub mod error;
pub mod policy;
pub mod reference;
#[cfg(feature = "registry")]
pub mod registry;
pub mod rekor;
pub mod signature;

pub use attestor::{ContainerStatus, SigstoreAttestor, SIGNATURE_VERIFIED_SELECTOR};
pub use builder::AttestorBuilder;
pub use cache::{LruSignatureCache, SignatureCache};
pub use config::AttestorConfig;
pub use error::{Error, Result};
pub use policy::PolicySets;
pub use rekor::RekorEndpoint;
