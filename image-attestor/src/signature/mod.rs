// Copyright (c) 2024 The image-attestor Authors
//
// SPDX-License-Identifier: Apache-2.0
//

//! Verified image signatures and the selectors derived from them.

#[cfg(feature = "signature-cosign")]
pub mod cosign;
pub mod fetch;
pub mod selector;

pub use fetch::{SignatureFetcher, SignatureVerifier, TrustRoots, VerifyOptions};
pub use selector::SignatureSelector;

/// Identity information carried by a keyless signing certificate.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SignerCertificate {
    pub email_addresses: Vec<String>,
    pub uris: Vec<String>,
}

/// Transparency log entry that corroborates a signature.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TransparencyLogBundle {
    /// Base64 encoded body of the log entry.
    pub body: String,
    pub log_id: String,
    pub log_index: i64,
    /// Unix seconds at which the entry was integrated into the log.
    pub integrated_time: i64,
}

/// A signature whose cryptographic verification already succeeded.
///
/// Values are only ever produced by a [`SignatureVerifier`].
pub trait VerifiedSignature: Send + Sync {
    /// The raw simple signing payload.
    fn payload(&self) -> &[u8];

    fn certificate(&self) -> Option<SignerCertificate>;

    fn bundle(&self) -> Option<TransparencyLogBundle>;
}

pub type Signatures = Vec<Box<dyn VerifiedSignature>>;
