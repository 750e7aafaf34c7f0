// Copyright (c) 2024 The image-attestor Authors
//
// SPDX-License-Identifier: Apache-2.0
//

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("parse image reference `{reference}` failed")]
    ReferenceParse {
        #[source]
        source: anyhow::Error,
        reference: String,
    },

    #[error("invalid rekor endpoint `{endpoint}`: {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    #[error("fetch manifest of `{reference}` failed")]
    ManifestFetch {
        #[source]
        source: anyhow::Error,
        reference: String,
    },

    #[error("digest {actual} does not match {expected}")]
    DigestMismatch { expected: String, actual: String },

    #[error("reference {0} is not a digest")]
    NotADigestReference(String),

    #[error("unsupported digest algorithm: {0}")]
    UnsupportedDigestAlgorithm(String),

    #[error("verify signatures of `{image}` failed")]
    VerificationFailed {
        #[source]
        source: anyhow::Error,
        image: String,
    },

    #[error("bundle not verified for {0}")]
    BundleNotVerified(String),

    #[error("decode signature payload failed: {0}")]
    PayloadDecode(String),

    #[error("image ID is empty")]
    EmptyImageId,

    #[error("invalid configuration")]
    Config {
        #[source]
        source: anyhow::Error,
    },
}
