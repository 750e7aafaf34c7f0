// Copyright (c) 2024 The image-attestor Authors
//
// SPDX-License-Identifier: Apache-2.0
//

use std::env;
use std::path::{Path, PathBuf};

use anyhow::Context;
use config::{Config, File};
use log::{debug, info};
use serde::Deserialize;

use crate::cache::DEFAULT_CACHE_SIZE;
use crate::{Error, Result};

/// Environment variable naming the configuration file.
pub const CONFIG_PATH_ENV: &str = "IMAGE_ATTESTOR_CONFIG";

/// `image-attestor` configuration information.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct AttestorConfig {
    /// URL of the Rekor transparency log. An empty string selects the public
    /// instance at `https://rekor.sigstore.dev`.
    ///
    /// This value defaults to `""`.
    #[serde(default)]
    pub rekor_url: String,

    /// Maximum number of distinct image IDs whose selectors are cached.
    /// `0` disables caching.
    ///
    /// This defaults to [`DEFAULT_CACHE_SIZE`].
    #[serde(default = "default_cache_size")]
    pub cache_size: usize,

    /// Image IDs for which signature verification is bypassed.
    #[serde(default)]
    pub skip_images: Vec<String>,

    /// Signer subjects allowed to produce selectors when
    /// `enable_allowed_subjects_list` is set.
    #[serde(default)]
    pub allowed_subjects: Vec<String>,

    #[serde(default)]
    pub enable_allowed_subjects_list: bool,

    /// Reject image references that are not digest qualified. When unset, a
    /// tag reference is pinned to the digest of the manifest the registry
    /// serves.
    ///
    /// This value defaults to `true`.
    #[serde(default = "default_require_digest_reference")]
    pub require_digest_reference: bool,

    /// PEM files holding the Fulcio certificates that keyless signing
    /// certificates must chain to. When empty, the cosign verifier uses the
    /// Sigstore public-good trust root from its TUF repository.
    ///
    /// This value defaults to `[]`.
    #[serde(default)]
    pub fulcio_roots: Vec<PathBuf>,
}

macro_rules! __default_deserialization_value {
    ($name: ident, $type: ident, $value: expr) => {
        fn $name() -> $type {
            $value
        }
    };
}

__default_deserialization_value!(default_cache_size, usize, DEFAULT_CACHE_SIZE);
__default_deserialization_value!(default_require_digest_reference, bool, true);

impl Default for AttestorConfig {
    fn default() -> AttestorConfig {
        AttestorConfig {
            rekor_url: String::new(),
            cache_size: default_cache_size(),
            skip_images: Vec::new(),
            allowed_subjects: Vec::new(),
            enable_allowed_subjects_list: false,
            require_digest_reference: default_require_digest_reference(),
            fulcio_roots: Vec::new(),
        }
    }
}

impl AttestorConfig {
    /// Load the configuration from `config_path`, or from the file named by
    /// [`CONFIG_PATH_ENV`], or fall back to the defaults.
    pub fn new(config_path: Option<String>) -> Result<Self> {
        let config_path = config_path.or_else(|| {
            if let Ok(env_path) = env::var(CONFIG_PATH_ENV) {
                debug!("Read image-attestor config path from env: {env_path}");
                return Some(env_path);
            }
            None
        });

        match config_path {
            Some(path) => {
                info!("Use configuration file {path}");
                Self::from_file(&path)
            }
            None => {
                info!("No config path specified, use a default config.");
                Ok(Self::default())
            }
        }
    }

    /// Load `AttestorConfig` from a configuration file. Supported formats are
    /// all formats supported by the `config` crate.
    pub fn from_file(config_path: &str) -> Result<Self> {
        if !Path::new(config_path).exists() {
            return Err(Error::Config {
                source: anyhow::anyhow!("config file {config_path} not found"),
            });
        }

        let c = Config::builder()
            .add_source(File::with_name(config_path))
            .build()
            .context("read config file")
            .map_err(|source| Error::Config { source })?;

        c.try_deserialize()
            .context("invalid config")
            .map_err(|source| Error::Config { source })
    }
}
