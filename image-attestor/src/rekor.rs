// Copyright (c) 2024 The image-attestor Authors
//
// SPDX-License-Identifier: Apache-2.0
//

//! Transparency log (Rekor) endpoint configuration.

use std::fmt;

use url::Url;

use crate::{Error, Result};

pub const DEFAULT_REKOR_SCHEME: &str = "https";
pub const DEFAULT_REKOR_HOST: &str = "rekor.sigstore.dev";
pub const DEFAULT_REKOR_BASE_PATH: &str = "/";

/// Where the transparency log client connects.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RekorEndpoint {
    pub scheme: String,
    pub host: String,
    pub path: String,
}

impl Default for RekorEndpoint {
    fn default() -> Self {
        Self {
            scheme: DEFAULT_REKOR_SCHEME.into(),
            host: DEFAULT_REKOR_HOST.into(),
            path: DEFAULT_REKOR_BASE_PATH.into(),
        }
    }
}

impl RekorEndpoint {
    /// Parse a transparency log URL.
    ///
    /// The empty string selects the default public instance. A scheme-less
    /// `//host/path` is read as https. Anything else must be an `https` URL
    /// with a non-empty host.
    pub fn parse(endpoint: &str) -> Result<Self> {
        if endpoint.is_empty() {
            return Ok(Self::default());
        }

        let invalid = |reason: String| Error::InvalidEndpoint {
            endpoint: endpoint.to_string(),
            reason,
        };

        let url = match endpoint.strip_prefix("//") {
            Some(rest) => Url::parse(&format!("{DEFAULT_REKOR_SCHEME}://{rest}")),
            None => Url::parse(endpoint),
        }
        .map_err(|e| invalid(e.to_string()))?;

        let host = match url.host_str() {
            Some(host) if !host.is_empty() => host,
            _ => return Err(invalid("empty host".into())),
        };
        let host = match url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        };

        let parsed = Self {
            scheme: url.scheme().to_string(),
            host,
            path: url.path().to_string(),
        };
        parsed.validate()?;
        Ok(parsed)
    }

    /// Check the scheme and host rules on an already built endpoint.
    pub fn validate(&self) -> Result<()> {
        if !self.scheme.is_empty() && self.scheme != DEFAULT_REKOR_SCHEME {
            return Err(Error::InvalidEndpoint {
                endpoint: self.to_string(),
                reason: format!("scheme `{}` is not https", self.scheme),
            });
        }
        if self.host.is_empty() {
            return Err(Error::InvalidEndpoint {
                endpoint: self.to_string(),
                reason: "empty host".into(),
            });
        }
        Ok(())
    }

    /// The endpoint as a base URL for API clients, without a trailing slash.
    pub fn base_url(&self) -> String {
        let scheme = match self.scheme.as_str() {
            "" => DEFAULT_REKOR_SCHEME,
            scheme => scheme,
        };
        format!("{scheme}://{}{}", self.host, self.path.trim_end_matches('/'))
    }
}

impl fmt::Display for RekorEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}{}", self.scheme, self.host, self.path)
    }
}
