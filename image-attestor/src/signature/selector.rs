// Copyright (c) 2024 The image-attestor Authors
//
// SPDX-License-Identifier: Apache-2.0
//

//! Derivation of signer identities from verified signatures.

use std::collections::HashMap;

use base64::{engine::general_purpose::STANDARD, Engine};
use log::warn;
use serde::Deserialize;

use super::{SignerCertificate, TransparencyLogBundle, VerifiedSignature};
use crate::{Error, Result};

pub const SUBJECT_SELECTOR: &str = "image-signature-subject";
pub const CONTENT_SELECTOR: &str = "image-signature-content";
pub const LOG_ID_SELECTOR: &str = "image-signature-logid";
pub const INTEGRATED_TIME_SELECTOR: &str = "image-signature-integrated-time";

/// Selector values derived from one signature.
///
/// Only a selector with `verified == true` carries a subject; everything
/// else contributes nothing to the attestation.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SignatureSelector {
    pub subject: String,
    pub content: Option<String>,
    pub log_id: Option<String>,
    pub integrated_time: Option<String>,
    pub verified: bool,
}

impl SignatureSelector {
    /// Derive the selector values of a verified signature.
    ///
    /// A certificate identity takes precedence over the `optional.subject`
    /// field of the payload. A payload that cannot be decoded, or a signature
    /// without any subject, yields an unverified empty selector.
    pub fn from_signature(signature: &dyn VerifiedSignature) -> Self {
        let subject = match signature_subject(signature) {
            Ok(subject) if !subject.is_empty() => subject,
            Ok(_) => {
                warn!("signature has an empty subject");
                return Self::default();
            }
            Err(e) => {
                warn!("get signature subject failed: {e}");
                return Self::default();
            }
        };

        let mut selector = Self {
            subject,
            verified: true,
            ..Default::default()
        };

        if let Some(bundle) = signature.bundle() {
            match bundle_signature_content(&bundle) {
                Ok(content) => selector.content = Some(content),
                Err(e) => warn!("get signature content failed: {e}"),
            }
            if !bundle.log_id.is_empty() {
                selector.log_id = Some(bundle.log_id);
            }
            if bundle.integrated_time != 0 {
                selector.integrated_time = Some(bundle.integrated_time.to_string());
            }
        }

        selector
    }

    /// Render as `<container_id>:<kind>:<value>` strings, skipping empty fields.
    pub fn to_selector_strings(&self, container_id: &str) -> Vec<String> {
        let fields = [
            (SUBJECT_SELECTOR, Some(&self.subject)),
            (CONTENT_SELECTOR, self.content.as_ref()),
            (LOG_ID_SELECTOR, self.log_id.as_ref()),
            (INTEGRATED_TIME_SELECTOR, self.integrated_time.as_ref()),
        ];

        fields
            .into_iter()
            .filter_map(|(kind, value)| match value {
                Some(value) if !value.is_empty() => Some(format!("{container_id}:{kind}:{value}")),
                _ => None,
            })
            .collect()
    }
}

#[derive(Deserialize)]
struct SimpleSigningPayload {
    #[serde(default)]
    optional: Option<HashMap<String, serde_json::Value>>,
}

fn signature_subject(signature: &dyn VerifiedSignature) -> Result<String> {
    let payload: SimpleSigningPayload = serde_json::from_slice(signature.payload())
        .map_err(|e| Error::PayloadDecode(e.to_string()))?;

    let payload_subject = payload
        .optional
        .as_ref()
        .and_then(|optional| optional.get("subject"))
        .and_then(|subject| subject.as_str())
        .unwrap_or_default()
        .to_string();

    Ok(match signature.certificate() {
        Some(certificate) => certificate_subject(&certificate),
        None => payload_subject,
    })
}

/// First email address of the certificate, else its first URI.
pub fn certificate_subject(certificate: &SignerCertificate) -> String {
    if let Some(email) = certificate.email_addresses.first() {
        return email.clone();
    }

    certificate
        .uris
        .first()
        .map(|uri| uri.trim_start_matches('/').to_string())
        .unwrap_or_default()
}

#[derive(Deserialize)]
struct BundleBody {
    spec: BundleSpec,
}

#[derive(Deserialize)]
struct BundleSpec {
    signature: BundleSignature,
}

#[derive(Deserialize)]
struct BundleSignature {
    #[serde(default)]
    content: String,
}

fn bundle_signature_content(bundle: &TransparencyLogBundle) -> Result<String> {
    let body = STANDARD
        .decode(&bundle.body)
        .map_err(|e| Error::PayloadDecode(format!("bundle body is not base64: {e}")))?;
    let body: BundleBody =
        serde_json::from_slice(&body).map_err(|e| Error::PayloadDecode(e.to_string()))?;

    if body.spec.signature.content.is_empty() {
        return Err(Error::PayloadDecode(
            "bundle payload body has no signature content".into(),
        ));
    }

    Ok(body.spec.signature.content)
}

/// Keep the selectors of every signature that produced a subject.
pub fn extract_selectors(signatures: &[Box<dyn VerifiedSignature>]) -> Vec<SignatureSelector> {
    signatures
        .iter()
        .map(|signature| SignatureSelector::from_signature(signature.as_ref()))
        .filter(|selector| selector.verified)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const PAYLOAD: &str = r#"{"critical": {"identity": {"docker-reference": "docker-registry.com/some/image"},"image": {"docker-manifest-digest": "some digest"},"type": "some type"},"optional": {"subject": "spirex@example.com","key2": "value 2","key3": "value 3"}}"#;

    #[derive(Default)]
    struct TestSignature {
        payload: Vec<u8>,
        certificate: Option<SignerCertificate>,
        bundle: Option<TransparencyLogBundle>,
    }

    impl VerifiedSignature for TestSignature {
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

    fn with_payload(payload: &str) -> TestSignature {
        TestSignature {
            payload: payload.as_bytes().to_vec(),
            ..Default::default()
        }
    }

    fn email(address: &str) -> Option<SignerCertificate> {
        Some(SignerCertificate {
            email_addresses: vec![address.into()],
            uris: vec![],
        })
    }

    fn rekord_body(content: &str) -> String {
        STANDARD.encode(format!(
            r#"{{"apiVersion":"0.0.1","kind":"hashedrekord","spec":{{"data":{{"hash":{{"algorithm":"sha256","value":"abc"}}}},"signature":{{"content":"{content}","format":"x509","publicKey":{{"content":"cert"}}}}}}}}"#
        ))
    }

    #[test]
    fn test_payload_subject() {
        let selector = SignatureSelector::from_signature(&with_payload(PAYLOAD));
        assert!(selector.verified);
        assert_eq!(selector.subject, "spirex@example.com");
        assert_eq!(selector.content, None);
    }

    #[test]
    fn test_certificate_overrides_payload() {
        let signature = TestSignature {
            payload: br#"{"optional": {"subject": "a@x.com"}}"#.to_vec(),
            certificate: email("b@x.com"),
            ..Default::default()
        };
        assert_eq!(SignatureSelector::from_signature(&signature).subject, "b@x.com");
    }

    #[rstest]
    #[case(vec!["first@x.com", "second@x.com"], vec!["https://host/path"], "first@x.com")]
    #[case(vec![], vec!["https://host/path1", "https://host/path2"], "https://host/path1")]
    #[case(vec![], vec!["//user@host"], "user@host")]
    #[case(vec![], vec![], "")]
    fn test_certificate_subject(
        #[case] emails: Vec<&str>,
        #[case] uris: Vec<&str>,
        #[case] expected: &str,
    ) {
        let certificate = SignerCertificate {
            email_addresses: emails.into_iter().map(String::from).collect(),
            uris: uris.into_iter().map(String::from).collect(),
        };
        assert_eq!(certificate_subject(&certificate), expected);
    }

    #[test]
    fn test_certificate_without_identity_drops_payload_subject() {
        let signature = TestSignature {
            payload: PAYLOAD.as_bytes().to_vec(),
            certificate: Some(SignerCertificate::default()),
            ..Default::default()
        };
        let selector = SignatureSelector::from_signature(&signature);
        assert!(!selector.verified);
        assert_eq!(selector, SignatureSelector::default());
    }

    #[rstest]
    #[case("")]
    #[case("{")]
    #[case("[1, 2, 3]")]
    #[case(r#"{"optional": {"subject": 42}}"#)]
    #[case(r#"{"optional": null}"#)]
    #[case(r#"{"critical": {}}"#)]
    fn test_no_subject_is_unverified(#[case] payload: &str) {
        let selector = SignatureSelector::from_signature(&with_payload(payload));
        assert_eq!(selector, SignatureSelector::default());
    }

    #[test]
    fn test_malformed_payload_ignores_certificate() {
        let signature = TestSignature {
            payload: vec![],
            certificate: email("b@x.com"),
            ..Default::default()
        };
        assert!(!SignatureSelector::from_signature(&signature).verified);
    }

    #[test]
    fn test_bundle_metadata() {
        let signature = TestSignature {
            bundle: Some(TransparencyLogBundle {
                body: rekord_body("MEUCIQDsig"),
                log_id: "c0d23d6ad406973f9559f3ba2d1ca01f84147d8ffc5b8445c224f98b9591801d".into(),
                log_index: 7,
                integrated_time: 1650000000,
            }),
            ..with_payload(PAYLOAD)
        };

        let selector = SignatureSelector::from_signature(&signature);
        assert_eq!(
            selector,
            SignatureSelector {
                subject: "spirex@example.com".into(),
                content: Some("MEUCIQDsig".into()),
                log_id: Some(
                    "c0d23d6ad406973f9559f3ba2d1ca01f84147d8ffc5b8445c224f98b9591801d".into()
                ),
                integrated_time: Some("1650000000".into()),
                verified: true,
            }
        );
    }

    #[rstest]
    #[case("not base64!")]
    #[case("e30=")]
    fn test_bad_bundle_body_keeps_subject(#[case] body: &str) {
        let signature = TestSignature {
            bundle: Some(TransparencyLogBundle {
                body: body.into(),
                ..Default::default()
            }),
            ..with_payload(PAYLOAD)
        };

        let selector = SignatureSelector::from_signature(&signature);
        assert!(selector.verified);
        assert_eq!(selector.content, None);
        assert_eq!(selector.log_id, None);
        assert_eq!(selector.integrated_time, None);
    }

    #[test]
    fn test_selector_strings() {
        let selector = SignatureSelector {
            subject: "spirex@example.com".into(),
            content: Some("MEUCIQDsig".into()),
            log_id: None,
            integrated_time: Some("1650000000".into()),
            verified: true,
        };
        assert_eq!(
            selector.to_selector_strings("000000"),
            vec![
                "000000:image-signature-subject:spirex@example.com",
                "000000:image-signature-content:MEUCIQDsig",
                "000000:image-signature-integrated-time:1650000000",
            ]
        );
    }

    #[test]
    fn test_extract_selectors_skips_unverified() {
        let signatures: Vec<Box<dyn VerifiedSignature>> = vec![
            Box::new(with_payload(PAYLOAD)),
            Box::new(with_payload("")),
            Box::new(TestSignature {
                certificate: email("b@x.com"),
                ..with_payload("{}")
            }),
        ];

        let subjects: Vec<_> = extract_selectors(&signatures)
            .into_iter()
            .map(|selector| selector.subject)
            .collect();
        assert_eq!(subjects, vec!["spirex@example.com", "b@x.com"]);
    }
}
