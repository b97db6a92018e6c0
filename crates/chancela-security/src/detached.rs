// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Detached CMS signatures (RFC 5652 SignedData without eContent).
//
// The content is hashed here; only the DER of the signed attributes goes to
// the key store, which lets hardware tokens sign without seeing the document.
// Signed attributes: contentType, messageDigest, signingTime,
// signingCertificateV2 (RFC 5035) and, when a policy digest is configured,
// the CAdES signature policy identifier for the ICP-Brasil AD-RB policy.

use std::time::SystemTime;

use chancela_core::error::ChancelaError;
use chrono::{DateTime, Utc};
use cms::cert::{CertificateChoices, IssuerAndSerialNumber};
use cms::content_info::{CmsVersion, ContentInfo};
use cms::signed_data::{
    CertificateSet, EncapsulatedContentInfo, SignedData, SignerIdentifier, SignerInfo,
    SignerInfos,
};
use const_oid::ObjectIdentifier;
use const_oid::db::rfc5911::{
    ID_AA_SIGNING_CERTIFICATE_V_2, ID_CONTENT_TYPE, ID_DATA, ID_MESSAGE_DIGEST, ID_SIGNED_DATA,
    ID_SIGNING_TIME,
};
use const_oid::db::rfc5912::{ID_SHA_256, SHA_256_WITH_RSA_ENCRYPTION};
use der::asn1::{Any, OctetString, SetOfVec};
use der::{Decode, Encode, EncodeValue, Sequence, Tagged};
use ring::signature::{RSA_PKCS1_2048_8192_SHA256, UnparsedPublicKey};
use spki::AlgorithmIdentifierOwned;
use tracing::{debug, instrument};
use x509_cert::Certificate;
use x509_cert::attr::Attribute;
use x509_cert::ext::pkix::name::GeneralName;
use x509_cert::serial_number::SerialNumber;
use x509_cert::time::Time;

use crate::integrity::sha256;

/// `id-aa-ets-sigPolicyId` (RFC 5126).
pub const ID_AA_ETS_SIG_POLICY_ID: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.16.2.15");

/// ICP-Brasil AD-RB CAdES policy, version 2.2.
pub const AD_RB_CADES_2_2: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("2.16.76.1.7.1.1.2.2");

/// A signature policy to commit to in the signed attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignaturePolicy {
    pub oid: ObjectIdentifier,
    /// SHA-256 of the policy document.
    pub digest: [u8; 32],
}

impl SignaturePolicy {
    pub fn ad_rb(digest: [u8; 32]) -> Self {
        Self {
            oid: AD_RB_CADES_2_2,
            digest,
        }
    }
}

/// What a successful verification established.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedSignature {
    pub signer_subject: String,
    pub signing_time: Option<DateTime<Utc>>,
    pub policy: Option<ObjectIdentifier>,
}

#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
struct IssuerSerial {
    issuer: Vec<GeneralName>,
    serial_number: SerialNumber,
}

/// `ESSCertIDv2` with the default (SHA-256) hash algorithm omitted.
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
struct EssCertIdV2 {
    cert_hash: OctetString,
    issuer_serial: IssuerSerial,
}

#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
struct SigningCertificateV2 {
    certs: Vec<EssCertIdV2>,
}

#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
struct OtherHashAlgAndValue {
    hash_algorithm: AlgorithmIdentifierOwned,
    hash_value: OctetString,
}

#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
struct SignaturePolicyId {
    sig_policy_id: ObjectIdentifier,
    sig_policy_hash: OtherHashAlgAndValue,
}

fn asn1(err: der::Error) -> ChancelaError {
    ChancelaError::Signing {
        kind: chancela_core::error::SigningFailure::Other,
        detail: format!("CMS encoding failed: {err}"),
    }
}

fn sha256_algorithm() -> AlgorithmIdentifierOwned {
    AlgorithmIdentifierOwned {
        oid: ID_SHA_256,
        parameters: None,
    }
}

fn attribute(
    oid: ObjectIdentifier,
    value: &(impl EncodeValue + Tagged),
) -> der::Result<Attribute> {
    let mut values = SetOfVec::new();
    values.insert(Any::encode_from(value)?)?;
    Ok(Attribute { oid, values })
}

fn signing_certificate_v2(leaf: &Certificate, leaf_der: &[u8]) -> der::Result<SigningCertificateV2> {
    let tbs = &leaf.tbs_certificate;
    Ok(SigningCertificateV2 {
        certs: vec![EssCertIdV2 {
            cert_hash: OctetString::new(sha256(leaf_der).to_vec())?,
            issuer_serial: IssuerSerial {
                issuer: vec![GeneralName::DirectoryName(tbs.issuer.clone())],
                serial_number: tbs.serial_number.clone(),
            },
        }],
    })
}

fn signed_attributes(
    content_digest: &[u8; 32],
    leaf: &Certificate,
    leaf_der: &[u8],
    policy: Option<&SignaturePolicy>,
    signing_time: SystemTime,
) -> der::Result<SetOfVec<Attribute>> {
    let mut attributes = vec![
        attribute(ID_CONTENT_TYPE, &ID_DATA)?,
        attribute(ID_MESSAGE_DIGEST, &OctetString::new(content_digest.to_vec())?)?,
        attribute(ID_SIGNING_TIME, &Time::try_from(signing_time)?)?,
        attribute(
            ID_AA_SIGNING_CERTIFICATE_V_2,
            &signing_certificate_v2(leaf, leaf_der)?,
        )?,
    ];
    if let Some(policy) = policy {
        attributes.push(attribute(
            ID_AA_ETS_SIG_POLICY_ID,
            &SignaturePolicyId {
                sig_policy_id: policy.oid,
                sig_policy_hash: OtherHashAlgAndValue {
                    hash_algorithm: sha256_algorithm(),
                    hash_value: OctetString::new(policy.digest.to_vec())?,
                },
            },
        )?);
    }
    SetOfVec::try_from(attributes)
}

/// Build a DER `ContentInfo` holding a detached SignedData over `content`.
///
/// `chain` is leaf first. `sign_raw` receives the DER of the signed
/// attributes and must return an RSASSA-PKCS1-v1_5 SHA-256 signature.
#[instrument(skip_all, fields(content_len = content.len(), chain_len = chain.len()))]
pub fn build_detached<F>(
    content: &[u8],
    chain: &[Certificate],
    policy: Option<&SignaturePolicy>,
    signing_time: SystemTime,
    sign_raw: F,
) -> Result<Vec<u8>, ChancelaError>
where
    F: FnOnce(&[u8]) -> Result<Vec<u8>, ChancelaError>,
{
    let leaf = chain
        .first()
        .ok_or_else(|| ChancelaError::IdentityExtraction("empty certificate chain".into()))?;
    let leaf_der = leaf.to_der().map_err(asn1)?;

    let digest = sha256(content);
    let attributes =
        signed_attributes(&digest, leaf, &leaf_der, policy, signing_time).map_err(asn1)?;
    let to_be_signed = attributes.to_der().map_err(asn1)?;
    let signature = sign_raw(&to_be_signed)?;

    let signer_info = SignerInfo {
        version: CmsVersion::V1,
        sid: SignerIdentifier::IssuerAndSerialNumber(IssuerAndSerialNumber {
            issuer: leaf.tbs_certificate.issuer.clone(),
            serial_number: leaf.tbs_certificate.serial_number.clone(),
        }),
        digest_alg: sha256_algorithm(),
        signed_attrs: Some(attributes),
        signature_algorithm: AlgorithmIdentifierOwned {
            oid: SHA_256_WITH_RSA_ENCRYPTION,
            parameters: Some(Any::null()),
        },
        signature: OctetString::new(signature).map_err(asn1)?,
        unsigned_attrs: None,
    };

    let certificates = chain
        .iter()
        .cloned()
        .map(CertificateChoices::Certificate)
        .collect::<Vec<_>>();

    let signed_data = SignedData {
        version: CmsVersion::V1,
        digest_algorithms: SetOfVec::try_from(vec![sha256_algorithm()]).map_err(asn1)?,
        encap_content_info: EncapsulatedContentInfo {
            econtent_type: ID_DATA,
            econtent: None,
        },
        certificates: Some(CertificateSet::try_from(certificates).map_err(asn1)?),
        crls: None,
        signer_infos: SignerInfos::try_from(vec![signer_info]).map_err(asn1)?,
    };

    let content_info = ContentInfo {
        content_type: ID_SIGNED_DATA,
        content: Any::encode_from(&signed_data).map_err(asn1)?,
    };
    let der = content_info.to_der().map_err(asn1)?;
    debug!(signature_len = der.len(), "detached signature built");
    Ok(der)
}

fn invalid(detail: impl Into<String>) -> ChancelaError {
    ChancelaError::Signing {
        kind: chancela_core::error::SigningFailure::CertificateValidation,
        detail: detail.into(),
    }
}

/// Verify a detached signature produced by [`build_detached`] (or any
/// single-signer RSA/SHA-256 CMS with signed attributes) against `content`.
#[instrument(skip_all, fields(signature_len = signature_der.len(), content_len = content.len()))]
pub fn verify_detached(
    signature_der: &[u8],
    content: &[u8],
) -> Result<VerifiedSignature, ChancelaError> {
    let content_info =
        ContentInfo::from_der(signature_der).map_err(|e| invalid(format!("not CMS: {e}")))?;
    if content_info.content_type != ID_SIGNED_DATA {
        return Err(invalid("not a SignedData"));
    }
    let signed_data: SignedData = content_info
        .content
        .decode_as()
        .map_err(|e| invalid(format!("malformed SignedData: {e}")))?;
    if signed_data.encap_content_info.econtent.is_some() {
        return Err(invalid("signature is not detached"));
    }

    let signer = signed_data
        .signer_infos
        .0
        .iter()
        .next()
        .ok_or_else(|| invalid("no signer"))?;
    let attributes = signer
        .signed_attrs
        .as_ref()
        .ok_or_else(|| invalid("no signed attributes"))?;

    let find = |oid: ObjectIdentifier| {
        attributes
            .iter()
            .find(|a| a.oid == oid)
            .and_then(|a| a.values.iter().next())
    };

    let message_digest: OctetString = find(ID_MESSAGE_DIGEST)
        .ok_or_else(|| invalid("no message digest"))?
        .decode_as()
        .map_err(|e| invalid(format!("malformed message digest: {e}")))?;
    if message_digest.as_bytes() != sha256(content).as_slice() {
        return Err(invalid("content does not match the signed digest"));
    }

    let SignerIdentifier::IssuerAndSerialNumber(sid) = &signer.sid else {
        return Err(invalid("unsupported signer identifier"));
    };
    let certificate = signed_data
        .certificates
        .iter()
        .flat_map(|set| set.0.iter())
        .find_map(|choice| match choice {
            CertificateChoices::Certificate(cert)
                if cert.tbs_certificate.issuer == sid.issuer
                    && cert.tbs_certificate.serial_number == sid.serial_number =>
            {
                Some(cert)
            }
            _ => None,
        })
        .ok_or_else(|| invalid("signer certificate not embedded"))?;

    let signed_bytes = attributes.to_der().map_err(asn1)?;
    let public_key = certificate
        .tbs_certificate
        .subject_public_key_info
        .subject_public_key
        .raw_bytes();
    UnparsedPublicKey::new(&RSA_PKCS1_2048_8192_SHA256, public_key)
        .verify(&signed_bytes, signer.signature.as_bytes())
        .map_err(|_| invalid("RSA signature does not verify"))?;

    let signing_time = find(ID_SIGNING_TIME)
        .and_then(|value| value.to_der().ok())
        .and_then(|der| Time::from_der(&der).ok())
        .and_then(|time| {
            let secs = i64::try_from(time.to_unix_duration().as_secs()).ok()?;
            DateTime::from_timestamp(secs, 0)
        });
    let policy = find(ID_AA_ETS_SIG_POLICY_ID)
        .and_then(|value| value.decode_as::<SignaturePolicyId>().ok())
        .map(|policy| policy.sig_policy_id);

    debug!("detached signature verified");
    Ok(VerifiedSignature {
        signer_subject: certificate.tbs_certificate.subject.to_string(),
        signing_time,
        policy,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::certificates::parse_certificate;
    use crate::keystore::{FileKeyStore, KeyStore};

    fn store() -> FileKeyStore {
        FileKeyStore::new(concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/keystore"))
    }

    fn sign(content: &[u8], policy: Option<&SignaturePolicy>) -> Vec<u8> {
        let store = store();
        let chain: Vec<Certificate> = store
            .certificate_chain("cert-1")
            .expect("chain")
            .iter()
            .map(|der| parse_certificate(der).expect("certificate"))
            .collect();
        build_detached(content, &chain, policy, SystemTime::now(), |tbs| {
            store.sign("cert-1", tbs).map_err(ChancelaError::from)
        })
        .expect("signature")
    }

    #[test]
    fn signature_verifies_against_its_content() {
        let verified = verify_detached(&sign(b"%PDF-1.7 test", None), b"%PDF-1.7 test")
            .expect("verified");
        assert!(verified.signer_subject.contains("MARIA DA SILVA"));
        assert!(verified.signing_time.is_some());
        assert_eq!(verified.policy, None);
    }

    #[test]
    fn signing_time_attribute_is_recorded() {
        let store = store();
        let chain: Vec<Certificate> = store
            .certificate_chain("cert-1")
            .expect("chain")
            .iter()
            .map(|der| parse_certificate(der).expect("certificate"))
            .collect();
        let at = SystemTime::UNIX_EPOCH + std::time::Duration::from_secs(1_767_225_600);
        let signature = build_detached(b"dated", &chain, None, at, |tbs| {
            store.sign("cert-1", tbs).map_err(ChancelaError::from)
        })
        .expect("signature");

        let verified = verify_detached(&signature, b"dated").expect("verified");
        assert_eq!(
            verified.signing_time.map(|t| t.timestamp()),
            Some(1_767_225_600)
        );
    }

    #[test]
    fn other_content_is_rejected() {
        let signature = sign(b"original", None);
        let err = verify_detached(&signature, b"tampered").unwrap_err();
        assert!(matches!(err, ChancelaError::Signing { .. }));
    }

    #[test]
    fn policy_identifier_is_committed() {
        let policy = SignaturePolicy::ad_rb(sha256(b"policy document"));
        let verified = verify_detached(&sign(b"doc", Some(&policy)), b"doc").expect("verified");
        assert_eq!(verified.policy, Some(AD_RB_CADES_2_2));
    }

    #[test]
    fn signature_does_not_embed_content() {
        let content = b"UNIQUE-MARKER-0123456789-UNIQUE-MARKER";
        let signature = sign(content, None);
        assert!(!signature.windows(content.len()).any(|w| w == content));
    }

    #[test]
    fn empty_chain_is_an_identity_error() {
        let err = build_detached(b"x", &[], None, SystemTime::now(), |_| Ok(Vec::new()))
            .unwrap_err();
        assert!(matches!(err, ChancelaError::IdentityExtraction(_)));
    }

    #[test]
    fn signer_failure_propagates() {
        let chain = vec![
            parse_certificate(&store().certificate_chain("cert-1").expect("chain")[0])
                .expect("certificate"),
        ];
        let err = build_detached(b"x", &chain, None, SystemTime::now(), |_| {
            Err(ChancelaError::signing(
                chancela_core::error::SigningFailure::Cancelled,
                "PIN entry cancelled",
            ))
        })
        .unwrap_err();
        assert!(matches!(
            err,
            ChancelaError::Signing {
                kind: chancela_core::error::SigningFailure::Cancelled,
                ..
            }
        ));
    }

    #[test]
    fn garbage_is_not_a_signature() {
        assert!(verify_detached(b"not der", b"x").is_err());
    }
}
