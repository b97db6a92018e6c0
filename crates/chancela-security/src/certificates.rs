// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Certificate holder identity: ICP-Brasil attribute extraction.
//
// Natural-person certificates issued under ICP-Brasil carry the holder's
// data in a subjectAltName otherName (OID 2.16.76.1.3.1): birth date as
// DDMMYYYY followed by the 11-digit CPF and further registry fields. Older
// certificates only carry it in the subject CN as `NAME:CPF`.

use chancela_core::error::ChancelaError;
use chancela_core::types::CertificateIdentity;
use chrono::{DateTime, Utc};
use const_oid::ObjectIdentifier;
use const_oid::db::rfc4519::COMMON_NAME;
use der::asn1::Any;
use der::{Decode, Tag, Tagged};
use tracing::{debug, instrument};
use x509_cert::Certificate;
use x509_cert::ext::pkix::SubjectAltName;
use x509_cert::ext::pkix::name::GeneralName;
use x509_cert::name::Name;
use x509_cert::time::Time;

/// otherName carrying natural-person holder data.
pub const ICP_HOLDER_DATA: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.16.76.1.3.1");

const BIRTH_DATE_LEN: usize = 8;
const TAX_ID_LEN: usize = 11;

/// Decode a DER certificate.
pub fn parse_certificate(der: &[u8]) -> Result<Certificate, ChancelaError> {
    Certificate::from_der(der)
        .map_err(|e| ChancelaError::IdentityExtraction(format!("certificate is not valid DER: {e}")))
}

/// Holder tax id, from the ICP otherName or the `NAME:TAXID` CN.
pub fn holder_tax_id(cert: &Certificate) -> Option<String> {
    icp_other_name_tax_id(cert).or_else(|| {
        common_name(&cert.tbs_certificate.subject)
            .as_deref()
            .and_then(split_common_name)
            .map(|(_, tax_id)| tax_id.to_owned())
    })
}

/// Holder identity and display metadata for the leaf of `chain`.
#[instrument(skip(chain), fields(chain_len = chain.len()))]
pub fn describe(alias: &str, chain: &[Vec<u8>]) -> Result<CertificateIdentity, ChancelaError> {
    let leaf = chain
        .first()
        .ok_or_else(|| ChancelaError::IdentityExtraction(format!("no certificate for {alias}")))?;
    let cert = parse_certificate(leaf)?;
    let tbs = &cert.tbs_certificate;

    let tax_id = holder_tax_id(&cert).ok_or_else(|| {
        ChancelaError::IdentityExtraction(format!(
            "certificate of {alias} carries no ICP-Brasil holder data"
        ))
    })?;

    let cn = common_name(&tbs.subject);
    let holder_name = cn.as_deref().map(|cn| match split_common_name(cn) {
        Some((name, _)) => name.to_owned(),
        None => cn.to_owned(),
    });

    debug!(alias, "holder identity extracted");
    Ok(CertificateIdentity {
        alias: alias.to_owned(),
        tax_id,
        holder_name,
        subject: tbs.subject.to_string(),
        issuer: tbs.issuer.to_string(),
        serial_number: tbs.serial_number.to_string(),
        not_before: to_utc(tbs.validity.not_before),
        not_after: to_utc(tbs.validity.not_after),
        chain_length: chain.len(),
    })
}

fn icp_other_name_tax_id(cert: &Certificate) -> Option<String> {
    let (_, san) = cert.tbs_certificate.get::<SubjectAltName>().ok()??;
    san.0.iter().find_map(|name| match name {
        GeneralName::OtherName(other) if other.type_id == ICP_HOLDER_DATA => {
            let text = any_text(&other.value)?;
            let tax_id = text.get(BIRTH_DATE_LEN..BIRTH_DATE_LEN + TAX_ID_LEN)?;
            is_tax_id(tax_id).then(|| tax_id.to_owned())
        }
        _ => None,
    })
}

/// `NAME:TAXID` → (`NAME`, `TAXID`).
fn split_common_name(cn: &str) -> Option<(&str, &str)> {
    let (name, tax_id) = cn.rsplit_once(':')?;
    is_tax_id(tax_id).then_some((name.trim(), tax_id))
}

fn is_tax_id(candidate: &str) -> bool {
    candidate.len() == TAX_ID_LEN && candidate.bytes().all(|b| b.is_ascii_digit())
}

fn common_name(name: &Name) -> Option<String> {
    name.0
        .iter()
        .flat_map(|rdn| rdn.0.iter())
        .find(|atv| atv.oid == COMMON_NAME)
        .and_then(|atv| any_text(&atv.value))
}

/// String content of the ASN.1 string types certificates use in practice.
fn any_text(value: &Any) -> Option<String> {
    match value.tag() {
        Tag::Utf8String
        | Tag::PrintableString
        | Tag::Ia5String
        | Tag::VisibleString
        | Tag::TeletexString
        | Tag::OctetString => std::str::from_utf8(value.value()).ok().map(str::to_owned),
        _ => None,
    }
}

fn to_utc(time: Time) -> DateTime<Utc> {
    let secs = i64::try_from(time.to_unix_duration().as_secs()).unwrap_or(i64::MAX);
    DateTime::from_timestamp(secs, 0).unwrap_or(DateTime::<Utc>::MAX_UTC)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture(alias: &str) -> Vec<u8> {
        let path = format!(
            "{}/tests/fixtures/keystore/{alias}/cert.der",
            env!("CARGO_MANIFEST_DIR")
        );
        std::fs::read(path).expect("fixture")
    }

    #[test]
    fn tax_id_from_icp_other_name() {
        let identity = describe("cert-1", &[fixture("cert-1")]).expect("identity");
        assert_eq!(identity.tax_id, "12345678909");
        assert_eq!(identity.holder_name.as_deref(), Some("MARIA DA SILVA"));
        assert!(identity.subject.contains("MARIA DA SILVA"));
        assert!(identity.not_before < identity.not_after);
        assert_eq!(identity.chain_length, 1);
    }

    #[test]
    fn tax_id_from_common_name() {
        let identity = describe("cn-holder", &[fixture("cn-holder")]).expect("identity");
        assert_eq!(identity.tax_id, "98765432100");
        assert_eq!(identity.holder_name.as_deref(), Some("JOAO SOUZA"));
    }

    #[test]
    fn certificate_without_holder_data_is_rejected() {
        let err = describe("plain", &[fixture("plain")]).unwrap_err();
        assert!(matches!(err, ChancelaError::IdentityExtraction(_)));
    }

    #[test]
    fn empty_chain_and_garbage_are_rejected() {
        assert!(matches!(
            describe("none", &[]),
            Err(ChancelaError::IdentityExtraction(_))
        ));
        assert!(matches!(
            describe("junk", &[vec![0x30, 0x03, 0x02, 0x01]]),
            Err(ChancelaError::IdentityExtraction(_))
        ));
    }

    #[test]
    fn common_name_split_requires_eleven_digits() {
        assert_eq!(
            split_common_name("ANA:12345678909"),
            Some(("ANA", "12345678909"))
        );
        assert_eq!(split_common_name("ANA:1234"), None);
        assert_eq!(split_common_name("ANA"), None);
    }
}
