//! # X.509 Certificates
//!
//! A parsed certificate that owns its DER. Only the fields the provisioning
//! path needs are extracted; the raw DER stays authoritative and is what the
//! boundary codec carries.

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use x509_parser::prelude::{FromDer, X509Certificate};

use kprov_core::hex::{bytes_to_hex, hex_prefix};

use crate::key::{AlgorithmId, OID_ED25519, OID_EC_PUBLIC_KEY, OID_SECP256R1};

/// A parsed X.509 certificate.
pub struct Certificate {
    der: Vec<u8>,
    subject: String,
    issuer: String,
    serial: String,
    not_before: DateTime<Utc>,
    not_after: DateTime<Utc>,
    public_key_algorithm: AlgorithmId,
    public_key: Vec<u8>,
}

impl Certificate {
    /// Parse a single DER certificate. Trailing bytes are rejected.
    pub fn from_der(der: &[u8]) -> Result<Self, String> {
        let (rest, cert) =
            X509Certificate::from_der(der).map_err(|e| format!("invalid X.509 DER: {e}"))?;
        if !rest.is_empty() {
            return Err(format!("{} trailing bytes after certificate", rest.len()));
        }

        let validity = cert.validity();
        let not_before = timestamp(validity.not_before.timestamp(), "notBefore")?;
        let not_after = timestamp(validity.not_after.timestamp(), "notAfter")?;

        let spki = cert.public_key();
        let alg_oid = spki.algorithm.algorithm.to_id_string();
        let curve_oid = spki
            .algorithm
            .parameters
            .as_ref()
            .and_then(|p| p.as_oid().ok())
            .map(|oid| oid.to_id_string());
        let public_key_algorithm = classify(&alg_oid, curve_oid.as_deref());

        Ok(Self {
            der: der.to_vec(),
            subject: cert.subject().to_string(),
            issuer: cert.issuer().to_string(),
            serial: cert.raw_serial_as_string(),
            not_before,
            not_after,
            public_key_algorithm,
            public_key: spki.subject_public_key.data.to_vec(),
        })
    }

    /// The DER this certificate was parsed from.
    pub fn der(&self) -> &[u8] {
        &self.der
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Serial number as colon-separated hex.
    pub fn serial(&self) -> &str {
        &self.serial
    }

    pub fn not_before(&self) -> DateTime<Utc> {
        self.not_before
    }

    pub fn not_after(&self) -> DateTime<Utc> {
        self.not_after
    }

    /// Whether `at` falls inside the validity window (inclusive).
    pub fn is_valid_at(&self, at: DateTime<Utc>) -> bool {
        self.not_before <= at && at <= self.not_after
    }

    /// Subject and issuer names are identical.
    pub fn is_self_issued(&self) -> bool {
        self.subject == self.issuer
    }

    pub fn public_key_algorithm(&self) -> &AlgorithmId {
        &self.public_key_algorithm
    }

    /// Raw subject public key bits.
    pub fn public_key(&self) -> &[u8] {
        &self.public_key
    }

    /// Lowercase hex SHA-256 of the DER.
    pub fn fingerprint(&self) -> String {
        bytes_to_hex(&Sha256::digest(&self.der))
    }
}

impl std::fmt::Debug for Certificate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Certificate")
            .field("subject", &self.subject)
            .field("issuer", &self.issuer)
            .field("serial", &self.serial)
            .field("not_after", &self.not_after)
            .field("algorithm", &self.public_key_algorithm)
            .field("sha256", &format_args!("{}...", hex_prefix(&Sha256::digest(&self.der))))
            .finish()
    }
}

fn timestamp(secs: i64, field: &str) -> Result<DateTime<Utc>, String> {
    DateTime::from_timestamp(secs, 0).ok_or_else(|| format!("{field} out of range: {secs}"))
}

fn classify(alg_oid: &str, curve_oid: Option<&str>) -> AlgorithmId {
    if alg_oid == OID_EC_PUBLIC_KEY.to_string() {
        if curve_oid == Some(OID_SECP256R1.to_string().as_str()) {
            return AlgorithmId::EcP256;
        }
        return AlgorithmId::Other(format!("{alg_oid}/{}", curve_oid.unwrap_or("?")));
    }
    if alg_oid == OID_ED25519.to_string() {
        return AlgorithmId::Ed25519;
    }
    AlgorithmId::Other(alg_oid.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn self_signed_p256() -> Vec<u8> {
        let certified = rcgen::generate_simple_self_signed(vec!["kms.example".to_string()]).unwrap();
        certified.cert.der().to_vec()
    }

    #[test]
    fn parses_p256_certificate() {
        let der = self_signed_p256();
        let cert = Certificate::from_der(&der).unwrap();
        assert_eq!(cert.public_key_algorithm(), &AlgorithmId::EcP256);
        assert_eq!(cert.public_key().len(), 65);
        assert_eq!(cert.public_key()[0], 0x04);
        assert_eq!(cert.der(), der.as_slice());
        assert!(cert.is_self_issued());
        assert!(cert.is_valid_at(Utc::now()));
        assert!(!cert.serial().is_empty());
        assert_eq!(cert.fingerprint().len(), 64);
    }

    #[test]
    fn parses_ed25519_certificate() {
        let kp = rcgen::KeyPair::generate_for(&rcgen::PKCS_ED25519).unwrap();
        let params = rcgen::CertificateParams::new(vec!["kms.example".to_string()]).unwrap();
        let cert = params.self_signed(&kp).unwrap();
        let parsed = Certificate::from_der(cert.der()).unwrap();
        assert_eq!(parsed.public_key_algorithm(), &AlgorithmId::Ed25519);
        assert_eq!(parsed.public_key().len(), 32);
    }

    #[test]
    fn trailing_bytes_rejected() {
        let mut der = self_signed_p256();
        der.push(0x00);
        let err = Certificate::from_der(&der).unwrap_err();
        assert!(err.contains("trailing"), "{err}");
    }

    #[test]
    fn truncated_der_rejected() {
        let der = self_signed_p256();
        assert!(Certificate::from_der(&der[..der.len() / 2]).is_err());
        assert!(Certificate::from_der(&[]).is_err());
    }

    #[test]
    fn validity_window_is_inclusive() {
        let der = self_signed_p256();
        let cert = Certificate::from_der(&der).unwrap();
        assert!(cert.is_valid_at(cert.not_before()));
        assert!(cert.is_valid_at(cert.not_after()));
        assert!(!cert.is_valid_at(cert.not_before() - chrono::Duration::seconds(1)));
    }

    #[test]
    fn classify_unknown_curve() {
        let alg = classify("1.2.840.10045.2.1", Some("1.3.132.0.34"));
        assert_eq!(alg.as_str(), "1.2.840.10045.2.1/1.3.132.0.34");
        assert!(!alg.is_supported());
        assert_eq!(classify("1.2.840.113549.1.1.1", None), AlgorithmId::Other("1.2.840.113549.1.1.1".into()));
    }
}
