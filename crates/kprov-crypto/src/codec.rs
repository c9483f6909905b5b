//! # Boundary Codec
//!
//! Converts keys and certificates to and from the DER carried across the
//! enclave boundary.
//!
//! - Private keys travel as PKCS#8 `PrivateKeyInfo`, whatever format they
//!   were loaded from.
//! - Certificates travel as their original DER.
//!
//! ## Security Invariant
//!
//! Decoding checks the buffer's declared length against its contents and
//! the outer DER framing against the buffer length before any parser sees
//! the bytes. A mismatch in either is a [`CodecError::Decode`]; nothing
//! partially decoded is returned.

use pkcs8::der::{Decode, Header, Reader, SliceReader, Tag};

use kprov_core::{EncodedBuffer, PayloadKind};

use crate::certificate::Certificate;
use crate::error::CodecError;
use crate::key::{AlgorithmId, AsymmetricKey};

/// Values that can be placed into an [`EncodedBuffer`] for the boundary.
pub trait BoundaryEncode {
    /// The payload kind produced by [`encode`](Self::encode).
    const KIND: PayloadKind;

    /// Algorithm family of the key (or of the certificate's public key).
    fn algorithm(&self) -> AlgorithmId;

    /// Produce the canonical encoding.
    fn encode(&self) -> Result<EncodedBuffer, CodecError>;
}

impl BoundaryEncode for AsymmetricKey {
    const KIND: PayloadKind = PayloadKind::PrivateKey;

    fn algorithm(&self) -> AlgorithmId {
        AsymmetricKey::algorithm(self)
    }

    fn encode(&self) -> Result<EncodedBuffer, CodecError> {
        encode_key(self)
    }
}

impl BoundaryEncode for Certificate {
    const KIND: PayloadKind = PayloadKind::Certificate;

    fn algorithm(&self) -> AlgorithmId {
        self.public_key_algorithm().clone()
    }

    fn encode(&self) -> Result<EncodedBuffer, CodecError> {
        encode_certificate(self)
    }
}

/// Encode a private key as PKCS#8 DER.
pub fn encode_key(key: &AsymmetricKey) -> Result<EncodedBuffer, CodecError> {
    let kind = PayloadKind::PrivateKey;
    let mut der = key.to_pkcs8_der().map_err(|e| CodecError::encode(kind, e))?;
    if der.is_empty() {
        return Err(CodecError::encode(kind, "encoder produced no bytes"));
    }
    Ok(EncodedBuffer::new(kind, std::mem::take(&mut *der)))
}

/// Encode a certificate as DER.
pub fn encode_certificate(cert: &Certificate) -> Result<EncodedBuffer, CodecError> {
    let kind = PayloadKind::Certificate;
    if cert.der().is_empty() {
        return Err(CodecError::encode(kind, "certificate has no DER"));
    }
    Ok(EncodedBuffer::new(kind, cert.der().to_vec()))
}

/// Decode a private key from a boundary buffer.
pub fn decode_key(buffer: &EncodedBuffer) -> Result<AsymmetricKey, CodecError> {
    let kind = PayloadKind::PrivateKey;
    let bytes = buffer.checked_bytes(kind)?;
    check_der_framing(kind, bytes)?;
    AsymmetricKey::from_pkcs8_der(bytes).map_err(|e| CodecError::decode(kind, e))
}

/// Decode a certificate from a boundary buffer.
pub fn decode_certificate(buffer: &EncodedBuffer) -> Result<Certificate, CodecError> {
    let kind = PayloadKind::Certificate;
    let bytes = buffer.checked_bytes(kind)?;
    check_der_framing(kind, bytes)?;
    Certificate::from_der(bytes).map_err(|e| CodecError::decode(kind, e))
}

/// The buffer must be exactly one DER SEQUENCE.
fn check_der_framing(kind: PayloadKind, bytes: &[u8]) -> Result<(), CodecError> {
    let mut reader = SliceReader::new(bytes).map_err(|e| CodecError::decode(kind, e))?;
    let header = Header::decode(&mut reader).map_err(|e| CodecError::decode(kind, e))?;
    if header.tag != Tag::Sequence {
        return Err(CodecError::decode(
            kind,
            format!("expected DER SEQUENCE, found {}", header.tag),
        ));
    }
    let header_len = usize::try_from(reader.position()).map_err(|e| CodecError::decode(kind, e))?;
    let body_len = usize::try_from(header.length).map_err(|e| CodecError::decode(kind, e))?;
    let framed = header_len.saturating_add(body_len);
    if framed > bytes.len() {
        return Err(CodecError::decode(
            kind,
            format!("truncated: DER declares {framed} bytes, buffer holds {}", bytes.len()),
        ));
    }
    if framed < bytes.len() {
        return Err(CodecError::decode(
            kind,
            format!("{} trailing bytes after DER value", bytes.len() - framed),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn rcgen_certificate() -> Certificate {
        let certified = rcgen::generate_simple_self_signed(vec!["kms.example".to_string()]).unwrap();
        Certificate::from_der(certified.cert.der()).unwrap()
    }

    #[test]
    fn key_roundtrip_both_algorithms() {
        for alg in [AlgorithmId::EcP256, AlgorithmId::Ed25519] {
            let key = AsymmetricKey::generate(&alg).unwrap();
            let buffer = encode_key(&key).unwrap();
            assert_eq!(buffer.kind(), PayloadKind::PrivateKey);
            assert_eq!(buffer.declared_len(), buffer.actual_len());
            let back = decode_key(&buffer).unwrap();
            assert!(key.same_key_as(&back));
        }
    }

    #[test]
    fn certificate_roundtrip_preserves_der() {
        let cert = rcgen_certificate();
        let buffer = encode_certificate(&cert).unwrap();
        assert_eq!(buffer.as_bytes(), cert.der());
        let back = decode_certificate(&buffer).unwrap();
        assert_eq!(back.der(), cert.der());
        assert_eq!(back.subject(), cert.subject());
    }

    #[test]
    fn trait_dispatch_matches_free_functions() {
        let key = AsymmetricKey::generate(&AlgorithmId::Ed25519).unwrap();
        let via_trait = BoundaryEncode::encode(&key).unwrap();
        assert_eq!(<AsymmetricKey as BoundaryEncode>::KIND, via_trait.kind());
        assert_eq!(BoundaryEncode::algorithm(&key), AlgorithmId::Ed25519);

        let cert = rcgen_certificate();
        assert_eq!(BoundaryEncode::algorithm(&cert), AlgorithmId::EcP256);
        assert_eq!(<Certificate as BoundaryEncode>::KIND, PayloadKind::Certificate);
    }

    #[test]
    fn declared_length_short_by_one_fails() {
        let key = AsymmetricKey::generate(&AlgorithmId::EcP256).unwrap();
        let good = encode_key(&key).unwrap();
        let bad = EncodedBuffer::from_parts(
            PayloadKind::PrivateKey,
            good.as_bytes().to_vec(),
            good.declared_len() - 1,
        );
        let err = decode_key(&bad).unwrap_err();
        assert!(matches!(err, CodecError::Decode { .. }));
    }

    #[test]
    fn truncated_bytes_fail_framing() {
        let cert = rcgen_certificate();
        let der = cert.der();
        let bad = EncodedBuffer::new(PayloadKind::Certificate, der[..der.len() - 1].to_vec());
        let err = decode_certificate(&bad).unwrap_err();
        assert!(matches!(
            err,
            CodecError::Decode {
                kind: PayloadKind::Certificate,
                ..
            }
        ));
    }

    #[test]
    fn trailing_bytes_fail_framing() {
        let key = AsymmetricKey::generate(&AlgorithmId::Ed25519).unwrap();
        let mut bytes = encode_key(&key).unwrap().as_bytes().to_vec();
        bytes.extend_from_slice(&[0x05, 0x00]);
        let bad = EncodedBuffer::new(PayloadKind::PrivateKey, bytes);
        let err = decode_key(&bad).unwrap_err();
        assert!(err.to_string().contains("trailing"), "{err}");
    }

    #[test]
    fn wrong_kind_fails() {
        let cert = rcgen_certificate();
        let buffer = encode_certificate(&cert).unwrap();
        let err = decode_key(&buffer).unwrap_err();
        assert!(matches!(
            err,
            CodecError::Decode {
                kind: PayloadKind::PrivateKey,
                ..
            }
        ));
    }

    #[test]
    fn non_sequence_fails() {
        let bad = EncodedBuffer::new(PayloadKind::PrivateKey, vec![0x04, 0x02, 0xaa, 0xbb]);
        let err = decode_key(&bad).unwrap_err();
        assert!(err.to_string().contains("SEQUENCE"), "{err}");
    }

    #[test]
    fn empty_buffer_fails() {
        let bad = EncodedBuffer::new(PayloadKind::Certificate, Vec::new());
        assert!(decode_certificate(&bad).is_err());
    }

    #[test]
    fn certificate_bytes_as_key_fail() {
        let cert = rcgen_certificate();
        let bad = EncodedBuffer::new(PayloadKind::PrivateKey, cert.der().to_vec());
        assert!(decode_key(&bad).is_err());
    }

    proptest! {
        #[test]
        fn ed25519_seed_roundtrip(seed in any::<[u8; 32]>()) {
            let key = AsymmetricKey::from_ed25519(ed25519_dalek::SigningKey::from_bytes(&seed));
            let back = decode_key(&encode_key(&key).unwrap()).unwrap();
            prop_assert!(key.same_key_as(&back));
        }

        #[test]
        fn p256_scalar_roundtrip(scalar in any::<[u8; 32]>()) {
            let sk = p256::SecretKey::from_slice(&scalar);
            prop_assume!(sk.is_ok());
            let key = AsymmetricKey::from_p256(sk.unwrap());
            let back = decode_key(&encode_key(&key).unwrap()).unwrap();
            prop_assert!(key.same_key_as(&back));
        }

        #[test]
        fn any_length_disagreement_is_rejected(delta in 1usize..64, grow in any::<bool>()) {
            let key = AsymmetricKey::generate(&AlgorithmId::Ed25519).unwrap();
            let good = encode_key(&key).unwrap();
            let declared = if grow {
                good.declared_len() + delta
            } else {
                good.declared_len().saturating_sub(delta)
            };
            let bad = EncodedBuffer::from_parts(PayloadKind::PrivateKey, good.as_bytes().to_vec(), declared);
            prop_assert!(decode_key(&bad).is_err());
        }
    }
}
