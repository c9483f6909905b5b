//! # Asymmetric Private Keys
//!
//! [`AsymmetricKey`] is an opaque owner of private key material for one of
//! the supported algorithm families. The rest of the workspace only sees
//! its [`AlgorithmId`], its public half, and its canonical encoding.
//!
//! ## Security Invariants
//!
//! - Not `Clone`. A key is moved or borrowed, never duplicated implicitly.
//! - Both backing types (`p256::SecretKey`, `ed25519_dalek::SigningKey`)
//!   zeroize their scalar on drop.
//! - `Debug` prints the algorithm and a public key prefix only.
//! - Equality of private material is checked in constant time.

use p256::elliptic_curve::sec1::ToEncodedPoint;
use pkcs8::{DecodePrivateKey, EncodePrivateKey, ObjectIdentifier, PrivateKeyInfo};
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use kprov_core::hex::hex_prefix;

/// `id-ecPublicKey` (RFC 5480).
pub const OID_EC_PUBLIC_KEY: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.2.1");
/// `secp256r1` / `prime256v1` named curve.
pub const OID_SECP256R1: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.3.1.7");
/// `id-Ed25519` (RFC 8410).
pub const OID_ED25519: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.101.112");

/// Algorithm family of a key or of a certificate's subject public key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AlgorithmId {
    /// ECDSA over NIST P-256.
    EcP256,
    /// Ed25519.
    Ed25519,
    /// Anything else, identified by its dotted OID. Never produced for
    /// private keys.
    Other(String),
}

impl AlgorithmId {
    /// Canonical string name.
    pub fn as_str(&self) -> &str {
        match self {
            Self::EcP256 => "ec-p256",
            Self::Ed25519 => "ed25519",
            Self::Other(oid) => oid,
        }
    }

    /// Whether keys of this family can cross the boundary.
    pub fn is_supported(&self) -> bool {
        !matches!(self, Self::Other(_))
    }
}

impl std::fmt::Display for AlgorithmId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

enum KeyMaterial {
    EcP256(p256::SecretKey),
    Ed25519(ed25519_dalek::SigningKey),
}

/// An owned private key.
pub struct AsymmetricKey {
    material: KeyMaterial,
}

impl AsymmetricKey {
    /// Wrap a P-256 secret key.
    pub fn from_p256(key: p256::SecretKey) -> Self {
        Self {
            material: KeyMaterial::EcP256(key),
        }
    }

    /// Wrap an Ed25519 signing key.
    pub fn from_ed25519(key: ed25519_dalek::SigningKey) -> Self {
        Self {
            material: KeyMaterial::Ed25519(key),
        }
    }

    /// Generate a fresh key of the given family with the OS CSPRNG.
    ///
    /// Returns `None` for [`AlgorithmId::Other`].
    pub fn generate(algorithm: &AlgorithmId) -> Option<Self> {
        let mut rng = rand_core::OsRng;
        match algorithm {
            AlgorithmId::EcP256 => Some(Self::from_p256(p256::SecretKey::random(&mut rng))),
            AlgorithmId::Ed25519 => Some(Self::from_ed25519(
                ed25519_dalek::SigningKey::generate(&mut rng),
            )),
            AlgorithmId::Other(_) => None,
        }
    }

    /// Parse a PKCS#8 DER document, dispatching on its algorithm OID.
    ///
    /// The whole input must be consumed; trailing bytes are an error.
    pub fn from_pkcs8_der(der: &[u8]) -> Result<Self, String> {
        let info = PrivateKeyInfo::try_from(der).map_err(|e| format!("invalid PKCS#8: {e}"))?;
        let oid = info.algorithm.oid;
        if oid == OID_EC_PUBLIC_KEY {
            let key = p256::SecretKey::from_pkcs8_der(der)
                .map_err(|e| format!("invalid P-256 key: {e}"))?;
            Ok(Self::from_p256(key))
        } else if oid == OID_ED25519 {
            let key = ed25519_dalek::SigningKey::from_pkcs8_der(der)
                .map_err(|e| format!("invalid Ed25519 key: {e}"))?;
            Ok(Self::from_ed25519(key))
        } else {
            Err(format!("unsupported private key algorithm {oid}"))
        }
    }

    /// Parse a SEC1 `ECPrivateKey` DER document (P-256 only).
    pub fn from_sec1_der(der: &[u8]) -> Result<Self, String> {
        p256::SecretKey::from_sec1_der(der)
            .map(Self::from_p256)
            .map_err(|e| format!("invalid SEC1 P-256 key: {e}"))
    }

    /// Algorithm family.
    pub fn algorithm(&self) -> AlgorithmId {
        match &self.material {
            KeyMaterial::EcP256(_) => AlgorithmId::EcP256,
            KeyMaterial::Ed25519(_) => AlgorithmId::Ed25519,
        }
    }

    /// Public key bytes: uncompressed SEC1 point for P-256, the 32-byte
    /// point for Ed25519.
    pub fn public_key_bytes(&self) -> Vec<u8> {
        match &self.material {
            KeyMaterial::EcP256(sk) => sk.public_key().to_encoded_point(false).as_bytes().to_vec(),
            KeyMaterial::Ed25519(sk) => sk.verifying_key().to_bytes().to_vec(),
        }
    }

    /// Canonical PKCS#8 DER. Zeroized when dropped.
    pub fn to_pkcs8_der(&self) -> Result<Zeroizing<Vec<u8>>, String> {
        let doc = match &self.material {
            KeyMaterial::EcP256(sk) => sk.to_pkcs8_der(),
            KeyMaterial::Ed25519(sk) => sk.to_pkcs8_der(),
        }
        .map_err(|e| e.to_string())?;
        Ok(Zeroizing::new(doc.as_bytes().to_vec()))
    }

    /// Whether `other` holds the same algorithm and the same private scalar.
    pub fn same_key_as(&self, other: &AsymmetricKey) -> bool {
        if self.algorithm() != other.algorithm() {
            return false;
        }
        let a = self.private_bytes();
        let b = other.private_bytes();
        a.as_slice().ct_eq(b.as_slice()).into()
    }

    fn private_bytes(&self) -> Zeroizing<Vec<u8>> {
        match &self.material {
            KeyMaterial::EcP256(sk) => Zeroizing::new(sk.to_bytes().to_vec()),
            KeyMaterial::Ed25519(sk) => Zeroizing::new(sk.to_bytes().to_vec()),
        }
    }
}

impl std::fmt::Debug for AsymmetricKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "AsymmetricKey({}, pub={}..., <private>)",
            self.algorithm(),
            hex_prefix(&self.public_key_bytes())
        )
    }
}
