//! # kprov-crypto: Credentials and the Boundary Codec
//!
//! Turns on-disk credentials into the byte buffers that cross the enclave
//! boundary, and back:
//!
//! - **Credential Loader** ([`loader`]) reads a PEM private key (PKCS#8
//!   P-256/Ed25519 or SEC1 P-256) and a PEM X.509 certificate.
//! - **Key and certificate types** ([`key`], [`certificate`]) are opaque
//!   values. Private key material is zeroized on drop and never printed.
//! - **Boundary Codec** ([`codec`]) produces and consumes the canonical
//!   DER form carried in an [`EncodedBuffer`](kprov_core::EncodedBuffer).
//!   `decode_key(encode_key(k))` is the same key as `k`.
//!
//! The same codec runs on both sides of the boundary: the untrusted caller
//! encodes, the enclave decodes.
//!
//! ## Crate Policy
//!
//! - Depends only on `kprov-core` internally.
//! - No trust decisions: certificates are parsed, not chain-verified.
//! - Tests use real keys and real certificates minted at test time.

pub mod certificate;
pub mod codec;
pub mod error;
pub mod key;
pub mod loader;

pub use certificate::Certificate;
pub use codec::{decode_certificate, decode_key, encode_certificate, encode_key, BoundaryEncode};
pub use error::{CodecError, CredentialError};
pub use key::{AlgorithmId, AsymmetricKey};
pub use loader::{load_certificate, load_private_key, parse_certificate_pem, parse_private_key_pem};
