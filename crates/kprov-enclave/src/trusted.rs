//! # Trusted Runtime
//!
//! The enclave side of the retrieve-key call. Given the raw envelope it:
//!
//! 1. parses the envelope strictly,
//! 2. rebuilds both buffers and decodes them with the same codec the
//!    untrusted side used,
//! 3. hands the client key and server certificate to a [`KeyRetriever`].
//!
//! The remote exchange itself (attestation, transport, chain validation)
//! lives behind [`KeyRetriever`]. Logging goes through
//! [`relay!`](kprov_core::relay) with integer severities and the source
//! location, as a real enclave would log through an ocall.
//!
//! ## Security Invariant
//!
//! The [`RetrievedKey`] stays with the caller of
//! [`TrustedRuntime::retrieve_key`], which is always inside the platform.
//! Only [`TrustedError::code`] crosses back.

use chrono::Utc;
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use kprov_core::hex::{bytes_to_hex, hex_prefix};
use kprov_core::{relay, DiagnosticChannel, EncodedBuffer, PayloadKind, Severity};
use kprov_crypto::{decode_certificate, decode_key, AsymmetricKey, Certificate};

use crate::envelope::ProvisioningEnvelope;
use crate::error::{RetrievalError, TrustedError};

/// Key material delivered by the key server.
pub struct RetrievedKey {
    key_id: String,
    material: Zeroizing<Vec<u8>>,
}

impl RetrievedKey {
    pub fn new(key_id: impl Into<String>, material: Vec<u8>) -> Self {
        Self {
            key_id: key_id.into(),
            material: Zeroizing::new(material),
        }
    }

    /// Server-assigned identifier. Safe to log.
    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    pub fn len(&self) -> usize {
        self.material.len()
    }

    pub fn is_empty(&self) -> bool {
        self.material.is_empty()
    }

    /// Key bytes. Only for use inside the enclave.
    pub fn expose(&self) -> &[u8] {
        &self.material
    }

    /// Lowercase hex SHA-256 of the key. Safe to log.
    pub fn fingerprint(&self) -> String {
        bytes_to_hex(&Sha256::digest(self.material.as_slice()))
    }
}

impl std::fmt::Debug for RetrievedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RetrievedKey({}, {} bytes, <secret>)", self.key_id, self.material.len())
    }
}

/// The remote retrieval exchange, as seen from inside the enclave.
pub trait KeyRetriever {
    /// Authenticate with `client_key`, verify the server as `server_cert`,
    /// and fetch the key.
    fn retrieve(
        &self,
        client_key: &AsymmetricKey,
        server_cert: &Certificate,
    ) -> Result<RetrievedKey, RetrievalError>;
}

impl<R: KeyRetriever + ?Sized> KeyRetriever for Box<R> {
    fn retrieve(
        &self,
        client_key: &AsymmetricKey,
        server_cert: &Certificate,
    ) -> Result<RetrievedKey, RetrievalError> {
        (**self).retrieve(client_key, server_cert)
    }
}

/// In-process retriever for development and tests.
///
/// Applies the checks a real exchange would fail on first (certificate
/// validity window, supported algorithms), then derives a deterministic
/// 32-byte key from the server certificate and the client public key.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoopbackRetriever;

impl LoopbackRetriever {
    const CONTEXT: &'static [u8] = b"kprov-loopback-v1";
}

impl KeyRetriever for LoopbackRetriever {
    fn retrieve(
        &self,
        client_key: &AsymmetricKey,
        server_cert: &Certificate,
    ) -> Result<RetrievedKey, RetrievalError> {
        let now = Utc::now();
        if !server_cert.is_valid_at(now) {
            return Err(RetrievalError::CertificateNotValid {
                at: now,
                not_before: server_cert.not_before(),
                not_after: server_cert.not_after(),
            });
        }
        let cert_alg = server_cert.public_key_algorithm();
        if !cert_alg.is_supported() {
            return Err(RetrievalError::UnsupportedAlgorithm {
                what: "server certificate",
                algorithm: cert_alg.to_string(),
            });
        }

        let mut hasher = Sha256::new();
        hasher.update(Self::CONTEXT);
        hasher.update(server_cert.der());
        hasher.update(client_key.public_key_bytes());
        let material = hasher.finalize().to_vec();
        let key_id = format!("loopback-{}", hex_prefix(&material));
        Ok(RetrievedKey::new(key_id, material))
    }
}

/// The enclave-side handler for the retrieve-key call.
pub struct TrustedRuntime<R: KeyRetriever> {
    retriever: R,
    channel: DiagnosticChannel,
}

impl<R: KeyRetriever> TrustedRuntime<R> {
    pub fn new(retriever: R, channel: DiagnosticChannel) -> Self {
        Self { retriever, channel }
    }

    pub fn retriever(&self) -> &R {
        &self.retriever
    }

    /// Handle one envelope. On failure the error is logged here and the
    /// caller only needs [`TrustedError::code`].
    pub fn retrieve_key(&self, envelope: &[u8]) -> Result<RetrievedKey, TrustedError> {
        let result = self.run(envelope);
        match &result {
            Ok(key) => relay!(
                self.channel,
                Severity::Info.as_syslog(),
                "retrieved key {} ({} bytes)",
                key.key_id(),
                key.len()
            ),
            Err(e) => relay!(self.channel, Severity::Error.as_syslog(), "{e}"),
        };
        result
    }

    fn run(&self, envelope: &[u8]) -> Result<RetrievedKey, TrustedError> {
        let fields = ProvisioningEnvelope::parse(envelope)?;

        // The envelope is length-exact, so declared and actual lengths agree.
        let key_buffer = EncodedBuffer::new(PayloadKind::PrivateKey, fields.private_key.to_vec());
        let cert_buffer = EncodedBuffer::new(PayloadKind::Certificate, fields.certificate.to_vec());
        let client_key = decode_key(&key_buffer)?;
        let server_cert = decode_certificate(&cert_buffer)?;
        relay!(
            self.channel,
            Severity::Debug.as_syslog(),
            "unmarshalled {} client key and server certificate {} (sha256 {})",
            client_key.algorithm(),
            server_cert.subject(),
            hex_prefix(&Sha256::digest(server_cert.der()))
        );

        Ok(self.retriever.retrieve(&client_key, &server_cert)?)
    }
}
