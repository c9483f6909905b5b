//! # Boundary Buffers
//!
//! [`EncodedBuffer`] is the unit that crosses the enclave boundary: the
//! canonical binary form of a private key or certificate, its declared
//! length, and what kind of payload it is.
//!
//! ## Invariants
//!
//! - A buffer produced by [`EncodedBuffer::new`] always has
//!   `declared_len() == as_bytes().len()`.
//! - A buffer reassembled from untrusted parts ([`EncodedBuffer::from_parts`])
//!   may disagree; [`EncodedBuffer::checked_bytes`] is the only way to reach
//!   the bytes for decoding and it rejects the mismatch.
//! - Contents are zeroized on drop, whether or not the provisioning call
//!   succeeded.
//! - `Debug` prints kind, lengths and a SHA-256 fingerprint prefix. Never
//!   the bytes.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use crate::error::BufferError;
use crate::hex::{bytes_to_hex, hex_prefix};

/// What an [`EncodedBuffer`] carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PayloadKind {
    /// PKCS#8 DER private key.
    PrivateKey,
    /// X.509 DER certificate.
    Certificate,
}

impl PayloadKind {
    /// Canonical string name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PrivateKey => "private-key",
            Self::Certificate => "certificate",
        }
    }

    /// Field tag used in the provisioning envelope.
    pub fn tag(&self) -> u8 {
        match self {
            Self::PrivateKey => 0x01,
            Self::Certificate => 0x02,
        }
    }

    /// Inverse of [`PayloadKind::tag`].
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0x01 => Some(Self::PrivateKey),
            0x02 => Some(Self::Certificate),
            _ => None,
        }
    }
}

impl std::fmt::Display for PayloadKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical binary encoding of a key or certificate, with explicit length.
///
/// Exclusively owned by whoever produced it. The provisioning call only
/// borrows it for the duration of the call.
pub struct EncodedBuffer {
    kind: PayloadKind,
    bytes: Zeroizing<Vec<u8>>,
    declared_len: usize,
}

impl EncodedBuffer {
    /// Wrap freshly encoded bytes. The declared length is the byte count.
    pub fn new(kind: PayloadKind, bytes: Vec<u8>) -> Self {
        let declared_len = bytes.len();
        Self {
            kind,
            bytes: Zeroizing::new(bytes),
            declared_len,
        }
    }

    /// Reassemble a buffer from bytes and a separately transported length.
    ///
    /// No check is made here; the mismatch surfaces at decode time.
    pub fn from_parts(kind: PayloadKind, bytes: Vec<u8>, declared_len: usize) -> Self {
        Self {
            kind,
            bytes: Zeroizing::new(bytes),
            declared_len,
        }
    }

    /// Payload kind.
    pub fn kind(&self) -> PayloadKind {
        self.kind
    }

    /// Length the producer declared.
    pub fn declared_len(&self) -> usize {
        self.declared_len
    }

    /// Number of bytes actually held.
    pub fn actual_len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the buffer holds no bytes.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Raw bytes, unchecked. Use [`checked_bytes`](Self::checked_bytes)
    /// before interpreting them.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Validate kind, length agreement and non-emptiness, then return the bytes.
    pub fn checked_bytes(&self, expected: PayloadKind) -> Result<&[u8], BufferError> {
        if self.kind != expected {
            return Err(BufferError::KindMismatch {
                expected,
                found: self.kind,
            });
        }
        if self.declared_len != self.bytes.len() {
            return Err(BufferError::LengthMismatch {
                kind: self.kind,
                declared: self.declared_len,
                actual: self.bytes.len(),
            });
        }
        if self.bytes.is_empty() {
            return Err(BufferError::Empty(self.kind));
        }
        Ok(&self.bytes)
    }

    /// SHA-256 of the contents as lowercase hex. Safe to log.
    pub fn fingerprint(&self) -> String {
        bytes_to_hex(&Sha256::digest(self.bytes.as_slice()))
    }
}

impl std::fmt::Debug for EncodedBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let digest = Sha256::digest(self.bytes.as_slice());
        f.debug_struct("EncodedBuffer")
            .field("kind", &self.kind)
            .field("declared_len", &self.declared_len)
            .field("actual_len", &self.bytes.len())
            .field("sha256", &format_args!("{}...", hex_prefix(&digest)))
            .finish()
    }
}
