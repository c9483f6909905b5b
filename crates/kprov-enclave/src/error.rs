//! # Enclave Error Types
//!
//! Untrusted-side lifecycle errors ([`EnclaveError`]), envelope parse
//! errors ([`EnvelopeError`]) and the trusted runtime's own failures
//! ([`RetrievalError`], [`TrustedError`]). Only [`TrustedError::code`]
//! ever crosses the boundary.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use kprov_core::PayloadKind;
use kprov_crypto::CodecError;
use thiserror::Error;

use crate::lifecycle::EnclaveState;
use crate::platform::EnclaveId;
use crate::status::PlatformStatus;

/// Errors in the enclave lifecycle.
#[derive(Error, Debug)]
pub enum EnclaveError {
    /// The platform refused to create the enclave.
    #[error("failed to load enclave {}: platform status {status}", image.display())]
    Load {
        /// Image that was requested.
        image: PathBuf,
        /// Platform status, verbatim.
        status: PlatformStatus,
    },

    /// A handle from this host is still outstanding.
    #[error("enclave {id} is still active; destroy it before loading another")]
    AlreadyActive {
        /// The outstanding enclave.
        id: EnclaveId,
    },

    /// The lifecycle state machine rejected a transition.
    #[error("invalid enclave transition from {from} to {to}")]
    InvalidTransition {
        /// Current state.
        from: EnclaveState,
        /// Attempted target state.
        to: EnclaveState,
    },

    /// The platform failed to destroy the enclave.
    #[error("failed to destroy enclave {id}: platform status {status}")]
    Destroy {
        /// Enclave being destroyed.
        id: EnclaveId,
        /// Platform status, verbatim.
        status: PlatformStatus,
    },
}

/// Malformed provisioning envelope.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EnvelopeError {
    #[error("envelope truncated: needed {needed} bytes, {available} available")]
    Truncated { needed: usize, available: usize },

    #[error("bad envelope magic")]
    BadMagic,

    #[error("unknown envelope field tag 0x{0:02x}")]
    UnknownTag(u8),

    #[error("duplicate envelope field: {0}")]
    DuplicateField(PayloadKind),

    #[error("missing envelope field: {0}")]
    MissingField(PayloadKind),

    #[error("{0} trailing bytes after envelope")]
    TrailingBytes(usize),

    #[error("envelope field {kind} too large: {len} bytes")]
    FieldTooLarge { kind: PayloadKind, len: usize },
}

/// Failure of the remote retrieval, as seen inside the enclave.
#[derive(Error, Debug)]
pub enum RetrievalError {
    /// The server certificate is not valid at the time of the attempt.
    #[error("server certificate not valid at {at} (valid {not_before} to {not_after})")]
    CertificateNotValid {
        at: DateTime<Utc>,
        not_before: DateTime<Utc>,
        not_after: DateTime<Utc>,
    },

    /// A credential uses an algorithm the retrieval exchange cannot use.
    #[error("unsupported {what} algorithm: {algorithm}")]
    UnsupportedAlgorithm { what: &'static str, algorithm: String },

    /// The key server refused or could not be reached.
    #[error("key server error: {0}")]
    Server(String),
}

/// Anything that makes the trusted runtime return non-zero.
#[derive(Error, Debug)]
pub enum TrustedError {
    #[error("rejected envelope: {0}")]
    Envelope(#[from] EnvelopeError),

    #[error("rejected credential: {0}")]
    Codec(#[from] CodecError),

    #[error("retrieval failed: {0}")]
    Retrieval(#[from] RetrievalError),
}

impl TrustedError {
    /// Return value reported by the enclave for inputs it refused.
    pub const INPUT_REJECTED: i32 = 1;
    /// Return value reported by the enclave when retrieval failed.
    pub const RETRIEVAL_FAILED: i32 = 2;

    /// The coarse code that crosses the boundary.
    pub fn code(&self) -> i32 {
        match self {
            Self::Envelope(_) | Self::Codec(_) => Self::INPUT_REJECTED,
            Self::Retrieval(_) => Self::RETRIEVAL_FAILED,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_error_carries_status_verbatim() {
        let err = EnclaveError::Load {
            image: PathBuf::from("enclave/missing.signed.so"),
            status: PlatformStatus::ENCLAVE_FILE_ACCESS,
        };
        let msg = err.to_string();
        assert!(msg.contains("enclave/missing.signed.so"));
        assert!(msg.contains("0x200f"));
    }

    #[test]
    fn already_active_names_the_id() {
        let err = EnclaveError::AlreadyActive {
            id: EnclaveId::new(7),
        };
        assert!(err.to_string().contains("0x0000000000000007"));
    }

    #[test]
    fn trusted_codes_are_coarse() {
        assert_eq!(TrustedError::from(EnvelopeError::BadMagic).code(), 1);
        let codec = CodecError::Decode {
            kind: PayloadKind::PrivateKey,
            reason: "truncated".into(),
        };
        assert_eq!(TrustedError::from(codec).code(), 1);
        let retrieval = RetrievalError::Server("refused".into());
        assert_eq!(TrustedError::from(retrieval).code(), 2);
    }

    #[test]
    fn envelope_tag_is_hex() {
        assert_eq!(
            EnvelopeError::UnknownTag(0x7f).to_string(),
            "unknown envelope field tag 0x7f"
        );
    }
}
