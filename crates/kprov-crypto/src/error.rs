//! # Credential and Codec Error Types
//!
//! Structured errors for loading credentials and for the boundary codec.
//! Reasons are descriptive strings from the parsing libraries; none of
//! them echo input bytes.

use std::path::PathBuf;

use kprov_core::{BufferError, PayloadKind};
use thiserror::Error;

/// Failure to load a private key or certificate from storage.
#[derive(Error, Debug)]
pub enum CredentialError {
    /// The path could not be opened because it does not exist.
    #[error("credential file not found: {}", path.display())]
    NotFound {
        /// Path that was requested.
        path: PathBuf,
    },

    /// The file exists but could not be read.
    #[error("credential file unreadable: {}: {source}", path.display())]
    Unreadable {
        /// Path that was requested.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The content is not a recognizable encoding of the expected type.
    #[error("failed to parse {expected} from {origin}: {reason}")]
    Parse {
        /// What was expected ("private key", "certificate").
        expected: &'static str,
        /// Path or `<memory>`.
        origin: String,
        /// What went wrong.
        reason: String,
    },
}

impl CredentialError {
    /// Whether this is a storage-level failure (missing or unreadable file)
    /// rather than a content failure.
    pub fn is_storage(&self) -> bool {
        matches!(self, Self::NotFound { .. } | Self::Unreadable { .. })
    }
}

/// Failure in the boundary codec.
#[derive(Error, Debug)]
pub enum CodecError {
    /// A key or certificate could not be serialized.
    #[error("failed to encode {kind}: {reason}")]
    Encode {
        /// Payload being produced.
        kind: PayloadKind,
        /// What went wrong.
        reason: String,
    },

    /// A buffer could not be turned back into a key or certificate.
    ///
    /// Nothing decoded from the buffer is returned alongside this error.
    #[error("failed to decode {kind}: {reason}")]
    Decode {
        /// Payload being consumed.
        kind: PayloadKind,
        /// What went wrong.
        reason: String,
    },
}

impl CodecError {
    pub(crate) fn decode(kind: PayloadKind, reason: impl std::fmt::Display) -> Self {
        Self::Decode {
            kind,
            reason: reason.to_string(),
        }
    }

    pub(crate) fn encode(kind: PayloadKind, reason: impl std::fmt::Display) -> Self {
        Self::Encode {
            kind,
            reason: reason.to_string(),
        }
    }
}

impl From<BufferError> for CodecError {
    fn from(err: BufferError) -> Self {
        let kind = match &err {
            BufferError::KindMismatch { expected, .. } => *expected,
            BufferError::LengthMismatch { kind, .. } => *kind,
            BufferError::Empty(kind) => *kind,
        };
        Self::decode(kind, err)
    }
}
