//! # Core Error Types
//!
//! Errors raised by the foundational types. Boundary buffer errors carry
//! the declared and actual lengths so a corrupted buffer can be diagnosed
//! from the log alone; they never carry buffer contents.

use std::path::PathBuf;

use thiserror::Error;

use crate::buffer::PayloadKind;

/// An [`EncodedBuffer`](crate::EncodedBuffer) failed its integrity checks.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BufferError {
    /// The buffer holds a different payload than the caller expected.
    #[error("expected {expected} payload, found {found}")]
    KindMismatch {
        /// Payload kind the caller asked for.
        expected: PayloadKind,
        /// Payload kind carried by the buffer.
        found: PayloadKind,
    },

    /// Declared length and actual byte count disagree.
    #[error("{kind} buffer length mismatch: declared {declared} bytes, holds {actual}")]
    LengthMismatch {
        /// Payload kind of the buffer.
        kind: PayloadKind,
        /// Length the producer declared.
        declared: usize,
        /// Number of bytes actually present.
        actual: usize,
    },

    /// The buffer is empty.
    #[error("{0} buffer is empty")]
    Empty(PayloadKind),
}

/// Errors loading or validating a [`ProvisionConfig`](crate::ProvisionConfig).
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read config {path}: {source}")]
    Io {
        /// Path that was being read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid YAML for the expected shape.
    #[error("failed to parse config {path}: {source}")]
    Yaml {
        /// Path that was being parsed.
        path: PathBuf,
        /// Underlying YAML error.
        #[source]
        source: serde_yaml::Error,
    },

    /// A field holds a value that cannot be used.
    #[error("invalid config field `{field}`: {reason}")]
    Invalid {
        /// Field name as written in YAML.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },

    /// Unknown severity name.
    #[error("unknown severity `{0}` (expected emergency, alert, critical, error, warning, notice, info or debug)")]
    UnknownSeverity(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn length_mismatch_display_has_both_lengths() {
        let err = BufferError::LengthMismatch {
            kind: PayloadKind::Certificate,
            declared: 512,
            actual: 480,
        };
        let msg = err.to_string();
        assert!(msg.contains("certificate"));
        assert!(msg.contains("512"));
        assert!(msg.contains("480"));
    }

    #[test]
    fn kind_mismatch_display() {
        let err = BufferError::KindMismatch {
            expected: PayloadKind::PrivateKey,
            found: PayloadKind::Certificate,
        };
        assert_eq!(err.to_string(), "expected private-key payload, found certificate");
    }

    #[test]
    fn invalid_field_display() {
        let err = ConfigError::Invalid {
            field: "enclave_image",
            reason: "path is empty".to_string(),
        };
        assert!(err.to_string().contains("enclave_image"));
    }

    #[test]
    fn io_error_keeps_path() {
        let err = ConfigError::Io {
            path: PathBuf::from("/etc/kprov.yaml"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
        };
        assert!(err.to_string().contains("/etc/kprov.yaml"));
    }
}
