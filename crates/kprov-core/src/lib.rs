//! # kprov-core: Foundational Types for kprov
//!
//! This crate is the leaf of the kprov workspace. It defines the types
//! shared by both sides of the enclave trust boundary:
//!
//! - **`EncodedBuffer`**: a byte sequence plus an explicit declared length
//!   and payload kind. The only shape in which key and certificate material
//!   is handed to the provisioning call.
//! - **`DiagnosticChannel`**: a severity-filtered logging relay usable from
//!   untrusted and trusted code alike, configured by an explicit
//!   [`LogConfig`] rather than process-global state.
//! - **`ProvisionConfig`**: YAML-loadable paths and options for one
//!   provisioning run.
//! - **`AttemptId`**: correlates the log lines of a single run.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `kprov-*` crates.
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.
//! - Nothing in this crate formats secret bytes; buffers print only their
//!   kind, length and fingerprint.

pub mod buffer;
pub mod config;
pub mod diagnostic;
pub mod error;
pub mod hex;
pub mod identity;

// Re-export primary types for ergonomic imports.
pub use buffer::{EncodedBuffer, PayloadKind};
pub use config::ProvisionConfig;
pub use diagnostic::{DiagnosticChannel, LogConfig, LogOutput, Severity};
pub use error::{BufferError, ConfigError};
pub use identity::AttemptId;
