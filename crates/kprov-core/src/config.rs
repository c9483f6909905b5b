//! # Provisioning Configuration
//!
//! Paths and options for one provisioning run, loadable from YAML:
//!
//! ```yaml
//! private_key: data/client_priv.pem
//! certificate: data/server_cert.pem
//! enclave_image: enclave/retrieve_key_enclave.signed.so
//! debug_enclave: true
//! expected_measurement: null
//! log:
//!   app_name: kprov
//!   path: kprov.log
//!   threshold: debug
//!   output: file
//! ```
//!
//! Every field has a default, so an empty document is valid. Command-line
//! flags override individual fields after loading.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::diagnostic::LogConfig;
use crate::error::ConfigError;
use crate::hex::hex_to_bytes;

/// Default private key location, relative to the working directory.
pub const DEFAULT_PRIVATE_KEY: &str = "data/client_priv.pem";
/// Default peer certificate location.
pub const DEFAULT_CERTIFICATE: &str = "data/server_cert.pem";
/// Default signed enclave image location.
pub const DEFAULT_ENCLAVE_IMAGE: &str = "enclave/retrieve_key_enclave.signed.so";

/// Configuration for one provisioning run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProvisionConfig {
    /// PEM private key handed to the enclave (the enclave's client credential).
    pub private_key: PathBuf,
    /// PEM certificate of the remote key server.
    pub certificate: PathBuf,
    /// Signed enclave image to load.
    pub enclave_image: PathBuf,
    /// Launch the enclave in debug mode.
    pub debug_enclave: bool,
    /// Hex SHA-256 the enclave image must measure to, if pinned.
    pub expected_measurement: Option<String>,
    /// Diagnostic channel configuration.
    pub log: LogConfig,
}

impl Default for ProvisionConfig {
    fn default() -> Self {
        Self {
            private_key: PathBuf::from(DEFAULT_PRIVATE_KEY),
            certificate: PathBuf::from(DEFAULT_CERTIFICATE),
            enclave_image: PathBuf::from(DEFAULT_ENCLAVE_IMAGE),
            debug_enclave: true,
            expected_measurement: None,
            log: LogConfig::default(),
        }
    }
}

impl ProvisionConfig {
    /// Load and validate a configuration file.
    pub fn from_yaml_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_yaml::from_str(&text).map_err(|source| ConfigError::Yaml {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that cannot work.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, path) in [
            ("private_key", &self.private_key),
            ("certificate", &self.certificate),
            ("enclave_image", &self.enclave_image),
        ] {
            if path.as_os_str().is_empty() {
                return Err(ConfigError::Invalid {
                    field,
                    reason: "path is empty".to_string(),
                });
            }
        }
        if self.log.app_name.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "log.app_name",
                reason: "must not be empty".to_string(),
            });
        }
        if let Some(hex) = &self.expected_measurement {
            parse_measurement(hex)?;
        }
        Ok(())
    }

    /// The pinned measurement as 32 raw bytes, if one is configured.
    pub fn expected_measurement_bytes(&self) -> Result<Option<[u8; 32]>, ConfigError> {
        self.expected_measurement
            .as_deref()
            .map(parse_measurement)
            .transpose()
    }
}

fn parse_measurement(hex: &str) -> Result<[u8; 32], ConfigError> {
    let bytes = hex_to_bytes(hex).map_err(|reason| ConfigError::Invalid {
        field: "expected_measurement",
        reason,
    })?;
    bytes.try_into().map_err(|b: Vec<u8>| ConfigError::Invalid {
        field: "expected_measurement",
        reason: format!("expected 32 bytes (64 hex chars), got {} bytes", b.len()),
    })
}
