//! # kprov-cli: The kprov Command-Line Tool
//!
//! Subcommands:
//!
//! - `kprov provision` runs the full provisioning flow ([`flow`]) against
//!   the configured enclave image.
//! - `kprov inspect` loads the key and certificate and reports what would
//!   cross the boundary, including the encode/decode self-check.
//! - `kprov measure` prints the SHA-256 measurement of an enclave image.
//!
//! Handlers return the process exit code. Each flow stage has its own code
//! ([`flow::ExitStatus`]) so scripts can tell a missing key from a failed
//! enclave load.

pub mod flow;
pub mod inspect;
pub mod logging;
pub mod measure;
pub mod provision;

use std::path::Path;

use anyhow::{Context, Result};
use kprov_core::ProvisionConfig;

/// Load the configuration file if one was given, else the defaults.
pub fn load_config(path: Option<&Path>) -> Result<ProvisionConfig> {
    match path {
        Some(path) => ProvisionConfig::from_yaml_file(path)
            .with_context(|| format!("failed to load configuration from {}", path.display())),
        None => Ok(ProvisionConfig::default()),
    }
}
