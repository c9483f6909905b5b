//! # Measure Subcommand
//!
//! `kprov measure` prints the SHA-256 measurement of an enclave image in
//! the form `expected_measurement` takes, followed by the path.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use kprov_core::hex::hex_to_bytes;
use kprov_core::ProvisionConfig;
use kprov_enclave::measure_image;

use crate::flow::ExitStatus;

/// Arguments for the `measure` subcommand.
#[derive(Args, Debug, Default)]
pub struct MeasureArgs {
    /// Enclave image (defaults to the configured image).
    pub image: Option<PathBuf>,

    /// Compare against this hex measurement and fail on mismatch.
    #[arg(long, value_name = "HEX")]
    pub check: Option<String>,
}

/// Execute the `measure` subcommand.
pub fn run_measure(args: &MeasureArgs, config: &ProvisionConfig) -> Result<u8> {
    let image = args.image.as_ref().unwrap_or(&config.enclave_image);
    let measurement = match measure_image(image) {
        Ok(m) => m,
        Err(e) => {
            eprintln!("error: cannot read enclave image {}: {e}", image.display());
            return Ok(ExitStatus::EnclaveLoad.code());
        }
    };
    println!("{measurement}  {}", image.display());

    if let Some(expected) = &args.check {
        let pinned = match hex_to_bytes(expected).map(<[u8; 32]>::try_from) {
            Ok(Ok(bytes)) => bytes,
            _ => {
                eprintln!("error: --check expects 64 hex characters");
                return Ok(ExitStatus::Usage.code());
            }
        };
        if !measurement.matches(&pinned) {
            eprintln!("error: measurement does not match {expected}");
            return Ok(ExitStatus::EnclaveLoad.code());
        }
        println!("OK");
    }
    Ok(ExitStatus::Success.code())
}
