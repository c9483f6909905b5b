//! # Inspect Subcommand
//!
//! `kprov inspect` reports what the provisioning flow would hand across
//! the boundary without loading an enclave: the client key algorithm and
//! public key fingerprint, the certificate's names and validity, the
//! encoded DER sizes, and the result of the encode/decode self-check.
//! Private key bytes are never printed.

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::Args;
use sha2::{Digest, Sha256};

use kprov_core::hex::bytes_to_hex;
use kprov_core::ProvisionConfig;
use kprov_crypto::{
    decode_certificate, decode_key, encode_certificate, encode_key, load_certificate,
    load_private_key,
};

use crate::flow::{ExitStatus, ProvisionError};

/// Arguments for the `inspect` subcommand.
#[derive(Args, Debug, Default)]
pub struct InspectArgs {
    /// PEM private key to inspect (defaults to the configured key).
    #[arg(long)]
    pub key: Option<PathBuf>,

    /// PEM certificate to inspect (defaults to the configured certificate).
    #[arg(long)]
    pub cert: Option<PathBuf>,
}

/// Execute the `inspect` subcommand.
pub fn run_inspect(args: &InspectArgs, config: &ProvisionConfig) -> Result<u8> {
    let key_path = args.key.as_ref().unwrap_or(&config.private_key);
    let cert_path = args.cert.as_ref().unwrap_or(&config.certificate);

    match inspect(key_path, cert_path) {
        Ok(lines) => {
            for line in lines {
                println!("{line}");
            }
            Ok(ExitStatus::Success.code())
        }
        Err(e) => {
            eprintln!("error: {e}");
            Ok(e.exit_status().code())
        }
    }
}

/// Build the report lines for one key and certificate.
pub fn inspect(key_path: &Path, cert_path: &Path) -> Result<Vec<String>, ProvisionError> {
    let key = load_private_key(key_path)?;
    let key_buffer = encode_key(&key)?;
    if !decode_key(&key_buffer)?.same_key_as(&key) {
        return Err(ProvisionError::SelfCheck);
    }

    let cert = load_certificate(cert_path)?;
    let cert_buffer = encode_certificate(&cert)?;
    if decode_certificate(&cert_buffer)?.der() != cert.der() {
        return Err(ProvisionError::SelfCheck);
    }

    let public_fingerprint = bytes_to_hex(&Sha256::digest(key.public_key_bytes()));
    Ok(vec![
        format!("Private key: {}", key_path.display()),
        format!("  algorithm:          {}", key.algorithm()),
        format!("  encoded (PKCS#8):   {} bytes", key_buffer.declared_len()),
        format!("  public key sha256:  {public_fingerprint}"),
        format!("Certificate: {}", cert_path.display()),
        format!("  subject:            {}", cert.subject()),
        format!("  issuer:             {}", cert.issuer()),
        format!("  serial:             {}", cert.serial()),
        format!("  valid:              {} to {}", cert.not_before(), cert.not_after()),
        format!("  key algorithm:      {}", cert.public_key_algorithm()),
        format!("  encoded (DER):      {} bytes", cert_buffer.declared_len()),
        format!("  sha256:             {}", cert.fingerprint()),
        "Self-check: encode/decode round trip ok".to_string(),
    ])
}
