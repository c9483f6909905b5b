//! # Credential Loader
//!
//! Reads PEM credentials from storage. Each file may contain several PEM
//! blocks; the first block of an acceptable type wins.
//!
//! | Label                   | Accepted as                 |
//! |-------------------------|-----------------------------|
//! | `PRIVATE KEY`           | PKCS#8 (P-256 or Ed25519)   |
//! | `EC PRIVATE KEY`        | SEC1 (P-256)                |
//! | `ENCRYPTED PRIVATE KEY` | rejected, no passphrase API |
//! | `CERTIFICATE`           | X.509                       |
//!
//! The file text and every decoded block are held in zeroizing buffers
//! until parsing is done.

use std::io::ErrorKind;
use std::path::Path;

use zeroize::Zeroizing;

use crate::certificate::Certificate;
use crate::error::CredentialError;
use crate::key::AsymmetricKey;

const MEMORY_ORIGIN: &str = "<memory>";

/// Load a PEM private key from `path`.
pub fn load_private_key(path: &Path) -> Result<AsymmetricKey, CredentialError> {
    let text = read_pem(path)?;
    private_key_from_pem(&text, &path.display().to_string())
}

/// Load a PEM certificate from `path`.
pub fn load_certificate(path: &Path) -> Result<Certificate, CredentialError> {
    let text = read_pem(path)?;
    certificate_from_pem(&text, &path.display().to_string())
}

/// Parse a PEM private key held in memory.
pub fn parse_private_key_pem(text: &str) -> Result<AsymmetricKey, CredentialError> {
    private_key_from_pem(text, MEMORY_ORIGIN)
}

/// Parse a PEM certificate held in memory.
pub fn parse_certificate_pem(text: &str) -> Result<Certificate, CredentialError> {
    certificate_from_pem(text, MEMORY_ORIGIN)
}

fn read_pem(path: &Path) -> Result<Zeroizing<String>, CredentialError> {
    match std::fs::read_to_string(path) {
        Ok(text) => Ok(Zeroizing::new(text)),
        Err(e) if e.kind() == ErrorKind::NotFound => Err(CredentialError::NotFound {
            path: path.to_path_buf(),
        }),
        Err(source) => Err(CredentialError::Unreadable {
            path: path.to_path_buf(),
            source,
        }),
    }
}

fn private_key_from_pem(text: &str, origin: &str) -> Result<AsymmetricKey, CredentialError> {
    let parse_error = |reason: String| CredentialError::Parse {
        expected: "private key",
        origin: origin.to_string(),
        reason,
    };

    let blocks = pem::parse_many(text).map_err(|e| parse_error(e.to_string()))?;
    for block in blocks {
        let label = block.tag().to_string();
        let der = Zeroizing::new(block.into_contents());
        match label.as_str() {
            "PRIVATE KEY" => return AsymmetricKey::from_pkcs8_der(&der).map_err(parse_error),
            "EC PRIVATE KEY" => return AsymmetricKey::from_sec1_der(&der).map_err(parse_error),
            "ENCRYPTED PRIVATE KEY" => {
                return Err(parse_error("encrypted private keys are not supported".to_string()))
            }
            _ => continue,
        }
    }
    Err(parse_error("no PRIVATE KEY block found".to_string()))
}

fn certificate_from_pem(text: &str, origin: &str) -> Result<Certificate, CredentialError> {
    let parse_error = |reason: String| CredentialError::Parse {
        expected: "certificate",
        origin: origin.to_string(),
        reason,
    };

    let blocks = pem::parse_many(text).map_err(|e| parse_error(e.to_string()))?;
    let block = blocks
        .into_iter()
        .find(|b| b.tag() == "CERTIFICATE")
        .ok_or_else(|| parse_error("no CERTIFICATE block found".to_string()))?;
    Certificate::from_der(block.contents()).map_err(parse_error)
}
