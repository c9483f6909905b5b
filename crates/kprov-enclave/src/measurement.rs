//! # Image Measurement
//!
//! SHA-256 over the whole enclave image file. The simulated platform
//! compares this against a pinned value before it will create an enclave.

use std::path::Path;

use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use kprov_core::hex::bytes_to_hex;

/// SHA-256 measurement of an enclave image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Measurement([u8; 32]);

impl Measurement {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Constant-time comparison.
    pub fn matches(&self, expected: &[u8; 32]) -> bool {
        self.0[..].ct_eq(&expected[..]).into()
    }

    pub fn to_hex(&self) -> String {
        bytes_to_hex(&self.0)
    }
}

impl std::fmt::Display for Measurement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Measure an in-memory image.
pub fn measure_bytes(image: &[u8]) -> Measurement {
    Measurement(Sha256::digest(image).into())
}

/// Read and measure an image file.
pub fn measure_image(path: &Path) -> std::io::Result<Measurement> {
    let image = std::fs::read(path)?;
    Ok(measure_bytes(&image))
}
