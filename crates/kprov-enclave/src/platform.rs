//! # Enclave Platform Abstraction
//!
//! The seam between kprov and the isolation technology. A platform can
//! create an enclave from a signed image, run the one privileged call kprov
//! needs, and destroy the enclave. Nothing else is assumed.
//!
//! Implementations MUST:
//! - Report failures as raw [`PlatformStatus`] codes, never panic.
//! - Treat the envelope passed to [`EnclavePlatform::ecall_retrieve_key`]
//!   as opaque; it is parsed only inside the enclave.
//! - Return from the privileged call only after the enclave finished.

use std::path::Path;

use crate::status::PlatformStatus;

/// Platform identifier of a live enclave.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EnclaveId(u64);

impl EnclaveId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn raw(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for EnclaveId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{:016x}", self.0)
    }
}

/// Options applied when an enclave is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LaunchOptions {
    /// Launch in debug mode (enclave memory inspectable by a debugger).
    pub debug: bool,
}

impl Default for LaunchOptions {
    fn default() -> Self {
        Self { debug: true }
    }
}

/// An enclave platform backend.
pub trait EnclavePlatform {
    /// Load and initialize an enclave from `image`.
    fn create_enclave(
        &self,
        image: &Path,
        options: LaunchOptions,
    ) -> Result<EnclaveId, PlatformStatus>;

    /// Hand the provisioning envelope to the enclave and run key retrieval.
    ///
    /// `Ok` carries the enclave's own return value (zero on success);
    /// `Err` means the call itself did not complete.
    fn ecall_retrieve_key(&self, id: EnclaveId, envelope: &[u8]) -> Result<i32, PlatformStatus>;

    /// Tear down an enclave.
    fn destroy_enclave(&self, id: EnclaveId) -> Result<(), PlatformStatus>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enclave_id_displays_as_padded_hex() {
        assert_eq!(EnclaveId::new(2).to_string(), "0x0000000000000002");
        assert_eq!(EnclaveId::new(u64::MAX).to_string(), "0xffffffffffffffff");
    }

    #[test]
    fn debug_launch_is_default() {
        assert!(LaunchOptions::default().debug);
    }
}
