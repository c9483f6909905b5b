//! # Platform Status Codes
//!
//! Raw status values reported by the isolation platform. The numbering
//! follows the SGX untrusted runtime so that codes in logs line up with
//! platform documentation. Unknown values are kept verbatim.

/// A status code reported by the enclave platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PlatformStatus(u32);

impl PlatformStatus {
    pub const SUCCESS: Self = Self(0x0000);
    pub const UNEXPECTED: Self = Self(0x0001);
    pub const INVALID_PARAMETER: Self = Self(0x0002);
    pub const OUT_OF_MEMORY: Self = Self(0x0003);
    /// The enclave was lost (power transition, crash) and must be reloaded.
    pub const ENCLAVE_LOST: Self = Self(0x0004);
    pub const INVALID_ENCLAVE: Self = Self(0x2001);
    pub const INVALID_ENCLAVE_ID: Self = Self(0x2002);
    /// The image signature or measurement did not verify.
    pub const INVALID_SIGNATURE: Self = Self(0x2003);
    pub const INVALID_METADATA: Self = Self(0x2009);
    /// The image file could not be opened or read.
    pub const ENCLAVE_FILE_ACCESS: Self = Self(0x200f);

    /// Wrap a raw code.
    pub const fn from_raw(code: u32) -> Self {
        Self(code)
    }

    /// The raw code.
    pub const fn raw(&self) -> u32 {
        self.0
    }

    pub fn is_success(&self) -> bool {
        *self == Self::SUCCESS
    }

    /// Symbolic name for known codes.
    pub fn name(&self) -> Option<&'static str> {
        let name = match *self {
            Self::SUCCESS => "success",
            Self::UNEXPECTED => "unexpected",
            Self::INVALID_PARAMETER => "invalid parameter",
            Self::OUT_OF_MEMORY => "out of memory",
            Self::ENCLAVE_LOST => "enclave lost",
            Self::INVALID_ENCLAVE => "invalid enclave",
            Self::INVALID_ENCLAVE_ID => "invalid enclave id",
            Self::INVALID_SIGNATURE => "invalid signature",
            Self::INVALID_METADATA => "invalid metadata",
            Self::ENCLAVE_FILE_ACCESS => "enclave file access",
            _ => return None,
        };
        Some(name)
    }
}

impl std::fmt::Display for PlatformStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.name() {
            Some(name) => write!(f, "0x{:04x} ({name})", self.0),
            None => write!(f, "0x{:04x}", self.0),
        }
    }
}
