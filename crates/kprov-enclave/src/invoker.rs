//! # Provisioning Invoker
//!
//! Issues the single privileged call that hands the encoded client key and
//! server certificate to an active enclave.
//!
//! Preconditions are checked before anything crosses the boundary. A
//! violated precondition is reported exactly like a platform refusal of
//! the call (`INVALID_PARAMETER`) and no call is made.
//!
//! The buffers are borrowed for the duration of the call. The envelope
//! built from them is zeroized before this function returns.

use kprov_core::{diag, EncodedBuffer, PayloadKind, Severity};

use crate::envelope::ProvisioningEnvelope;
use crate::lifecycle::Enclave;
use crate::platform::EnclavePlatform;
use crate::status::PlatformStatus;

/// Outcome of one provisioning call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionStatus {
    /// The enclave retrieved and kept the key.
    Success,
    /// The call completed but the enclave reported a non-zero code.
    EnclaveFailure {
        /// Enclave return value. Opaque outside the enclave.
        code: i32,
    },
    /// The call did not complete, or was never issued.
    BoundaryCallFailed {
        /// Platform status, verbatim.
        status: PlatformStatus,
    },
}

impl ProvisionStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

impl std::fmt::Display for ProvisionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::EnclaveFailure { code } => write!(f, "enclave returned {code}"),
            Self::BoundaryCallFailed { status } => write!(f, "boundary call failed: {status}"),
        }
    }
}

/// Hand `key` and `cert` to `enclave` and run key retrieval.
pub fn provision<P: EnclavePlatform>(
    enclave: &Enclave<'_, P>,
    key: &EncodedBuffer,
    cert: &EncodedBuffer,
) -> ProvisionStatus {
    let channel = enclave.channel();
    let refused = ProvisionStatus::BoundaryCallFailed {
        status: PlatformStatus::INVALID_PARAMETER,
    };

    if !enclave.is_active() {
        diag!(
            channel,
            Severity::Error,
            "enclave {} is {}, refusing to provision",
            enclave.id(),
            enclave.state()
        );
        return refused;
    }
    let key_bytes = match key.checked_bytes(PayloadKind::PrivateKey) {
        Ok(bytes) => bytes,
        Err(e) => {
            diag!(channel, Severity::Error, "private key buffer rejected: {e}");
            return refused;
        }
    };
    let cert_bytes = match cert.checked_bytes(PayloadKind::Certificate) {
        Ok(bytes) => bytes,
        Err(e) => {
            diag!(channel, Severity::Error, "certificate buffer rejected: {e}");
            return refused;
        }
    };
    let envelope = match (ProvisioningEnvelope {
        private_key: key_bytes,
        certificate: cert_bytes,
    })
    .to_bytes()
    {
        Ok(envelope) => envelope,
        Err(e) => {
            diag!(channel, Severity::Error, "cannot build envelope: {e}");
            return refused;
        }
    };

    diag!(
        channel,
        Severity::Debug,
        "calling retrieve-key on enclave {} ({} byte key, {} byte certificate)",
        enclave.id(),
        key_bytes.len(),
        cert_bytes.len()
    );
    let status = match enclave.ecall_retrieve_key(&envelope) {
        Ok(0) => ProvisionStatus::Success,
        Ok(code) => ProvisionStatus::EnclaveFailure { code },
        Err(status) => ProvisionStatus::BoundaryCallFailed { status },
    };
    let severity = if status.is_success() {
        Severity::Info
    } else {
        Severity::Error
    };
    diag!(channel, severity, "retrieve-key on enclave {}: {status}", enclave.id());
    status
}
