//! # kprov-enclave: Compartment Lifecycle and the Provisioning Call
//!
//! Everything between "credentials are encoded" and "the enclave reports a
//! status":
//!
//! - **Platform** ([`platform`], [`status`]) is the seam to the isolation
//!   technology: create, one privileged call, destroy. Failures are raw
//!   [`PlatformStatus`] codes.
//! - **Lifecycle** ([`lifecycle`]) owns the `Unloaded -> Loaded -> Active
//!   -> Destroyed` state machine. An [`Enclave`] handle exists only while
//!   the compartment is active and is torn down exactly once.
//! - **Invoker** ([`invoker`], [`envelope`]) checks preconditions, packs
//!   both buffers into one length-prefixed envelope and issues the call.
//! - **Trusted runtime** ([`trusted`]) is the compartment side: strict
//!   envelope parse, decode with the shared codec, hand off to a
//!   [`KeyRetriever`]. The retrieved key never leaves it.
//! - **Simulated platform** ([`simulated`]) hosts the trusted runtime
//!   in-process, with SHA-256 image measurement.
//!
//! ## Crate Policy
//!
//! - Only status codes cross back from the compartment.
//! - No retries. A failed call is reported, not repeated.

pub mod envelope;
pub mod error;
pub mod invoker;
pub mod lifecycle;
pub mod measurement;
pub mod platform;
pub mod simulated;
pub mod status;
pub mod trusted;

pub use envelope::ProvisioningEnvelope;
pub use error::{EnclaveError, EnvelopeError, RetrievalError, TrustedError};
pub use invoker::{provision, ProvisionStatus};
pub use lifecycle::{Enclave, EnclaveHost, EnclaveState};
pub use measurement::{measure_bytes, measure_image, Measurement};
pub use platform::{EnclaveId, EnclavePlatform, LaunchOptions};
pub use simulated::{CallCounts, SimulatedPlatform};
pub use status::PlatformStatus;
pub use trusted::{KeyRetriever, LoopbackRetriever, RetrievedKey, TrustedRuntime};
