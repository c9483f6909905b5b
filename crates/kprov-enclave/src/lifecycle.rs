//! # Enclave Lifecycle
//!
//! ```text
//! Unloaded ──load──▶ Loaded ──init──▶ Active ──destroy──▶ Destroyed
//! ```
//!
//! [`EnclaveHost::load`] runs the first two transitions inside one call, so
//! callers only ever hold an `Active` [`Enclave`]. The handle borrows its
//! host, and [`Enclave::destroy`] consumes it: a privileged call after
//! teardown does not compile.
//!
//! ## Security Invariant
//!
//! Every loaded enclave is destroyed exactly once. Explicit
//! [`Enclave::destroy`] reports platform errors; a handle dropped on an
//! error path (`?`, panic) is torn down by `Drop`, which logs instead.
//!
//! A host hands out at most one live handle at a time. An enclave whose
//! destroy failed still counts as live, so the host will not load another.

use std::cell::Cell;
use std::path::Path;

use kprov_core::{diag, DiagnosticChannel, Severity};

use crate::error::EnclaveError;
use crate::platform::{EnclaveId, EnclavePlatform, LaunchOptions};
use crate::status::PlatformStatus;

// ── Lifecycle State ─────────────────────────────────────────────────

/// Where an enclave is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnclaveState {
    /// No platform resources allocated.
    Unloaded,
    /// Image accepted by the platform.
    Loaded,
    /// Initialized; privileged calls are allowed.
    Active,
    /// Torn down. Terminal.
    Destroyed,
}

impl EnclaveState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unloaded => "UNLOADED",
            Self::Loaded => "LOADED",
            Self::Active => "ACTIVE",
            Self::Destroyed => "DESTROYED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Destroyed)
    }

    /// Whether `next` directly follows this state.
    ///
    /// No wildcard, so a new state must be placed explicitly.
    pub fn can_transition_to(&self, next: EnclaveState) -> bool {
        match self {
            Self::Unloaded => next == Self::Loaded,
            Self::Loaded => matches!(next, Self::Active | Self::Destroyed),
            Self::Active => next == Self::Destroyed,
            Self::Destroyed => false,
        }
    }

    /// Validated transition.
    pub fn transition(self, next: EnclaveState) -> Result<EnclaveState, EnclaveError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(EnclaveError::InvalidTransition {
                from: self,
                to: next,
            })
        }
    }
}

impl std::fmt::Display for EnclaveState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Host ────────────────────────────────────────────────────────────

/// Owns a platform and hands out enclave handles.
pub struct EnclaveHost<P: EnclavePlatform> {
    platform: P,
    options: LaunchOptions,
    channel: DiagnosticChannel,
    active: Cell<Option<EnclaveId>>,
}

impl<P: EnclavePlatform> EnclaveHost<P> {
    pub fn new(platform: P, options: LaunchOptions, channel: DiagnosticChannel) -> Self {
        Self {
            platform,
            options,
            channel,
            active: Cell::new(None),
        }
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    pub fn options(&self) -> LaunchOptions {
        self.options
    }

    pub fn channel(&self) -> &DiagnosticChannel {
        &self.channel
    }

    /// The enclave currently handed out, if any.
    pub fn active_id(&self) -> Option<EnclaveId> {
        self.active.get()
    }

    /// Load and initialize an enclave from `image`.
    pub fn load(&self, image: &Path) -> Result<Enclave<'_, P>, EnclaveError> {
        if let Some(id) = self.active.get() {
            return Err(EnclaveError::AlreadyActive { id });
        }

        // Checked before the platform call so a created enclave always ends
        // up behind a handle.
        let state = launch_state()?;
        diag!(
            self.channel,
            Severity::Debug,
            "loading enclave image {} (debug launch: {})",
            image.display(),
            self.options.debug
        );
        let id = self
            .platform
            .create_enclave(image, self.options)
            .map_err(|status| {
                diag!(
                    self.channel,
                    Severity::Error,
                    "enclave creation failed: {} (image {})",
                    status,
                    image.display()
                );
                EnclaveError::Load {
                    image: image.to_path_buf(),
                    status,
                }
            })?;

        self.active.set(Some(id));
        diag!(self.channel, Severity::Info, "enclave initialized: EID = {id}");
        Ok(Enclave {
            host: self,
            id,
            state,
        })
    }
}

/// The state a successful load ends in, reached through every
/// intermediate transition.
fn launch_state() -> Result<EnclaveState, EnclaveError> {
    EnclaveState::Unloaded
        .transition(EnclaveState::Loaded)?
        .transition(EnclaveState::Active)
}

// ── Handle ──────────────────────────────────────────────────────────

/// A live enclave. Destroyed exactly once, explicitly or on drop.
pub struct Enclave<'h, P: EnclavePlatform> {
    host: &'h EnclaveHost<P>,
    id: EnclaveId,
    state: EnclaveState,
}

impl<'h, P: EnclavePlatform> Enclave<'h, P> {
    pub fn id(&self) -> EnclaveId {
        self.id
    }

    pub fn state(&self) -> EnclaveState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == EnclaveState::Active
    }

    /// Channel of the owning host.
    pub fn channel(&self) -> &'h DiagnosticChannel {
        &self.host.channel
    }

    /// Issue the retrieve-key privileged call.
    ///
    /// Refused with [`PlatformStatus::INVALID_ENCLAVE_ID`] unless `Active`.
    pub fn ecall_retrieve_key(&self, envelope: &[u8]) -> Result<i32, PlatformStatus> {
        if !self.is_active() {
            return Err(PlatformStatus::INVALID_ENCLAVE_ID);
        }
        self.host.platform.ecall_retrieve_key(self.id, envelope)
    }

    /// Tear the enclave down.
    pub fn destroy(mut self) -> Result<(), EnclaveError> {
        self.teardown()
    }

    fn teardown(&mut self) -> Result<(), EnclaveError> {
        let next = self.state.transition(EnclaveState::Destroyed)?;
        // Marked destroyed before the platform call so a failure here is
        // not retried from `Drop`. The host slot is only released once the
        // platform confirms; after a failed destroy the host refuses to load.
        self.state = next;
        match self.host.platform.destroy_enclave(self.id) {
            Ok(()) => {
                self.host.active.set(None);
                diag!(self.host.channel, Severity::Debug, "enclave {} destroyed", self.id);
                Ok(())
            }
            Err(status) => Err(EnclaveError::Destroy {
                id: self.id,
                status,
            }),
        }
    }
}

impl<P: EnclavePlatform> Drop for Enclave<'_, P> {
    fn drop(&mut self) {
        if self.state.is_terminal() {
            return;
        }
        diag!(
            self.host.channel,
            Severity::Warning,
            "enclave {} dropped while active; tearing down",
            self.id
        );
        if let Err(e) = self.teardown() {
            diag!(self.host.channel, Severity::Error, "{e}");
        }
    }
}

impl<P: EnclavePlatform> std::fmt::Debug for Enclave<'_, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Enclave")
            .field("id", &self.id)
            .field("state", &self.state)
            .finish()
    }
}
