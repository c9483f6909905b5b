//! # Simulated Enclave Platform
//!
//! An in-process [`EnclavePlatform`] for development and tests. It behaves
//! like a real platform at the boundary:
//!
//! - the image must exist and be non-empty, and must match the pinned
//!   [`Measurement`] if one is configured;
//! - enclave ids are opaque and only valid until destroyed;
//! - the privileged call runs a [`TrustedRuntime`] and returns only its
//!   coarse return value. The retrieved key stays in the enclave slot.
//!
//! Every platform call is counted so tests can assert on teardown and on
//! the absence of privileged calls.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::Path;

use kprov_core::{diag, DiagnosticChannel, Severity};

use crate::measurement::{measure_bytes, Measurement};
use crate::platform::{EnclaveId, EnclavePlatform, LaunchOptions};
use crate::status::PlatformStatus;
use crate::trusted::{KeyRetriever, LoopbackRetriever, RetrievedKey, TrustedRuntime};

/// First id handed out. Real platforms never use zero.
const FIRST_ENCLAVE_ID: u64 = 2;

/// Number of calls of each kind the platform has served.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CallCounts {
    pub create: usize,
    pub ecall: usize,
    pub destroy: usize,
}

struct EnclaveSlot {
    measurement: Measurement,
    debug: bool,
    retrieved: Option<RetrievedKey>,
}

/// In-process enclave platform.
pub struct SimulatedPlatform<R: KeyRetriever = LoopbackRetriever> {
    runtime: TrustedRuntime<R>,
    channel: DiagnosticChannel,
    expected_measurement: Option<[u8; 32]>,
    next_id: Cell<u64>,
    slots: RefCell<HashMap<EnclaveId, EnclaveSlot>>,
    counts: Cell<CallCounts>,
}

impl SimulatedPlatform<LoopbackRetriever> {
    /// Platform backed by the [`LoopbackRetriever`].
    pub fn loopback(channel: DiagnosticChannel) -> Self {
        Self::new(LoopbackRetriever, channel)
    }
}

impl<R: KeyRetriever> SimulatedPlatform<R> {
    pub fn new(retriever: R, channel: DiagnosticChannel) -> Self {
        Self {
            runtime: TrustedRuntime::new(retriever, channel.clone()),
            channel,
            expected_measurement: None,
            next_id: Cell::new(FIRST_ENCLAVE_ID),
            slots: RefCell::new(HashMap::new()),
            counts: Cell::new(CallCounts::default()),
        }
    }

    /// Require images to measure to `expected`.
    pub fn with_expected_measurement(mut self, expected: Option<[u8; 32]>) -> Self {
        self.expected_measurement = expected;
        self
    }

    pub fn call_counts(&self) -> CallCounts {
        self.counts.get()
    }

    /// Enclaves created and not yet destroyed.
    pub fn live_enclaves(&self) -> usize {
        self.slots.borrow().len()
    }

    /// Whether the enclave `id` holds a retrieved key.
    pub fn has_retrieved_key(&self, id: EnclaveId) -> bool {
        self.slots
            .borrow()
            .get(&id)
            .is_some_and(|slot| slot.retrieved.is_some())
    }

    /// Measurement and launch mode of a live enclave.
    pub fn describe(&self, id: EnclaveId) -> Option<(Measurement, bool)> {
        self.slots
            .borrow()
            .get(&id)
            .map(|slot| (slot.measurement, slot.debug))
    }

    fn count(&self, update: impl FnOnce(&mut CallCounts)) {
        let mut counts = self.counts.get();
        update(&mut counts);
        self.counts.set(counts);
    }
}

impl<R: KeyRetriever> EnclavePlatform for SimulatedPlatform<R> {
    fn create_enclave(
        &self,
        image: &Path,
        options: LaunchOptions,
    ) -> Result<EnclaveId, PlatformStatus> {
        self.count(|c| c.create += 1);

        let bytes = std::fs::read(image).map_err(|e| {
            let detail = if e.kind() == ErrorKind::NotFound {
                "not found".to_string()
            } else {
                e.to_string()
            };
            diag!(
                self.channel,
                Severity::Debug,
                "cannot read enclave image {}: {detail}",
                image.display()
            );
            PlatformStatus::ENCLAVE_FILE_ACCESS
        })?;
        if bytes.is_empty() {
            return Err(PlatformStatus::INVALID_ENCLAVE);
        }

        let measurement = measure_bytes(&bytes);
        if let Some(expected) = &self.expected_measurement {
            if !measurement.matches(expected) {
                return Err(PlatformStatus::INVALID_SIGNATURE);
            }
        }

        let id = EnclaveId::new(self.next_id.get());
        self.next_id.set(self.next_id.get() + 1);
        self.slots.borrow_mut().insert(
            id,
            EnclaveSlot {
                measurement,
                debug: options.debug,
                retrieved: None,
            },
        );
        Ok(id)
    }

    fn ecall_retrieve_key(&self, id: EnclaveId, envelope: &[u8]) -> Result<i32, PlatformStatus> {
        self.count(|c| c.ecall += 1);

        if !self.slots.borrow().contains_key(&id) {
            return Err(PlatformStatus::INVALID_ENCLAVE_ID);
        }
        let (code, retrieved) = match self.runtime.retrieve_key(envelope) {
            Ok(key) => (0, Some(key)),
            Err(e) => (e.code(), None),
        };
        if let Some(slot) = self.slots.borrow_mut().get_mut(&id) {
            slot.retrieved = retrieved;
        }
        Ok(code)
    }

    fn destroy_enclave(&self, id: EnclaveId) -> Result<(), PlatformStatus> {
        self.count(|c| c.destroy += 1);
        self.slots
            .borrow_mut()
            .remove(&id)
            .map(drop)
            .ok_or(PlatformStatus::INVALID_ENCLAVE_ID)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use kprov_core::LogConfig;

    fn platform() -> SimulatedPlatform {
        SimulatedPlatform::loopback(DiagnosticChannel::new(Arc::new(LogConfig::default())))
    }

    fn image(dir: &tempfile::TempDir, contents: &[u8]) -> std::path::PathBuf {
        let path = dir.path().join("retrieve_key_enclave.signed.so");
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn missing_image_is_file_access() {
        let p = platform();
        let err = p
            .create_enclave(Path::new("/nonexistent/enclave.so"), LaunchOptions::default())
            .unwrap_err();
        assert_eq!(err, PlatformStatus::ENCLAVE_FILE_ACCESS);
        assert_eq!(p.live_enclaves(), 0);
        assert_eq!(p.call_counts().create, 1);
    }

    #[test]
    fn empty_image_is_invalid_enclave() {
        let dir = tempfile::tempdir().unwrap();
        let path = image(&dir, b"");
        let err = platform()
            .create_enclave(&path, LaunchOptions::default())
            .unwrap_err();
        assert_eq!(err, PlatformStatus::INVALID_ENCLAVE);
    }

    #[test]
    fn measurement_is_enforced() {
        let dir = tempfile::tempdir().unwrap();
        let path = image(&dir, b"enclave image v1");

        let good = measure_bytes(b"enclave image v1");
        let p = platform().with_expected_measurement(Some(*good.as_bytes()));
        let id = p.create_enclave(&path, LaunchOptions { debug: false }).unwrap();
        assert_eq!(p.describe(id), Some((good, false)));

        let p = platform().with_expected_measurement(Some([0u8; 32]));
        let err = p.create_enclave(&path, LaunchOptions::default()).unwrap_err();
        assert_eq!(err, PlatformStatus::INVALID_SIGNATURE);
    }

    #[test]
    fn ids_are_distinct_and_die_with_destroy() {
        let dir = tempfile::tempdir().unwrap();
        let path = image(&dir, b"enclave");
        let p = platform();
        let a = p.create_enclave(&path, LaunchOptions::default()).unwrap();
        let b = p.create_enclave(&path, LaunchOptions::default()).unwrap();
        assert_ne!(a, b);
        assert_eq!(a.raw(), FIRST_ENCLAVE_ID);
        assert_eq!(p.live_enclaves(), 2);

        p.destroy_enclave(a).unwrap();
        assert_eq!(p.destroy_enclave(a), Err(PlatformStatus::INVALID_ENCLAVE_ID));
        assert_eq!(
            p.ecall_retrieve_key(a, b"KPV1"),
            Err(PlatformStatus::INVALID_ENCLAVE_ID)
        );
        assert_eq!(p.live_enclaves(), 1);
    }

    #[test]
    fn garbage_envelope_returns_enclave_code() {
        let dir = tempfile::tempdir().unwrap();
        let path = image(&dir, b"enclave");
        let p = platform();
        let id = p.create_enclave(&path, LaunchOptions::default()).unwrap();
        assert_eq!(p.ecall_retrieve_key(id, b"not an envelope"), Ok(1));
        assert!(!p.has_retrieved_key(id));
        assert_eq!(
            p.call_counts(),
            CallCounts {
                create: 1,
                ecall: 1,
                destroy: 0
            }
        );
    }
}
