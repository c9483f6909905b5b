//! # Enclave Lifecycle Tests
//!
//! Every loaded enclave is destroyed exactly once, whether the caller
//! destroys it explicitly or drops the handle on an error path, and a
//! host never hands out two live handles.

use std::path::PathBuf;
use std::sync::Arc;

use kprov_core::{DiagnosticChannel, LogConfig};
use kprov_enclave::{
    EnclaveError, EnclaveHost, EnclaveState, LaunchOptions, PlatformStatus, SimulatedPlatform,
};

fn host() -> EnclaveHost<SimulatedPlatform> {
    let channel = DiagnosticChannel::new(Arc::new(LogConfig {
        path: None,
        ..LogConfig::default()
    }));
    EnclaveHost::new(
        SimulatedPlatform::loopback(channel.clone()),
        LaunchOptions::default(),
        channel,
    )
}

fn image(dir: &tempfile::TempDir) -> PathBuf {
    let path = dir.path().join("retrieve_key_enclave.signed.so");
    std::fs::write(&path, b"simulated enclave").unwrap();
    path
}

#[test]
fn explicit_destroy_tears_down_once() {
    let dir = tempfile::tempdir().unwrap();
    let host = host();
    let enclave = host.load(&image(&dir)).unwrap();
    assert_eq!(enclave.state(), EnclaveState::Active);
    assert_eq!(host.active_id(), Some(enclave.id()));

    enclave.destroy().unwrap();
    assert_eq!(host.active_id(), None);
    assert_eq!(host.platform().call_counts().destroy, 1);
    assert_eq!(host.platform().live_enclaves(), 0);
}

#[test]
fn dropped_handle_is_torn_down() {
    let dir = tempfile::tempdir().unwrap();
    let host = host();

    fn failing_stage(host: &EnclaveHost<SimulatedPlatform>, image: &std::path::Path) -> Result<(), String> {
        let _enclave = host.load(image).map_err(|e| e.to_string())?;
        Err("later stage failed".to_string())
    }
    assert!(failing_stage(&host, &image(&dir)).is_err());

    assert_eq!(host.platform().call_counts().destroy, 1);
    assert_eq!(host.platform().live_enclaves(), 0);
    assert_eq!(host.active_id(), None);
}

#[test]
fn second_load_while_active_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let path = image(&dir);
    let host = host();
    let first = host.load(&path).unwrap();

    let err = host.load(&path).unwrap_err();
    assert!(matches!(err, EnclaveError::AlreadyActive { id } if id == first.id()));
    assert_eq!(host.platform().call_counts().create, 1);

    first.destroy().unwrap();
    let second = host.load(&path).unwrap();
    second.destroy().unwrap();
    assert_eq!(host.platform().call_counts().destroy, 2);
}

#[test]
fn failed_load_leaves_nothing_to_destroy() {
    let host = host();
    let err = host
        .load(std::path::Path::new("/nonexistent/enclave.signed.so"))
        .unwrap_err();
    match err {
        EnclaveError::Load { status, .. } => assert_eq!(status, PlatformStatus::ENCLAVE_FILE_ACCESS),
        other => panic!("expected Load, got {other:?}"),
    }
    assert_eq!(host.active_id(), None);
    assert_eq!(host.platform().call_counts().destroy, 0);
}

#[test]
fn launch_mode_reaches_the_platform() {
    let dir = tempfile::tempdir().unwrap();
    let channel = DiagnosticChannel::new(Arc::new(LogConfig {
        path: None,
        ..LogConfig::default()
    }));
    let host = EnclaveHost::new(
        SimulatedPlatform::loopback(channel.clone()),
        LaunchOptions { debug: false },
        channel,
    );
    let enclave = host.load(&image(&dir)).unwrap();
    let (_, debug) = host.platform().describe(enclave.id()).unwrap();
    assert!(!debug);
    enclave.destroy().unwrap();
}

#[test]
fn state_machine_has_no_way_back() {
    use EnclaveState::*;
    for state in [Unloaded, Loaded, Active, Destroyed] {
        assert!(!state.can_transition_to(Unloaded));
    }
    assert!(Destroyed.is_terminal());
    assert!(matches!(
        Destroyed.transition(Active),
        Err(EnclaveError::InvalidTransition { from: Destroyed, to: Active })
    ));
}
