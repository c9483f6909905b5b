//! # Provisioning Flow
//!
//! The one sequential run kprov exists for:
//!
//! ```text
//! load key ─▶ encode ─▶ self-check ─▶ load cert ─▶ encode
//!     ─▶ load enclave ─▶ provision ─▶ destroy enclave
//! ```
//!
//! Each stage failure is fatal and maps to its own process exit code
//! ([`ExitStatus`]). Credentials are loaded and encoded before the enclave
//! is touched, so a bad credential never costs an enclave load. Once an
//! enclave is loaded it is destroyed on every path.

use kprov_core::{
    diag, relay, AttemptId, DiagnosticChannel, EncodedBuffer, ProvisionConfig, Severity,
};
use kprov_crypto::{
    decode_key, encode_certificate, encode_key, load_certificate, load_private_key, AlgorithmId,
    CodecError, CredentialError,
};
use kprov_enclave::{
    provision, EnclaveError, EnclaveHost, EnclaveId, EnclavePlatform, PlatformStatus,
    ProvisionStatus,
};
use thiserror::Error;

/// Process exit codes, one per failing stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    Success,
    /// Bad configuration or command line.
    Usage,
    /// A credential file is missing or unreadable.
    CredentialStorage,
    /// A credential file does not parse.
    CredentialParse,
    /// Encoding, or the untrusted-side self-check, failed.
    Codec,
    /// The platform refused to load the enclave.
    EnclaveLoad,
    /// The privileged call did not complete.
    BoundaryCall,
    /// The enclave ran but retrieval failed.
    Retrieval,
    /// The enclave could not be destroyed.
    Teardown,
}

impl ExitStatus {
    pub fn code(&self) -> u8 {
        match self {
            Self::Success => 0,
            Self::Usage => 1,
            Self::CredentialStorage => 2,
            Self::CredentialParse => 3,
            Self::Codec => 4,
            Self::EnclaveLoad => 5,
            Self::BoundaryCall => 6,
            Self::Retrieval => 7,
            Self::Teardown => 8,
        }
    }
}

/// Failure of one flow stage.
#[derive(Error, Debug)]
pub enum ProvisionError {
    #[error(transparent)]
    Credential(#[from] CredentialError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("encoded private key did not decode back to the same key")]
    SelfCheck,

    #[error(transparent)]
    Load(EnclaveError),

    #[error("provisioning call failed: platform status {status}")]
    BoundaryCall { status: PlatformStatus },

    #[error("key retrieval failed inside the enclave (code {code})")]
    Retrieval { code: i32 },

    #[error(transparent)]
    Teardown(EnclaveError),
}

impl ProvisionError {
    pub fn exit_status(&self) -> ExitStatus {
        match self {
            Self::Credential(e) if e.is_storage() => ExitStatus::CredentialStorage,
            Self::Credential(_) => ExitStatus::CredentialParse,
            Self::Codec(_) | Self::SelfCheck => ExitStatus::Codec,
            Self::Load(_) => ExitStatus::EnclaveLoad,
            Self::BoundaryCall { .. } => ExitStatus::BoundaryCall,
            Self::Retrieval { .. } => ExitStatus::Retrieval,
            Self::Teardown(_) => ExitStatus::Teardown,
        }
    }

    /// Name of the failing stage, for log lines.
    pub fn stage(&self) -> &'static str {
        match self {
            Self::Credential(_) => "load-credentials",
            Self::Codec(_) | Self::SelfCheck => "encode",
            Self::Load(_) => "load-enclave",
            Self::BoundaryCall { .. } | Self::Retrieval { .. } => "provision",
            Self::Teardown(_) => "destroy-enclave",
        }
    }
}

/// Turn the outcome of the provisioning call into a flow result.
pub fn check_status(status: ProvisionStatus) -> Result<(), ProvisionError> {
    match status {
        ProvisionStatus::Success => Ok(()),
        ProvisionStatus::EnclaveFailure { code } => Err(ProvisionError::Retrieval { code }),
        ProvisionStatus::BoundaryCallFailed { status } => Err(ProvisionError::BoundaryCall { status }),
    }
}

/// What a successful run did.
#[derive(Debug, Clone)]
pub struct ProvisionReport {
    pub attempt: AttemptId,
    pub enclave: EnclaveId,
    pub key_algorithm: AlgorithmId,
    pub key_len: usize,
    pub certificate_len: usize,
    pub certificate_fingerprint: String,
}

/// Run the full flow against `host`.
///
/// `channel` should already be tagged with `attempt`.
pub fn run_provision<P: EnclavePlatform>(
    config: &ProvisionConfig,
    host: &EnclaveHost<P>,
    channel: &DiagnosticChannel,
    attempt: AttemptId,
) -> Result<ProvisionReport, ProvisionError> {
    let result = provision_stages(config, host, channel, attempt);
    if let Err(e) = &result {
        diag!(
            channel,
            Severity::Error,
            "provisioning failed at stage {}: {e}",
            e.stage()
        );
    }
    result
}

fn provision_stages<P: EnclavePlatform>(
    config: &ProvisionConfig,
    host: &EnclaveHost<P>,
    channel: &DiagnosticChannel,
    attempt: AttemptId,
) -> Result<ProvisionReport, ProvisionError> {
    let log = channel.config();
    diag!(
        channel,
        Severity::Info,
        "{} {} starting attempt {attempt}",
        log.app_name,
        log.app_version
    );
    diag!(
        channel,
        Severity::Debug,
        "log sink {} at threshold {}",
        log.path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "<none>".to_string()),
        log.threshold
    );

    let (key_buffer, key_algorithm) = encode_client_key(config, channel)?;

    // Exercise the trusted-side logging entry point before anything crosses.
    relay!(
        channel,
        Severity::Debug.as_syslog(),
        "diagnostic relay ready (untrusted side)"
    );

    let cert = load_certificate(&config.certificate)?;
    let cert_buffer = encode_certificate(&cert)?;
    diag!(
        channel,
        Severity::Debug,
        "server certificate {} ({}, valid {} to {}) encoded: {} bytes",
        cert.subject(),
        cert.public_key_algorithm(),
        cert.not_before(),
        cert.not_after(),
        cert_buffer.declared_len()
    );

    let enclave = host.load(&config.enclave_image).map_err(ProvisionError::Load)?;
    let enclave_id = enclave.id();

    let outcome = check_status(provision(&enclave, &key_buffer, &cert_buffer));
    let teardown = enclave.destroy().map_err(ProvisionError::Teardown);

    // A provisioning failure outranks a teardown failure; both are logged.
    if let (Err(_), Err(t)) = (&outcome, &teardown) {
        diag!(channel, Severity::Error, "{t}");
    }
    outcome?;
    teardown?;

    diag!(
        channel,
        Severity::Info,
        "key provisioned into enclave {enclave_id}"
    );
    Ok(ProvisionReport {
        attempt,
        enclave: enclave_id,
        key_algorithm,
        key_len: key_buffer.declared_len(),
        certificate_len: cert_buffer.declared_len(),
        certificate_fingerprint: cert.fingerprint(),
    })
}

/// Load, encode and self-check the client private key.
fn encode_client_key(
    config: &ProvisionConfig,
    channel: &DiagnosticChannel,
) -> Result<(EncodedBuffer, AlgorithmId), ProvisionError> {
    let key = load_private_key(&config.private_key)?;
    let algorithm = key.algorithm();
    let buffer = encode_key(&key)?;
    diag!(
        channel,
        Severity::Debug,
        "client private key ({algorithm}) loaded from {} and encoded: {} bytes",
        config.private_key.display(),
        buffer.declared_len()
    );

    let decoded = decode_key(&buffer)?;
    if !decoded.same_key_as(&key) {
        return Err(ProvisionError::SelfCheck);
    }
    diag!(channel, Severity::Debug, "encoded private key self-check passed");
    Ok((buffer, algorithm))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::{Path, PathBuf};
    use std::sync::Arc;

    use kprov_core::LogConfig;
    use kprov_enclave::{LaunchOptions, SimulatedPlatform};

    struct Workspace {
        _dir: tempfile::TempDir,
        config: ProvisionConfig,
    }

    fn workspace() -> Workspace {
        let dir = tempfile::tempdir().unwrap();
        let certified = rcgen::generate_simple_self_signed(vec!["kms.example".to_string()]).unwrap();
        let key = dir.path().join("client_priv.pem");
        let cert = dir.path().join("server_cert.pem");
        let image = dir.path().join("retrieve_key_enclave.signed.so");
        std::fs::write(&key, certified.key_pair.serialize_pem()).unwrap();
        std::fs::write(&cert, certified.cert.pem()).unwrap();
        std::fs::write(&image, b"enclave image").unwrap();
        let config = ProvisionConfig {
            private_key: key,
            certificate: cert,
            enclave_image: image,
            log: LogConfig {
                path: None,
                ..LogConfig::default()
            },
            ..ProvisionConfig::default()
        };
        Workspace { _dir: dir, config }
    }

    fn host(config: &ProvisionConfig) -> (EnclaveHost<SimulatedPlatform>, DiagnosticChannel) {
        let channel = DiagnosticChannel::new(Arc::new(config.log.clone()));
        let platform = SimulatedPlatform::loopback(channel.clone());
        (
            EnclaveHost::new(platform, LaunchOptions::default(), channel.clone()),
            channel,
        )
    }

    fn run(
        config: &ProvisionConfig,
    ) -> (
        Result<ProvisionReport, ProvisionError>,
        EnclaveHost<SimulatedPlatform>,
    ) {
        let (host, channel) = host(config);
        let attempt = AttemptId::new();
        let result = run_provision(config, &host, &channel.for_attempt(attempt), attempt);
        (result, host)
    }

    #[test]
    fn happy_path_provisions_and_tears_down() {
        let ws = workspace();
        let (result, host) = run(&ws.config);
        let report = result.unwrap();
        assert_eq!(report.key_algorithm, AlgorithmId::EcP256);
        assert!(report.key_len > 0);
        let counts = host.platform().call_counts();
        assert_eq!((counts.create, counts.ecall, counts.destroy), (1, 1, 1));
        assert_eq!(host.platform().live_enclaves(), 0);
    }

    #[test]
    fn missing_key_is_storage_error_before_enclave() {
        let mut ws = workspace();
        ws.config.private_key = PathBuf::from("/nonexistent/client_priv.pem");
        let (result, host) = run(&ws.config);
        let err = result.unwrap_err();
        assert_eq!(err.exit_status(), ExitStatus::CredentialStorage);
        assert_eq!(host.platform().call_counts().create, 0);
    }

    #[test]
    fn garbage_certificate_is_parse_error_before_enclave() {
        let ws = workspace();
        std::fs::write(&ws.config.certificate, "-----BEGIN CERTIFICATE-----\nAAAA").unwrap();
        let (result, host) = run(&ws.config);
        let err = result.unwrap_err();
        assert_eq!(err.exit_status(), ExitStatus::CredentialParse);
        assert_eq!(err.stage(), "load-credentials");
        assert_eq!(host.platform().call_counts().create, 0);
    }

    #[test]
    fn missing_image_is_load_error_without_ecall() {
        let mut ws = workspace();
        ws.config.enclave_image = PathBuf::from("/nonexistent/enclave.signed.so");
        let (result, host) = run(&ws.config);
        match result.unwrap_err() {
            ProvisionError::Load(EnclaveError::Load { status, image }) => {
                assert_eq!(status, PlatformStatus::ENCLAVE_FILE_ACCESS);
                assert_eq!(image, Path::new("/nonexistent/enclave.signed.so"));
            }
            other => panic!("expected Load, got {other:?}"),
        }
        let counts = host.platform().call_counts();
        assert_eq!((counts.ecall, counts.destroy), (0, 0));
    }

    #[test]
    fn exit_codes_are_distinct() {
        let all = [
            ExitStatus::Success,
            ExitStatus::Usage,
            ExitStatus::CredentialStorage,
            ExitStatus::CredentialParse,
            ExitStatus::Codec,
            ExitStatus::EnclaveLoad,
            ExitStatus::BoundaryCall,
            ExitStatus::Retrieval,
            ExitStatus::Teardown,
        ];
        let mut codes: Vec<u8> = all.iter().map(ExitStatus::code).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes, (0..=8).collect::<Vec<u8>>());
    }

    #[test]
    fn provision_status_maps_to_errors() {
        assert!(check_status(ProvisionStatus::Success).is_ok());
        let retrieval = check_status(ProvisionStatus::EnclaveFailure { code: 2 }).unwrap_err();
        assert_eq!(retrieval.exit_status(), ExitStatus::Retrieval);
        let err = check_status(ProvisionStatus::BoundaryCallFailed {
            status: PlatformStatus::ENCLAVE_LOST,
        })
        .unwrap_err();
        assert_eq!(err.exit_status(), ExitStatus::BoundaryCall);
        assert!(err.to_string().contains("0x0004"));
    }
}
