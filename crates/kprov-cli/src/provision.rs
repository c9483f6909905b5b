//! # Provision Subcommand
//!
//! `kprov provision` applies flag overrides to the loaded configuration,
//! installs the log sink, and runs the provisioning flow against the
//! simulated enclave platform.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;

use kprov_core::{AttemptId, DiagnosticChannel, LogOutput, ProvisionConfig, Severity};
use kprov_enclave::{EnclaveHost, LaunchOptions, SimulatedPlatform};

use crate::flow::{run_provision as run_flow, ExitStatus};
use crate::logging::install_sink;

/// Arguments for the `provision` subcommand.
#[derive(Args, Debug, Default)]
pub struct ProvisionArgs {
    /// PEM private key handed to the enclave.
    #[arg(long)]
    pub key: Option<PathBuf>,

    /// PEM certificate of the key server.
    #[arg(long)]
    pub cert: Option<PathBuf>,

    /// Signed enclave image.
    #[arg(long)]
    pub enclave: Option<PathBuf>,

    /// Launch the enclave without debug mode.
    #[arg(long)]
    pub release: bool,

    /// Hex SHA-256 the enclave image must measure to.
    #[arg(long, value_name = "HEX")]
    pub expected_measurement: Option<String>,

    /// Diagnostic log file (appended).
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Least severe diagnostic severity to record (emergency .. debug).
    #[arg(long, value_name = "SEVERITY")]
    pub log_threshold: Option<Severity>,

    /// Also write diagnostics to standard error.
    #[arg(long)]
    pub log_stderr: bool,

    /// Write log lines as JSON.
    #[arg(long)]
    pub json_logs: bool,
}

impl ProvisionArgs {
    /// Override configuration fields with the flags that were given.
    pub fn apply(&self, config: &mut ProvisionConfig) {
        if let Some(key) = &self.key {
            config.private_key = key.clone();
        }
        if let Some(cert) = &self.cert {
            config.certificate = cert.clone();
        }
        if let Some(image) = &self.enclave {
            config.enclave_image = image.clone();
        }
        if self.release {
            config.debug_enclave = false;
        }
        if let Some(hex) = &self.expected_measurement {
            config.expected_measurement = Some(hex.clone());
        }
        if let Some(path) = &self.log_file {
            config.log.path = Some(path.clone());
        }
        if let Some(threshold) = self.log_threshold {
            config.log.threshold = threshold;
        }
        if self.log_stderr {
            config.log.output = LogOutput::Both;
        }
    }
}

/// Execute the `provision` subcommand.
pub fn run_provision(args: &ProvisionArgs, mut config: ProvisionConfig, verbose: u8) -> Result<u8> {
    args.apply(&mut config);
    config.validate().context("invalid provisioning configuration")?;
    install_sink(&config.log, verbose, args.json_logs)?;
    Ok(provision_with(&config))
}

/// Run the flow with an already-installed sink and report the outcome.
pub fn provision_with(config: &ProvisionConfig) -> u8 {
    let expected = match config.expected_measurement_bytes() {
        Ok(expected) => expected,
        Err(e) => {
            tracing::error!("{e}");
            return ExitStatus::Usage.code();
        }
    };

    let attempt = AttemptId::new();
    let channel = DiagnosticChannel::new(Arc::new(config.log.clone())).for_attempt(attempt);
    let platform = SimulatedPlatform::loopback(channel.clone()).with_expected_measurement(expected);
    let options = LaunchOptions {
        debug: config.debug_enclave,
    };
    let host = EnclaveHost::new(platform, options, channel.clone());

    match run_flow(config, &host, &channel, attempt) {
        Ok(report) => {
            println!("Provisioned {} client key into enclave {}", report.key_algorithm, report.enclave);
            println!("  attempt:      {}", report.attempt);
            println!("  key:          {} bytes", report.key_len);
            println!(
                "  certificate:  {} bytes (sha256 {})",
                report.certificate_len, report.certificate_fingerprint
            );
            ExitStatus::Success.code()
        }
        // The flow has already logged the failure through the channel.
        Err(e) => {
            eprintln!("error: {e}");
            e.exit_status().code()
        }
    }
}
