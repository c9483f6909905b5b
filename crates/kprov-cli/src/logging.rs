//! # Log Sink Installation
//!
//! Builds the process `tracing` subscriber from a [`LogConfig`].
//!
//! - Diagnostic-channel events (target [`DIAG_TARGET`]) have already been
//!   filtered by the channel's severity threshold, so every one of them is
//!   written to the configured sink: the log file, standard error, or both.
//! - All other events go to standard error, filtered by `-v` verbosity
//!   (`RUST_LOG` overrides).
//!
//! The file is opened for append and created if missing. Lines are plain
//! text, or JSON with `--json-logs`.

use std::sync::Mutex;

use anyhow::{Context, Result};
use kprov_core::diagnostic::DIAG_TARGET;
use kprov_core::LogConfig;
use tracing::level_filters::LevelFilter;
use tracing::Subscriber;
use tracing_subscriber::filter::Targets;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Default stderr filter directive for a `-v` count.
pub fn verbosity_directive(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// Build the subscriber without installing it.
pub fn build_subscriber(
    config: &LogConfig,
    verbose: u8,
    json: bool,
) -> Result<impl Subscriber + Send + Sync> {
    let mut layers: Vec<BoxedLayer> = Vec::new();

    if let Some(file) = config.open_sink().with_context(|| {
        format!(
            "cannot open log file {}",
            config
                .path
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default()
        )
    })? {
        let diag_only = Targets::new().with_target(DIAG_TARGET, LevelFilter::TRACE);
        let layer = fmt::layer().with_writer(Mutex::new(file)).with_ansi(false);
        layers.push(if json {
            layer.json().with_filter(diag_only).boxed()
        } else {
            layer.with_filter(diag_only).boxed()
        });
    }

    let mut stderr_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(verbosity_directive(verbose)));
    stderr_filter = if config.writes_stderr() {
        stderr_filter.add_directive(
            format!("{DIAG_TARGET}=trace")
                .parse()
                .context("invalid diagnostic filter directive")?,
        )
    } else {
        stderr_filter.add_directive(
            format!("{DIAG_TARGET}=off")
                .parse()
                .context("invalid diagnostic filter directive")?,
        )
    };
    let stderr = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);
    layers.push(if json {
        stderr.json().with_filter(stderr_filter).boxed()
    } else {
        stderr.with_filter(stderr_filter).boxed()
    });

    Ok(Registry::default().with(layers))
}

/// Build the subscriber and install it as the global default.
pub fn install_sink(config: &LogConfig, verbose: u8, json: bool) -> Result<()> {
    let subscriber = build_subscriber(config, verbose, json)?;
    tracing::subscriber::set_global_default(subscriber)
        .context("a global tracing subscriber is already installed")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use kprov_core::{diag, DiagnosticChannel, LogOutput, Severity};
    use kprov_enclave::{LoopbackRetriever, TrustedRuntime};

    fn file_config(dir: &tempfile::TempDir, threshold: Severity) -> LogConfig {
        LogConfig {
            path: Some(dir.path().join("logs").join("kprov.log")),
            threshold,
            output: LogOutput::File,
            ..LogConfig::default()
        }
    }

    #[test]
    fn verbosity_levels() {
        assert_eq!(verbosity_directive(0), "warn");
        assert_eq!(verbosity_directive(1), "info");
        assert_eq!(verbosity_directive(2), "debug");
        assert_eq!(verbosity_directive(7), "trace");
    }

    #[test]
    fn diagnostic_events_reach_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = file_config(&dir, Severity::Info);
        let subscriber = build_subscriber(&config, 0, false).unwrap();
        let channel = DiagnosticChannel::new(Arc::new(config.clone()));

        tracing::subscriber::with_default(subscriber, || {
            diag!(channel, Severity::Info, "enclave initialized: EID = 0x0000000000000002");
            diag!(channel, Severity::Debug, "suppressed by threshold");
            tracing::info!("not a diagnostic event");
        });

        let text = std::fs::read_to_string(config.path.as_ref().unwrap()).unwrap();
        assert!(text.contains("EID = 0x0000000000000002"));
        assert!(text.contains("app=\"kprov\"") || text.contains("app=kprov"));
        assert!(!text.contains("suppressed by threshold"));
        assert!(!text.contains("not a diagnostic event"));
    }

    #[test]
    fn json_lines_carry_fields() {
        let dir = tempfile::tempdir().unwrap();
        let config = file_config(&dir, Severity::Debug);
        let subscriber = build_subscriber(&config, 0, true).unwrap();
        let channel = DiagnosticChannel::new(Arc::new(config.clone()));

        tracing::subscriber::with_default(subscriber, || {
            kprov_core::relay!(channel, 6, "relayed from the enclave");
            let runtime = TrustedRuntime::new(LoopbackRetriever, channel.clone());
            assert!(runtime.retrieve_key(b"junk").is_err());
        });

        let text = std::fs::read_to_string(config.path.as_ref().unwrap()).unwrap();
        let line = text.lines().next().unwrap();
        assert!(line.starts_with('{'));
        assert!(line.contains("\"severity\":\"info\""));
        assert!(line.contains("relayed from the enclave"));
        assert!(line.contains(&format!("\"version\":\"{}\"", config.app_version)));
        assert!(line.contains("logging.rs"));

        let rejected = text
            .lines()
            .find(|l| l.contains("bad envelope magic"))
            .expect("enclave-side rejection logged");
        assert!(rejected.contains("\"severity\":\"error\""));
        assert!(rejected.contains("trusted.rs"));
        assert!(rejected.contains("\"function\":\"kprov_enclave::trusted\""));
        assert!(!rejected.contains("\"line\":0,"));
        assert!(!rejected.contains("<relay>"));
    }

    #[test]
    fn file_is_appended_not_truncated() {
        let dir = tempfile::tempdir().unwrap();
        let config = file_config(&dir, Severity::Debug);
        let channel = DiagnosticChannel::new(Arc::new(config.clone()));
        for run in ["first run", "second run"] {
            let subscriber = build_subscriber(&config, 0, false).unwrap();
            tracing::subscriber::with_default(subscriber, || {
                diag!(channel, Severity::Notice, "{run}");
            });
        }
        let text = std::fs::read_to_string(config.path.as_ref().unwrap()).unwrap();
        assert!(text.contains("first run"));
        assert!(text.contains("second run"));
    }

    #[test]
    fn unwritable_log_path_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"").unwrap();
        let config = LogConfig {
            path: Some(blocker.join("kprov.log")),
            ..LogConfig::default()
        };
        let err = build_subscriber(&config, 0, false).err().unwrap();
        assert!(format!("{err:#}").contains("cannot open log file"));
    }
}
