//! # Diagnostic Channel
//!
//! A logging relay with a syslog-style severity taxonomy that both sides
//! of the enclave boundary use the same way. Untrusted code calls it
//! directly (usually through [`diag!`](crate::diag)); trusted code reaches
//! it through the platform's log relay, which hands over an integer
//! severity via [`DiagnosticChannel::relay_at`] (usually through
//! [`relay!`](crate::relay)). Both entry points record the caller's file,
//! function and line.
//!
//! ## Configuration
//!
//! [`LogConfig`] is constructed once at process start and shared by
//! reference (`Arc`). There is no process-global logging state in this
//! crate; the `tracing` subscriber that actually writes the sink is
//! installed by the binary.
//!
//! ## Security Invariant
//!
//! Messages carry identifiers, paths, status codes, lengths and
//! fingerprints. Callers never format key material into them, and the
//! key/buffer types in this workspace redact themselves in `Debug`.

use std::fs::{File, OpenOptions};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::identity::AttemptId;

/// Tracing target for every event emitted by the channel.
pub const DIAG_TARGET: &str = "kprov::diag";

/// Message severity, most severe first (syslog numbering).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// System is unusable.
    Emergency,
    /// Action must be taken immediately.
    Alert,
    /// Critical condition.
    Critical,
    /// Error condition.
    Error,
    /// Warning condition.
    Warning,
    /// Normal but significant.
    Notice,
    /// Informational.
    Info,
    /// Debug-level detail.
    Debug,
}

impl Severity {
    /// All severities, most severe first.
    pub const ALL: [Severity; 8] = [
        Self::Emergency,
        Self::Alert,
        Self::Critical,
        Self::Error,
        Self::Warning,
        Self::Notice,
        Self::Info,
        Self::Debug,
    ];

    /// Syslog priority number (0 = emergency … 7 = debug).
    pub fn as_syslog(&self) -> i32 {
        match self {
            Self::Emergency => 0,
            Self::Alert => 1,
            Self::Critical => 2,
            Self::Error => 3,
            Self::Warning => 4,
            Self::Notice => 5,
            Self::Info => 6,
            Self::Debug => 7,
        }
    }

    /// Map a syslog priority number back to a severity.
    pub fn from_syslog(value: i32) -> Option<Self> {
        Self::ALL.iter().copied().find(|s| s.as_syslog() == value)
    }

    /// Canonical lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Emergency => "emergency",
            Self::Alert => "alert",
            Self::Critical => "critical",
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Notice => "notice",
            Self::Info => "info",
            Self::Debug => "debug",
        }
    }

    /// Whether a message of this severity passes `threshold`.
    pub fn passes(&self, threshold: Severity) -> bool {
        *self <= threshold
    }

    /// The `tracing` level events of this severity are emitted at.
    pub fn tracing_level(&self) -> tracing::Level {
        match self {
            Self::Emergency | Self::Alert | Self::Critical | Self::Error => tracing::Level::ERROR,
            Self::Warning => tracing::Level::WARN,
            Self::Notice | Self::Info => tracing::Level::INFO,
            Self::Debug => tracing::Level::DEBUG,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        match lower.as_str() {
            "emerg" => return Ok(Self::Emergency),
            "crit" => return Ok(Self::Critical),
            "err" => return Ok(Self::Error),
            "warn" => return Ok(Self::Warning),
            _ => {}
        }
        Self::ALL
            .iter()
            .copied()
            .find(|sev| sev.as_str() == lower)
            .ok_or_else(|| ConfigError::UnknownSeverity(s.to_string()))
    }
}

/// Where the log sink writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    /// Append to the configured file only.
    File,
    /// Standard error only.
    Stderr,
    /// Both the file and standard error.
    Both,
}

/// Process-wide logging configuration, built once at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Application name stamped on every event.
    pub app_name: String,
    /// Application version stamped on every event.
    pub app_version: String,
    /// Append-only log file. `None` disables the file sink.
    pub path: Option<PathBuf>,
    /// Messages less severe than this are suppressed.
    pub threshold: Severity,
    /// Sink selection.
    pub output: LogOutput,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            app_name: "kprov".to_string(),
            app_version: env!("CARGO_PKG_VERSION").to_string(),
            path: Some(PathBuf::from("kprov.log")),
            threshold: Severity::Debug,
            output: LogOutput::File,
        }
    }
}

impl LogConfig {
    /// Whether events should reach the file sink.
    pub fn writes_file(&self) -> bool {
        self.path.is_some() && matches!(self.output, LogOutput::File | LogOutput::Both)
    }

    /// Whether events should reach standard error.
    pub fn writes_stderr(&self) -> bool {
        matches!(self.output, LogOutput::Stderr | LogOutput::Both) || self.path.is_none()
    }

    /// Open the configured log file for appending, creating it if needed.
    ///
    /// Returns `Ok(None)` when the file sink is disabled.
    pub fn open_sink(&self) -> std::io::Result<Option<File>> {
        match (&self.path, self.writes_file()) {
            (Some(path), true) => {
                if let Some(parent) = path.parent() {
                    if !parent.as_os_str().is_empty() {
                        std::fs::create_dir_all(parent)?;
                    }
                }
                OpenOptions::new().create(true).append(true).open(path).map(Some)
            }
            _ => Ok(None),
        }
    }
}

/// Severity-filtered logging relay.
///
/// Cheap to clone; clones share the same configuration.
#[derive(Debug, Clone)]
pub struct DiagnosticChannel {
    config: Arc<LogConfig>,
    attempt: Option<AttemptId>,
}

impl DiagnosticChannel {
    /// Create a channel over a shared configuration.
    pub fn new(config: Arc<LogConfig>) -> Self {
        Self {
            config,
            attempt: None,
        }
    }

    /// A channel whose events are tagged with `attempt`.
    pub fn for_attempt(&self, attempt: AttemptId) -> Self {
        Self {
            config: Arc::clone(&self.config),
            attempt: Some(attempt),
        }
    }

    /// The configuration this channel filters against.
    pub fn config(&self) -> &LogConfig {
        &self.config
    }

    /// Whether a message of `severity` would be emitted.
    pub fn enabled(&self, severity: Severity) -> bool {
        severity.passes(self.config.threshold)
    }

    /// Emit one message. Returns `false` if it was suppressed by the threshold.
    pub fn log(
        &self,
        severity: Severity,
        file: &str,
        function: &str,
        line: u32,
        message: &str,
    ) -> bool {
        if !self.enabled(severity) {
            return false;
        }
        let app = self.config.app_name.as_str();
        let version = self.config.app_version.as_str();
        let attempt = self
            .attempt
            .map(|a| a.to_string())
            .unwrap_or_else(|| "-".to_string());

        macro_rules! emit {
            ($level:expr) => {
                tracing::event!(
                    target: DIAG_TARGET,
                    $level,
                    severity = severity.as_str(),
                    file,
                    function,
                    line,
                    app,
                    version,
                    attempt = attempt.as_str(),
                    "{message}"
                )
            };
        }

        // `event!` needs a constant level, hence one arm per level.
        match severity {
            Severity::Emergency | Severity::Alert | Severity::Critical | Severity::Error => {
                emit!(tracing::Level::ERROR)
            }
            Severity::Warning => emit!(tracing::Level::WARN),
            Severity::Notice | Severity::Info => emit!(tracing::Level::INFO),
            Severity::Debug => emit!(tracing::Level::DEBUG),
        }
        true
    }

    /// Entry point for messages relayed with a raw integer severity, as
    /// they arrive from inside the enclave. Out-of-range values are
    /// treated as [`Severity::Debug`].
    pub fn relay_at(
        &self,
        raw_severity: i32,
        file: &str,
        function: &str,
        line: u32,
        message: &str,
    ) -> bool {
        let severity = Severity::from_syslog(raw_severity).unwrap_or(Severity::Debug);
        self.log(severity, file, function, line, message)
    }
}

/// Log through a [`DiagnosticChannel`] with the caller's source location.
///
/// ```
/// use std::sync::Arc;
/// use kprov_core::{diag, DiagnosticChannel, LogConfig, Severity};
///
/// let channel = DiagnosticChannel::new(Arc::new(LogConfig::default()));
/// diag!(channel, Severity::Info, "loaded {} bytes", 121);
/// ```
#[macro_export]
macro_rules! diag {
    ($channel:expr, $severity:expr, $($arg:tt)+) => {
        $channel.log(
            $severity,
            file!(),
            module_path!(),
            line!(),
            &format!($($arg)+),
        )
    };
}

/// Relay a message with a raw integer severity and the caller's source
/// location.
///
/// ```
/// use std::sync::Arc;
/// use kprov_core::{relay, DiagnosticChannel, LogConfig};
///
/// let channel = DiagnosticChannel::new(Arc::new(LogConfig::default()));
/// relay!(channel, 3, "rejected envelope: {}", "bad magic");
/// ```
#[macro_export]
macro_rules! relay {
    ($channel:expr, $raw_severity:expr, $($arg:tt)+) => {
        $channel.relay_at(
            $raw_severity,
            file!(),
            module_path!(),
            line!(),
            &format!($($arg)+),
        )
    };
}
