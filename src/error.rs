//! Unified error types for the fleet tool.

use std::fmt;

// ---------------------------------------------------------------------------
// ConfigError
// ---------------------------------------------------------------------------

/// Errors when loading or validating configuration and target selections.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Toml(toml::de::Error),
    /// No config file at the override path or any default location. The
    /// message lists where we looked.
    MissingFile(String),
    /// Malformed connection string, cluster definition, or slice expression.
    Invalid(String),
    /// A `-n`/`-c` flag referenced a name that is not configured.
    UnknownTarget(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "io: {e}"),
            Self::Toml(e) => write!(f, "toml: {e}"),
            Self::MissingFile(msg) => write!(f, "{msg}"),
            Self::Invalid(msg) => write!(f, "invalid config: {msg}"),
            Self::UnknownTarget(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        Self::Toml(e)
    }
}

// ---------------------------------------------------------------------------
// RpcError
// ---------------------------------------------------------------------------

/// Errors from the RPC gateway that are NOT per-node call outcomes.
///
/// Remote failures (unreachable, timeout, 401, 5xx) are normal `CallResult`
/// values and never appear here. This enum covers conditions that abort the
/// whole invocation instead of degrading it to a partial result.
#[derive(Debug)]
pub enum RpcError {
    /// TLS certificate verification failed for a node. Usually a fleet-wide
    /// misconfiguration (self-signed certs), so it is fatal rather than
    /// a per-node partial failure.
    TlsVerification { node: String },
    /// A dispatched task panicked; a programming error, not a remote failure.
    TaskPanicked(String),
}

impl fmt::Display for RpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TlsVerification { node } => {
                write!(f, "couldn't contact '{node}': TLS verification failed")
            }
            Self::TaskPanicked(msg) => write!(f, "dispatch task panicked: {msg}"),
        }
    }
}

impl std::error::Error for RpcError {}

impl RpcError {
    /// Multi-line remediation text printed when TLS verification fails.
    pub fn remediation(&self) -> Option<String> {
        match self {
            Self::TlsVerification { .. } => Some(
                "If you'd like to disable TLS verification, add this to your config:\n\
                 \x20   verify_tls = false\n\
                 You can also connect over plain HTTP by adjusting your node definition."
                    .to_string(),
            ),
            Self::TaskPanicked(_) => None,
        }
    }
}

// ---------------------------------------------------------------------------
// SecretsError
// ---------------------------------------------------------------------------

/// Errors when reading or writing the on-disk secret store.
#[derive(Debug)]
pub enum SecretsError {
    Io(std::io::Error),
    /// Parse, encode, or decrypt failure, with context.
    Invalid(String),
}

impl fmt::Display for SecretsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "io: {e}"),
            Self::Invalid(msg) => write!(f, "invalid secret store: {msg}"),
        }
    }
}

impl std::error::Error for SecretsError {}

impl From<std::io::Error> for SecretsError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

// ---------------------------------------------------------------------------
// BridgeError
// ---------------------------------------------------------------------------

/// Errors from the interactive terminal bridge.
#[derive(Debug)]
pub enum BridgeError {
    /// Local terminal I/O failed (raw mode, stdout writes, event polling).
    Terminal(std::io::Error),
    /// The remote process could not be started; carries the RPC status code.
    StartFailed(u16),
}

impl fmt::Display for BridgeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Terminal(e) => write!(f, "terminal: {e}"),
            Self::StartFailed(code) => write!(f, "remote process failed to start: status {code}"),
        }
    }
}

impl std::error::Error for BridgeError {}

impl From<std::io::Error> for BridgeError {
    fn from(e: std::io::Error) -> Self {
        Self::Terminal(e)
    }
}
