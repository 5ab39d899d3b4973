//! Unified error type for aws-vault.
//!
//! All public APIs return `Result<T, Error>`. The error type provides
//! specific variants for the main failure categories -- configuration,
//! secret storage, credential derivation, and prompting -- while remaining
//! easy to construct from string messages for validation errors.

use std::fmt;

use crate::store::StoreError;

/// The unified error type for all aws-vault operations.
#[derive(Debug)]
pub enum Error {
    // ── I/O & serialization ────────────────────────────────────────────
    /// Filesystem or I/O operation failed.
    Io(std::io::Error),

    /// JSON serialization/deserialization error.
    Json(serde_json::Error),

    // ── Configuration ──────────────────────────────────────────────────
    /// Unparseable or inconsistent configuration.
    Config(String),

    /// The requested profile does not exist in the config file.
    ProfileNotFound(String),

    /// The profile graph contains a `source_profile`/`include_profile` cycle.
    CircularProfile(String),

    /// A profile references an `[sso-session]` section that does not exist.
    UnknownSsoSession(String),

    /// A role profile names more than one credential source.
    MutuallyExclusiveCredentialSource(String),

    // ── Secret storage ─────────────────────────────────────────────────
    /// Secret-store backend failure.
    Store(StoreError),

    /// No long-lived credentials are stored for the profile.
    CredentialsMissing(String),

    // ── Derivation ─────────────────────────────────────────────────────
    /// A credential provider failed: network, subprocess, expired MFA,
    /// invalid role, or a malformed credential document.
    Derivation(String),

    // ── User interaction ───────────────────────────────────────────────
    /// The user cancelled a prompt, or no prompt driver is available.
    Prompt(String),

    // ── Catch-all ──────────────────────────────────────────────────────
    /// Any other error.
    Other(String),
}

// ── Display ────────────────────────────────────────────────────────────

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "{}", e),
            Error::Json(e) => write!(f, "JSON error: {}", e),
            Error::Config(msg) => write!(f, "config error: {}", msg),
            Error::ProfileNotFound(name) => write!(f, "profile '{}' not found in config", name),
            Error::CircularProfile(name) => {
                write!(f, "profile '{}' creates a circular reference", name)
            }
            Error::UnknownSsoSession(name) => write!(f, "unknown sso-session '{}'", name),
            Error::MutuallyExclusiveCredentialSource(msg) => {
                write!(f, "only one credential source may be set: {}", msg)
            }
            Error::Store(e) => write!(f, "secret store: {}", e),
            Error::CredentialsMissing(profile) => {
                write!(f, "profile {}: credentials missing", profile)
            }
            Error::Derivation(msg) => write!(f, "{}", msg),
            Error::Prompt(msg) => write!(f, "prompt: {}", msg),
            Error::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::Json(e) => Some(e),
            _ => None,
        }
    }
}

// ── From implementations for common error types ────────────────────────

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Json(e)
    }
}

impl From<StoreError> for Error {
    fn from(e: StoreError) -> Self {
        Error::Store(e)
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Other(s)
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Other(s.to_string())
    }
}

// ── Convenience constructors ───────────────────────────────────────────

impl Error {
    /// Create a config error.
    pub fn config(message: impl Into<String>) -> Self {
        Error::Config(message.into())
    }

    /// Create a derivation error.
    pub fn derivation(message: impl Into<String>) -> Self {
        Error::Derivation(message.into())
    }

    /// Create a prompt error.
    pub fn prompt(message: impl Into<String>) -> Self {
        Error::Prompt(message.into())
    }

    /// Create a derivation error from an STS failure, translating common
    /// error codes into user-friendly messages.
    pub fn sts(e: impl fmt::Display) -> Self {
        let msg = e.to_string();

        let friendly = if msg.contains("InvalidClientTokenId") {
            "The stored access key is invalid (was it deactivated or rotated?)".to_string()
        } else if msg.contains("SignatureDoesNotMatch") {
            "The stored secret key does not match the access key".to_string()
        } else if msg.contains("ExpiredToken") {
            "The session token has expired".to_string()
        } else if msg.contains("AccessDenied") && msg.contains("MultiFactorAuthentication") {
            "MFA was rejected (wrong or reused one-time code?)".to_string()
        } else if msg.contains("AccessDenied") {
            "Access denied (check the role trust policy and IAM permissions)".to_string()
        } else if msg.contains("RegionDisabled") {
            "The STS endpoint for this region is disabled for the account".to_string()
        } else {
            msg
        };

        Error::Derivation(friendly)
    }
}

/// Convenience type alias for Results using the aws-vault Error.
pub type Result<T> = std::result::Result<T, Error>;
