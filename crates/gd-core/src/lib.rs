//! Shared primitives used across Gemdust crates.

use core::fmt;
use url::Host;

/// Result alias used across the workspace.
pub type BrowserResult<T> = Result<T, BrowserError>;

/// Workspace-wide error carrying a stable dotted code and a human message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowserError {
    pub code: &'static str,
    pub message: String,
}

impl BrowserError {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for BrowserError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for BrowserError {}

/// Canonical form of a host name used for certificate scoping.
///
/// Trims whitespace and trailing root dots, then applies URL host parsing:
/// ASCII lowercasing, IDNA to punycode and percent-decoding. Returns `None`
/// for blank or unparsable hosts.
pub fn normalize_host(host: &str) -> Option<String> {
    let trimmed = host.trim().trim_end_matches('.');
    if trimmed.is_empty() {
        return None;
    }

    Host::parse(trimmed).ok().map(|host| host.to_string())
}
