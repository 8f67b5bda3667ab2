//! Certificate fingerprints and their display forms.

use core::fmt;
use core::str::FromStr;
use gd_core::BrowserError;
use serde::Deserialize;
use serde::Serialize;
use sha2::Digest;
use sha2::Sha256;

const GROUPS_PER_ROW: usize = 8;

/// Content hash of an encoded certificate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Fingerprint(Vec<u8>);

impl Fingerprint {
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// SHA-256 over DER certificate bytes.
    pub fn of_der(der: &[u8]) -> Self {
        Self(Sha256::digest(der).to_vec())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Single-line copyable form, e.g. `AB:CD:EF`.
    pub fn one_line(&self) -> String {
        join_groups(&self.0)
    }

    /// Multi-line form with eight groups per row.
    pub fn pretty(&self) -> String {
        self.0
            .chunks(GROUPS_PER_ROW)
            .map(join_groups)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

fn join_groups(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|byte| format!("{byte:02X}"))
        .collect::<Vec<_>>()
        .join(":")
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.one_line())
    }
}

impl FromStr for Fingerprint {
    type Err = BrowserError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let input = input.trim();
        if input.is_empty() {
            return Ok(Self(Vec::new()));
        }

        input
            .split([':', '\n'])
            .map(|group| {
                if group.len() != 2 || !group.bytes().all(|byte| byte.is_ascii_hexdigit()) {
                    return Err(BrowserError::new(
                        "security.fingerprint_invalid",
                        format!("fingerprint group `{group}` must be two hex digits"),
                    ));
                }
                u8::from_str_radix(group, 16).map_err(|error| {
                    BrowserError::new(
                        "security.fingerprint_invalid",
                        format!("fingerprint group `{group}` is not hex: {error}"),
                    )
                })
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Self)
    }
}

impl From<Fingerprint> for String {
    fn from(value: Fingerprint) -> Self {
        value.one_line()
    }
}

impl TryFrom<String> for Fingerprint {
    type Error = BrowserError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}
