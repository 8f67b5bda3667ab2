//! Client certificate records.

use chrono::DateTime;
use chrono::Utc;
use core::fmt;
use core::str::FromStr;
use gd_core::BrowserError;
use gd_security::Fingerprint;
use gd_security::GeneratedCertificate;
use serde::Deserialize;
use serde::Serialize;
use uuid::Uuid;

/// Stable identifier assigned when a certificate is inserted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CertificateId(Uuid);

impl CertificateId {
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for CertificateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0.hyphenated(), f)
    }
}

impl FromStr for CertificateId {
    type Err = BrowserError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(input.trim()).map(Self).map_err(|error| {
            BrowserError::new(
                "storage.certificates.id_invalid",
                format!("`{input}` is not a certificate id: {error}"),
            )
        })
    }
}

/// Lifecycle class of a client certificate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CertificateKind {
    /// User-named identity kept until explicitly deleted.
    Permanent,
    /// Anonymous one-off identity named by a generated identifier.
    Transient,
}

impl CertificateKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Permanent => "permanent",
            Self::Transient => "transient",
        }
    }

    pub fn is_transient(self) -> bool {
        matches!(self, Self::Transient)
    }
}

/// Immutable snapshot of a stored client certificate.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Certificate {
    pub id: CertificateId,
    pub host: String,
    pub name: String,
    pub kind: CertificateKind,
    #[serde(with = "base64_data")]
    pub data: Vec<u8>,
    pub fingerprint: Fingerprint,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
}

impl fmt::Debug for Certificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Certificate")
            .field("id", &self.id)
            .field("host", &self.host)
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("data_len", &self.data.len())
            .field("fingerprint", &self.fingerprint.one_line())
            .field("is_active", &self.is_active)
            .field("created_at", &self.created_at)
            .field("last_used_at", &self.last_used_at)
            .finish()
    }
}

/// Insert request; the store assigns id, timestamps and activation.
#[derive(Clone, PartialEq, Eq)]
pub struct NewCertificate {
    pub host: String,
    pub name: String,
    pub kind: CertificateKind,
    pub data: Vec<u8>,
    pub fingerprint: Fingerprint,
}

impl NewCertificate {
    pub fn from_generated(
        host: impl Into<String>,
        name: impl Into<String>,
        kind: CertificateKind,
        generated: GeneratedCertificate,
    ) -> Self {
        Self {
            host: host.into(),
            name: name.into(),
            kind,
            data: generated.data,
            fingerprint: generated.fingerprint,
        }
    }
}

impl fmt::Debug for NewCertificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewCertificate")
            .field("host", &self.host)
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("data_len", &self.data.len())
            .field("fingerprint", &self.fingerprint.one_line())
            .finish()
    }
}

mod base64_data {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use serde::Deserialize;
    use serde::Deserializer;
    use serde::Serializer;

    pub fn serialize<S: Serializer>(data: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(data))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded).map_err(serde::de::Error::custom)
    }
}
