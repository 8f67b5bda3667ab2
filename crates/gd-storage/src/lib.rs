//! Client certificate storage with per-host activation.

pub mod error;
pub mod file;
pub mod memory;
pub mod model;
mod table;

use chrono::DateTime;
use chrono::Utc;
use gd_core::BrowserResult;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

pub use error::StoreError;
pub use file::FileCertificateStore;
pub use memory::InMemoryCertificateStore;
pub use model::Certificate;
pub use model::CertificateId;
pub use model::CertificateKind;
pub use model::NewCertificate;

/// Durable record store for client certificates.
///
/// Every mutation is one atomic step: concurrent callers never observe a
/// host with two active certificates, and a failed call changes nothing.
pub trait CertificateStore: Send + Sync {
    /// Certificates scoped to `host`, oldest first. Unknown hosts yield an empty list.
    fn certificates_for(&self, host: &str) -> Vec<Certificate>;

    /// Every stored certificate, oldest first.
    fn all_certificates(&self) -> Vec<Certificate>;

    fn get(&self, id: &CertificateId) -> Option<Certificate>;

    fn active_for(&self, host: &str) -> Option<Certificate>;

    /// Inserts `new` and makes it the only active certificate of its host.
    fn add_and_activate(&self, new: NewCertificate) -> Result<Certificate, StoreError>;

    /// Makes `id` the only active certificate of its host.
    fn activate(&self, id: &CertificateId) -> Result<Certificate, StoreError>;

    fn deactivate_all_for(&self, host: &str) -> Result<(), StoreError>;

    /// Removes `id`. Another certificate is never promoted in its place.
    fn delete(&self, id: &CertificateId) -> Result<Certificate, StoreError>;

    fn mark_used(&self, id: &CertificateId, at: DateTime<Utc>) -> Result<Certificate, StoreError>;

    /// Looks up the active certificate for `host` and records its use at `at`,
    /// as one step. `Ok(None)` when the host has no active certificate.
    fn select_active(
        &self,
        host: &str,
        at: DateTime<Utc>,
    ) -> Result<Option<Certificate>, StoreError>;
}

/// Durable storage configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StorageConfig {
    /// Keep certificates in memory only, e.g. for private browsing.
    pub ephemeral_mode: bool,
}

/// Entry point for certificate storage backends.
#[derive(Debug, Clone, Default)]
pub struct StorageManager {
    pub config: StorageConfig,
    persistent_root: Option<PathBuf>,
}

impl StorageManager {
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            persistent_root: None,
        }
    }

    pub fn with_persistent_root(mut self, root: PathBuf) -> Self {
        self.persistent_root = Some(root);
        self
    }

    pub fn persistent_root(&self) -> Option<&Path> {
        self.persistent_root.as_deref()
    }

    /// Opens the certificate store this configuration selects.
    pub fn open_certificate_store(&self) -> BrowserResult<Arc<dyn CertificateStore>> {
        if self.config.ephemeral_mode {
            return Ok(Arc::new(InMemoryCertificateStore::new()));
        }

        let root = self.persistent_root.as_ref().ok_or_else(|| {
            gd_core::BrowserError::new(
                "storage.persistence_unconfigured",
                "persistent storage root is not configured",
            )
        })?;

        let store = FileCertificateStore::open_in(root)?;
        Ok(Arc::new(store))
    }
}
