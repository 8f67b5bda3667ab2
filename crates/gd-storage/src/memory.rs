//! Memory-only certificate store.

use crate::CertificateStore;
use crate::error::StoreError;
use crate::model::Certificate;
use crate::model::CertificateId;
use crate::model::NewCertificate;
use crate::table::CertificateTable;
use chrono::DateTime;
use chrono::Utc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;

/// Certificates that vanish with the process.
#[derive(Debug, Default)]
pub struct InMemoryCertificateStore {
    table: Mutex<CertificateTable>,
}

impl InMemoryCertificateStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> MutexGuard<'_, CertificateTable> {
        // Table mutations cannot leave partial state, so a poisoned guard is still readable.
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn write<T>(
        &self,
        mutate: impl FnOnce(&mut CertificateTable) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut table = self.table.lock().map_err(|_| StoreError::LockPoisoned)?;
        mutate(&mut table)
    }
}

impl CertificateStore for InMemoryCertificateStore {
    fn certificates_for(&self, host: &str) -> Vec<Certificate> {
        self.read().certificates_for(host)
    }

    fn all_certificates(&self) -> Vec<Certificate> {
        self.read().records().to_vec()
    }

    fn get(&self, id: &CertificateId) -> Option<Certificate> {
        self.read().get(id)
    }

    fn active_for(&self, host: &str) -> Option<Certificate> {
        self.read().active_for(host)
    }

    fn add_and_activate(&self, new: NewCertificate) -> Result<Certificate, StoreError> {
        self.write(|table| table.add_and_activate(new, Utc::now()))
    }

    fn activate(&self, id: &CertificateId) -> Result<Certificate, StoreError> {
        self.write(|table| table.activate(id))
    }

    fn deactivate_all_for(&self, host: &str) -> Result<(), StoreError> {
        self.write(|table| table.deactivate_all_for(host))
    }

    fn delete(&self, id: &CertificateId) -> Result<Certificate, StoreError> {
        self.write(|table| table.delete(id))
    }

    fn mark_used(&self, id: &CertificateId, at: DateTime<Utc>) -> Result<Certificate, StoreError> {
        self.write(|table| table.mark_used(id, at))
    }

    fn select_active(
        &self,
        host: &str,
        at: DateTime<Utc>,
    ) -> Result<Option<Certificate>, StoreError> {
        self.write(|table| Ok(table.select_active(host, at)))
    }
}
