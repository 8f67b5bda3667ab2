//! In-memory certificate table shared by every store backend.
//!
//! Each mutation validates before it touches any record, so a failed call
//! leaves the table exactly as it was.

use crate::error::StoreError;
use crate::model::Certificate;
use crate::model::CertificateId;
use crate::model::NewCertificate;
use chrono::DateTime;
use chrono::Utc;
use gd_core::normalize_host;
use std::collections::HashMap;
use std::collections::HashSet;

/// Records in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct CertificateTable {
    records: Vec<Certificate>,
}

impl CertificateTable {
    pub(crate) fn from_records(records: Vec<Certificate>) -> Result<Self, StoreError> {
        let table = Self { records };
        table.check_consistency()?;
        Ok(table)
    }

    pub(crate) fn records(&self) -> &[Certificate] {
        &self.records
    }

    pub(crate) fn certificates_for(&self, host: &str) -> Vec<Certificate> {
        let Some(host) = normalize_host(host) else {
            return Vec::new();
        };

        self.records
            .iter()
            .filter(|record| record.host == host)
            .cloned()
            .collect()
    }

    pub(crate) fn get(&self, id: &CertificateId) -> Option<Certificate> {
        self.records.iter().find(|record| record.id == *id).cloned()
    }

    pub(crate) fn active_for(&self, host: &str) -> Option<Certificate> {
        let host = normalize_host(host)?;
        self.records
            .iter()
            .find(|record| record.host == host && record.is_active)
            .cloned()
    }

    pub(crate) fn add_and_activate(
        &mut self,
        new: NewCertificate,
        now: DateTime<Utc>,
    ) -> Result<Certificate, StoreError> {
        let host = normalize_host(&new.host).ok_or_else(|| StoreError::InvalidHost(new.host))?;

        let mut id = CertificateId::random();
        while self.position(&id).is_ok() {
            id = CertificateId::random();
        }

        self.deactivate_host(&host);
        let record = Certificate {
            id,
            host,
            name: new.name,
            kind: new.kind,
            data: new.data,
            fingerprint: new.fingerprint,
            is_active: true,
            created_at: now,
            last_used_at: None,
        };
        self.records.push(record.clone());
        Ok(record)
    }

    pub(crate) fn activate(&mut self, id: &CertificateId) -> Result<Certificate, StoreError> {
        let index = self.position(id)?;
        let host = self.records[index].host.clone();
        self.deactivate_host(&host);
        self.records[index].is_active = true;
        Ok(self.records[index].clone())
    }

    pub(crate) fn deactivate_all_for(&mut self, host: &str) -> Result<(), StoreError> {
        let host = normalize_host(host).ok_or_else(|| StoreError::InvalidHost(host.to_owned()))?;
        self.deactivate_host(&host);
        Ok(())
    }

    pub(crate) fn delete(&mut self, id: &CertificateId) -> Result<Certificate, StoreError> {
        let index = self.position(id)?;
        Ok(self.records.remove(index))
    }

    pub(crate) fn mark_used(
        &mut self,
        id: &CertificateId,
        at: DateTime<Utc>,
    ) -> Result<Certificate, StoreError> {
        let index = self.position(id)?;
        self.records[index].last_used_at = Some(at);
        Ok(self.records[index].clone())
    }

    /// Host's active record with its last use set to `at`.
    pub(crate) fn select_active(
        &mut self,
        host: &str,
        at: DateTime<Utc>,
    ) -> Option<Certificate> {
        let host = normalize_host(host)?;
        let record = self
            .records
            .iter_mut()
            .find(|record| record.host == host && record.is_active)?;
        record.last_used_at = Some(at);
        Some(record.clone())
    }

    /// Unique ids, normalized hosts and at most one active record per host.
    pub(crate) fn check_consistency(&self) -> Result<(), StoreError> {
        let mut ids = HashSet::new();
        let mut active_per_host: HashMap<&str, usize> = HashMap::new();

        for record in &self.records {
            if !ids.insert(record.id) {
                return Err(StoreError::Corrupt(format!(
                    "duplicate certificate id {}",
                    record.id
                )));
            }

            if normalize_host(&record.host).as_deref() != Some(record.host.as_str()) {
                return Err(StoreError::Corrupt(format!(
                    "certificate {} has unnormalized host `{}`",
                    record.id, record.host
                )));
            }

            if record.is_active {
                let count = active_per_host.entry(record.host.as_str()).or_default();
                *count += 1;
                if *count > 1 {
                    return Err(StoreError::Corrupt(format!(
                        "host `{}` has more than one active certificate",
                        record.host
                    )));
                }
            }
        }

        Ok(())
    }

    fn position(&self, id: &CertificateId) -> Result<usize, StoreError> {
        self.records
            .iter()
            .position(|record| record.id == *id)
            .ok_or(StoreError::NotFound(*id))
    }

    fn deactivate_host(&mut self, host: &str) {
        for record in self.records.iter_mut().filter(|record| record.host == host) {
            record.is_active = false;
        }
    }
}
