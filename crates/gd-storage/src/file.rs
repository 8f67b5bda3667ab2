//! Certificate store persisted as a JSON document under the profile root.
//!
//! Several processes may share one profile. Every mutation holds an exclusive
//! advisory lock on a sibling `.lock` file while it re-reads the document,
//! applies the change and replaces the file.

use crate::CertificateStore;
use crate::error::StoreError;
use crate::model::Certificate;
use crate::model::CertificateId;
use crate::model::NewCertificate;
use crate::table::CertificateTable;
use chrono::DateTime;
use chrono::Utc;
use fd_lock::RwLock;
use serde::Deserialize;
use serde::Serialize;
use std::fs;
use std::fs::File;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;
use tracing::debug;
use tracing::warn;

const STORE_DIR: &str = "certificates";
const STORE_FILE: &str = "client-certificates.json";
const DOCUMENT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct StoreDocument {
    version: u32,
    certificates: Vec<Certificate>,
}

/// File-backed store. The in-memory table mirrors the last document read or
/// written; each mutation is persisted before it becomes visible.
#[derive(Debug)]
pub struct FileCertificateStore {
    path: PathBuf,
    lock_path: PathBuf,
    table: Mutex<CertificateTable>,
}

impl FileCertificateStore {
    /// Opens `<root>/certificates/client-certificates.json`.
    pub fn open_in(root: &Path) -> Result<Self, StoreError> {
        Self::open(root.join(STORE_DIR).join(STORE_FILE))
    }

    /// Opens the store at `path`; a missing file is an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let lock_path = lock_path(&path);
        let table = load_shared(&path, &lock_path)?;
        debug!(
            path = %path.display(),
            certificates = table.records().len(),
            "opened certificate store"
        );

        Ok(Self {
            path,
            lock_path,
            table: Mutex::new(table),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Latest persisted table, or the cached one when the file cannot be read.
    fn snapshot(&self) -> MutexGuard<'_, CertificateTable> {
        // Published tables are always ones that were persisted whole.
        let mut cached = self.table.lock().unwrap_or_else(PoisonError::into_inner);
        match load_shared(&self.path, &self.lock_path) {
            Ok(latest) => *cached = latest,
            Err(error) => {
                warn!(path = %self.path.display(), %error, "serving cached certificates");
            }
        }
        cached
    }

    /// Re-reads the document under the exclusive file lock, applies `mutate`
    /// and persists the result before publishing it.
    fn transact<T>(
        &self,
        mutate: impl FnOnce(&mut CertificateTable) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut cached = self.table.lock().map_err(|_| StoreError::LockPoisoned)?;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|error| {
                StoreError::WriteFailed(format!(
                    "failed to create certificate directory `{}`: {error}",
                    parent.display()
                ))
            })?;
        }

        let lock_file = open_lock_file(&self.lock_path).map_err(|error| {
            StoreError::WriteFailed(format!(
                "failed to open certificate store lock `{}`: {error}",
                self.lock_path.display()
            ))
        })?;
        let mut file_lock = RwLock::new(lock_file);
        let _held = file_lock.write().map_err(|error| {
            StoreError::WriteFailed(format!(
                "failed to lock certificate store `{}`: {error}",
                self.lock_path.display()
            ))
        })?;

        *cached = read_document(&self.path)?;
        let mut next = cached.clone();
        let value = mutate(&mut next)?;

        if next != *cached {
            write_document(&self.path, &next)?;
            *cached = next;
        }

        Ok(value)
    }
}

impl CertificateStore for FileCertificateStore {
    fn certificates_for(&self, host: &str) -> Vec<Certificate> {
        self.snapshot().certificates_for(host)
    }

    fn all_certificates(&self) -> Vec<Certificate> {
        self.snapshot().records().to_vec()
    }

    fn get(&self, id: &CertificateId) -> Option<Certificate> {
        self.snapshot().get(id)
    }

    fn active_for(&self, host: &str) -> Option<Certificate> {
        self.snapshot().active_for(host)
    }

    fn add_and_activate(&self, new: NewCertificate) -> Result<Certificate, StoreError> {
        self.transact(|table| table.add_and_activate(new, Utc::now()))
    }

    fn activate(&self, id: &CertificateId) -> Result<Certificate, StoreError> {
        self.transact(|table| table.activate(id))
    }

    fn deactivate_all_for(&self, host: &str) -> Result<(), StoreError> {
        self.transact(|table| table.deactivate_all_for(host))
    }

    fn delete(&self, id: &CertificateId) -> Result<Certificate, StoreError> {
        self.transact(|table| table.delete(id))
    }

    fn mark_used(&self, id: &CertificateId, at: DateTime<Utc>) -> Result<Certificate, StoreError> {
        self.transact(|table| table.mark_used(id, at))
    }

    fn select_active(
        &self,
        host: &str,
        at: DateTime<Utc>,
    ) -> Result<Option<Certificate>, StoreError> {
        self.transact(|table| Ok(table.select_active(host, at)))
    }
}

fn open_lock_file(lock_path: &Path) -> std::io::Result<File> {
    OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(lock_path)
}

/// Reads the document under a shared lock. Nothing on disk is an empty table.
fn load_shared(path: &Path, lock_path: &Path) -> Result<CertificateTable, StoreError> {
    if !lock_path.exists() && !path.exists() {
        return Ok(CertificateTable::default());
    }

    let lock_file = open_lock_file(lock_path).map_err(|error| {
        StoreError::LoadFailed(format!(
            "failed to open certificate store lock `{}`: {error}",
            lock_path.display()
        ))
    })?;
    let file_lock = RwLock::new(lock_file);
    let _held = file_lock.read().map_err(|error| {
        StoreError::LoadFailed(format!(
            "failed to lock certificate store `{}`: {error}",
            lock_path.display()
        ))
    })?;

    read_document(path)
}

fn read_document(path: &Path) -> Result<CertificateTable, StoreError> {
    if !path.exists() {
        return Ok(CertificateTable::default());
    }

    let content = fs::read(path).map_err(|error| {
        StoreError::LoadFailed(format!(
            "failed to read certificate store `{}`: {error}",
            path.display()
        ))
    })?;

    let document: StoreDocument = serde_json::from_slice(&content).map_err(|error| {
        StoreError::LoadFailed(format!(
            "certificate store `{}` is not valid JSON: {error}",
            path.display()
        ))
    })?;

    if document.version != DOCUMENT_VERSION {
        return Err(StoreError::LoadFailed(format!(
            "certificate store `{}` has unsupported version {}",
            path.display(),
            document.version
        )));
    }

    CertificateTable::from_records(document.certificates)
}

fn write_document(path: &Path, table: &CertificateTable) -> Result<(), StoreError> {
    let result = write_document_atomically(path, table);
    if let Err(error) = &result {
        warn!(path = %path.display(), %error, "certificate store write rejected");
    }
    result
}

fn write_document_atomically(path: &Path, table: &CertificateTable) -> Result<(), StoreError> {
    let document = StoreDocument {
        version: DOCUMENT_VERSION,
        certificates: table.records().to_vec(),
    };
    let encoded = serde_json::to_vec_pretty(&document).map_err(|error| {
        StoreError::WriteFailed(format!("failed to encode certificate store: {error}"))
    })?;

    let staging = staging_path(path);
    let written = File::create(&staging).and_then(|mut staged| {
        staged.write_all(&encoded)?;
        staged.sync_all()
    });
    if let Err(error) = written {
        let _ = fs::remove_file(&staging);
        return Err(StoreError::WriteFailed(format!(
            "failed to write certificate store `{}`: {error}",
            staging.display()
        )));
    }

    fs::rename(&staging, path).map_err(|error| {
        let _ = fs::remove_file(&staging);
        StoreError::WriteFailed(format!(
            "failed to replace certificate store `{}`: {error}",
            path.display()
        ))
    })?;

    debug!(
        path = %path.display(),
        certificates = table.records().len(),
        "persisted certificate store"
    );
    Ok(())
}

fn staging_path(path: &Path) -> PathBuf {
    sibling_path(path, ".tmp")
}

fn lock_path(path: &Path) -> PathBuf {
    sibling_path(path, ".lock")
}

fn sibling_path(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_default();
    name.push(suffix);
    path.with_file_name(name)
}
