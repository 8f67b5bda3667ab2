//! Certificate store failures.

use crate::model::CertificateId;
use gd_core::BrowserError;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// Persistence rejected the transaction; state is unchanged.
    #[error("certificate store write failed: {0}")]
    WriteFailed(String),
    #[error("certificate {0} no longer exists")]
    NotFound(CertificateId),
    #[error("`{0}` is not a valid certificate host")]
    InvalidHost(String),
    #[error("certificate store could not be loaded: {0}")]
    LoadFailed(String),
    #[error("certificate store is inconsistent: {0}")]
    Corrupt(String),
    #[error("certificate store lock was poisoned")]
    LockPoisoned,
}

impl StoreError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::WriteFailed(_) => "storage.certificates.write_failed",
            Self::NotFound(_) => "storage.certificates.not_found",
            Self::InvalidHost(_) => "storage.certificates.host_invalid",
            Self::LoadFailed(_) => "storage.certificates.load_failed",
            Self::Corrupt(_) => "storage.certificates.corrupt",
            Self::LockPoisoned => "storage.certificates.lock_poisoned",
        }
    }
}

impl From<StoreError> for BrowserError {
    fn from(error: StoreError) -> Self {
        BrowserError::new(error.code(), error.to_string())
    }
}
