//! Browser profile coordinator for client certificates.

pub mod certificates;

use gd_core::BrowserResult;
use gd_security::CertificateGenerator;
use gd_security::CertificatePolicy;
use gd_security::RcgenCertificateGenerator;
use gd_storage::StorageConfig;
use gd_storage::StorageManager;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

pub use certificates::CertificateCommand;
pub use certificates::CertificateCommandError;
pub use certificates::CertificateService;
pub use certificates::CommandResult;
pub use certificates::HostCertificateState;

/// Environment variable that overrides the persistent storage root.
pub const STORAGE_DIR_ENV: &str = "GEMDUST_STORAGE_DIR";

/// Profile settings the shell or CLI passes in at startup.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BrowserConfig {
    pub storage: StorageConfig,
    /// Falls back to [`default_storage_root`] when unset.
    pub storage_root: Option<PathBuf>,
    pub policy: CertificatePolicy,
}

/// Top-level profile object: policy, storage and the certificate service.
#[derive(Debug)]
pub struct Browser {
    pub policy: CertificatePolicy,
    pub storage: StorageManager,
    pub certificates: CertificateService,
}

/// Startup summary used by the shell/app layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowserSummary {
    pub certificates: usize,
    pub hosts_with_active_certificate: usize,
    pub persistent: bool,
    /// Directory holding the certificate file; `None` for ephemeral profiles.
    pub storage_root: Option<PathBuf>,
}

impl Browser {
    pub fn new() -> BrowserResult<Self> {
        Self::with_config(BrowserConfig::default())
    }

    pub fn with_config(config: BrowserConfig) -> BrowserResult<Self> {
        Self::with_generator(config, Arc::new(RcgenCertificateGenerator))
    }

    /// Builds a profile around a caller-supplied key generator.
    pub fn with_generator(
        config: BrowserConfig,
        generator: Arc<dyn CertificateGenerator>,
    ) -> BrowserResult<Self> {
        config.policy.validate()?;

        let root = config.storage_root.unwrap_or_else(default_storage_root);
        let storage = StorageManager::new(config.storage).with_persistent_root(root);
        let store = storage.open_certificate_store()?;
        let certificates = CertificateService::new(store, generator, config.policy.clone());

        Ok(Self {
            policy: config.policy,
            storage,
            certificates,
        })
    }

    pub fn boot(&self) -> BrowserResult<BrowserSummary> {
        let all = self.certificates.all_certificates();
        let active_hosts: BTreeSet<&str> = all
            .iter()
            .filter(|certificate| certificate.is_active)
            .map(|certificate| certificate.host.as_str())
            .collect();

        let persistent = !self.storage.config.ephemeral_mode;
        let storage_root = self
            .storage
            .persistent_root()
            .filter(|_| persistent)
            .map(|root| root.to_path_buf());

        let summary = BrowserSummary {
            certificates: all.len(),
            hosts_with_active_certificate: active_hosts.len(),
            persistent,
            storage_root,
        };
        info!(
            certificates = summary.certificates,
            active_hosts = summary.hosts_with_active_certificate,
            persistent = summary.persistent,
            storage_root = ?summary.storage_root,
            "certificate profile loaded"
        );
        Ok(summary)
    }
}

/// `$GEMDUST_STORAGE_DIR`, else `.gemdust` under the working directory.
pub fn default_storage_root() -> PathBuf {
    if let Some(override_root) = std::env::var_os(STORAGE_DIR_ENV) {
        return PathBuf::from(override_root);
    }

    std::env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join(".gemdust")
}

#[cfg(test)]
mod tests {
    use super::Browser;
    use super::BrowserConfig;
    use gd_security::CertificatePolicy;
    use gd_storage::StorageConfig;

    fn ephemeral() -> BrowserConfig {
        BrowserConfig {
            storage: StorageConfig {
                ephemeral_mode: true,
            },
            ..BrowserConfig::default()
        }
    }

    #[test]
    fn ephemeral_profile_boots_empty() {
        let summary = Browser::with_config(ephemeral()).and_then(|browser| browser.boot());
        match summary {
            Ok(summary) => {
                assert_eq!(summary.certificates, 0);
                assert_eq!(summary.hosts_with_active_certificate, 0);
                assert!(!summary.persistent);
                assert_eq!(summary.storage_root, None);
            }
            Err(error) => panic!("{error}"),
        }
    }

    #[test]
    fn invalid_policy_is_rejected_at_startup() {
        let config = BrowserConfig {
            policy: CertificatePolicy {
                transient_validity_days: 0,
                ..CertificatePolicy::default()
            },
            ..ephemeral()
        };
        let error = Browser::with_config(config).err();
        assert_eq!(error.map(|error| error.code), Some("security.invalid_policy"));
    }

    #[test]
    fn boot_counts_hosts_with_active_certificates() {
        let browser = match Browser::with_config(ephemeral()) {
            Ok(browser) => browser,
            Err(error) => panic!("{error}"),
        };
        for host in ["one.example", "one.example", "two.example"] {
            if let Err(error) = browser.certificates.create_transient_certificate(host) {
                panic!("{error}");
            }
        }
        if let Err(error) = browser.certificates.deactivate("two.example") {
            panic!("{error}");
        }

        match browser.boot() {
            Ok(summary) => {
                assert_eq!(summary.certificates, 3);
                assert_eq!(summary.hosts_with_active_certificate, 1);
            }
            Err(error) => panic!("{error}"),
        }
    }
}
