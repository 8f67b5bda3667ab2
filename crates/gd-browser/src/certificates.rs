//! Client certificate commands issued by the browser shell.
//!
//! Every state transition maps onto exactly one atomic store call; this layer
//! validates requests, generates key material outside the store lock and turns
//! failures into messages the shell can show.

use chrono::Utc;
use gd_core::BrowserError;
use gd_core::BrowserResult;
use gd_core::normalize_host;
use gd_net::ClientIdentity;
use gd_net::ClientIdentitySource;
use gd_security::CertificateGenerator;
use gd_security::CertificateMaterial;
use gd_security::CertificatePolicy;
use gd_security::GenerationError;
use gd_storage::Certificate;
use gd_storage::CertificateId;
use gd_storage::CertificateKind;
use gd_storage::CertificateStore;
use gd_storage::NewCertificate;
use gd_storage::StoreError;
use std::fmt;
use std::sync::Arc;
use tracing::debug;
use tracing::info;
use tracing::warn;
use uuid::Uuid;

/// Activation state of a single host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostCertificateState {
    NoActiveCertificate,
    ActiveCertificate(Certificate),
}

impl HostCertificateState {
    pub fn active(&self) -> Option<&Certificate> {
        match self {
            Self::NoActiveCertificate => None,
            Self::ActiveCertificate(certificate) => Some(certificate),
        }
    }
}

/// User-level command, used to phrase failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CertificateCommand {
    Create,
    Activate,
    Deactivate,
    Delete,
}

impl CertificateCommand {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Activate => "activate",
            Self::Deactivate => "deactivate",
            Self::Delete => "delete",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CertificateCommandError {
    /// Key generation failed; nothing was stored.
    #[error("certificate generation failed: {0}")]
    Generation(#[from] GenerationError),
    /// Persistence rejected the change; the store is unchanged.
    #[error("could not {} certificate: {reason}", command.as_str())]
    StoreWrite {
        command: CertificateCommand,
        reason: String,
    },
    /// The certificate was deleted before the command reached the store.
    #[error("could not {} certificate {id}: it no longer exists", command.as_str())]
    NotFound {
        command: CertificateCommand,
        id: CertificateId,
    },
    #[error("invalid certificate request: {0}")]
    InvalidRequest(String),
}

impl CertificateCommandError {
    fn from_store(command: CertificateCommand, error: StoreError) -> Self {
        match error {
            StoreError::NotFound(id) => Self::NotFound { command, id },
            StoreError::InvalidHost(host) => {
                Self::InvalidRequest(format!("`{host}` is not a valid host"))
            }
            other => Self::StoreWrite {
                command,
                reason: other.to_string(),
            },
        }
    }

    /// Generation failures block the flow; everything else is a passing notice.
    pub fn is_blocking(&self) -> bool {
        matches!(self, Self::Generation(_))
    }

    /// Text for the toast or alert shown to the user.
    pub fn user_message(&self) -> String {
        match self {
            Self::Generation(_) => {
                "The certificate could not be generated. No certificate was created.".to_owned()
            }
            Self::StoreWrite { command, .. } => format!(
                "Could not {} the certificate. Nothing was changed.",
                command.as_str()
            ),
            Self::NotFound { command, .. } => format!(
                "Could not {} the certificate because it no longer exists.",
                command.as_str()
            ),
            Self::InvalidRequest(reason) => reason.clone(),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Generation(_) => "browser.certificates.generation_failed",
            Self::StoreWrite { .. } => "browser.certificates.store_write_failed",
            Self::NotFound { .. } => "browser.certificates.not_found",
            Self::InvalidRequest(_) => "browser.certificates.invalid_request",
        }
    }
}

impl From<CertificateCommandError> for BrowserError {
    fn from(error: CertificateCommandError) -> Self {
        BrowserError::new(error.code(), error.to_string())
    }
}

pub type CommandResult<T> = Result<T, CertificateCommandError>;

/// Non-UI service that owns every client-certificate transition.
#[derive(Clone)]
pub struct CertificateService {
    store: Arc<dyn CertificateStore>,
    generator: Arc<dyn CertificateGenerator>,
    policy: CertificatePolicy,
}

impl fmt::Debug for CertificateService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CertificateService")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl CertificateService {
    pub fn new(
        store: Arc<dyn CertificateStore>,
        generator: Arc<dyn CertificateGenerator>,
        policy: CertificatePolicy,
    ) -> Self {
        Self {
            store,
            generator,
            policy,
        }
    }

    pub fn policy(&self) -> &CertificatePolicy {
        &self.policy
    }

    pub fn certificates_for(&self, host: &str) -> Vec<Certificate> {
        self.store.certificates_for(host)
    }

    pub fn all_certificates(&self) -> Vec<Certificate> {
        self.store.all_certificates()
    }

    pub fn certificate(&self, id: &CertificateId) -> Option<Certificate> {
        self.store.get(id)
    }

    pub fn host_state(&self, host: &str) -> HostCertificateState {
        match self.store.active_for(host) {
            Some(certificate) => HostCertificateState::ActiveCertificate(certificate),
            None => HostCertificateState::NoActiveCertificate,
        }
    }

    /// Creates a user-named certificate and makes it the host's active one.
    pub fn create_certificate(
        &self,
        host: &str,
        name: &str,
        validity_days: u32,
    ) -> CommandResult<Certificate> {
        let host = checked_host(host)?;
        let name = self.policy.check_name(name).map_err(invalid_request)?;
        let validity_days = self
            .policy
            .check_validity(validity_days)
            .map_err(invalid_request)?;

        self.create(
            host,
            name.to_owned(),
            CertificateKind::Permanent,
            validity_days,
        )
    }

    /// Creates an anonymous certificate named by a fresh UUID and activates it.
    pub fn create_transient_certificate(&self, host: &str) -> CommandResult<Certificate> {
        let host = checked_host(host)?;
        let name = Uuid::new_v4().hyphenated().to_string();
        self.create(
            host,
            name,
            CertificateKind::Transient,
            self.policy.transient_validity_days,
        )
    }

    pub fn activate(&self, id: &CertificateId) -> CommandResult<Certificate> {
        let certificate = self
            .store
            .activate(id)
            .map_err(|error| store_failure(CertificateCommand::Activate, error))?;
        info!(
            host = %certificate.host,
            id = %certificate.id,
            "activated client certificate"
        );
        Ok(certificate)
    }

    /// Leaves `host` without an active certificate. Succeeds when none was active.
    ///
    /// Returns the normalized host that was cleared.
    pub fn deactivate(&self, host: &str) -> CommandResult<String> {
        let host = checked_host(host)?;
        self.store
            .deactivate_all_for(&host)
            .map_err(|error| store_failure(CertificateCommand::Deactivate, error))?;
        info!(%host, "deactivated client certificates");
        Ok(host)
    }

    pub fn delete(&self, id: &CertificateId) -> CommandResult<Certificate> {
        let removed = self
            .store
            .delete(id)
            .map_err(|error| store_failure(CertificateCommand::Delete, error))?;
        info!(
            host = %removed.host,
            id = %removed.id,
            was_active = removed.is_active,
            "deleted client certificate"
        );
        Ok(removed)
    }

    /// Active certificate to present for `host`, with its last use recorded.
    ///
    /// Lookup and recording are one store step, so a certificate deactivated
    /// or replaced concurrently is never presented.
    pub fn select_for_handshake(&self, host: &str) -> Option<Certificate> {
        match self.store.select_active(host, Utc::now()) {
            Ok(Some(selected)) => {
                debug!(host = %selected.host, id = %selected.id, "presenting client certificate");
                Some(selected)
            }
            Ok(None) => None,
            Err(error) => {
                let active = self.store.active_for(host)?;
                warn!(id = %active.id, %error, "failed to record client certificate use");
                Some(active)
            }
        }
    }

    fn create(
        &self,
        host: String,
        name: String,
        kind: CertificateKind,
        validity_days: u32,
    ) -> CommandResult<Certificate> {
        let generated = self
            .generator
            .generate(validity_days, &name)
            .map_err(|error| {
                warn!(%host, %error, "client certificate generation failed");
                CertificateCommandError::Generation(error)
            })?;

        let new = NewCertificate::from_generated(host, name, kind, generated);
        let certificate = self
            .store
            .add_and_activate(new)
            .map_err(|error| store_failure(CertificateCommand::Create, error))?;

        info!(
            host = %certificate.host,
            id = %certificate.id,
            kind = certificate.kind.as_str(),
            fingerprint = %certificate.fingerprint,
            "created and activated client certificate"
        );
        Ok(certificate)
    }
}

impl ClientIdentitySource for CertificateService {
    fn identity_for(&self, host: &str) -> BrowserResult<Option<ClientIdentity>> {
        let Some(certificate) = self.select_for_handshake(host) else {
            return Ok(None);
        };

        let material = CertificateMaterial::from_bundle(&certificate.data)?;
        Ok(Some(ClientIdentity {
            host: certificate.host,
            name: certificate.name,
            transient: certificate.kind.is_transient(),
            certificate_der: material.certificate_der,
            private_key_der: material.private_key_der,
        }))
    }
}

fn checked_host(host: &str) -> CommandResult<String> {
    normalize_host(host).ok_or_else(|| {
        CertificateCommandError::InvalidRequest(
            "a host is required for client certificates".to_owned(),
        )
    })
}

fn store_failure(command: CertificateCommand, error: StoreError) -> CertificateCommandError {
    let error = CertificateCommandError::from_store(command, error);
    warn!(command = command.as_str(), %error, "client certificate command failed");
    error
}

fn invalid_request(error: BrowserError) -> CertificateCommandError {
    CertificateCommandError::InvalidRequest(error.message)
}

#[cfg(test)]
mod tests {
    use super::CertificateCommand;
    use super::CertificateCommandError;
    use gd_core::BrowserError;
    use gd_security::GenerationError;
    use gd_storage::CertificateId;
    use gd_storage::StoreError;

    #[test]
    fn store_errors_map_onto_command_errors() {
        let id = CertificateId::random();
        assert_eq!(
            CertificateCommandError::from_store(
                CertificateCommand::Activate,
                StoreError::NotFound(id)
            ),
            CertificateCommandError::NotFound {
                command: CertificateCommand::Activate,
                id
            }
        );
        assert!(matches!(
            CertificateCommandError::from_store(
                CertificateCommand::Delete,
                StoreError::WriteFailed("disk full".to_owned())
            ),
            CertificateCommandError::StoreWrite {
                command: CertificateCommand::Delete,
                ..
            }
        ));
    }

    #[test]
    fn user_messages_name_the_command() {
        let error = CertificateCommandError::NotFound {
            command: CertificateCommand::Activate,
            id: CertificateId::random(),
        };
        assert_eq!(
            error.user_message(),
            "Could not activate the certificate because it no longer exists."
        );
        assert!(!error.is_blocking());

        let generation = CertificateCommandError::Generation(GenerationError::Crypto(
            "rng unavailable".to_owned(),
        ));
        assert!(generation.is_blocking());
        let converted = BrowserError::from(generation);
        assert_eq!(converted.code, "browser.certificates.generation_failed");
    }
}
