//! Contract between the TLS handshake layer and the certificate store.

use crate::url::BrowserUrl;
use gd_core::BrowserResult;

/// Credential presented during TLS client-certificate negotiation.
#[derive(Clone, PartialEq, Eq)]
pub struct ClientIdentity {
    pub host: String,
    pub name: String,
    /// Transient identities are anonymous; the shell does not prompt for a name.
    pub transient: bool,
    pub certificate_der: Vec<u8>,
    pub private_key_der: Vec<u8>,
}

impl std::fmt::Debug for ClientIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientIdentity")
            .field("host", &self.host)
            .field("name", &self.name)
            .field("transient", &self.transient)
            .field("certificate_der_len", &self.certificate_der.len())
            .finish_non_exhaustive()
    }
}

/// Answers "is there an active certificate for this host?" at handshake time.
pub trait ClientIdentitySource: Send + Sync {
    fn identity_for(&self, host: &str) -> BrowserResult<Option<ClientIdentity>>;
}

/// Looks up the identity for `url`, skipping schemes that never use one.
pub fn identity_for_url(
    source: &dyn ClientIdentitySource,
    url: &BrowserUrl,
) -> BrowserResult<Option<ClientIdentity>> {
    if !url.scheme().supports_client_certificates() {
        return Ok(None);
    }

    source.identity_for(url.host())
}
