//! rustls adapter that presents the active client certificate for a host.

use crate::client_auth::ClientIdentity;
use crate::client_auth::ClientIdentitySource;
use gd_core::BrowserError;
use gd_core::BrowserResult;
use rustls::ClientConfig;
use rustls::SignatureScheme;
use rustls::client::ResolvesClientCert;
use rustls::client::danger::ServerCertVerifier;
use rustls::pki_types::CertificateDer;
use rustls::pki_types::PrivateKeyDer;
use rustls::pki_types::PrivatePkcs8KeyDer;
use rustls::sign::CertifiedKey;
use std::sync::Arc;

/// Client-certificate resolver bound to a single host's handshake.
#[derive(Debug)]
pub struct HostClientCertResolver {
    host: String,
    key: Option<Arc<CertifiedKey>>,
}

impl HostClientCertResolver {
    /// Asks `source` for the host's active identity and prepares it for signing.
    pub fn for_host(source: &dyn ClientIdentitySource, host: &str) -> BrowserResult<Self> {
        let identity = source.identity_for(host)?;
        Self::from_identity(host, identity.as_ref())
    }

    pub fn from_identity(host: &str, identity: Option<&ClientIdentity>) -> BrowserResult<Self> {
        let key = identity.map(certified_key).transpose()?.map(Arc::new);
        Ok(Self {
            host: host.to_owned(),
            key,
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }
}

impl ResolvesClientCert for HostClientCertResolver {
    fn resolve(
        &self,
        _root_hint_subjects: &[&[u8]],
        _sigschemes: &[SignatureScheme],
    ) -> Option<Arc<CertifiedKey>> {
        self.key.clone()
    }

    fn has_certs(&self) -> bool {
        self.key.is_some()
    }
}

/// Client config that authenticates with `resolver`.
///
/// Server trust (TOFU pinning for Gemini, WebPKI for HTTPS) is supplied by the caller.
pub fn client_config_with_identity(
    verifier: Arc<dyn ServerCertVerifier>,
    resolver: HostClientCertResolver,
) -> BrowserResult<ClientConfig> {
    let provider = Arc::new(rustls::crypto::aws_lc_rs::default_provider());
    let config = ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(|error| {
            BrowserError::new(
                "net.tls.config_versions_invalid",
                format!("failed to configure TLS protocol versions: {error}"),
            )
        })?
        .dangerous()
        .with_custom_certificate_verifier(verifier)
        .with_client_cert_resolver(Arc::new(resolver));
    Ok(config)
}

fn certified_key(identity: &ClientIdentity) -> BrowserResult<CertifiedKey> {
    let key_der = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(
        identity.private_key_der.clone(),
    ));
    let signing_key = rustls::crypto::aws_lc_rs::sign::any_supported_type(&key_der).map_err(
        |error| {
            BrowserError::new(
                "net.tls.client_key_unsupported",
                format!(
                    "client certificate `{}` for `{}` has an unusable key: {error}",
                    identity.name, identity.host
                ),
            )
        },
    )?;

    Ok(CertifiedKey::new(
        vec![CertificateDer::from(identity.certificate_der.clone())],
        signing_key,
    ))
}
