//! Networking contracts: URL scoping and TLS client authentication.

pub mod client_auth;
#[cfg(feature = "tls-rustls")]
pub mod tls_backend;
pub mod url;

pub use client_auth::ClientIdentity;
pub use client_auth::ClientIdentitySource;
pub use client_auth::identity_for_url;
#[cfg(feature = "tls-rustls")]
pub use tls_backend::HostClientCertResolver;
#[cfg(feature = "tls-rustls")]
pub use tls_backend::client_config_with_identity;
pub use url::BrowserUrl;
pub use url::Scheme;
