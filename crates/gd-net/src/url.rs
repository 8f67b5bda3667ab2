//! URL parsing for the hosts client certificates are scoped to.

use gd_core::BrowserError;
use gd_core::BrowserResult;
use gd_core::normalize_host;
use url::Url;

/// Navigable URL schemes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scheme {
    Gemini,
    Https,
    Http,
}

impl Scheme {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "gemini" => Some(Self::Gemini),
            "https" => Some(Self::Https),
            "http" => Some(Self::Http),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Gemini => "gemini",
            Self::Https => "https",
            Self::Http => "http",
        }
    }

    /// Schemes whose handshake can present a client certificate.
    pub fn supports_client_certificates(self) -> bool {
        !matches!(self, Self::Http)
    }

    pub fn default_port(self) -> u16 {
        match self {
            Self::Gemini => 1965,
            Self::Https => 443,
            Self::Http => 80,
        }
    }
}

/// A parsed navigation target reduced to what certificate lookup needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowserUrl {
    url: Url,
    scheme: Scheme,
    host: String,
    port: u16,
}

impl BrowserUrl {
    pub fn parse(input: &str) -> BrowserResult<Self> {
        let mut url = Url::parse(input.trim()).map_err(|error| {
            BrowserError::new("net.url.invalid", format!("`{input}` is not a URL: {error}"))
        })?;

        let scheme = Scheme::from_name(url.scheme()).ok_or_else(|| {
            BrowserError::new(
                "net.url.scheme_unsupported",
                format!("`{}:` URLs cannot be opened", url.scheme()),
            )
        })?;

        if url.has_authority() && (!url.username().is_empty() || url.password().is_some()) {
            return Err(BrowserError::new(
                "net.url.credentials_disallowed",
                "credentials embedded in the URL are refused",
            ));
        }

        let host = url.host_str().and_then(normalize_host).ok_or_else(|| {
            BrowserError::new(
                "net.url.host_missing",
                format!("`{input}` does not name a host"),
            )
        })?;
        let port = url.port().unwrap_or(scheme.default_port());
        url.set_fragment(None);

        Ok(Self {
            url,
            scheme,
            host,
            port,
        })
    }

    /// Serialized URL without its fragment.
    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }

    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    /// Lowercase host without a trailing dot; the certificate scope.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// `host` or `host:port` when the port differs from the scheme default.
    pub fn authority(&self) -> String {
        match self.port {
            port if port == self.scheme.default_port() => self.host.clone(),
            port => format!("{}:{port}", self.host),
        }
    }
}
