//! HTTP transport construction.
//!
//! A [`TransportBuilder`] turns process-wide connection settings into a
//! ready `reqwest::Client`. Which builder is used depends on the requested
//! secure protocol: `auto` keeps the TLS backend defaults, an explicit
//! version pins the minimum version the handshake may negotiate.

use std::fmt;
use std::str::FromStr;

use reqwest::tls::Version;
use reqwest::{Client, ClientBuilder};
use tracing::debug;

use super::constants::CONNECT_TIMEOUT;
use super::error::DownloadError;
use crate::user_agent;

/// Secure protocol selection for HTTPS connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SecureProtocol {
    /// Let the TLS backend negotiate.
    #[default]
    Auto,
    /// TLS 1.0 or newer.
    TlsV1_0,
    /// TLS 1.1 or newer.
    TlsV1_1,
    /// TLS 1.2 or newer.
    TlsV1_2,
    /// TLS 1.3 only.
    TlsV1_3,
}

impl SecureProtocol {
    /// Minimum TLS version to enforce, `None` for [`SecureProtocol::Auto`].
    #[must_use]
    pub fn min_tls_version(self) -> Option<Version> {
        match self {
            Self::Auto => None,
            Self::TlsV1_0 => Some(Version::TLS_1_0),
            Self::TlsV1_1 => Some(Version::TLS_1_1),
            Self::TlsV1_2 => Some(Version::TLS_1_2),
            Self::TlsV1_3 => Some(Version::TLS_1_3),
        }
    }
}

impl FromStr for SecureProtocol {
    type Err = DownloadError;

    /// Case-insensitive; the empty string means `auto`. SSLv2 and SSLv3 are
    /// not supported by any backend and are rejected with everything else.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "" | "auto" => Ok(Self::Auto),
            "tlsv1" | "tlsv1_0" => Ok(Self::TlsV1_0),
            "tlsv1_1" => Ok(Self::TlsV1_1),
            "tlsv1_2" => Ok(Self::TlsV1_2),
            "tlsv1_3" => Ok(Self::TlsV1_3),
            _ => Err(DownloadError::unknown_secure_protocol(value)),
        }
    }
}

impl fmt::Display for SecureProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Auto => "auto",
            Self::TlsV1_0 => "TLSv1",
            Self::TlsV1_1 => "TLSv1_1",
            Self::TlsV1_2 => "TLSv1_2",
            Self::TlsV1_3 => "TLSv1_3",
        })
    }
}

/// Builds the HTTP client every download of a run shares.
pub trait TransportBuilder: Send + Sync + fmt::Debug {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Applies this transport's settings to a client builder.
    fn configure(&self, builder: ClientBuilder) -> ClientBuilder;

    /// Builds the client.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::ClientBuild`] if the TLS backend or resolver
    /// cannot be initialised with these settings.
    fn build(&self) -> Result<Client, DownloadError> {
        debug!(transport = self.name(), "building HTTP client");
        self.configure(base_client_builder())
            .build()
            .map_err(DownloadError::client_build)
    }
}

/// Shared settings: User-Agent and connect timeout, no overall deadline.
///
/// The transfer loop bounds each chunk read itself; a whole-request timeout
/// would cut off large but healthy downloads.
fn base_client_builder() -> ClientBuilder {
    Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .user_agent(user_agent::default_user_agent())
}

/// Backend TLS defaults, optionally skipping certificate checks.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultTransport {
    insecure: bool,
}

impl DefaultTransport {
    /// Creates the default transport.
    #[must_use]
    pub fn new(insecure: bool) -> Self {
        Self { insecure }
    }
}

impl TransportBuilder for DefaultTransport {
    fn name(&self) -> &'static str {
        "default"
    }

    fn configure(&self, builder: ClientBuilder) -> ClientBuilder {
        builder.danger_accept_invalid_certs(self.insecure)
    }
}

/// Default transport plus a pinned minimum TLS version.
#[derive(Debug, Clone, Copy)]
pub struct PolicyTransport {
    inner: DefaultTransport,
    protocol: SecureProtocol,
}

impl PolicyTransport {
    /// Creates a transport enforcing `protocol` as the TLS floor.
    #[must_use]
    pub fn new(protocol: SecureProtocol, insecure: bool) -> Self {
        Self {
            inner: DefaultTransport::new(insecure),
            protocol,
        }
    }

    /// The enforced protocol.
    #[must_use]
    pub fn protocol(&self) -> SecureProtocol {
        self.protocol
    }
}

impl TransportBuilder for PolicyTransport {
    fn name(&self) -> &'static str {
        "tls-policy"
    }

    fn configure(&self, builder: ClientBuilder) -> ClientBuilder {
        let builder = self.inner.configure(builder);
        match self.protocol.min_tls_version() {
            Some(version) => builder.min_tls_version(version),
            None => builder,
        }
    }
}

/// Picks the transport for a secure protocol setting.
///
/// # Errors
///
/// Returns [`DownloadError::UnknownSecureProtocol`] for unsupported values;
/// no request is made in that case.
pub fn select_transport(
    protocol: &str,
    insecure: bool,
) -> Result<Box<dyn TransportBuilder>, DownloadError> {
    let transport: Box<dyn TransportBuilder> = match protocol.parse::<SecureProtocol>()? {
        SecureProtocol::Auto => Box::new(DefaultTransport::new(insecure)),
        pinned => Box::new(PolicyTransport::new(pinned, insecure)),
    };
    debug!(transport = transport.name(), protocol, insecure, "selected transport");
    Ok(transport)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_secure_protocol_values() {
        assert_eq!("auto".parse::<SecureProtocol>().unwrap(), SecureProtocol::Auto);
        assert_eq!("".parse::<SecureProtocol>().unwrap(), SecureProtocol::Auto);
        assert_eq!("TLSv1".parse::<SecureProtocol>().unwrap(), SecureProtocol::TlsV1_0);
        assert_eq!("tlsv1_1".parse::<SecureProtocol>().unwrap(), SecureProtocol::TlsV1_1);
        assert_eq!("TLSv1_2".parse::<SecureProtocol>().unwrap(), SecureProtocol::TlsV1_2);
        assert_eq!("TLSV1_3".parse::<SecureProtocol>().unwrap(), SecureProtocol::TlsV1_3);
    }

    #[test]
    fn test_legacy_ssl_is_rejected() {
        for value in ["SSLv2", "SSLv3", "tls9", "PFS"] {
            match value.parse::<SecureProtocol>() {
                Err(DownloadError::UnknownSecureProtocol { value: rejected }) => {
                    assert_eq!(rejected, value);
                }
                other => panic!("Expected UnknownSecureProtocol for {value}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_display_round_trips_through_parse() {
        for protocol in [
            SecureProtocol::Auto,
            SecureProtocol::TlsV1_0,
            SecureProtocol::TlsV1_2,
            SecureProtocol::TlsV1_3,
        ] {
            assert_eq!(protocol.to_string().parse::<SecureProtocol>().unwrap(), protocol);
        }
    }

    #[test]
    fn test_select_transport_by_protocol() {
        assert_eq!(select_transport("auto", false).unwrap().name(), "default");
        assert_eq!(select_transport("TLSv1_2", true).unwrap().name(), "tls-policy");
        assert!(matches!(
            select_transport("SSLv3", false),
            Err(DownloadError::UnknownSecureProtocol { .. })
        ));
    }

    #[test]
    fn test_auto_has_no_tls_floor() {
        assert!(SecureProtocol::Auto.min_tls_version().is_none());
        assert_eq!(
            SecureProtocol::TlsV1_2.min_tls_version(),
            Some(Version::TLS_1_2)
        );
    }

    #[test]
    fn test_default_transport_builds_client() {
        let client = DefaultTransport::new(false).build();
        assert!(client.is_ok());
    }
}
