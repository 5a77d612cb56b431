//! TLS settings for the in-band upgrade.

use rustls::pki_types::CertificateDer;

/// TLS configuration for MySQL connections.
///
/// MySQL negotiates TLS in-band: the client sends an SSLRequest packet on the
/// plain connection and then performs the handshake on the same socket.
#[derive(Clone, Debug, Default)]
#[non_exhaustive]
pub struct TlsConfig {
    /// Skip certificate chain and hostname validation.
    ///
    /// Handshake signatures are still checked. **Warning:** the server is not
    /// authenticated; use only against development servers.
    pub trust_server_certificate: bool,

    /// Root certificates to trust. If empty, the bundled webpki roots are used.
    pub root_certificates: Vec<CertificateDer<'static>>,

    /// Name sent as SNI and validated against the certificate.
    ///
    /// If not set, the host passed to the upgrade is used.
    pub server_name: Option<String>,
}

impl TlsConfig {
    /// Create a configuration that validates against the webpki roots.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Skip certificate validation.
    #[must_use]
    pub fn trust_server_certificate(mut self, trust: bool) -> Self {
        self.trust_server_certificate = trust;
        self
    }

    /// Trust `cert` as a root instead of the webpki roots.
    #[must_use]
    pub fn add_root_certificate(mut self, cert: CertificateDer<'static>) -> Self {
        self.root_certificates.push(cert);
        self
    }

    /// Override the name used for SNI and certificate validation.
    #[must_use]
    pub fn with_server_name(mut self, name: impl Into<String>) -> Self {
        self.server_name = Some(name.into());
        self
    }
}
