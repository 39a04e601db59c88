//! TLS setup for PostgreSQL connections.

use std::sync::Arc;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{verify_tls12_signature, verify_tls13_signature, CryptoProvider};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, SignatureScheme};
use tokio_postgres_rustls::MakeRustlsConnect;
use tracing::warn;

use crate::error::{EtlError, Result};

/// PostgreSQL `sslmode` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SslMode {
    /// Plain TCP.
    #[default]
    Disable,
    /// TLS without certificate verification.
    Require,
    /// TLS, certificate checked against the bundled roots.
    VerifyCa,
    /// TLS, certificate and hostname checked.
    VerifyFull,
}

impl SslMode {
    /// Parse an `ssl_mode` setting. Empty means disabled.
    pub fn parse(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "disable" | "" => Ok(SslMode::Disable),
            "require" => Ok(SslMode::Require),
            "verify-ca" => Ok(SslMode::VerifyCa),
            "verify-full" => Ok(SslMode::VerifyFull),
            other => Err(EtlError::Config(format!(
                "Invalid ssl_mode '{}'. Valid values: disable, require, verify-ca, verify-full",
                other
            ))),
        }
    }
}

/// rustls connector for `mode`, `None` when TLS is disabled.
pub fn tls_connector(mode: SslMode) -> Result<Option<MakeRustlsConnect>> {
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let builder = ClientConfig::builder_with_provider(provider.clone())
        .with_safe_default_protocol_versions()
        .map_err(|e| EtlError::Config(format!("TLS setup failed: {}", e)))?;

    let config = match mode {
        SslMode::Disable => return Ok(None),
        SslMode::Require => {
            warn!("ssl_mode=require does not verify the server certificate");
            builder
                .dangerous()
                .with_custom_certificate_verifier(Arc::new(UnverifiedCert { provider }))
                .with_no_client_auth()
        }
        SslMode::VerifyCa | SslMode::VerifyFull => {
            if mode == SslMode::VerifyCa {
                // rustls always checks the hostname as well.
                warn!("ssl_mode=verify-ca behaves like verify-full");
            }
            let mut roots = rustls::RootCertStore::empty();
            roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
            builder.with_root_certificates(roots).with_no_client_auth()
        }
    };

    Ok(Some(MakeRustlsConnect::new(config)))
}

/// `ssl_mode=require`: any certificate chain, handshake signatures still checked.
#[derive(Debug)]
struct UnverifiedCert {
    provider: Arc<CryptoProvider>,
}

impl ServerCertVerifier for UnverifiedCert {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> std::result::Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(message, cert, dss, &self.provider.signature_verification_algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(message, cert, dss, &self.provider.signature_verification_algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ssl_mode_parsing() {
        assert_eq!(SslMode::parse("disable").unwrap(), SslMode::Disable);
        assert_eq!(SslMode::parse("REQUIRE").unwrap(), SslMode::Require);
        assert_eq!(SslMode::parse("verify-ca").unwrap(), SslMode::VerifyCa);
        assert_eq!(SslMode::parse("verify-full").unwrap(), SslMode::VerifyFull);
        assert_eq!(SslMode::parse("").unwrap(), SslMode::Disable);
        assert!(SslMode::parse("prefer").is_err());
    }

    #[test]
    fn test_disable_builds_no_connector() {
        assert!(tls_connector(SslMode::Disable).unwrap().is_none());
    }

    #[test]
    fn test_tls_modes_build_connector() {
        for mode in [SslMode::Require, SslMode::VerifyCa, SslMode::VerifyFull] {
            assert!(tls_connector(mode).unwrap().is_some(), "{:?}", mode);
        }
    }
}
