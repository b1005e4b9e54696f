//! rustls connectors for the source and target pools.
//!
//! `require` encrypts but accepts any server certificate, as libpq does.
//! `verify-ca` and `verify-full` check the chain against the webpki roots.
//! rustls cannot skip the hostname check, so `verify-ca` is `verify-full`.

use std::sync::Arc;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{self, CryptoProvider};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{
    ClientConfig, ConfigBuilder, DigitallySignedStruct, RootCertStore, SignatureScheme,
    WantsVerifier,
};
use tokio_postgres_rustls::MakeRustlsConnect;
use tracing::warn;

use crate::config::SslMode;
use crate::error::{MigrateError, Result};

/// Connector for `mode`, or None when TLS is disabled.
///
/// `server` only labels the log lines.
pub fn connector(mode: SslMode, server: &str) -> Result<Option<MakeRustlsConnect>> {
    let config = match mode {
        SslMode::Disable => return Ok(None),
        SslMode::Require => {
            warn!(
                "{}: ssl_mode=require does not verify the server certificate",
                server
            );
            unverified_config()?
        }
        SslMode::VerifyCa => {
            warn!("{}: ssl_mode=verify-ca also verifies the hostname", server);
            verified_config()?
        }
        SslMode::VerifyFull => verified_config()?,
    };
    Ok(Some(MakeRustlsConnect::new(config)))
}

// Pinned to ring whichever providers other crates enable.
fn ring() -> Arc<CryptoProvider> {
    Arc::new(crypto::ring::default_provider())
}

fn builder(provider: Arc<CryptoProvider>) -> Result<ConfigBuilder<ClientConfig, WantsVerifier>> {
    ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(|e| MigrateError::Config(format!("TLS setup failed: {}", e)))
}

fn verified_config() -> Result<ClientConfig> {
    let roots = RootCertStore {
        roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
    };
    Ok(builder(ring())?
        .with_root_certificates(roots)
        .with_no_client_auth())
}

fn unverified_config() -> Result<ClientConfig> {
    let provider = ring();
    let verifier = AnyServerCert {
        provider: provider.clone(),
    };
    Ok(builder(provider)?
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(verifier))
        .with_no_client_auth())
}

/// Trusts any certificate chain. Handshake signatures are still checked.
#[derive(Debug)]
struct AnyServerCert {
    provider: Arc<CryptoProvider>,
}

impl ServerCertVerifier for AnyServerCert {
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
        crypto::verify_tls12_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        crypto::verify_tls13_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}
