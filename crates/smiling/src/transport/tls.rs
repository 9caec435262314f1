use std::sync::Arc;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{CryptoProvider, ring};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, SignatureScheme};

use super::{ConnectionTrace, TransportOverrides};
use crate::DownloadError;

/// Certificate verifier that checks the chain against the logical host even
/// when the handshake presented an override name.
#[derive(Debug)]
pub struct OverrideVerifier {
    inner: Arc<dyn ServerCertVerifier>,
    overrides: Arc<TransportOverrides>,
    trace: Arc<ConnectionTrace>,
}

impl OverrideVerifier {
    pub fn new(
        inner: Arc<dyn ServerCertVerifier>,
        overrides: Arc<TransportOverrides>,
        trace: Arc<ConnectionTrace>,
    ) -> Self {
        Self {
            inner,
            overrides,
            trace,
        }
    }

    /// Name the certificate must be valid for, if it differs from the presented one.
    fn expected_name(
        &self,
        presented: &ServerName<'_>,
    ) -> Result<Option<ServerName<'static>>, rustls::Error> {
        let ServerName::DnsName(dns_name) = presented else {
            return Ok(None);
        };
        let presented = dns_name.as_ref();
        let logical = self.overrides.logical_host(presented);
        self.trace.record(logical, "start_tls", presented);
        if logical == presented {
            return Ok(None);
        }
        ServerName::try_from(logical.to_owned())
            .map(Some)
            .map_err(|e| rustls::Error::General(format!("invalid host name {logical}: {e}")))
    }
}

impl ServerCertVerifier for OverrideVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        server_name: &ServerName<'_>,
        ocsp_response: &[u8],
        now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        let expected = self.expected_name(server_name)?;
        let name: &ServerName<'_> = match &expected {
            Some(logical) => logical,
            None => server_name,
        };
        self.inner
            .verify_server_cert(end_entity, intermediates, name, ocsp_response, now)
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        self.inner.verify_tls12_signature(message, cert, dss)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        self.inner.verify_tls13_signature(message, cert, dss)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.inner.supported_verify_schemes()
    }
}

/// TLS configuration whose verifier honours the override table.
pub fn build_tls_config(
    overrides: Arc<TransportOverrides>,
    trace: Arc<ConnectionTrace>,
) -> Result<ClientConfig, DownloadError> {
    let provider: Arc<CryptoProvider> = Arc::new(ring::default_provider());
    let platform = rustls_platform_verifier::Verifier::new(Arc::clone(&provider))
        .map_err(|e| DownloadError::Tls(format!("platform verifier unavailable: {e}")))?;
    let verifier = OverrideVerifier::new(Arc::new(platform), overrides, trace);

    let tls_config = ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(|e| DownloadError::Tls(format!("unsupported protocol versions: {e}")))?
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(verifier))
        .with_no_client_auth();
    Ok(tls_config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::HashMap;

    #[derive(Debug, Default)]
    struct RecordingVerifier {
        names: Mutex<Vec<String>>,
    }

    impl ServerCertVerifier for RecordingVerifier {
        fn verify_server_cert(
            &self,
            _end_entity: &CertificateDer<'_>,
            _intermediates: &[CertificateDer<'_>],
            server_name: &ServerName<'_>,
            _ocsp_response: &[u8],
            _now: UnixTime,
        ) -> Result<ServerCertVerified, rustls::Error> {
            if let ServerName::DnsName(name) = server_name {
                self.names.lock().push(name.as_ref().to_owned());
            }
            Ok(ServerCertVerified::assertion())
        }

        fn verify_tls12_signature(
            &self,
            _message: &[u8],
            _cert: &CertificateDer<'_>,
            _dss: &DigitallySignedStruct,
        ) -> Result<HandshakeSignatureValid, rustls::Error> {
            Ok(HandshakeSignatureValid::assertion())
        }

        fn verify_tls13_signature(
            &self,
            _message: &[u8],
            _cert: &CertificateDer<'_>,
            _dss: &DigitallySignedStruct,
        ) -> Result<HandshakeSignatureValid, rustls::Error> {
            Ok(HandshakeSignatureValid::assertion())
        }

        fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
            vec![SignatureScheme::ED25519]
        }
    }

    #[test]
    fn test_certificate_checked_against_logical_host() {
        let overrides = TransportOverrides::new(
            HashMap::from([("asset.example.com".to_owned(), "203.0.113.7".to_owned())]),
            HashMap::from([("asset.example.com".to_owned(), "cdn.example.net".to_owned())]),
        )
        .unwrap();
        let inner = Arc::new(RecordingVerifier::default());
        let verifier = OverrideVerifier::new(
            inner.clone(),
            Arc::new(overrides),
            Arc::new(ConnectionTrace::new()),
        );

        let cert = CertificateDer::from(vec![0u8; 4]);
        for presented in ["cdn.example.net", "plain.example.org"] {
            let name = ServerName::try_from(presented).unwrap();
            verifier
                .verify_server_cert(&cert, &[], &name, &[], UnixTime::now())
                .unwrap();
        }

        assert_eq!(
            *inner.names.lock(),
            vec!["asset.example.com".to_owned(), "plain.example.org".to_owned()]
        );
        assert_eq!(
            verifier.supported_verify_schemes(),
            vec![SignatureScheme::ED25519]
        );
    }
}
