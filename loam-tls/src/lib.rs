//! TLS configs for loam clients and servers.
//!
//! Every `remote` endpoint speaks TLS. Clients trust the webpki roots by
//! default; self-signed server certs are accepted only behind an explicit
//! opt-in, used for test servers. TCP keep-alive on the underlying sockets
//! is configured by the REST client (see `loam_api::rest`), independently
//! of the application-level ping task.

use std::sync::Arc;

use anyhow::{bail, Context};
use loam_api::{Endpoint, Transport};
use rustls::pki_types::{
    pem::PemObject,
    CertificateDer, PrivateKeyDer,
};
use tracing::warn;

/// Assemble the client-side TLS config. `allow_self_signed` disables server
/// certificate verification entirely and must only be set when talking to
/// a test server.
pub fn client_config(allow_self_signed: bool) -> rustls::ClientConfig {
    let mut roots = rustls::RootCertStore::empty();
    roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    let mut config = rustls::ClientConfig::builder()
        .with_root_certificates(roots)
        .with_no_client_auth();

    if allow_self_signed {
        warn!("TLS server certificate verification is disabled");
        config
            .dangerous()
            .set_certificate_verifier(Arc::new(danger::AcceptAnyServerCert::new()));
    }

    config
}

/// Assemble the server-side TLS config from PEM-encoded cert chain and
/// private key, e.g. as read from the certificate files named at startup.
pub fn server_config_from_pem(
    cert_chain_pem: &[u8],
    key_pem: &[u8],
) -> anyhow::Result<rustls::ServerConfig> {
    let cert_chain = CertificateDer::pem_slice_iter(cert_chain_pem)
        .collect::<Result<Vec<_>, _>>()
        .context("Failed to parse PEM cert chain")?;
    let key =
        PrivateKeyDer::from_pem_slice(key_pem).context("Failed to parse PEM private key")?;

    rustls::ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(cert_chain, key)
        .context("Cert chain and key are inconsistent")
}

/// The base URL for dialing an endpoint. Only network transports are
/// dialable, and they are always `https`.
pub fn base_url(endpoint: &Endpoint) -> anyhow::Result<String> {
    match endpoint.transport {
        Transport::Remote | Transport::Gcp => Ok(format!("https://{}", endpoint.dial_addr())),
        Transport::InProcess | Transport::Unassigned =>
            bail!("endpoint {endpoint} is not dialable"),
    }
}

pub mod danger {
    //! A [`ServerCertVerifier`] that skips certificate validation. Opt-in
    //! only; see [`client_config`](super::client_config).

    use rustls::{
        client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier},
        crypto::WebPkiSupportedAlgorithms,
        pki_types::{CertificateDer, ServerName, UnixTime},
        DigitallySignedStruct, SignatureScheme,
    };

    /// Accepts any server certificate. Handshake signatures are still
    /// checked against the presented (unvalidated) certificate, so the
    /// session is at least bound to whoever holds its private key.
    #[derive(Debug)]
    pub struct AcceptAnyServerCert {
        algs: WebPkiSupportedAlgorithms,
    }

    impl AcceptAnyServerCert {
        #[allow(clippy::new_without_default)]
        pub fn new() -> Self {
            Self {
                algs: rustls::crypto::ring::default_provider().signature_verification_algorithms,
            }
        }
    }

    impl ServerCertVerifier for AcceptAnyServerCert {
        fn verify_server_cert(
            &self,
            _end_entity: &CertificateDer<'_>,
            _intermediates: &[CertificateDer<'_>],
            _server_name: &ServerName<'_>,
            _ocsp_response: &[u8],
            _now: UnixTime,
        ) -> Result<ServerCertVerified, rustls::Error> {
            Ok(ServerCertVerified::assertion())
        }

        fn verify_tls12_signature(
            &self,
            message: &[u8],
            cert: &CertificateDer<'_>,
            dss: &DigitallySignedStruct,
        ) -> Result<HandshakeSignatureValid, rustls::Error> {
            rustls::crypto::verify_tls12_signature(message, cert, dss, &self.algs)
        }

        fn verify_tls13_signature(
            &self,
            message: &[u8],
            cert: &CertificateDer<'_>,
            dss: &DigitallySignedStruct,
        ) -> Result<HandshakeSignatureValid, rustls::Error> {
            rustls::crypto::verify_tls13_signature(message, cert, dss, &self.algs)
        }

        fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
            self.algs.supported_schemes()
        }
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use anyhow::Context;
    use rustls::pki_types::ServerName;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    use super::*;

    /// Conduct a TLS handshake over a fake pair of connected streams.
    /// Returns the client and server results instead of panicking so that
    /// negative cases can be tested too.
    async fn do_tls_handshake(
        client_config: Arc<rustls::ClientConfig>,
        server_config: Arc<rustls::ServerConfig>,
        expected_dns: &str,
    ) -> [Result<(), String>; 2] {
        let (client_stream, server_stream) = tokio::io::duplex(4096);

        let client = async move {
            let connector = tokio_rustls::TlsConnector::from(client_config);
            let sni = ServerName::try_from(expected_dns.to_owned()).unwrap();
            let mut stream = connector
                .connect(sni, client_stream)
                .await
                .context("Client didn't connect")?;

            stream.write_all(b"hello").await.context("Write failed")?;
            stream.flush().await.context("Flush failed")?;
            stream.shutdown().await.context("Shutdown failed")?;

            let mut resp = Vec::new();
            stream.read_to_end(&mut resp).await.context("Read failed")?;
            assert_eq!(&resp, b"goodbye");

            Ok::<_, anyhow::Error>(())
        };

        let server = async move {
            let acceptor = tokio_rustls::TlsAcceptor::from(server_config);
            let mut stream = acceptor
                .accept(server_stream)
                .await
                .context("Server didn't accept")?;

            let mut req = Vec::new();
            stream.read_to_end(&mut req).await.context("Read failed")?;
            assert_eq!(&req, b"hello");

            stream.write_all(b"goodbye").await.context("Write failed")?;
            stream.shutdown().await.context("Shutdown failed")?;

            Ok::<_, anyhow::Error>(())
        };

        let (client_result, server_result) = tokio::join!(client, server);
        [
            client_result.map_err(|e| format!("{e:#}")),
            server_result.map_err(|e| format!("{e:#}")),
        ]
    }

    fn self_signed_server_config() -> Arc<rustls::ServerConfig> {
        let certified =
            rcgen::generate_simple_self_signed(vec!["testserver.example.com".to_owned()]).unwrap();
        let cert_pem = certified.cert.pem();
        let key_pem = certified.key_pair.serialize_pem();
        Arc::new(server_config_from_pem(cert_pem.as_bytes(), key_pem.as_bytes()).unwrap())
    }

    #[tokio::test]
    async fn self_signed_accepted_only_with_opt_in() {
        let server_config = self_signed_server_config();

        // Opted in: the handshake completes.
        let permissive = Arc::new(client_config(true));
        let [client_res, server_res] =
            do_tls_handshake(permissive, server_config.clone(), "testserver.example.com").await;
        client_res.unwrap();
        server_res.unwrap();

        // Default config: the self-signed cert is rejected.
        let strict = Arc::new(client_config(false));
        let [client_res, _server_res] =
            do_tls_handshake(strict, server_config, "testserver.example.com").await;
        assert!(client_res.is_err());
    }

    #[test]
    fn server_config_rejects_garbage_pem() {
        assert!(server_config_from_pem(b"not a cert", b"not a key").is_err());
    }

    #[test]
    fn base_urls() {
        let remote = Endpoint::parse("remote,dir.example.com:443").unwrap();
        assert_eq!(base_url(&remote).unwrap(), "https://dir.example.com:443");

        let prefixed = Endpoint::parse("remote,https://dir.example.com:443").unwrap();
        assert_eq!(base_url(&prefixed).unwrap(), "https://dir.example.com:443");

        let inprocess = Endpoint::parse("inprocess").unwrap();
        assert!(base_url(&inprocess).is_err());
    }
}
