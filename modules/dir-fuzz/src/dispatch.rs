//! Sends one raw request to the captured service and collects the raw response.

use crate::http::{find_head_end, header_value, parse_response};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use pathfuzz_core::{HttpService, Scheme};
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{verify_tls12_signature, verify_tls13_signature, CryptoProvider};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, SignatureScheme};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_rustls::TlsConnector;
use tracing::debug;

/// Upper bound on a collected response; larger bodies are truncated.
pub const MAX_RESPONSE_BYTES: usize = 16 * 1024 * 1024;

/// Transport for templated requests. `None` means no response, whatever the cause.
#[async_trait]
pub trait Dispatch: Send + Sync {
    async fn send(&self, service: &HttpService, request: &[u8]) -> Option<Vec<u8>>;
}

#[derive(Debug, Clone)]
pub struct DispatchOptions {
    pub timeout_ms: u64,
    pub insecure: bool,
}

impl Default for DispatchOptions {
    fn default() -> Self {
        DispatchOptions { timeout_ms: 10_000, insecure: false }
    }
}

/// Plain TCP or TLS, one connection per request. Every connect, handshake, write and
/// read is bounded by the configured timeout.
pub struct TcpDispatcher {
    timeout: Duration,
    tls: Arc<ClientConfig>,
}

impl TcpDispatcher {
    pub fn new(opts: DispatchOptions) -> Self {
        TcpDispatcher { timeout: Duration::from_millis(opts.timeout_ms.max(1)), tls: tls_config(opts.insecure) }
    }

    async fn exchange(&self, service: &HttpService, request: &[u8]) -> Result<Vec<u8>> {
        let addr = (service.host.as_str(), service.port);
        let tcp = timeout(self.timeout, TcpStream::connect(addr)).await??;
        match service.scheme {
            Scheme::Http => round_trip(tcp, request, self.timeout).await,
            Scheme::Https => {
                let server_name = match service.host.parse::<std::net::IpAddr>() {
                    Ok(ip) => ServerName::IpAddress(ip.into()),
                    Err(_) => ServerName::try_from(service.host.clone()).map_err(|_| anyhow!("invalid server name"))?,
                };
                let connector = TlsConnector::from(self.tls.clone());
                let tls = timeout(self.timeout, connector.connect(server_name, tcp)).await??;
                round_trip(tls, request, self.timeout).await
            }
        }
    }
}

#[async_trait]
impl Dispatch for TcpDispatcher {
    async fn send(&self, service: &HttpService, request: &[u8]) -> Option<Vec<u8>> {
        match self.exchange(service, request).await {
            Ok(raw) => Some(raw),
            Err(e) => {
                debug!(%service, error = %e, "no response");
                None
            }
        }
    }
}

async fn round_trip<S>(mut stream: S, request: &[u8], io_timeout: Duration) -> Result<Vec<u8>>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    timeout(io_timeout, stream.write_all(request)).await??;
    timeout(io_timeout, stream.flush()).await??;

    let mut buf = Vec::with_capacity(8192);
    let mut chunk = vec![0u8; 8192];
    let mut head_end = None;
    let mut framing = Framing::UntilEof;
    let head_only = request.starts_with(b"HEAD ");

    loop {
        if head_end.is_none() {
            if let Some(end) = find_head_end(&buf) {
                head_end = Some(end);
                framing = framing_of(&buf[..end], head_only);
            }
        }
        if let Some(end) = head_end {
            if framing.complete(&buf, end) {
                break;
            }
        }
        if buf.len() >= MAX_RESPONSE_BYTES {
            buf.truncate(MAX_RESPONSE_BYTES);
            break;
        }
        let n = match timeout(io_timeout, stream.read(&mut chunk)).await {
            Ok(Ok(n)) => n,
            // peers commonly drop TLS without close_notify once the body is sent
            Ok(Err(_)) if !buf.is_empty() => 0,
            Ok(Err(e)) => return Err(e.into()),
            Err(_) if !buf.is_empty() => {
                debug!(bytes = buf.len(), "read timed out, keeping what arrived");
                0
            }
            Err(e) => return Err(e.into()),
        };
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    if buf.is_empty() {
        return Err(anyhow!("connection closed without a response"));
    }
    Ok(buf)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Framing {
    NoBody,
    Length(usize),
    Chunked,
    UntilEof,
}

impl Framing {
    fn complete(&self, buf: &[u8], head_end: usize) -> bool {
        match *self {
            Framing::NoBody => true,
            Framing::Length(n) => buf.len() >= head_end + n,
            Framing::Chunked => chunked_len(&buf[head_end..]).is_some(),
            Framing::UntilEof => false,
        }
    }
}

/// Length of a complete chunked body including its trailer section, or `None` while more
/// bytes are needed. Chunk extensions are ignored; a size line that is not hex also yields
/// `None`, leaving the read to EOF or timeout.
fn chunked_len(body: &[u8]) -> Option<usize> {
    let mut pos = 0;
    loop {
        let line_end = pos + line_len(&body[pos..])?;
        let line = std::str::from_utf8(&body[pos..line_end]).ok()?;
        let size_text = line.split(';').next().unwrap_or("").trim();
        let size = usize::from_str_radix(size_text, 16).ok()?;
        pos = line_end + 2;
        if size == 0 {
            break;
        }
        pos = pos.checked_add(size)?.checked_add(2)?;
        if body.len() < pos {
            return None;
        }
    }
    // trailer fields, then the blank line
    loop {
        let n = line_len(&body[pos..])?;
        pos += n + 2;
        if n == 0 {
            return Some(pos);
        }
    }
}

/// Bytes before the next CRLF.
fn line_len(bytes: &[u8]) -> Option<usize> {
    bytes.windows(2).position(|w| w == b"\r\n")
}

fn framing_of(head: &[u8], head_only: bool) -> Framing {
    let status = parse_response(head).map(|h| h.status).unwrap_or(0);
    if head_only || (100..200).contains(&status) || status == 204 || status == 304 {
        return Framing::NoBody;
    }
    let text = String::from_utf8_lossy(head);
    if header_value(&text, "transfer-encoding").map(|v| v.to_ascii_lowercase().contains("chunked")).unwrap_or(false) {
        return Framing::Chunked;
    }
    match header_value(&text, "content-length").and_then(|v| v.parse::<usize>().ok()) {
        Some(n) => Framing::Length(n),
        None => Framing::UntilEof,
    }
}

fn tls_config(insecure: bool) -> Arc<ClientConfig> {
    // Ensure a crypto provider is installed (ring)
    let _ = CryptoProvider::install_default(rustls::crypto::ring::default_provider());
    let mut config = if insecure {
        ClientConfig::builder()
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(AcceptAnyCert(Arc::new(rustls::crypto::ring::default_provider()))))
            .with_no_client_auth()
    } else {
        let mut root_store = rustls::RootCertStore::empty();
        root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        ClientConfig::builder().with_root_certificates(root_store).with_no_client_auth()
    };
    config.alpn_protocols = vec![b"http/1.1".to_vec()];
    Arc::new(config)
}

/// Skips chain validation but still checks handshake signatures.
#[derive(Debug)]
struct AcceptAnyCert(Arc<CryptoProvider>);

impl ServerCertVerifier for AcceptAnyCert {
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
        verify_tls12_signature(message, cert, dss, &self.0.signature_verification_algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(message, cert, dss, &self.0.signature_verification_algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.0.signature_verification_algorithms.supported_schemes()
    }
}
