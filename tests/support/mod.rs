//! Shared fixtures: a throwaway mutual-TLS certificate set and a minimal
//! HTTPS cluster endpoint for exercising the gateway's upstream path end to
//! end.

use rcgen::{BasicConstraints, Certificate, CertificateParams, IsCa};
use std::io::Write;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio_rustls::rustls;
use tokio_rustls::TlsAcceptor;

/// Freshly minted CA plus server and client certificates for 127.0.0.1.
pub struct TestTls {
    pub ca_pem: String,
    pub client_cert_pem: String,
    pub client_key_pem: String,
    server_cert_der: Vec<u8>,
    server_key_der: Vec<u8>,
}

pub fn mint_certificates() -> TestTls {
    let mut ca_params = CertificateParams::new(Vec::<String>::new());
    ca_params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
    let ca = Certificate::from_params(ca_params).unwrap();

    let server = Certificate::from_params(CertificateParams::new(vec![
        "127.0.0.1".to_string(),
        "localhost".to_string(),
    ]))
    .unwrap();

    let client =
        Certificate::from_params(CertificateParams::new(vec!["gateway-client".to_string()]))
            .unwrap();

    TestTls {
        ca_pem: ca.serialize_pem().unwrap(),
        client_cert_pem: client.serialize_pem_with_signer(&ca).unwrap(),
        client_key_pem: client.serialize_private_key_pem(),
        server_cert_der: server.serialize_der_with_signer(&ca).unwrap(),
        server_key_der: server.serialize_private_key_der(),
    }
}

/// A running fake cluster endpoint: its port and the request paths it saw.
pub struct UpstreamFixture {
    pub port: u16,
    requests: Arc<Mutex<Vec<String>>>,
}

impl UpstreamFixture {
    pub fn seen_paths(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

/// Serve a minimal HTTPS cluster API on an ephemeral port.
///
/// Routes: the floor version endpoint reports `ApiVersion` 1.41; log follows
/// for the container `missing` are rejected with a 404 body; other log
/// follows stream one multiplexed stdout frame; anything else is answered
/// with a marker header and a JSON body so mirroring can be asserted.
pub async fn spawn_tls_upstream(tls: &TestTls) -> UpstreamFixture {
    let config = rustls::ServerConfig::builder()
        .with_safe_defaults()
        .with_no_client_auth()
        .with_single_cert(
            vec![rustls::Certificate(tls.server_cert_der.clone())],
            rustls::PrivateKey(tls.server_key_der.clone()),
        )
        .unwrap();
    let acceptor = TlsAcceptor::from(Arc::new(config));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let requests = Arc::new(Mutex::new(Vec::new()));

    let seen = requests.clone();
    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                break;
            };
            let acceptor = acceptor.clone();
            let seen = seen.clone();
            tokio::spawn(async move {
                let Ok(mut stream) = acceptor.accept(stream).await else {
                    return;
                };

                let Some(path) = read_request_path(&mut stream).await else {
                    return;
                };
                seen.lock().unwrap().push(path.clone());

                let _ = stream.write_all(&respond(&path)).await;
                let _ = stream.shutdown().await;
            });
        }
    });

    UpstreamFixture { port, requests }
}

async fn read_request_path<S: AsyncReadExt + Unpin>(stream: &mut S) -> Option<String> {
    let mut head = Vec::new();
    let mut buf = [0u8; 1024];
    while !head.windows(4).any(|w| w == b"\r\n\r\n") {
        match stream.read(&mut buf).await {
            Ok(0) | Err(_) => return None,
            Ok(n) => head.extend_from_slice(&buf[..n]),
        }
    }
    let request = String::from_utf8_lossy(&head);
    request.split_whitespace().nth(1).map(str::to_string)
}

fn respond(path: &str) -> Vec<u8> {
    if path.starts_with("/v1.14/version") {
        return http_response("200 OK", "application/json", "", br#"{"ApiVersion":"1.41"}"#);
    }

    if path.contains("/containers/missing/logs") {
        return http_response("404 Not Found", "text/plain", "", b"No such container: missing");
    }

    if path.contains("/logs") {
        // One multiplexed stdout frame: header byte 1, length 5, "hello".
        let frame = [&[1u8, 0, 0, 0, 0, 0, 0, 5][..], b"hello"].concat();
        return http_response("200 OK", "application/octet-stream", "", &frame);
    }

    http_response(
        "200 OK",
        "application/json",
        "x-upstream-fixture: mirrored\r\n",
        br#"{"containers":[]}"#,
    )
}

fn http_response(status: &str, content_type: &str, extra_headers: &str, body: &[u8]) -> Vec<u8> {
    let mut response = Vec::new();
    write!(
        response,
        "HTTP/1.1 {}\r\ncontent-type: {}\r\n{}content-length: {}\r\nconnection: close\r\n\r\n",
        status,
        content_type,
        extra_headers,
        body.len()
    )
    .unwrap();
    response.extend_from_slice(body);
    response
}

/// Build a credential archive whose bundle points at the given endpoint.
pub fn credentials_zip(ca: &str, cert: &str, key: &str, port: u16) -> Vec<u8> {
    let env = format!("DOCKER_HOST=tcp://127.0.0.1:{}\n", port);
    let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    for (name, contents) in [
        ("acme/ca.pem", ca),
        ("acme/cert.pem", cert),
        ("acme/key.pem", key),
        ("acme/docker.env", env.as_str()),
    ] {
        writer
            .start_file(name, zip::write::FileOptions::default())
            .unwrap();
        writer.write_all(contents.as_bytes()).unwrap();
    }
    writer.finish().unwrap().into_inner()
}
