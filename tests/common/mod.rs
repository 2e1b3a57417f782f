//! Shared utilities for integration and load testing.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use edge_gateway::config::{GatewayConfig, RouteConfig};
use edge_gateway::lifecycle::{bootstrap, Shutdown};
use futures_util::{SinkExt, StreamExt};
use rustls::pki_types::{CertificateDer, ServerName};
use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_rustls::client::TlsStream;
use tokio_rustls::TlsConnector;

/// Host name the test certificate is issued for.
pub const CANONICAL_HOST: &str = "gateway.test";

/// Self-signed certificate written to a temporary directory.
pub struct TestCert {
    pub dir: TempDir,
    pub cert_pem: String,
    pub cert_der: CertificateDer<'static>,
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
}

impl TestCert {
    pub fn generate() -> Self {
        let certified =
            rcgen::generate_simple_self_signed(vec![CANONICAL_HOST.to_string(), "localhost".to_string()]).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let cert_path = dir.path().join("fullchain.pem");
        let key_path = dir.path().join("privkey.pem");
        std::fs::write(&cert_path, certified.cert.pem()).unwrap();
        std::fs::write(&key_path, certified.key_pair.serialize_pem()).unwrap();

        Self {
            cert_pem: certified.cert.pem(),
            cert_der: certified.cert.der().clone(),
            dir,
            cert_path,
            key_path,
        }
    }
}

/// A running gateway on ephemeral ports.
pub struct TestGateway {
    pub http_addr: SocketAddr,
    pub https_addr: SocketAddr,
    pub shutdown: Shutdown,
    pub cert: TestCert,
    pub handle: tokio::task::JoinHandle<()>,
}

impl TestGateway {
    /// `https://gateway.test:<port><path>`, resolved to the local listener.
    pub fn url(&self, path: &str) -> String {
        format!("https://{}:{}{}", CANONICAL_HOST, self.https_addr.port(), path)
    }

    /// HTTPS client trusting the test certificate.
    pub fn client(&self) -> reqwest::Client {
        self.client_builder().build().unwrap()
    }

    pub fn client_builder(&self) -> reqwest::ClientBuilder {
        reqwest::Client::builder()
            .add_root_certificate(reqwest::Certificate::from_pem(self.cert.cert_pem.as_bytes()).unwrap())
            .resolve(CANONICAL_HOST, self.https_addr)
            .redirect(reqwest::redirect::Policy::none())
            .no_proxy()
    }

    /// Open a TLS connection negotiating HTTP/1.1 only.
    pub async fn tls_connect(&self) -> TlsStream<TcpStream> {
        let mut roots = rustls::RootCertStore::empty();
        roots.add(self.cert.cert_der.clone()).unwrap();
        let mut config = rustls::ClientConfig::builder_with_provider(Arc::new(
            rustls::crypto::aws_lc_rs::default_provider(),
        ))
        .with_safe_default_protocol_versions()
        .unwrap()
        .with_root_certificates(roots)
        .with_no_client_auth();
        config.alpn_protocols = vec![b"http/1.1".to_vec()];

        let stream = TcpStream::connect(self.https_addr).await.unwrap();
        let name = ServerName::try_from(CANONICAL_HOST).unwrap();
        TlsConnector::from(Arc::new(config)).connect(name, stream).await.unwrap()
    }

    /// Send a raw HTTP/1.1 request head over TLS and return the whole response.
    pub async fn raw_request(&self, method: &str, target: &str) -> String {
        let mut stream = self.tls_connect().await;
        let request = format!(
            "{} {} HTTP/1.1\r\nHost: {}\r\nConnection: close\r\n\r\n",
            method, target, CANONICAL_HOST
        );
        stream.write_all(request.as_bytes()).await.unwrap();
        let mut response = Vec::new();
        let _ = stream.read_to_end(&mut response).await;
        String::from_utf8_lossy(&response).into_owned()
    }
}

/// Gateway config bound to ephemeral local ports with the given routes.
pub fn test_config(cert: &TestCert, routes: Vec<RouteConfig>) -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.server.canonical_host = CANONICAL_HOST.to_string();
    config.server.http_address = "127.0.0.1:0".to_string();
    config.server.https_address = "127.0.0.1:0".to_string();
    config.server.tls.cert_path = cert.cert_path.to_string_lossy().into_owned();
    config.server.tls.key_path = cert.key_path.to_string_lossy().into_owned();
    config.timeouts.connect_secs = 1;
    config.timeouts.response_secs = 2;
    config.timeouts.shutdown_grace_secs = 1;
    config.routes = routes;
    config
}

/// Start a gateway serving `routes`; `tweak` adjusts the config first.
pub async fn spawn_gateway<F>(routes: Vec<RouteConfig>, tweak: F) -> TestGateway
where
    F: FnOnce(&mut GatewayConfig),
{
    let cert = TestCert::generate();
    let mut config = test_config(&cert, routes);
    tweak(&mut config);

    let shutdown = Shutdown::new();
    let gateway = bootstrap(config, shutdown.clone()).await.unwrap();
    let http_addr = gateway.http_addr().unwrap();
    let https_addr = gateway.https_addr().unwrap();
    let handle = tokio::spawn(gateway.run());

    TestGateway {
        http_addr,
        https_addr,
        shutdown,
        cert,
        handle,
    }
}

/// Start a simple mock backend that returns a fixed response.
pub async fn start_mock_backend(response: &'static str) -> SocketAddr {
    start_programmable_backend(move |_| async move { (200, response.to_string()) }).await
}

/// Start a programmable mock backend. `f` receives the raw request
/// (head and decoded body) and returns status and body.
pub async fn start_programmable_backend<F, Fut>(f: F) -> SocketAddr
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((socket, _)) => {
                    let f = f.clone();
                    tokio::spawn(async move {
                        let mut reader = BufReader::new(socket);
                        let Some(request) = read_request(&mut reader).await else {
                            return;
                        };
                        let (status, body) = f(request).await;
                        let status_text = match status {
                            200 => "200 OK",
                            404 => "404 Not Found",
                            500 => "500 Internal Server Error",
                            503 => "503 Service Unavailable",
                            _ => "200 OK",
                        };
                        let response = format!(
                            "HTTP/1.1 {}\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            status_text,
                            body.len(),
                            body
                        );
                        let mut socket = reader.into_inner();
                        let _ = socket.write_all(response.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}

/// Backend that answers with the request it received: head, blank line, body.
pub async fn start_echo_backend() -> SocketAddr {
    start_programmable_backend(|request| async move { (200, request) }).await
}

/// Backend that accepts and reads the request but waits `delay` before answering.
pub async fn start_slow_backend(delay: Duration) -> SocketAddr {
    start_programmable_backend(move |_| async move {
        tokio::time::sleep(delay).await;
        (200, "late".to_string())
    })
    .await
}

/// Backend that accepts a connection and closes it without answering.
pub async fn start_hangup_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            drop(socket);
        }
    });
    addr
}

/// Backend that reads the request, writes `response` verbatim and then
/// keeps the connection open without sending anything else.
pub async fn start_stalling_backend(response: &'static str) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut reader = BufReader::new(socket);
                if read_request(&mut reader).await.is_none() {
                    return;
                }
                let mut socket = reader.into_inner();
                if socket.write_all(response.as_bytes()).await.is_err() {
                    return;
                }
                let mut buf = [0u8; 64];
                while matches!(socket.read(&mut buf).await, Ok(n) if n > 0) {}
            });
        }
    });
    addr
}

/// Backend that never answers. Each time a connection that carried a
/// request is closed by the peer, the close time is sent on the channel.
pub async fn start_disconnect_recording_backend() -> (SocketAddr, mpsc::UnboundedReceiver<Instant>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (closed_tx, closed_rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            let closed_tx = closed_tx.clone();
            tokio::spawn(async move {
                let mut reader = BufReader::new(socket);
                if read_request(&mut reader).await.is_none() {
                    return;
                }
                let mut socket = reader.into_inner();
                let mut buf = [0u8; 64];
                while matches!(socket.read(&mut buf).await, Ok(n) if n > 0) {}
                let _ = closed_tx.send(Instant::now());
            });
        }
    });
    (addr, closed_rx)
}

/// WebSocket backend echoing every text and binary message.
pub async fn start_websocket_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let Ok(mut ws) = tokio_tungstenite::accept_async(socket).await else {
                    return;
                };
                while let Some(Ok(message)) = ws.next().await {
                    if message.is_text() || message.is_binary() {
                        if ws.send(message).await.is_err() {
                            break;
                        }
                    } else if message.is_close() {
                        break;
                    }
                }
            });
        }
    });
    addr
}

/// An address nothing listens on.
pub async fn closed_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

/// Read one HTTP/1.1 request: head plus a `Content-Length` or chunked body.
async fn read_request(reader: &mut BufReader<TcpStream>) -> Option<String> {
    let mut head = String::new();
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line).await.ok()? == 0 {
            return None;
        }
        let done = line == "\r\n";
        head.push_str(&line);
        if done {
            break;
        }
    }

    let lower = head.to_ascii_lowercase();
    let mut body = Vec::new();
    if let Some(length) = header_value(&lower, "content-length").and_then(|v| v.parse::<usize>().ok()) {
        body.resize(length, 0);
        reader.read_exact(&mut body).await.ok()?;
    } else if header_value(&lower, "transfer-encoding").is_some_and(|v| v.contains("chunked")) {
        loop {
            let mut size_line = String::new();
            reader.read_line(&mut size_line).await.ok()?;
            let size = usize::from_str_radix(size_line.trim().split(';').next()?, 16).ok()?;
            let mut chunk = vec![0u8; size + 2];
            reader.read_exact(&mut chunk).await.ok()?;
            if size == 0 {
                break;
            }
            body.extend_from_slice(&chunk[..size]);
        }
    }

    Some(format!("{}{}", head, String::from_utf8_lossy(&body)))
}

fn header_value<'a>(head: &'a str, name: &str) -> Option<&'a str> {
    head.lines().find_map(|line| {
        let (key, value) = line.split_once(':')?;
        (key.trim() == name).then(|| value.trim())
    })
}
