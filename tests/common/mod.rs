//! Shared utilities for integration tests.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use restcore::http::ServerError;
use restcore::HttpServer;

/// Credential the mock token backend accepts.
#[allow(dead_code)]
pub const GOOD_TOKEN: &str = "Bearer good-token";

/// Start a mock token backend on an ephemeral port.
///
/// `GET /verify` answers 200 for [`GOOD_TOKEN`] and 401 otherwise;
/// `GET /get_user` answers a JSON user for [`GOOD_TOKEN`] and 404 otherwise.
#[allow(dead_code)]
pub async fn start_token_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    tokio::spawn(async move {
                        let mut buf = vec![0u8; 4096];
                        let mut read = 0;
                        while !buf[..read].windows(4).any(|w| w == b"\r\n\r\n") {
                            match socket.read(&mut buf[read..]).await {
                                Ok(0) | Err(_) => return,
                                Ok(n) => read += n,
                            }
                        }
                        let head = String::from_utf8_lossy(&buf[..read]).to_string();
                        let path = head.split_whitespace().nth(1).unwrap_or("/").to_string();
                        let authorized = head.lines().any(|line| {
                            line.to_ascii_lowercase().starts_with("authorization:")
                                && line["authorization:".len()..].trim() == GOOD_TOKEN
                        });

                        let (status, body) = match (path.as_str(), authorized) {
                            ("/verify", true) => ("200 OK", String::new()),
                            ("/verify", false) => ("401 Unauthorized", String::new()),
                            ("/get_user", true) => ("200 OK", r#"{"id":7,"name":"alice"}"#.to_string()),
                            _ => ("404 Not Found", String::new()),
                        };
                        let response_str = format!(
                            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            status,
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response_str.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}

/// Run `server` on an ephemeral port and wait until it accepts connections.
#[allow(dead_code)]
pub async fn spawn_server(server: Arc<HttpServer>) -> (SocketAddr, JoinHandle<Result<(), ServerError>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move { server.run(listener).await });
    wait_for_port(addr).await;
    (addr, handle)
}

/// Poll until something listens on `addr`.
pub async fn wait_for_port(addr: SocketAddr) {
    for _ in 0..50 {
        if tokio::net::TcpStream::connect(addr).await.is_ok() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("nothing listening on {}", addr);
}
