//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use invocation_guard::config::EndpointConfig;
use invocation_guard::OperationError;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Operation that fails its first `failures` invocations, then succeeds.
#[derive(Clone)]
pub struct Flaky {
    calls: Arc<AtomicU32>,
    failures: u32,
    error: fn() -> OperationError,
}

impl Flaky {
    pub fn new(failures: u32, error: fn() -> OperationError) -> Self {
        Self {
            calls: Arc::new(AtomicU32::new(0)),
            failures,
            error,
        }
    }

    /// Fails every invocation.
    pub fn always(error: fn() -> OperationError) -> Self {
        Self::new(u32::MAX, error)
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub async fn invoke(&self) -> Result<&'static str, OperationError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            Err((self.error)())
        } else {
            Ok("ok")
        }
    }
}

pub fn connection_refused() -> OperationError {
    OperationError::connection("connection refused")
}

pub fn upstream_timeout() -> OperationError {
    OperationError::timeout("upstream timed out")
}

pub fn endpoint(id: &str) -> EndpointConfig {
    EndpointConfig {
        id: id.to_string(),
        description: format!("endpoint {id}"),
        rate_limit_rpm: None,
        health_url: None,
    }
}

/// Start a mock HTTP endpoint on an ephemeral port. Each request is answered
/// with the status `f` returns.
pub async fn start_programmable_endpoint<F, Fut>(f: F) -> SocketAddr
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = u16> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let f = f.clone();
                    tokio::spawn(async move {
                        let mut request = [0u8; 1024];
                        let _ = socket.read(&mut request).await;
                        let status = f().await;
                        let status_text = match status {
                            200 => "200 OK",
                            429 => "429 Too Many Requests",
                            500 => "500 Internal Server Error",
                            503 => "503 Service Unavailable",
                            _ => "200 OK",
                        };
                        let response = format!(
                            "HTTP/1.1 {status_text}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
                        );
                        let _ = socket.write_all(response.as_bytes()).await;
                        let _ = socket.shutdown().await;
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}
