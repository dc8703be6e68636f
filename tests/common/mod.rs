//! Shared utilities for integration testing.
#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use account_service::api::{HttpServer, LoggingMiddleware, RpcServer};
use account_service::domain::{Service, SharedService};
use account_service::lifecycle::Shutdown;
use account_service::resilience::RateLimiter;
use account_service::storage::MemoryStore;

/// HTTP and RPC servers sharing one service and one limiter.
pub struct TestServers {
    pub http_addr: SocketAddr,
    pub rpc_addr: SocketAddr,
    pub shutdown: Shutdown,
}

impl TestServers {
    pub fn base_url(&self) -> String {
        format!("http://{}", self.http_addr)
    }
}

impl Drop for TestServers {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Service over an empty in-memory store, wrapped in the logging middleware.
pub fn memory_service() -> SharedService {
    let service = Service::new(Arc::new(MemoryStore::new()));
    Arc::new(LoggingMiddleware::new(service))
}

/// Start both servers on ephemeral ports.
pub async fn start_servers(service: SharedService, requests_per_second: u32, burst: u32) -> TestServers {
    let limiter = Arc::new(RateLimiter::new(requests_per_second, burst));
    let shutdown = Shutdown::new();

    let http_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let rpc_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let http_addr = http_listener.local_addr().unwrap();
    let rpc_addr = rpc_listener.local_addr().unwrap();

    let http = HttpServer::new(service.clone(), limiter.clone(), Duration::from_secs(5));
    tokio::spawn(http.run(http_listener, shutdown.signalled()));
    let rpc = RpcServer::new(service, limiter);
    tokio::spawn(rpc.run(rpc_listener, shutdown.subscribe()));

    TestServers {
        http_addr,
        rpc_addr,
        shutdown,
    }
}

/// An address nothing listens on.
pub async fn closed_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

/// Start a backend that accepts connections and never answers.
pub async fn start_silent_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });
    addr
}

/// Start a programmable HTTP backend answering every request with `f()`.
pub async fn start_programmable_backend<F, Fut>(f: F) -> SocketAddr
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
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
                        let mut buf = [0u8; 4096];
                        let _ = socket.read(&mut buf).await;

                        let (status, body) = f().await;
                        let status_text = match status {
                            200 => "200 OK",
                            201 => "201 Created",
                            400 => "400 Bad Request",
                            404 => "404 Not Found",
                            429 => "429 Too Many Requests",
                            500 => "500 Internal Server Error",
                            502 => "502 Bad Gateway",
                            _ => "200 OK",
                        };

                        let response_str = format!(
                            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            status_text,
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
