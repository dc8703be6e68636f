//! RPC server over TCP.
//!
//! # Responsibilities
//! - Accept connections and answer newline-delimited JSON frames in order
//! - Apply the shared rate limiter before a frame is decoded
//! - Close connections that go idle without completing a frame
//! - Stop accepting on shutdown and let open connections finish their current frame

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::io::BufReader;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio::task::JoinSet;

use crate::domain::{render, Error, SharedService, User};
use crate::observability::metrics;
use crate::resilience::RateLimiter;
use crate::transport::rpc::{
    read_line, write_frame, CreateUserReply, ErrorReply, FindUserByIdReply, FrameError,
    RpcRequest,
};

const TRANSPORT: &str = "rpc";

/// How long a connection may wait for its next frame unless configured otherwise.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Reply {
    Find(FindUserByIdReply),
    Create(CreateUserReply),
    Rejected(ErrorReply),
}

/// RPC server for the user API.
#[derive(Clone)]
pub struct RpcServer {
    service: SharedService,
    limiter: Arc<RateLimiter>,
    idle_timeout: Duration,
}

impl RpcServer {
    pub fn new(service: SharedService, limiter: Arc<RateLimiter>) -> Self {
        Self {
            service,
            limiter,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
        }
    }

    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Accept connections until a shutdown signal arrives, then wait for open
    /// connections to finish.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "RPC server starting");

        let mut connections = JoinSet::new();
        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        let server = self.clone();
                        let conn_shutdown = shutdown.resubscribe();
                        connections.spawn(async move {
                            server.serve_connection(stream, peer, conn_shutdown).await;
                        });
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Failed to accept RPC connection");
                    }
                },
                Some(_) = connections.join_next(), if !connections.is_empty() => {}
                _ = shutdown.recv() => break,
            }
        }

        tracing::info!(open = connections.len(), "RPC server draining connections");
        while connections.join_next().await.is_some() {}

        tracing::info!("RPC server stopped");
        Ok(())
    }

    async fn serve_connection(
        &self,
        stream: TcpStream,
        peer: SocketAddr,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        tracing::debug!(peer = %peer, "RPC connection opened");
        let (reader, mut writer) = stream.into_split();
        let mut reader = BufReader::new(reader);

        loop {
            let line = tokio::select! {
                line = tokio::time::timeout(self.idle_timeout, read_line(&mut reader)) => line,
                _ = shutdown.recv() => break,
            };
            let Ok(line) = line else {
                tracing::debug!(peer = %peer, timeout = ?self.idle_timeout, "RPC connection idle");
                break;
            };
            let reply = match line {
                Ok(Some(line)) => self.handle_frame(&line).await,
                Ok(None) => break,
                Err(FrameError::TooLarge) => {
                    tracing::warn!(peer = %peer, "RPC frame too large");
                    let err = Error::internal().with_cause(FrameError::TooLarge);
                    let _ = write_frame(&mut writer, &ErrorReply { error: render(&err) }).await;
                    break;
                }
                Err(e) => {
                    tracing::debug!(peer = %peer, error = %e, "RPC read failed");
                    break;
                }
            };

            if let Err(e) = write_frame(&mut writer, &reply).await {
                tracing::debug!(peer = %peer, error = %e, "RPC write failed");
                break;
            }
        }
        tracing::debug!(peer = %peer, "RPC connection closed");
    }

    async fn handle_frame(&self, line: &str) -> Reply {
        if let Err(err) = self.limiter.check() {
            tracing::warn!(transport = TRANSPORT, "Rate limit exceeded");
            metrics::record_rate_limited(TRANSPORT);
            return Reply::Rejected(ErrorReply { error: render(&err) });
        }

        let request: RpcRequest = match serde_json::from_str(line) {
            Ok(request) => request,
            Err(e) => {
                tracing::debug!(error = %e, "Malformed RPC frame");
                let err = Error::internal().with_cause(e);
                return Reply::Rejected(ErrorReply { error: render(&err) });
            }
        };

        let start = Instant::now();
        let method = request.method();
        match request {
            RpcRequest::FindUserById(params) => {
                let result = self.service.find_user_by_id(&params.id).await;
                metrics::record_request(
                    TRANSPORT,
                    method,
                    result.as_ref().err().map(Error::code),
                    start.elapsed(),
                );
                Reply::Find(FindUserByIdReply::from_result(
                    result.map_err(|e| render(&e)),
                ))
            }
            RpcRequest::CreateUser(params) => {
                let mut user = User::new(params.username);
                let result = self.service.create_user(&mut user).await;
                metrics::record_request(
                    TRANSPORT,
                    method,
                    result.as_ref().err().map(Error::code),
                    start.elapsed(),
                );
                match result {
                    Ok(()) => Reply::Create(CreateUserReply::created(user.id)),
                    Err(e) => Reply::Create(CreateUserReply::failed(render(&e))),
                }
            }
        }
    }
}
