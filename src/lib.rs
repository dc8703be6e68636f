//! Account management service: find and create users over HTTP and RPC.

pub mod api;
pub mod client;
pub mod config;
pub mod domain;
pub mod lifecycle;
pub mod observability;
pub mod resilience;
pub mod storage;
pub mod transport;

pub use api::{HttpServer, LoggingMiddleware, RpcServer};
pub use client::{Client, ClientError, HttpTransport, RpcTransport};
pub use config::ServiceConfig;
pub use domain::{Error, ErrorCode, Service, SharedService, User, UserService};
pub use lifecycle::Shutdown;
