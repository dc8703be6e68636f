//! Server-side endpoints.
//!
//! # Data Flow
//! ```text
//! HTTP request ─→ TraceLayer → rate limit (route layer) → decode ─┐
//!                                                                 ├→ LoggingMiddleware → Service
//! RPC frame ────→ rate limit → decode ────────────────────────────┘
//!
//! Service result → render → transport encoder → wire
//! ```
//!
//! # Design Decisions
//! - One limiter shared by both transports, checked before anything is decoded
//! - A rejected call never reaches the logging middleware or the service
//! - Every error response goes through `render`

pub mod http;
pub mod middleware;
pub mod rpc;

pub use http::HttpServer;
pub use middleware::LoggingMiddleware;
pub use rpc::RpcServer;
