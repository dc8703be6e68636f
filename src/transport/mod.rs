//! Wire formats shared by servers and clients.
//!
//! # Data Flow
//! ```text
//! Server: service result → render → http.rs / rpc.rs encoders → wire
//! Client: wire → http.rs / rpc.rs decoders → Error::from(ErrorBody) → breaker
//! ```
//!
//! # Design Decisions
//! - Errors cross the wire only as `{code, message}`; causes never leave
//! - Both transports reconstruct the same structured error on the client side
//! - Unknown codes decode as `internal`

pub mod http;
pub mod rpc;
