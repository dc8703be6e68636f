//! Account domain.
//!
//! # Data Flow
//! ```text
//! caller
//!     → service.rs (validate input, classify failures)
//!     → repository.rs (storage contract)
//!     ← error.rs (code + safe message, cause kept local)
//! ```
//!
//! # Design Decisions
//! - Lower layers classify as precisely as they can; higher layers never widen a
//!   specific code to `internal`
//! - Causes are for logs only; `render` is the single gate to the outside

pub mod error;
pub mod repository;
pub mod service;
pub mod user;

pub use error::{classify, render, BoxError, Error, ErrorBody, ErrorCode, OpError};
pub use repository::{StorageResult, UserRepository};
pub use service::{Service, SharedService, UserService};
pub use user::User;
