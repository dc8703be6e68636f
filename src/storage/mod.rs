//! Repository implementations.
//!
//! # Data Flow
//! ```text
//! domain::Service
//!     → UserRepository (trait, domain/repository.rs)
//!         → memory.rs (in-process table, used by the server binary)
//!         → mock.rs (programmable responses, used by tests)
//! ```
//!
//! # Design Decisions
//! - Implementations classify what they know (`not_found`, `conflict`) and box
//!   everything else
//! - Transactions stage a copy of the table and swap it in on commit

pub mod memory;
pub mod mock;

pub use memory::{MemoryStore, MemoryTx};
