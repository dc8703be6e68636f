//! Storage contract the domain service depends on.
//!
//! Implementations report failures as [`BoxError`]. A repository that can tell what went
//! wrong (an absent row, a uniqueness violation) returns a structured
//! [`Error`](crate::domain::Error) inside that box; the service keeps such
//! classifications and turns everything else into `internal`.

use async_trait::async_trait;
use futures_util::future::BoxFuture;
use uuid::Uuid;

use crate::domain::error::BoxError;
use crate::domain::user::User;

/// Outcome of a storage operation.
pub type StorageResult<T> = Result<T, BoxError>;

/// Key-based user store with scoped transactions.
#[async_trait]
pub trait UserRepository: Send + Sync + 'static {
    /// Handle to an open transaction.
    type Tx: Send;

    /// Look up a user, inside `tx` when one is given.
    ///
    /// An absent user must be reported as a `not_found` error.
    async fn find_user_by_id(&self, tx: Option<&mut Self::Tx>, id: Uuid) -> StorageResult<User>;

    /// Best-effort check whether a username is taken.
    async fn username_in_use(&self, username: &str) -> StorageResult<bool>;

    /// Insert a new user. A uniqueness violation should be reported as `conflict`.
    async fn create_user(&self, user: &User) -> StorageResult<()>;

    /// Update a user's details within a transaction.
    async fn update_user(&self, tx: &mut Self::Tx, user: &User) -> StorageResult<()>;

    /// Run `atomic` in a transaction.
    ///
    /// Commits only when `atomic` succeeds. Rolls back on error, and on panic before
    /// resuming the unwind.
    async fn transact<F>(&self, atomic: F) -> StorageResult<()>
    where
        F: for<'t> FnOnce(&'t mut Self::Tx) -> BoxFuture<'t, StorageResult<()>> + Send;
}
