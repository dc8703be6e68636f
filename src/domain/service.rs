//! User service contract and its local implementation.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::error::{BoxError, Error, ErrorCode, OpError};
use crate::domain::repository::UserRepository;
use crate::domain::user::{is_valid_username, parse_user_id, User};
use crate::resilience::timeouts::bounded;

/// Operations for managing user accounts.
///
/// Implemented by the local [`Service`], by middleware wrapping it, and by remote
/// clients, each with its own error type.
#[async_trait]
pub trait UserService: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Return a user by ID.
    async fn find_user_by_id(&self, id: &str) -> Result<User, Self::Error>;

    /// Create a new user. On success `user.id` holds the assigned ID.
    async fn create_user(&self, user: &mut User) -> Result<(), Self::Error>;
}

#[async_trait]
impl<S> UserService for Arc<S>
where
    S: UserService + ?Sized,
{
    type Error = S::Error;

    async fn find_user_by_id(&self, id: &str) -> Result<User, Self::Error> {
        (**self).find_user_by_id(id).await
    }

    async fn create_user(&self, user: &mut User) -> Result<(), Self::Error> {
        (**self).create_user(user).await
    }
}

/// A service shared between transports.
pub type SharedService = Arc<dyn UserService<Error = Error>>;

/// Default deadline for a single repository call.
pub const DEFAULT_STORAGE_TIMEOUT: Duration = Duration::from_secs(5);

/// Validates input and orchestrates the repository.
pub struct Service<R> {
    repo: Arc<R>,
    storage_timeout: Duration,
}

impl<R: UserRepository> Service<R> {
    /// Create a service backed by `repo`.
    pub fn new(repo: Arc<R>) -> Self {
        Self {
            repo,
            storage_timeout: DEFAULT_STORAGE_TIMEOUT,
        }
    }

    /// Bound every repository call by `timeout`.
    pub fn with_storage_timeout(mut self, timeout: Duration) -> Self {
        self.storage_timeout = timeout;
        self
    }

    fn storage_failure(op: &'static str, err: BoxError) -> Error {
        let err = Error::classified(Box::new(OpError::new(op, err)));
        if err.code() == ErrorCode::Internal {
            if let Some(cause) = err.cause() {
                tracing::error!(op, cause = %cause, "Storage failure");
            }
        }
        err
    }
}

#[async_trait]
impl<R: UserRepository> UserService for Service<R> {
    type Error = Error;

    /// Returns `invalid_user_id` if the ID is not a UUID.
    ///
    /// An absent user is reported by the repository itself as `not_found`.
    async fn find_user_by_id(&self, id: &str) -> Result<User, Error> {
        let user_id = parse_user_id(id)?;

        bounded(self.storage_timeout, self.repo.find_user_by_id(None, user_id))
            .await
            .map_err(|e| Self::storage_failure("UserStorage.FindUserByID", e))
    }

    /// Returns `invalid` if the username is blank or malformed, or `conflict` if it is
    /// already in use.
    async fn create_user(&self, user: &mut User) -> Result<(), Error> {
        if !is_valid_username(&user.username) {
            tracing::debug!(username = %user.username, "Rejected invalid username");
            return Err(Error::invalid_username());
        }

        let in_use = bounded(self.storage_timeout, self.repo.username_in_use(&user.username))
            .await
            .map_err(|e| Self::storage_failure("UserStorage.UsernameInUse", e))?;
        if in_use {
            return Err(Error::conflict());
        }

        let candidate = User {
            id: Uuid::new_v4().to_string(),
            username: user.username.clone(),
        };
        bounded(self.storage_timeout, self.repo.create_user(&candidate))
            .await
            .map_err(|e| Self::storage_failure("UserStorage.CreateUser", e))?;

        *user = candidate;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::error::INTERNAL_MESSAGE;
    use crate::storage::mock::MockRepository;
    use crate::storage::MemoryStore;

    fn service(repo: &Arc<MockRepository>) -> Service<MockRepository> {
        Service::new(repo.clone())
    }

    #[tokio::test]
    async fn test_malformed_ids_never_reach_repository() {
        let repo = Arc::new(MockRepository::default());
        let svc = service(&repo);

        for id in ["", "123", "87553f14", "87553f14-4c0f-4bd8-8be1-1b6ff5bd8eeZ", "../etc"] {
            let err = svc.find_user_by_id(id).await.unwrap_err();
            assert_eq!(err, Error::invalid_user_id(), "id {id:?}");
        }
        assert_eq!(repo.calls().find_user_by_id, 0);
    }

    #[tokio::test]
    async fn test_find_trusts_repository_not_found() {
        let repo = Arc::new(MockRepository::default().on_find_user_by_id(|_| {
            Err(Error::not_found().with_cause("no rows in result set").into())
        }));
        let err = service(&repo)
            .find_user_by_id("87553f14-4c0f-4bd8-8be1-1b6ff5bd8eef")
            .await
            .unwrap_err();
        assert_eq!(err, Error::not_found());
        assert_eq!(repo.calls().find_user_by_id, 1);
    }

    #[tokio::test]
    async fn test_find_unclassified_failure_is_internal() {
        let repo = Arc::new(
            MockRepository::default().on_find_user_by_id(|_| Err("no rows in result set".into())),
        );
        let err = service(&repo)
            .find_user_by_id("87553f14-4c0f-4bd8-8be1-1b6ff5bd8eef")
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::Internal);
        assert_eq!(err.message(), INTERNAL_MESSAGE);
    }

    #[tokio::test]
    async fn test_invalid_usernames_skip_storage() {
        let repo = Arc::new(MockRepository::default());
        let svc = service(&repo);

        for name in ["", " ", "   ", ">_<", "bob smith", "bob!"] {
            let mut user = User::new(name);
            let err = svc.create_user(&mut user).await.unwrap_err();
            assert_eq!(err, Error::invalid_username(), "username {name:?}");
        }
        let calls = repo.calls();
        assert_eq!(calls.username_in_use, 0);
        assert_eq!(calls.create_user, 0);
    }

    #[tokio::test]
    async fn test_username_in_use_is_conflict() {
        let repo = Arc::new(MockRepository::default().on_username_in_use(|_| Ok(true)));
        let mut user = User::new("bob123");
        let err = service(&repo).create_user(&mut user).await.unwrap_err();
        assert_eq!(err, Error::conflict());
        assert_eq!(repo.calls().create_user, 0);
        assert!(user.id.is_empty());
    }

    #[tokio::test]
    async fn test_create_storage_error_is_internal() {
        let repo = Arc::new(
            MockRepository::default()
                .on_username_in_use(|_| Ok(false))
                .on_create_user(|_| {
                    Err(OpError::new("UserStorage.CreateUser", "db connection failed").into())
                }),
        );
        let mut user = User::new("bob123");
        let err = service(&repo).create_user(&mut user).await.unwrap_err();
        assert_eq!(err, Error::internal());
        assert!(!err.to_string().contains("db connection failed"));
        assert!(user.id.is_empty());
    }

    #[tokio::test]
    async fn test_insert_time_conflict_is_preserved() {
        let repo = Arc::new(
            MockRepository::default()
                .on_username_in_use(|_| Ok(false))
                .on_create_user(|_| Err(Error::conflict().into())),
        );
        let err = service(&repo)
            .create_user(&mut User::new("bob123"))
            .await
            .unwrap_err();
        assert_eq!(err, Error::conflict());
    }

    #[tokio::test]
    async fn test_probe_failure_is_internal() {
        let repo = Arc::new(MockRepository::default().on_username_in_use(|_| Err("timeout".into())));
        let err = service(&repo)
            .create_user(&mut User::new("bob123"))
            .await
            .unwrap_err();
        assert_eq!(err, Error::internal());
        assert_eq!(repo.calls().create_user, 0);
    }

    #[tokio::test]
    async fn test_create_assigns_id() {
        let store = Arc::new(MemoryStore::new());
        let svc = Service::new(store.clone());

        let mut user = User::new("alice");
        svc.create_user(&mut user).await.unwrap();
        assert!(Uuid::parse_str(&user.id).is_ok());

        let found = svc.find_user_by_id(&user.id).await.unwrap();
        assert_eq!(found, user);

        let err = svc.create_user(&mut User::new("alice")).await.unwrap_err();
        assert_eq!(err, Error::conflict());
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_storage_is_internal() {
        let repo = Arc::new(MockRepository::default().with_delay(Duration::from_secs(30)));
        let svc = service(&repo).with_storage_timeout(Duration::from_millis(100));
        let err = svc
            .find_user_by_id("87553f14-4c0f-4bd8-8be1-1b6ff5bd8eef")
            .await
            .unwrap_err();
        assert_eq!(err, Error::internal());
    }
}
