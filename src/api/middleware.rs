//! Service middleware.

use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::domain::{classify, ErrorCode, User, UserService};
use crate::transport::rpc::{CREATE_USER, FIND_USER_BY_ID};

/// Logs every call with its method, input, outcome and duration.
pub struct LoggingMiddleware<S> {
    inner: S,
}

impl<S> LoggingMiddleware<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

fn log_call<E>(method: &'static str, input: &str, err: Option<&E>, took: Duration)
where
    E: std::error::Error + 'static,
{
    match err {
        None => tracing::info!(method, input, took = ?took, "Service call"),
        Some(e) => {
            let code = classify(e);
            if code == ErrorCode::Internal {
                tracing::error!(method, input, code = %code, err = %e, took = ?took, "Service call");
            } else {
                tracing::info!(method, input, code = %code, err = %e, took = ?took, "Service call");
            }
        }
    }
}

#[async_trait]
impl<S: UserService> UserService for LoggingMiddleware<S> {
    type Error = S::Error;

    async fn find_user_by_id(&self, id: &str) -> Result<User, Self::Error> {
        let start = Instant::now();
        let result = self.inner.find_user_by_id(id).await;
        log_call(
            FIND_USER_BY_ID,
            id,
            result.as_ref().err(),
            start.elapsed(),
        );
        result
    }

    async fn create_user(&self, user: &mut User) -> Result<(), Self::Error> {
        let start = Instant::now();
        let input = user.username.clone();
        let result = self.inner.create_user(user).await;
        log_call(
            CREATE_USER,
            &input,
            result.as_ref().err(),
            start.elapsed(),
        );
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Error;
    use crate::storage::mock::MockUserService;

    #[tokio::test]
    async fn test_passes_results_through() {
        let svc = LoggingMiddleware::new(
            MockUserService::default().on_find_user_by_id(|_| Err(Error::not_found())),
        );
        let err = svc.find_user_by_id("abc").await.unwrap_err();
        assert_eq!(err, Error::not_found());

        let mut user = User::new("bob123");
        svc.create_user(&mut user).await.unwrap();
        assert!(!user.id.is_empty());

        let calls = svc.into_inner().calls();
        assert_eq!(calls.find_user_by_id, 1);
        assert_eq!(calls.create_user, 1);
    }
}
