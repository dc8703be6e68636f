//! Remote client for the user API.
//!
//! # Data Flow
//! ```text
//! caller
//!     → Client (UserService impl)
//!     → CircuitBreaker (one per operation)
//!     → Transport (http.rs or rpc.rs): encode → round trip → decode
//!     → structured Error or value
//! ```
//!
//! # Design Decisions
//! - Transports return domain errors; network faults become `internal`
//! - Only `rate_limit` and `internal` outcomes count against a breaker
//! - An open breaker is a distinct [`ClientError`] variant with no error code

pub mod http;
pub mod rpc;

use async_trait::async_trait;

use crate::config::CircuitBreakerConfig;
use crate::domain::{Error, ErrorCode, User, UserService};
use crate::resilience::{BreakerError, BreakerState, CircuitBreaker};
use crate::transport::rpc::{CREATE_USER, FIND_USER_BY_ID};

pub use http::HttpTransport;
pub use rpc::RpcTransport;

/// One round trip per operation.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn find_user_by_id(&self, id: &str) -> Result<User, Error>;

    /// Create `username`, returning the assigned id.
    async fn create_user(&self, username: &str) -> Result<String, Error>;
}

/// Failure seen by a client caller.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The server answered with an error, or the call failed and was classified.
    #[error(transparent)]
    Service(#[from] Error),
    /// The breaker for `operation` is open; nothing was sent.
    #[error("circuit breaker for {operation} is open")]
    CircuitOpen { operation: &'static str },
}

impl ClientError {
    /// The error code, or `None` when the call was refused by a breaker.
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            ClientError::Service(e) => Some(e.code()),
            ClientError::CircuitOpen { .. } => None,
        }
    }
}

impl From<BreakerError<Error>> for ClientError {
    fn from(err: BreakerError<Error>) -> Self {
        match err {
            BreakerError::Open { name } => ClientError::CircuitOpen { operation: name },
            BreakerError::Inner(e) => ClientError::Service(e),
        }
    }
}

fn counts_as_failure(err: &Error) -> bool {
    err.code().trips_breaker()
}

/// Client implementing [`UserService`] over a transport.
pub struct Client<T> {
    transport: T,
    find_breaker: CircuitBreaker,
    create_breaker: CircuitBreaker,
}

impl<T: Transport> Client<T> {
    pub fn new(transport: T, breaker: &CircuitBreakerConfig) -> Self {
        Self {
            transport,
            find_breaker: CircuitBreaker::new(FIND_USER_BY_ID, breaker),
            create_breaker: CircuitBreaker::new(CREATE_USER, breaker),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// State of the breaker guarding `operation`, if there is one.
    pub fn breaker_state(&self, operation: &str) -> Option<BreakerState> {
        match operation {
            FIND_USER_BY_ID => Some(self.find_breaker.state()),
            CREATE_USER => Some(self.create_breaker.state()),
            _ => None,
        }
    }
}

#[async_trait]
impl<T: Transport> UserService for Client<T> {
    type Error = ClientError;

    async fn find_user_by_id(&self, id: &str) -> Result<User, ClientError> {
        let user = self
            .find_breaker
            .call(self.transport.find_user_by_id(id), counts_as_failure)
            .await?;
        Ok(user)
    }

    async fn create_user(&self, user: &mut User) -> Result<(), ClientError> {
        let id = self
            .create_breaker
            .call(self.transport.create_user(&user.username), counts_as_failure)
            .await?;
        user.id = id;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Transport answering from a script, counting round trips.
    #[derive(Default)]
    struct ScriptedTransport {
        create: Mutex<Vec<Result<String, Error>>>,
        round_trips: AtomicUsize,
    }

    impl ScriptedTransport {
        fn answering(answers: Vec<Result<String, Error>>) -> Self {
            Self {
                create: Mutex::new(answers.into_iter().rev().collect()),
                round_trips: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn find_user_by_id(&self, _id: &str) -> Result<User, Error> {
            self.round_trips.fetch_add(1, Ordering::SeqCst);
            Err(Error::not_found())
        }

        async fn create_user(&self, _username: &str) -> Result<String, Error> {
            self.round_trips.fetch_add(1, Ordering::SeqCst);
            self.create
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Ok("fresh-id".to_string()))
        }
    }

    fn client(answers: Vec<Result<String, Error>>) -> Client<ScriptedTransport> {
        Client::new(ScriptedTransport::answering(answers), &CircuitBreakerConfig::default())
    }

    #[tokio::test]
    async fn test_create_assigns_returned_id() {
        let client = client(vec![Ok("42".to_string())]);
        let mut user = User::new("bob123");
        client.create_user(&mut user).await.unwrap();
        assert_eq!(user.id, "42");
    }

    #[tokio::test]
    async fn test_five_internal_errors_open_the_breaker() {
        let client = client(vec![Err(Error::internal()); 5]);
        for _ in 0..5 {
            let err = client.create_user(&mut User::new("bob123")).await.unwrap_err();
            assert_eq!(err.code(), Some(ErrorCode::Internal));
        }
        assert_eq!(client.breaker_state(CREATE_USER), Some(BreakerState::Open));

        let err = client.create_user(&mut User::new("bob123")).await.unwrap_err();
        assert!(matches!(err, ClientError::CircuitOpen { operation: "CreateUser" }));
        assert_eq!(err.code(), None);
        assert_eq!(client.transport().round_trips.load(Ordering::SeqCst), 5);

        assert_eq!(client.breaker_state(FIND_USER_BY_ID), Some(BreakerState::Closed));
    }

    #[tokio::test]
    async fn test_domain_errors_do_not_trip() {
        let mut answers = vec![Err(Error::conflict()); 10];
        answers.extend(vec![Err(Error::invalid_username()); 10]);
        let client = client(answers);
        for _ in 0..20 {
            let err = client.create_user(&mut User::new("bob123")).await.unwrap_err();
            assert!(matches!(err, ClientError::Service(_)));
        }
        for _ in 0..10 {
            let err = client.find_user_by_id("x").await.unwrap_err();
            assert_eq!(err.code(), Some(ErrorCode::NotFound));
        }
        assert_eq!(client.breaker_state(CREATE_USER), Some(BreakerState::Closed));
        assert_eq!(client.breaker_state(FIND_USER_BY_ID), Some(BreakerState::Closed));
    }

    #[tokio::test]
    async fn test_rate_limit_counts_as_failure() {
        let client = client(vec![Err(Error::rate_limit()); 5]);
        for _ in 0..5 {
            let _ = client.create_user(&mut User::new("bob123")).await;
        }
        assert_eq!(client.breaker_state(CREATE_USER), Some(BreakerState::Open));
    }
}
