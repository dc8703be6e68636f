//! Programmable test doubles for the repository and the service.
//!
//! Each operation answers through a closure set by the test and counts its calls, so
//! tests can assert both what was returned and what was never reached.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::future::BoxFuture;
use uuid::Uuid;

use crate::domain::{Error, StorageResult, User, UserRepository, UserService};

type FindFn = Box<dyn Fn(Uuid) -> StorageResult<User> + Send + Sync>;
type InUseFn = Box<dyn Fn(&str) -> StorageResult<bool> + Send + Sync>;
type WriteFn = Box<dyn Fn(&User) -> StorageResult<()> + Send + Sync>;

/// Call counts observed by a mock.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MockCalls {
    pub find_user_by_id: usize,
    pub username_in_use: usize,
    pub create_user: usize,
    pub update_user: usize,
    pub transact: usize,
}

#[derive(Debug, Default)]
struct Counters {
    find_user_by_id: AtomicUsize,
    username_in_use: AtomicUsize,
    create_user: AtomicUsize,
    update_user: AtomicUsize,
    transact: AtomicUsize,
}

impl Counters {
    fn snapshot(&self) -> MockCalls {
        MockCalls {
            find_user_by_id: self.find_user_by_id.load(Ordering::SeqCst),
            username_in_use: self.username_in_use.load(Ordering::SeqCst),
            create_user: self.create_user.load(Ordering::SeqCst),
            update_user: self.update_user.load(Ordering::SeqCst),
            transact: self.transact.load(Ordering::SeqCst),
        }
    }
}

/// Repository whose answers are set per test.
///
/// Unset operations behave like an empty store: lookups are `not_found`, no
/// username is in use, and writes succeed.
#[derive(Default)]
pub struct MockRepository {
    find_user_by_id: Option<FindFn>,
    username_in_use: Option<InUseFn>,
    create_user: Option<WriteFn>,
    delay: Option<Duration>,
    counters: Counters,
}

impl MockRepository {
    pub fn on_find_user_by_id(
        mut self,
        f: impl Fn(Uuid) -> StorageResult<User> + Send + Sync + 'static,
    ) -> Self {
        self.find_user_by_id = Some(Box::new(f));
        self
    }

    pub fn on_username_in_use(
        mut self,
        f: impl Fn(&str) -> StorageResult<bool> + Send + Sync + 'static,
    ) -> Self {
        self.username_in_use = Some(Box::new(f));
        self
    }

    pub fn on_create_user(
        mut self,
        f: impl Fn(&User) -> StorageResult<()> + Send + Sync + 'static,
    ) -> Self {
        self.create_user = Some(Box::new(f));
        self
    }

    /// Sleep before answering every call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> MockCalls {
        self.counters.snapshot()
    }

    async fn enter(&self, counter: &AtomicUsize) {
        counter.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl UserRepository for MockRepository {
    type Tx = ();

    async fn find_user_by_id(&self, _tx: Option<&mut ()>, id: Uuid) -> StorageResult<User> {
        self.enter(&self.counters.find_user_by_id).await;
        match &self.find_user_by_id {
            Some(f) => f(id),
            None => Err(Error::not_found().into()),
        }
    }

    async fn username_in_use(&self, username: &str) -> StorageResult<bool> {
        self.enter(&self.counters.username_in_use).await;
        match &self.username_in_use {
            Some(f) => f(username),
            None => Ok(false),
        }
    }

    async fn create_user(&self, user: &User) -> StorageResult<()> {
        self.enter(&self.counters.create_user).await;
        match &self.create_user {
            Some(f) => f(user),
            None => Ok(()),
        }
    }

    async fn update_user(&self, _tx: &mut (), _user: &User) -> StorageResult<()> {
        self.enter(&self.counters.update_user).await;
        Ok(())
    }

    async fn transact<F>(&self, atomic: F) -> StorageResult<()>
    where
        F: for<'t> FnOnce(&'t mut ()) -> BoxFuture<'t, StorageResult<()>> + Send,
    {
        self.enter(&self.counters.transact).await;
        let mut tx = ();
        atomic(&mut tx).await
    }
}

type ServiceFindFn = Box<dyn Fn(&str) -> Result<User, Error> + Send + Sync>;
type ServiceCreateFn = Box<dyn Fn(&mut User) -> Result<(), Error> + Send + Sync>;

/// Service whose answers are set per test, for exercising transports in isolation.
///
/// Unset operations: lookups are `not_found`, creates succeed and assign a fresh id.
#[derive(Default)]
pub struct MockUserService {
    find_user_by_id: Option<ServiceFindFn>,
    create_user: Option<ServiceCreateFn>,
    counters: Counters,
}

impl MockUserService {
    pub fn on_find_user_by_id(
        mut self,
        f: impl Fn(&str) -> Result<User, Error> + Send + Sync + 'static,
    ) -> Self {
        self.find_user_by_id = Some(Box::new(f));
        self
    }

    pub fn on_create_user(
        mut self,
        f: impl Fn(&mut User) -> Result<(), Error> + Send + Sync + 'static,
    ) -> Self {
        self.create_user = Some(Box::new(f));
        self
    }

    pub fn calls(&self) -> MockCalls {
        self.counters.snapshot()
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }
}

#[async_trait]
impl UserService for MockUserService {
    type Error = Error;

    async fn find_user_by_id(&self, id: &str) -> Result<User, Error> {
        self.counters.find_user_by_id.fetch_add(1, Ordering::SeqCst);
        match &self.find_user_by_id {
            Some(f) => f(id),
            None => Err(Error::not_found()),
        }
    }

    async fn create_user(&self, user: &mut User) -> Result<(), Error> {
        self.counters.create_user.fetch_add(1, Ordering::SeqCst);
        match &self.create_user {
            Some(f) => f(user),
            None => {
                user.id = Uuid::new_v4().to_string();
                Ok(())
            }
        }
    }
}
