//! In-memory user repository.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::domain::{Error, StorageResult, User, UserRepository};

type Table = HashMap<String, User>;

/// Users keyed by id, with username uniqueness enforced on every write.
///
/// The table lock is held for the whole of a transaction, so the atomic unit must
/// only touch storage through its transaction handle.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    table: Arc<Mutex<Table>>,
}

/// Transaction over a staged copy of the table.
#[derive(Debug)]
pub struct MemoryTx {
    staged: Table,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.table.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.table.lock().await.is_empty()
    }
}

fn lookup(table: &Table, id: Uuid) -> StorageResult<User> {
    table
        .get(&id.to_string())
        .cloned()
        .ok_or_else(|| Error::not_found().into())
}

fn username_taken(table: &Table, username: &str, except_id: &str) -> bool {
    table
        .values()
        .any(|u| u.username == username && u.id != except_id)
}

#[async_trait]
impl UserRepository for MemoryStore {
    type Tx = MemoryTx;

    async fn find_user_by_id(&self, tx: Option<&mut MemoryTx>, id: Uuid) -> StorageResult<User> {
        match tx {
            Some(tx) => lookup(&tx.staged, id),
            None => lookup(&*self.table.lock().await, id),
        }
    }

    async fn username_in_use(&self, username: &str) -> StorageResult<bool> {
        let table = self.table.lock().await;
        Ok(table.values().any(|u| u.username == username))
    }

    async fn create_user(&self, user: &User) -> StorageResult<()> {
        let mut table = self.table.lock().await;
        if table.contains_key(&user.id) || username_taken(&table, &user.username, "") {
            return Err(Error::conflict().into());
        }
        table.insert(user.id.clone(), user.clone());
        Ok(())
    }

    async fn update_user(&self, tx: &mut MemoryTx, user: &User) -> StorageResult<()> {
        if !tx.staged.contains_key(&user.id) {
            return Err(Error::not_found().into());
        }
        if username_taken(&tx.staged, &user.username, &user.id) {
            return Err(Error::conflict().into());
        }
        tx.staged.insert(user.id.clone(), user.clone());
        Ok(())
    }

    async fn transact<F>(&self, atomic: F) -> StorageResult<()>
    where
        F: for<'t> FnOnce(&'t mut MemoryTx) -> BoxFuture<'t, StorageResult<()>> + Send,
    {
        let mut table = self.table.lock().await;
        let mut tx = MemoryTx {
            staged: table.clone(),
        };

        let outcome = AssertUnwindSafe(atomic(&mut tx)).catch_unwind().await;
        match outcome {
            Ok(Ok(())) => {
                *table = tx.staged;
                Ok(())
            }
            Ok(Err(e)) => {
                tracing::debug!(error = %e, "Transaction rolled back");
                Err(e)
            }
            Err(panic) => {
                drop(table);
                tracing::warn!("Transaction rolled back after panic");
                std::panic::resume_unwind(panic)
            }
        }
    }
}
