//! A single in-memory database: a locked [`Store`] plus change notification.

use super::store::Store;
use crate::{Error, Result, Seq};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{watch, RwLock};
use tokio_util::sync::CancellationToken;

/// One database. Shared by every handle opened on it.
#[derive(Debug)]
pub struct Database {
    name: String,
    store: RwLock<Store>,
    /// Latest update sequence, for change-feed waiters
    seq: watch::Sender<Seq>,
    /// Set once the database is destroyed
    closed: AtomicBool,
}

impl Database {
    pub fn new(name: impl Into<String>) -> Self {
        let (seq, _) = watch::channel(0);
        Self {
            name: name.into(),
            store: RwLock::new(Store::new()),
            seq,
            closed: AtomicBool::new(false),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// A receiver that observes every update sequence change and closure.
    pub fn subscribe(&self) -> watch::Receiver<Seq> {
        self.seq.subscribe()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Mark the database destroyed and wake every waiter.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.seq.send_modify(|_| {});
    }

    /// Run `f` under the read lock.
    pub async fn read<T>(&self, cancel: &CancellationToken, f: impl FnOnce(&Store) -> T) -> Result<T> {
        let guard = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            guard = self.store.read() => guard,
        };
        self.check_open(cancel)?;
        Ok(f(&guard))
    }

    /// Run `f` under the write lock.
    ///
    /// The token is checked again once the lock is held; past that point the
    /// mutation always completes. Waiters are notified if the update sequence
    /// moved.
    pub async fn write<T>(
        &self,
        cancel: &CancellationToken,
        f: impl FnOnce(&mut Store) -> Result<T>,
    ) -> Result<T> {
        let mut guard = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            guard = self.store.write() => guard,
        };
        self.check_open(cancel)?;

        let before = guard.update_seq();
        let result = f(&mut guard);
        let after = guard.update_seq();
        if after != before {
            self.seq.send_replace(after);
        }
        result
    }

    fn check_open(&self, cancel: &CancellationToken) -> Result<()> {
        if cancel.is_cancelled() {
            tracing::debug!(db = %self.name, "call cancelled before commit");
            return Err(Error::Cancelled);
        }
        if self.is_closed() {
            return Err(Error::missing());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn write_notifies_subscribers() {
        let db = Database::new("alpha");
        let mut rx = db.subscribe();
        let cancel = CancellationToken::new();

        db.write(&cancel, |s| s.put("doc1", json!({}), None))
            .await
            .unwrap();

        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), 1);
    }

    #[tokio::test]
    async fn cancelled_write_commits_nothing() {
        let db = Database::new("alpha");
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = db.write(&cancel, |s| s.put("doc1", json!({}), None)).await;
        assert_eq!(result, Err(Error::Cancelled));

        let live = CancellationToken::new();
        assert_eq!(db.read(&live, |s| s.update_seq()).await, Ok(0));
    }

    #[tokio::test]
    async fn closed_database_rejects_calls() {
        let db = Database::new("alpha");
        let mut rx = db.subscribe();
        db.close();

        rx.changed().await.unwrap();
        let result = db.read(&CancellationToken::new(), |s| s.len()).await;
        assert!(matches!(result, Err(Error::NotFound(_))));
    }
}
