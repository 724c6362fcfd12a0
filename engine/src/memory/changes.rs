//! Change feeds over an in-memory database.
//!
//! A feed reads the change log in batches. When it runs dry it parks on the
//! database's sequence watch until a write, the timeout, destruction or
//! cancellation. The receiver lives inside the stream, so dropping the stream
//! is all it takes to stop waiting.

use super::database::Database;
use crate::{ChangeEntry, ChangesFeed, ChangesQuery, Error, Feed, Result, Seq};
use futures::stream::{self, StreamExt};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

struct FeedState {
    db: Arc<Database>,
    rx: watch::Receiver<Seq>,
    cancel: CancellationToken,
    feed: Feed,
    /// Last sequence handed to the buffer
    since: Seq,
    /// Entries still allowed by `limit`
    remaining: Option<usize>,
    /// Idle time allowed between batches
    timeout: Option<Duration>,
    deadline: Option<Instant>,
    buffer: VecDeque<ChangeEntry>,
    done: bool,
}

/// Build a feed starting after `since`.
///
/// `rx` must have been subscribed before `since` was resolved, so that no
/// write can slip between the two.
pub(crate) fn feed(
    db: Arc<Database>,
    rx: watch::Receiver<Seq>,
    since: Seq,
    query: &ChangesQuery,
    cancel: CancellationToken,
) -> ChangesFeed {
    let state = FeedState {
        db,
        rx,
        cancel,
        feed: query.feed,
        since,
        remaining: query.limit,
        timeout: query.timeout,
        deadline: query.timeout.map(|t| Instant::now() + t),
        buffer: VecDeque::new(),
        done: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(entry) = state.buffer.pop_front() {
                return Some((Ok(entry), state));
            }
            if state.done || state.remaining == Some(0) {
                return None;
            }
            match state.fill().await {
                Ok(()) => {}
                Err(Error::Cancelled) | Err(Error::NotFound(_)) => {
                    tracing::debug!(db = %state.db.name(), since = state.since, "changes feed ended");
                    return None;
                }
                Err(err) => {
                    state.done = true;
                    return Some((Err(err), state));
                }
            }
        }
    })
    .boxed()
}

impl FeedState {
    /// Read the next batch into the buffer, waiting if the feed type asks
    /// for it. Sets `done` when no further batch should be read.
    async fn fill(&mut self) -> Result<()> {
        loop {
            self.rx.borrow_and_update();
            let (since, limit) = (self.since, self.remaining);
            let batch = self
                .db
                .read(&self.cancel, |store| store.changes_since(since, limit))
                .await?;

            if let Some(last) = batch.last() {
                self.since = last.seq;
                if let Some(remaining) = self.remaining.as_mut() {
                    *remaining = remaining.saturating_sub(batch.len());
                }
                self.buffer.extend(batch);
                self.deadline = self.timeout.map(|t| Instant::now() + t);
                self.done = self.feed != Feed::Continuous;
                return Ok(());
            }

            if self.feed == Feed::Normal || !self.wait().await? {
                self.done = true;
                return Ok(());
            }
        }
    }

    /// Wait for the next write. Returns `false` if the timeout fired first.
    async fn wait(&mut self) -> Result<bool> {
        let deadline = self.deadline;
        let timeout = async move {
            match deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            _ = self.cancel.cancelled() => Err(Error::Cancelled),
            _ = timeout => Ok(false),
            changed = self.rx.changed() => {
                if changed.is_err() || self.db.is_closed() {
                    Err(Error::missing())
                } else {
                    Ok(true)
                }
            }
        }
    }
}
