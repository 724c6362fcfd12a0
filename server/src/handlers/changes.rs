//! Change feed rendering.

use crate::error::Result;
use axum::body::{Body, Bytes};
use futures::{StreamExt, TryStreamExt};
use serde::Serialize;
use settee_engine::{ChangeEntry, ChangesFeed, DocId, Error, RevisionId, Seq};

/// One change in CouchDB format.
#[derive(Debug, Serialize)]
pub struct ChangeRow {
    pub seq: Seq,
    pub id: DocId,
    pub changes: Vec<RevRef>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub deleted: bool,
}

#[derive(Debug, Serialize)]
pub struct RevRef {
    pub rev: RevisionId,
}

impl From<ChangeEntry> for ChangeRow {
    fn from(entry: ChangeEntry) -> Self {
        Self {
            seq: entry.seq,
            id: entry.id,
            changes: vec![RevRef { rev: entry.rev }],
            deleted: entry.deleted,
        }
    }
}

/// Response for normal and longpoll feeds.
#[derive(Debug, Serialize)]
pub struct ChangesResponse {
    pub results: Vec<ChangeRow>,
    pub last_seq: Seq,
}

/// Drain a finite feed. `last_seq` is the last delivered sequence, 0 when
/// nothing was delivered.
pub async fn collect_changes(feed: ChangesFeed) -> Result<ChangesResponse> {
    let results: Vec<ChangeRow> = feed.map_ok(ChangeRow::from).try_collect().await?;
    let last_seq = results.last().map_or(0, |row| row.seq);
    Ok(ChangesResponse { results, last_seq })
}

/// Stream a continuous feed as newline-delimited JSON.
pub fn continuous_body(feed: ChangesFeed) -> Body {
    let lines = feed.map(|entry| {
        let row = ChangeRow::from(entry?);
        let mut line = serde_json::to_vec(&row).map_err(|e| Error::Internal(e.to_string()))?;
        line.push(b'\n');
        Ok::<_, Error>(Bytes::from(line))
    });
    Body::from_stream(lines)
}
