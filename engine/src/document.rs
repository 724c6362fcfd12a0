//! Document, row and change types exchanged with drivers.

use crate::{DocId, Error, Result, RevisionId, Seq};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Check that a caller-supplied document id is usable.
///
/// Ids must be non-empty and must not start with `_`, which is reserved for
/// special endpoints.
pub fn validate_doc_id(id: &str) -> Result<()> {
    if id.is_empty() {
        return Err(Error::BadRequest("document id must not be empty".into()));
    }
    if id.starts_with('_') {
        return Err(Error::BadRequest(
            "only reserved document ids may start with underscore".into(),
        ));
    }
    Ok(())
}

/// A single revision of a document, as returned by `get`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Document id
    pub id: DocId,
    /// Revision this body belongs to
    pub rev: RevisionId,
    /// Whether this revision is a tombstone
    pub deleted: bool,
    /// The document body, without special members
    pub body: Value,
    /// Other live leaves, filled only when conflicts were requested
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conflicts: Vec<RevisionId>,
}

impl Document {
    /// Render the document the way it appears on the wire, with `_id`,
    /// `_rev` and, where relevant, `_deleted` and `_conflicts` merged in.
    pub fn to_json(&self) -> Value {
        let mut map = Map::new();
        map.insert("_id".into(), Value::String(self.id.clone()));
        map.insert("_rev".into(), Value::String(self.rev.to_string()));
        if self.deleted {
            map.insert("_deleted".into(), Value::Bool(true));
        }
        if !self.conflicts.is_empty() {
            let revs = self
                .conflicts
                .iter()
                .map(|r| Value::String(r.to_string()))
                .collect();
            map.insert("_conflicts".into(), Value::Array(revs));
        }
        if let Value::Object(body) = &self.body {
            for (key, value) in body {
                map.insert(key.clone(), value.clone());
            }
        }
        Value::Object(map)
    }
}

/// One row of an `all_docs` enumeration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    pub id: DocId,
    /// Winning revision
    pub rev: RevisionId,
    pub deleted: bool,
    /// Winning body, when `include_docs` was requested
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc: Option<Value>,
}

/// The result of an `all_docs` call.
///
/// Rows come from a point-in-time snapshot; to see later writes, issue the
/// call again.
#[derive(Debug)]
pub struct Rows {
    total_rows: usize,
    offset: usize,
    rows: std::vec::IntoIter<Row>,
}

impl Rows {
    /// Build a row set.
    pub fn new(total_rows: usize, offset: usize, rows: Vec<Row>) -> Self {
        Self {
            total_rows,
            offset,
            rows: rows.into_iter(),
        }
    }

    /// An empty row set.
    pub fn empty() -> Self {
        Self::new(0, 0, Vec::new())
    }

    /// Number of documents in the database at snapshot time.
    pub fn total_rows(&self) -> usize {
        self.total_rows
    }

    /// Number of rows skipped before the first returned row.
    pub fn offset(&self) -> usize {
        self.offset
    }
}

impl Iterator for Rows {
    type Item = Row;

    fn next(&mut self) -> Option<Row> {
        self.rows.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.rows.size_hint()
    }
}

impl ExactSizeIterator for Rows {}

/// An entry in a database's change log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEntry {
    /// Sequence number, unique and increasing per database
    pub seq: Seq,
    pub id: DocId,
    /// Winning revision after the change
    pub rev: RevisionId,
    pub deleted: bool,
}

/// Summary information about a database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DbInfo {
    pub db_name: String,
    /// Documents whose winner is not a tombstone
    pub doc_count: usize,
    /// Documents whose winner is a tombstone
    pub doc_del_count: usize,
    pub update_seq: Seq,
}

/// One edit in a bulk write.
#[derive(Debug, Clone, PartialEq)]
pub struct BulkEdit {
    /// Target id; `None` lets the backend assign one
    pub id: Option<DocId>,
    /// Expected parent (or, for replicated edits, the revision itself)
    pub rev: Option<RevisionId>,
    pub deleted: bool,
    pub body: Value,
    /// Explicit ancestry for replicated edits, newest first
    pub history: Vec<RevisionId>,
}

impl BulkEdit {
    /// A regular create or update.
    pub fn put(id: impl Into<DocId>, body: Value, rev: Option<RevisionId>) -> Self {
        Self {
            id: Some(id.into()),
            rev,
            deleted: false,
            body,
            history: Vec::new(),
        }
    }

    /// A deletion of `rev`.
    pub fn delete(id: impl Into<DocId>, rev: RevisionId) -> Self {
        Self {
            id: Some(id.into()),
            rev: Some(rev),
            deleted: true,
            body: Value::Object(Map::new()),
            history: Vec::new(),
        }
    }

    /// A replicated revision with its ancestry, newest first.
    pub fn replicated(
        id: impl Into<DocId>,
        history: Vec<RevisionId>,
        deleted: bool,
        body: Value,
    ) -> Self {
        Self {
            id: Some(id.into()),
            rev: history.first().cloned(),
            deleted,
            body,
            history,
        }
    }

    /// Parse a wire document, splitting off `_id`, `_rev`, `_deleted` and
    /// `_revisions`. Any other `_`-prefixed member is rejected.
    pub fn from_json(value: Value) -> Result<Self> {
        let Value::Object(mut map) = value else {
            return Err(Error::BadRequest("document must be a JSON object".into()));
        };

        let id = match map.remove("_id") {
            None => None,
            Some(Value::String(id)) => Some(id),
            Some(_) => return Err(Error::BadRequest("document id must be a string".into())),
        };
        let rev = match map.remove("_rev") {
            None | Some(Value::Null) => None,
            Some(Value::String(rev)) => Some(RevisionId::parse(&rev)?),
            Some(_) => return Err(Error::BadRequest("_rev must be a string".into())),
        };
        let deleted = match map.remove("_deleted") {
            None => false,
            Some(Value::Bool(deleted)) => deleted,
            Some(_) => return Err(Error::BadRequest("_deleted must be a boolean".into())),
        };
        let history = match map.remove("_revisions") {
            None => Vec::new(),
            Some(revisions) => parse_revisions(revisions)?,
        };

        if let Some(key) = map.keys().find(|k| k.starts_with('_')) {
            return Err(Error::BadRequest(format!(
                "bad special document member: {key}"
            )));
        }

        let rev = match (rev, history.first()) {
            (Some(rev), Some(newest)) if &rev != newest => {
                return Err(Error::BadRequest("_rev does not match _revisions".into()));
            }
            (None, Some(newest)) => Some(newest.clone()),
            (rev, _) => rev,
        };

        Ok(Self {
            id,
            rev,
            deleted,
            body: Value::Object(map),
            history,
        })
    }
}

/// Parse `{"start": N, "ids": [newest, ..]}` into revision ids.
fn parse_revisions(value: Value) -> Result<Vec<RevisionId>> {
    #[derive(Deserialize)]
    struct Revisions {
        start: u64,
        ids: Vec<String>,
    }

    let revisions: Revisions = serde_json::from_value(value)
        .map_err(|e| Error::BadRequest(format!("invalid _revisions: {e}")))?;
    if revisions.ids.len() as u64 > revisions.start {
        return Err(Error::BadRequest(
            "_revisions.start is smaller than its history".into(),
        ));
    }
    Ok(revisions
        .ids
        .into_iter()
        .enumerate()
        .map(|(i, hash)| RevisionId::new(revisions.start - i as u64, hash))
        .collect())
}

/// The outcome of one edit in a bulk write.
#[derive(Debug, Clone, PartialEq)]
pub struct BulkResult {
    pub id: DocId,
    pub outcome: Result<RevisionId>,
}
