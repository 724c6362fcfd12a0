//! Store - the per-database state container.
//!
//! The Store holds every document's revision tree and the change log. It is
//! plain synchronous state; [`Database`](super::database::Database) wraps it in
//! a lock and takes care of cancellation and wake-ups.

use crate::document::validate_doc_id;
use crate::{
    AllDocsQuery, BulkEdit, ChangeEntry, DbInfo, DocId, Document, Error, Result, RevTree,
    RevisionId, Row, Rows, Seq,
};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Documents and change log of one database.
#[derive(Debug, Clone, Default)]
pub struct Store {
    /// Revision trees by id; the map order is the enumeration order
    docs: BTreeMap<DocId, RevTree>,
    /// Change log; the entry with seq `n` sits at index `n - 1`
    changes: Vec<ChangeEntry>,
}

impl Store {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sequence number of the latest change, 0 when nothing happened yet.
    pub fn update_seq(&self) -> Seq {
        self.changes.len() as Seq
    }

    /// Number of documents, deleted ones included.
    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    /// The revision tree of a document.
    pub fn tree(&self, id: &str) -> Option<&RevTree> {
        self.docs.get(id)
    }

    /// Create or update a document.
    ///
    /// `expected` must be the current winning revision, or `None` when the
    /// document does not exist yet. A document whose winner is a tombstone
    /// may also be re-created with `None`; the new revision extends the
    /// tombstone.
    pub fn put(&mut self, id: &str, body: Value, expected: Option<&RevisionId>) -> Result<RevisionId> {
        validate_doc_id(id)?;
        if !body.is_object() {
            return Err(Error::BadRequest("document must be a JSON object".into()));
        }

        let before = self.winner_of(id);
        let parent = match (&before, expected) {
            (None, None) => None,
            (None, Some(_)) => return Err(Error::conflict()),
            (Some(winner), Some(expected)) if winner == expected => Some(winner.clone()),
            (Some(winner), None) if self.is_deleted(id) => Some(winner.clone()),
            (Some(_), _) => return Err(Error::conflict()),
        };

        let tree = self.docs.entry(id.to_string()).or_default();
        let rev = tree.insert_edit(parent.as_ref(), false, body)?;
        self.record_change(id, before);
        Ok(rev)
    }

    /// Write a tombstone on top of the winning revision.
    pub fn delete(&mut self, id: &str, expected: &RevisionId) -> Result<RevisionId> {
        let tree = self.docs.get_mut(id).ok_or_else(Error::missing)?;
        if tree.is_deleted() {
            return Err(Error::deleted());
        }
        let before = tree.winner().cloned();
        if before.as_ref() != Some(expected) {
            return Err(Error::conflict());
        }

        let rev = tree.insert_edit(Some(expected), true, Value::Object(Map::new()))?;
        self.record_change(id, before);
        Ok(rev)
    }

    /// Graft a replicated revision path without conflict checks.
    ///
    /// Returns the newest revision of the path. A change is logged only if
    /// the graft moved the winner.
    pub fn graft(
        &mut self,
        id: &str,
        history: &[RevisionId],
        deleted: bool,
        body: Value,
    ) -> Result<RevisionId> {
        validate_doc_id(id)?;
        let newest = history
            .first()
            .cloned()
            .ok_or_else(|| Error::BadRequest("replicated edit needs a revision".into()))?;

        let before = self.winner_of(id);
        let mut tree = self.docs.get(id).cloned().unwrap_or_default();
        tree.graft(history, deleted, body)?;
        self.docs.insert(id.to_string(), tree);
        self.record_change(id, before);
        Ok(newest)
    }

    /// Apply one bulk edit.
    ///
    /// With `new_edits` the edit follows the `put`/`delete` rules; without
    /// it the edit is grafted as a replicated revision.
    pub fn apply(&mut self, id: &str, edit: BulkEdit, new_edits: bool) -> Result<RevisionId> {
        if !new_edits {
            let history = if edit.history.is_empty() {
                edit.rev.into_iter().collect()
            } else {
                edit.history
            };
            return self.graft(id, &history, edit.deleted, edit.body);
        }

        if edit.deleted {
            return match edit.rev {
                Some(rev) => self.delete(id, &rev),
                None if self.docs.contains_key(id) => Err(Error::conflict()),
                None => Err(Error::missing()),
            };
        }
        self.put(id, edit.body, edit.rev.as_ref())
    }

    /// Fetch a revision, or the winner when `rev` is `None`.
    pub fn get(&self, id: &str, rev: Option<&RevisionId>, conflicts: bool) -> Result<Document> {
        let tree = self.docs.get(id).ok_or_else(Error::missing)?;
        let (rev, node) = match rev {
            Some(rev) => {
                let node = tree.get(rev).ok_or_else(Error::missing)?;
                (rev, node)
            }
            None => {
                let (rev, node) = tree.winning_node().ok_or_else(Error::missing)?;
                if node.deleted {
                    return Err(Error::deleted());
                }
                (rev, node)
            }
        };
        let body = node.body.clone().ok_or_else(Error::missing)?;

        Ok(Document {
            id: id.to_string(),
            rev: rev.clone(),
            deleted: node.deleted,
            body,
            conflicts: if conflicts {
                tree.conflicts()
            } else {
                Vec::new()
            },
        })
    }

    /// Enumerate documents in id order.
    pub fn all_docs(&self, query: &AllDocsQuery) -> Rows {
        let total = self.docs.len();
        let Some(range) = query.key_range() else {
            return Rows::new(total, query.skip, Vec::new());
        };

        let matched = self.docs.range::<str, _>(range);
        let iter: Box<dyn Iterator<Item = (&DocId, &RevTree)>> = if query.descending {
            Box::new(matched.rev())
        } else {
            Box::new(matched)
        };

        let rows = iter
            .skip(query.skip)
            .take(query.limit.unwrap_or(usize::MAX))
            .filter_map(|(id, tree)| {
                let (rev, node) = tree.winning_node()?;
                Some(Row {
                    id: id.clone(),
                    rev: rev.clone(),
                    deleted: node.deleted,
                    doc: query
                        .include_docs
                        .then(|| node.body.clone())
                        .flatten(),
                })
            })
            .collect();

        Rows::new(total, query.skip, rows)
    }

    /// Change-log entries with a sequence number above `since`.
    pub fn changes_since(&self, since: Seq, limit: Option<usize>) -> Vec<ChangeEntry> {
        let start = (since as usize).min(self.changes.len());
        self.changes[start..]
            .iter()
            .take(limit.unwrap_or(usize::MAX))
            .cloned()
            .collect()
    }

    /// Summary counters.
    pub fn info(&self, name: &str) -> DbInfo {
        let deleted = self.docs.values().filter(|t| t.is_deleted()).count();
        DbInfo {
            db_name: name.to_string(),
            doc_count: self.docs.len() - deleted,
            doc_del_count: deleted,
            update_seq: self.update_seq(),
        }
    }

    fn winner_of(&self, id: &str) -> Option<RevisionId> {
        self.docs.get(id).and_then(|t| t.winner().cloned())
    }

    fn is_deleted(&self, id: &str) -> bool {
        self.docs.get(id).is_some_and(RevTree::is_deleted)
    }

    /// Append a change entry if the winner of `id` moved away from `before`.
    fn record_change(&mut self, id: &str, before: Option<RevisionId>) {
        let Some(tree) = self.docs.get(id) else {
            return;
        };
        let Some(winner) = tree.winner() else {
            return;
        };
        if before.as_ref() == Some(winner) {
            return;
        }

        let entry = ChangeEntry {
            seq: self.update_seq() + 1,
            id: id.to_string(),
            rev: winner.clone(),
            deleted: tree.is_deleted(),
        };
        self.changes.push(entry);
    }
}
