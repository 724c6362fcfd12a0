//! Revision trees and deterministic winner selection.
//!
//! Every document owns a forest of revisions. Edits never overwrite; they add
//! a child under an existing revision (or a new root). Conflicts show up as
//! several leaves, and exactly one leaf is the winner.
//!
//! # Algorithm
//!
//! 1. Collect all leaves (revisions that are nobody's parent)
//! 2. Pick the leaf with the highest generation
//! 3. Break generation ties by the lexicographically highest revision id
//!
//! The winner depends only on the set of nodes in the tree, never on the
//! order they were inserted in. This is what lets replicas converge.

use crate::{Error, Result, RevisionId};
use serde_json::Value;
use std::collections::{HashMap, HashSet};

/// A single revision in a tree.
#[derive(Debug, Clone, PartialEq)]
pub struct RevNode {
    /// Parent revision, `None` for a root
    pub parent: Option<RevisionId>,
    /// Tombstone flag
    pub deleted: bool,
    /// Body; `None` when only the revision id is known (grafted ancestor)
    pub body: Option<Value>,
}

/// The edit history of one document.
#[derive(Debug, Clone, Default)]
pub struct RevTree {
    nodes: HashMap<RevisionId, RevNode>,
    winner: Option<RevisionId>,
}

impl RevTree {
    /// Create an empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of revisions in the tree.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True if the tree holds no revisions.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Check if a revision is part of the tree.
    pub fn contains(&self, rev: &RevisionId) -> bool {
        self.nodes.contains_key(rev)
    }

    /// Get a revision node.
    pub fn get(&self, rev: &RevisionId) -> Option<&RevNode> {
        self.nodes.get(rev)
    }

    /// The current winning revision.
    pub fn winner(&self) -> Option<&RevisionId> {
        self.winner.as_ref()
    }

    /// The winning revision's node.
    pub fn winning_node(&self) -> Option<(&RevisionId, &RevNode)> {
        let rev = self.winner.as_ref()?;
        self.nodes.get(rev).map(|node| (rev, node))
    }

    /// True if the winning revision is a tombstone.
    pub fn is_deleted(&self) -> bool {
        self.winning_node().is_some_and(|(_, node)| node.deleted)
    }

    /// All leaf revisions, highest first.
    pub fn leaves(&self) -> Vec<&RevisionId> {
        let parents: HashSet<&RevisionId> =
            self.nodes.values().filter_map(|n| n.parent.as_ref()).collect();
        let mut leaves: Vec<_> = self.nodes.keys().filter(|r| !parents.contains(r)).collect();
        leaves.sort_by(|a, b| b.cmp(a));
        leaves
    }

    /// Non-deleted leaves other than the winner, highest first.
    pub fn conflicts(&self) -> Vec<RevisionId> {
        self.leaves()
            .into_iter()
            .filter(|rev| Some(*rev) != self.winner.as_ref())
            .filter(|rev| self.nodes.get(*rev).is_some_and(|n| !n.deleted))
            .cloned()
            .collect()
    }

    /// Add an edit as a child of `parent` (or as a root).
    ///
    /// The new revision id is content addressed. Inserting an edit that is
    /// already present is a no-op that returns the existing id.
    pub fn insert_edit(
        &mut self,
        parent: Option<&RevisionId>,
        deleted: bool,
        body: Value,
    ) -> Result<RevisionId> {
        let rev = RevisionId::compute(parent, deleted, &body)?;
        if !self.nodes.contains_key(&rev) {
            self.nodes.insert(
                rev.clone(),
                RevNode {
                    parent: parent.cloned(),
                    deleted,
                    body: Some(body),
                },
            );
            self.recompute_winner();
        }
        Ok(rev)
    }

    /// Graft an explicit revision path into the tree.
    ///
    /// `history` runs newest first: `history[0]` is the revision carrying
    /// `body`, each following entry is the parent of the one before it.
    /// Existing nodes are kept; a grafted path only ever adds information.
    pub fn graft(&mut self, history: &[RevisionId], deleted: bool, body: Value) -> Result<()> {
        if history.is_empty() {
            return Err(Error::BadRequest("revision history is empty".into()));
        }
        for pair in history.windows(2) {
            if pair[0].generation != pair[1].next_generation()? {
                return Err(Error::BadRequest(format!(
                    "revision history is not contiguous at {}",
                    pair[0]
                )));
            }
        }

        for (i, rev) in history.iter().enumerate() {
            let parent = history.get(i + 1).cloned();
            let (node_deleted, node_body) = if i == 0 {
                (deleted, Some(body.clone()))
            } else {
                (false, None)
            };

            match self.nodes.get_mut(rev) {
                Some(existing) => {
                    if existing.parent.is_none() {
                        existing.parent = parent;
                    }
                    if existing.body.is_none() && node_body.is_some() {
                        existing.body = node_body;
                        existing.deleted = node_deleted;
                    }
                }
                None => {
                    self.nodes.insert(
                        rev.clone(),
                        RevNode {
                            parent,
                            deleted: node_deleted,
                            body: node_body,
                        },
                    );
                }
            }
        }

        self.recompute_winner();
        Ok(())
    }

    fn recompute_winner(&mut self) {
        let winner = self.leaves().first().map(|rev| (*rev).clone());
        self.winner = winner;
    }
}
