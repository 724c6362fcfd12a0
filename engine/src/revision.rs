//! Content-addressed revision identifiers.
//!
//! A revision id is `<generation>-<hash>`. The generation is the length of
//! the edit chain from the root; the hash is derived from the parent revision,
//! the deleted flag and the canonical JSON body, so the same edit applied on
//! two nodes yields the same id.

use crate::{Error, Generation};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Bytes of the SHA-256 digest kept in the hash part.
const HASH_BYTES: usize = 16;

/// A revision identifier.
///
/// Ordering rules:
/// 1. Higher generation wins
/// 2. If generations are equal, the lexicographically higher hash wins
///
/// With equal generations the string prefixes match, so this is the same as
/// comparing the full `<generation>-<hash>` strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RevisionId {
    /// Edit-chain length, starting at 1
    pub generation: Generation,
    /// Hex content hash
    pub hash: String,
}

impl RevisionId {
    /// Create a revision id from its parts.
    pub fn new(generation: Generation, hash: impl Into<String>) -> Self {
        Self {
            generation,
            hash: hash.into(),
        }
    }

    /// Compute the child revision of `parent` for the given body.
    ///
    /// Fails when the parent's generation is already at the maximum.
    pub fn compute(
        parent: Option<&RevisionId>,
        deleted: bool,
        body: &serde_json::Value,
    ) -> crate::Result<Self> {
        let generation = match parent {
            Some(p) => p.next_generation()?,
            None => 1,
        };

        let mut hasher = Sha256::new();
        if let Some(parent) = parent {
            hasher.update(parent.to_string().as_bytes());
        }
        hasher.update([0u8, deleted as u8]);
        write_canonical(body, &mut hasher);
        let digest = hasher.finalize();

        Ok(Self {
            generation,
            hash: hex::encode(&digest[..HASH_BYTES]),
        })
    }

    /// Generation of a child of this revision.
    pub fn next_generation(&self) -> crate::Result<Generation> {
        self.generation
            .checked_add(1)
            .ok_or_else(|| Error::BadRequest("revision generation overflow".into()))
    }

    /// Parse a `<generation>-<hash>` string.
    pub fn parse(s: &str) -> crate::Result<Self> {
        let invalid = || Error::BadRequest(format!("invalid rev format: {s:?}"));
        let (generation, hash) = s.split_once('-').ok_or_else(invalid)?;
        let generation: Generation = generation.parse().map_err(|_| invalid())?;
        if generation == 0 || hash.is_empty() {
            return Err(invalid());
        }
        Ok(Self::new(generation, hash))
    }
}

/// Feed `value` to the hasher as JSON with object keys sorted.
fn write_canonical(value: &serde_json::Value, hasher: &mut Sha256) {
    use serde_json::Value;

    match value {
        Value::Object(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            hasher.update(b"{");
            for (i, (key, value)) in entries.into_iter().enumerate() {
                if i > 0 {
                    hasher.update(b",");
                }
                hasher.update(Value::String(key.clone()).to_string().as_bytes());
                hasher.update(b":");
                write_canonical(value, hasher);
            }
            hasher.update(b"}");
        }
        Value::Array(items) => {
            hasher.update(b"[");
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    hasher.update(b",");
                }
                write_canonical(item, hasher);
            }
            hasher.update(b"]");
        }
        scalar => hasher.update(scalar.to_string().as_bytes()),
    }
}

impl fmt::Display for RevisionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.generation, self.hash)
    }
}

impl FromStr for RevisionId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Ord for RevisionId {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.generation.cmp(&other.generation) {
            Ordering::Equal => self.hash.cmp(&other.hash),
            other => other,
        }
    }
}

impl PartialOrd for RevisionId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Serialize for RevisionId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for RevisionId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(de::Error::custom)
    }
}
