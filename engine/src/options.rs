//! Layered option sets.
//!
//! Options are backend-specific `key -> JSON value` pairs. A call's
//! effective options are built once by layering sets on top of each other:
//! later layers override earlier keys. The façade always layers client
//! defaults first and the call's own options second.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// A set of options.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Options(BTreeMap<String, Value>);

impl Options {
    /// Create an empty option set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(key, value);
        self
    }

    /// Insert or replace one option.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    /// Layer `other` on top of this set. Keys in `other` win.
    pub fn layer(mut self, other: Options) -> Self {
        self.0.extend(other.0);
        self
    }

    /// Merge any number of sets, left to right, last write wins.
    pub fn merged<I>(layers: I) -> Self
    where
        I: IntoIterator<Item = Options>,
    {
        layers.into_iter().fold(Self::new(), Self::layer)
    }

    /// Parse query-string pairs the CouchDB way: each value is decoded as
    /// JSON, falling back to a plain string.
    pub fn from_query<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: AsRef<str>,
    {
        pairs
            .into_iter()
            .map(|(k, v)| {
                let raw = v.as_ref();
                let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.into()));
                (k.into(), value)
            })
            .collect()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// First present key among `keys`, for options with aliases.
    pub fn first_of(&self, keys: &[&str]) -> Option<&Value> {
        keys.iter().find_map(|k| self.0.get(*k))
    }

    /// A string option. Numbers are accepted and stringified.
    pub fn get_str(&self, key: &str) -> Result<Option<String>> {
        match self.0.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(Value::Number(n)) => Ok(Some(n.to_string())),
            Some(other) => Err(invalid(key, "a string", other)),
        }
    }

    /// A boolean option. Accepts `true`/`false` as JSON or as strings.
    pub fn get_bool(&self, key: &str) -> Result<Option<bool>> {
        match self.0.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Bool(b)) => Ok(Some(*b)),
            Some(Value::String(s)) if s == "true" => Ok(Some(true)),
            Some(Value::String(s)) if s == "false" => Ok(Some(false)),
            Some(other) => Err(invalid(key, "a boolean", other)),
        }
    }

    /// A non-negative integer option. Accepts numbers or numeric strings.
    pub fn get_u64(&self, key: &str) -> Result<Option<u64>> {
        match self.0.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Number(n)) => n
                .as_u64()
                .map(Some)
                .ok_or_else(|| invalid(key, "a non-negative integer", &Value::Number(n.clone()))),
            Some(Value::String(s)) => s
                .parse()
                .map(Some)
                .map_err(|_| invalid(key, "a non-negative integer", &Value::String(s.clone()))),
            Some(other) => Err(invalid(key, "a non-negative integer", other)),
        }
    }
}

fn invalid(key: &str, expected: &str, got: &Value) -> Error {
    Error::BadRequest(format!("option {key:?} must be {expected}, got {got}"))
}

impl FromIterator<(String, Value)> for Options {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl From<BTreeMap<String, Value>> for Options {
    fn from(map: BTreeMap<String, Value>) -> Self {
        Self(map)
    }
}
