//! Typed views of the options understood by `all_docs` and `changes`.

use crate::{Error, Options, Result, Seq};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::ops::Bound;
use std::time::Duration;

/// Range and paging parameters for `all_docs`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllDocsQuery {
    /// Where enumeration starts (the high end when descending)
    pub start: Bound<String>,
    /// Where enumeration stops (the low end when descending)
    pub end: Bound<String>,
    pub limit: Option<usize>,
    pub skip: usize,
    pub descending: bool,
    pub include_docs: bool,
}

impl Default for AllDocsQuery {
    fn default() -> Self {
        Self {
            start: Bound::Unbounded,
            end: Bound::Unbounded,
            limit: None,
            skip: 0,
            descending: false,
            include_docs: false,
        }
    }
}

impl AllDocsQuery {
    /// Read the query from an option set.
    ///
    /// Understands `startkey`/`start_key`, `endkey`/`end_key`,
    /// `inclusive_start`, `inclusive_end`, `limit`, `skip`, `descending`
    /// and `include_docs`.
    pub fn from_options(options: &Options) -> Result<Self> {
        let start_key = key_option(options, &["startkey", "start_key"])?;
        let end_key = key_option(options, &["endkey", "end_key"])?;
        let inclusive_start = options.get_bool("inclusive_start")?.unwrap_or(true);
        let inclusive_end = options.get_bool("inclusive_end")?.unwrap_or(true);

        Ok(Self {
            start: bound(start_key, inclusive_start),
            end: bound(end_key, inclusive_end),
            limit: options.get_u64("limit")?.map(|n| n as usize),
            skip: options.get_u64("skip")?.unwrap_or(0) as usize,
            descending: options.get_bool("descending")?.unwrap_or(false),
            include_docs: options.get_bool("include_docs")?.unwrap_or(false),
        })
    }

    /// The `(low, high)` key bounds in ascending key order, or `None` when
    /// the range cannot contain any key.
    pub fn key_range(&self) -> Option<(Bound<&str>, Bound<&str>)> {
        let (low, high) = if self.descending {
            (&self.end, &self.start)
        } else {
            (&self.start, &self.end)
        };
        let low = as_str_bound(low);
        let high = as_str_bound(high);

        let empty = match (low, high) {
            (Bound::Included(a), Bound::Included(b)) => a > b,
            (Bound::Included(a) | Bound::Excluded(a), Bound::Included(b) | Bound::Excluded(b)) => {
                a >= b
            }
            _ => false,
        };
        (!empty).then_some((low, high))
    }
}

fn key_option(options: &Options, keys: &[&str]) -> Result<Option<String>> {
    match options.first_of(keys) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(key)) => Ok(Some(key.clone())),
        Some(other) => Err(Error::BadRequest(format!(
            "{} must be a string document id, got {other}",
            keys[0]
        ))),
    }
}

fn bound(key: Option<String>, inclusive: bool) -> Bound<String> {
    match key {
        None => Bound::Unbounded,
        Some(key) if inclusive => Bound::Included(key),
        Some(key) => Bound::Excluded(key),
    }
}

fn as_str_bound(bound: &Bound<String>) -> Bound<&str> {
    match bound {
        Bound::Included(s) => Bound::Included(s.as_str()),
        Bound::Excluded(s) => Bound::Excluded(s.as_str()),
        Bound::Unbounded => Bound::Unbounded,
    }
}

/// How a changes request is served.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Feed {
    /// Return what exists and finish
    #[default]
    Normal,
    /// Wait for the first change if there is none yet, then finish
    LongPoll,
    /// Stream changes as they happen until cancelled or timed out
    Continuous,
}

impl Feed {
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "normal" => Ok(Feed::Normal),
            "longpoll" => Ok(Feed::LongPoll),
            "continuous" => Ok(Feed::Continuous),
            other => Err(Error::BadRequest(format!("unsupported feed type: {other}"))),
        }
    }
}

/// Where a changes feed starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Since {
    /// Changes after this sequence number
    Seq(Seq),
    /// Only changes that happen after the request
    Now,
}

impl Default for Since {
    fn default() -> Self {
        Since::Seq(0)
    }
}

/// Parameters for a changes request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangesQuery {
    pub since: Since,
    pub feed: Feed,
    /// How long longpoll/continuous feeds wait for new changes; for a
    /// continuous feed the wait restarts after every delivered batch
    pub timeout: Option<Duration>,
    pub limit: Option<usize>,
}

impl ChangesQuery {
    /// Read the query from an option set (`since`, `feed`, `timeout` in
    /// milliseconds, `limit`).
    pub fn from_options(options: &Options) -> Result<Self> {
        let since = match options.get_str("since")? {
            None => Since::default(),
            Some(s) if s == "now" => Since::Now,
            Some(s) => Since::Seq(
                s.parse()
                    .map_err(|_| Error::BadRequest(format!("invalid since value: {s}")))?,
            ),
        };
        let feed = match options.get_str("feed")? {
            None => Feed::Normal,
            Some(feed) => Feed::parse(&feed)?,
        };

        Ok(Self {
            since,
            feed,
            timeout: options.get_u64("timeout")?.map(Duration::from_millis),
            limit: options.get_u64("limit")?.map(|n| n as usize),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_docs_defaults() {
        let query = AllDocsQuery::from_options(&Options::new()).unwrap();
        assert_eq!(query, AllDocsQuery::default());
        assert_eq!(
            query.key_range(),
            Some((Bound::Unbounded, Bound::Unbounded))
        );
    }

    #[test]
    fn all_docs_range_options() {
        let opts = Options::new()
            .with("startkey", "b")
            .with("end_key", "d")
            .with("inclusive_end", false)
            .with("limit", 2)
            .with("skip", "1");
        let query = AllDocsQuery::from_options(&opts).unwrap();

        assert_eq!(query.start, Bound::Included("b".into()));
        assert_eq!(query.end, Bound::Excluded("d".into()));
        assert_eq!(query.limit, Some(2));
        assert_eq!(query.skip, 1);
    }

    #[test]
    fn descending_swaps_bounds() {
        let opts = Options::new()
            .with("startkey", "z")
            .with("endkey", "a")
            .with("descending", true);
        let query = AllDocsQuery::from_options(&opts).unwrap();
        assert_eq!(
            query.key_range(),
            Some((Bound::Included("a"), Bound::Included("z")))
        );
    }

    #[test]
    fn inverted_range_is_empty() {
        let opts = Options::new().with("startkey", "z").with("endkey", "a");
        let query = AllDocsQuery::from_options(&opts).unwrap();
        assert_eq!(query.key_range(), None);

        let opts = Options::new()
            .with("startkey", "a")
            .with("endkey", "a")
            .with("inclusive_end", false);
        let query = AllDocsQuery::from_options(&opts).unwrap();
        assert_eq!(query.key_range(), None);
    }

    #[test]
    fn non_string_keys_rejected() {
        let opts = Options::new().with("startkey", 5);
        assert!(matches!(
            AllDocsQuery::from_options(&opts),
            Err(Error::BadRequest(_))
        ));
    }

    #[test]
    fn changes_options() {
        let opts = Options::new()
            .with("since", "now")
            .with("feed", "continuous")
            .with("timeout", 250);
        let query = ChangesQuery::from_options(&opts).unwrap();
        assert_eq!(query.since, Since::Now);
        assert_eq!(query.feed, Feed::Continuous);
        assert_eq!(query.timeout, Some(Duration::from_millis(250)));

        let query = ChangesQuery::from_options(&Options::new().with("since", 7)).unwrap();
        assert_eq!(query.since, Since::Seq(7));
        assert_eq!(query.feed, Feed::Normal);

        assert!(ChangesQuery::from_options(&Options::new().with("feed", "eventsource")).is_err());
    }
}
