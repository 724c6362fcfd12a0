//! # Settee Engine
//!
//! A document database core with pluggable backends.
//!
//! This crate holds everything except the HTTP surface: the driver contract,
//! the registry and client façade that route calls to a backend, and an
//! in-memory reference backend built on revision trees.
//!
//! ## Core Concepts
//!
//! ### Documents and revisions
//!
//! A document is a JSON object addressed by id. Every write produces a new
//! [`RevisionId`] of the form `<generation>-<hash>`, where the hash is derived
//! from the parent revision, the deletion flag and the body. The same edit
//! therefore always gets the same revision id.
//!
//! ### Revision trees
//!
//! A [`RevTree`] keeps every revision of a document. Concurrent edits show up
//! as sibling leaves; one leaf is chosen as the winner with a rule that only
//! depends on the leaves themselves (highest generation, then highest id).
//!
//! ### Drivers
//!
//! Backends implement [`Driver`], [`DriverClient`] and [`DriverDb`].
//! Optional capabilities ([`UuidGenerator`], [`Cluster`], [`LogReader`],
//! [`ClientAuthenticator`]) are probed at call time; absent ones surface as
//! [`Error::NotImplemented`].
//!
//! ### Cancellation
//!
//! Every operation takes a [`CancellationToken`]. A cancelled call returns
//! [`Error::Cancelled`] and commits nothing.
//!
//! ## Quick Start
//!
//! ```rust
//! use settee_engine::{memory::MemoryDriver, Options, Registry};
//! use serde_json::json;
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! # tokio_test_block(async {
//! let registry = Registry::new();
//! registry.register("memory", Arc::new(MemoryDriver));
//!
//! let cancel = CancellationToken::new();
//! let client = registry.new_client(&cancel, "memory", "").await.unwrap();
//! client.create_db(&cancel, "alpha", &Options::new()).await.unwrap();
//!
//! let db = client.db(&cancel, "alpha", &Options::new()).await.unwrap();
//! let rev = db.put(&cancel, "doc1", json!({"a": 1}), None, &Options::new()).await.unwrap();
//! assert_eq!(rev.generation, 1);
//! # });
//! # fn tokio_test_block<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(f)
//! # }
//! ```

pub mod auth;
pub mod client;
pub mod document;
pub mod driver;
pub mod error;
pub mod memory;
pub mod options;
pub mod query;
pub mod registry;
pub mod rev_tree;
pub mod revision;

pub use auth::{Credentials, MemoryUserStore, UserContext, UserStore, ADMIN_ROLE};
pub use client::{Client, Db};
pub use document::{BulkEdit, BulkResult, ChangeEntry, DbInfo, Document, Row, Rows};
pub use driver::{
    ChangesFeed, ClientAuthenticator, Cluster, Driver, DriverClient, DriverDb, LogReader,
    Membership, ServerInfo, UuidGenerator, Vendor,
};
pub use error::{Error, Result};
pub use options::Options;
pub use query::{AllDocsQuery, ChangesQuery, Feed, Since};
pub use registry::Registry;
pub use rev_tree::{RevNode, RevTree};
pub use revision::RevisionId;
pub use tokio_util::sync::CancellationToken;

/// Document identifier.
pub type DocId = String;

/// Position in a database's change log.
pub type Seq = u64;

/// Revision depth, 1 for a document's first revision.
pub type Generation = u64;
