//! The driver contract.
//!
//! A backend plugs into Settee by implementing [`Driver`], which builds a
//! [`DriverClient`] from a data-source name. The client covers database
//! lifecycle and hands out [`DriverDb`] handles for document work.
//!
//! Optional capabilities (UUID generation, cluster membership, log
//! retrieval, client authentication) are separate traits. A client exposes
//! the ones it supports through the `Option`-returning accessors on
//! [`DriverClient`]; the defaults report the capability as absent.
//!
//! Every method takes a [`CancellationToken`]. Implementations must not
//! commit a mutation once the token has fired before their commit point.

use crate::auth::Credentials;
use crate::{
    BulkEdit, BulkResult, ChangeEntry, DbInfo, DocId, Document, Options, Result, RevisionId, Rows,
};
use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// A stream of change-log entries.
pub type ChangesFeed = BoxStream<'static, Result<ChangeEntry>>;

/// Builds clients for one kind of backend.
#[async_trait]
pub trait Driver: Send + Sync {
    /// Connect to the backend described by `dsn`.
    async fn new_client(
        &self,
        cancel: &CancellationToken,
        dsn: &str,
    ) -> Result<Arc<dyn DriverClient>>;
}

/// A connection to a backend.
#[async_trait]
pub trait DriverClient: Send + Sync {
    async fn server_info(&self, cancel: &CancellationToken, options: &Options)
        -> Result<ServerInfo>;

    async fn all_dbs(&self, cancel: &CancellationToken, options: &Options) -> Result<Vec<String>>;

    async fn db_exists(
        &self,
        cancel: &CancellationToken,
        name: &str,
        options: &Options,
    ) -> Result<bool>;

    async fn create_db(&self, cancel: &CancellationToken, name: &str, options: &Options)
        -> Result<()>;

    async fn destroy_db(
        &self,
        cancel: &CancellationToken,
        name: &str,
        options: &Options,
    ) -> Result<()>;

    /// Open a handle to an existing database.
    async fn db(
        &self,
        cancel: &CancellationToken,
        name: &str,
        options: &Options,
    ) -> Result<Arc<dyn DriverDb>>;

    fn uuid_generator(&self) -> Option<&dyn UuidGenerator> {
        None
    }

    fn cluster(&self) -> Option<&dyn Cluster> {
        None
    }

    fn log_reader(&self) -> Option<&dyn LogReader> {
        None
    }

    fn authenticator(&self) -> Option<&dyn ClientAuthenticator> {
        None
    }
}

/// Document operations on one database.
#[async_trait]
pub trait DriverDb: Send + Sync {
    async fn info(&self, cancel: &CancellationToken) -> Result<DbInfo>;

    /// Create or update `id`. `rev` must be the current winning revision,
    /// or `None` for a new document.
    async fn put(
        &self,
        cancel: &CancellationToken,
        id: &str,
        body: Value,
        rev: Option<&RevisionId>,
        options: &Options,
    ) -> Result<RevisionId>;

    /// Create a document under a backend-assigned id.
    async fn create_doc(
        &self,
        cancel: &CancellationToken,
        body: Value,
        options: &Options,
    ) -> Result<(DocId, RevisionId)>;

    /// Fetch `rev`, or the winning revision when `rev` is `None`.
    async fn get(
        &self,
        cancel: &CancellationToken,
        id: &str,
        rev: Option<&RevisionId>,
        options: &Options,
    ) -> Result<Document>;

    /// Write a tombstone on top of `rev`.
    async fn delete(
        &self,
        cancel: &CancellationToken,
        id: &str,
        rev: &RevisionId,
        options: &Options,
    ) -> Result<RevisionId>;

    /// Apply each edit independently; one result per edit, in order.
    async fn bulk_docs(
        &self,
        cancel: &CancellationToken,
        edits: Vec<BulkEdit>,
        options: &Options,
    ) -> Result<Vec<BulkResult>>;

    /// Enumerate documents in id order.
    async fn all_docs(&self, cancel: &CancellationToken, options: &Options) -> Result<Rows>;

    /// Read the change log. The feed keeps a clone of `cancel` and ends
    /// when it fires.
    async fn changes(&self, cancel: &CancellationToken, options: &Options) -> Result<ChangesFeed>;
}

/// Server-side UUID generation.
#[async_trait]
pub trait UuidGenerator: Send + Sync {
    async fn uuids(&self, cancel: &CancellationToken, count: usize) -> Result<Vec<String>>;
}

/// Cluster membership reporting.
#[async_trait]
pub trait Cluster: Send + Sync {
    async fn membership(&self, cancel: &CancellationToken) -> Result<Membership>;
}

/// Access to the backend's own log.
#[async_trait]
pub trait LogReader: Send + Sync {
    /// Read up to `length` bytes ending `offset` bytes before the end.
    async fn log(&self, cancel: &CancellationToken, length: u64, offset: u64) -> Result<Vec<u8>>;
}

/// Authentication of the client connection itself.
#[async_trait]
pub trait ClientAuthenticator: Send + Sync {
    async fn authenticate(&self, cancel: &CancellationToken, credentials: &Credentials)
        -> Result<()>;
}

/// Version and vendor information about a backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerInfo {
    pub couchdb: String,
    pub version: String,
    pub vendor: Vendor,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vendor {
    pub name: String,
    pub version: String,
}

impl ServerInfo {
    pub fn new(vendor: impl Into<String>, version: impl Into<String>) -> Self {
        let version = version.into();
        Self {
            couchdb: "Welcome".into(),
            version: version.clone(),
            vendor: Vendor {
                name: vendor.into(),
                version,
            },
        }
    }
}

/// Nodes known to a cluster.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    /// Every known node, cluster members included
    pub all_nodes: Vec<String>,
    pub cluster_nodes: Vec<String>,
}
