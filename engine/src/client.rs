//! The client façade.
//!
//! [`Client`] and [`Db`] are what applications hold. They forward to the
//! driver, layer the client's default options under every call's own
//! options, and turn missing optional capabilities into
//! [`Error::NotImplemented`].

use crate::auth::Credentials;
use crate::driver::{DriverClient, DriverDb};
use crate::{
    BulkEdit, BulkResult, ChangesFeed, DbInfo, DocId, Document, Error, Membership, Options,
    Result, RevisionId, Rows, ServerInfo,
};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Largest number of UUIDs one `uuids` call may ask for.
pub const MAX_UUIDS: usize = 1000;

/// Check a database name: a lowercase letter, then lowercase letters,
/// digits or any of `_$()+-/`.
pub fn validate_db_name(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid = chars.next().is_some_and(|c| c.is_ascii_lowercase())
        && chars.all(|c| {
            c.is_ascii_lowercase() || c.is_ascii_digit() || "_$()+-/".contains(c)
        });
    if valid {
        Ok(())
    } else {
        Err(Error::BadRequest("invalid database name".into()))
    }
}

/// A connection to a backend, created by [`Registry::new_client`](crate::Registry::new_client).
#[derive(Clone)]
pub struct Client {
    driver: String,
    dsn: String,
    inner: Arc<dyn DriverClient>,
    defaults: Options,
}

impl Client {
    pub(crate) fn new(driver: &str, dsn: &str, inner: Arc<dyn DriverClient>) -> Self {
        Self {
            driver: driver.to_string(),
            dsn: dsn.to_string(),
            inner,
            defaults: Options::new(),
        }
    }

    /// Options layered under every call made through this client and the
    /// [`Db`] handles it opens.
    pub fn with_defaults(mut self, defaults: Options) -> Self {
        self.defaults = defaults;
        self
    }

    /// Name of the driver this client was created with.
    pub fn driver(&self) -> &str {
        &self.driver
    }

    pub fn dsn(&self) -> &str {
        &self.dsn
    }

    pub fn defaults(&self) -> &Options {
        &self.defaults
    }

    fn effective(&self, options: &Options) -> Options {
        self.defaults.clone().layer(options.clone())
    }

    pub async fn server_info(
        &self,
        cancel: &CancellationToken,
        options: &Options,
    ) -> Result<ServerInfo> {
        self.inner.server_info(cancel, &self.effective(options)).await
    }

    /// Database names, sorted.
    pub async fn all_dbs(&self, cancel: &CancellationToken, options: &Options) -> Result<Vec<String>> {
        self.inner.all_dbs(cancel, &self.effective(options)).await
    }

    pub async fn db_exists(
        &self,
        cancel: &CancellationToken,
        name: &str,
        options: &Options,
    ) -> Result<bool> {
        self.inner.db_exists(cancel, name, &self.effective(options)).await
    }

    pub async fn create_db(
        &self,
        cancel: &CancellationToken,
        name: &str,
        options: &Options,
    ) -> Result<()> {
        validate_db_name(name)?;
        self.inner.create_db(cancel, name, &self.effective(options)).await
    }

    pub async fn destroy_db(
        &self,
        cancel: &CancellationToken,
        name: &str,
        options: &Options,
    ) -> Result<()> {
        self.inner.destroy_db(cancel, name, &self.effective(options)).await
    }

    /// Open an existing database.
    pub async fn db(&self, cancel: &CancellationToken, name: &str, options: &Options) -> Result<Db> {
        let inner = self.inner.db(cancel, name, &self.effective(options)).await?;
        Ok(Db {
            name: name.to_string(),
            inner,
            defaults: self.defaults.clone(),
        })
    }

    /// Ask the backend for `count` fresh UUIDs.
    pub async fn uuids(&self, cancel: &CancellationToken, count: usize) -> Result<Vec<String>> {
        if count > MAX_UUIDS {
            return Err(Error::BadRequest(format!(
                "count must not exceed {MAX_UUIDS}"
            )));
        }
        let generator = self
            .inner
            .uuid_generator()
            .ok_or_else(|| absent("uuids"))?;
        generator.uuids(cancel, count).await
    }

    pub async fn membership(&self, cancel: &CancellationToken) -> Result<Membership> {
        let cluster = self.inner.cluster().ok_or_else(|| absent("membership"))?;
        cluster.membership(cancel).await
    }

    /// Read up to `length` bytes of the backend log, `offset` bytes from
    /// its end.
    pub async fn log(&self, cancel: &CancellationToken, length: u64, offset: u64) -> Result<Vec<u8>> {
        let reader = self.inner.log_reader().ok_or_else(|| absent("log"))?;
        reader.log(cancel, length, offset).await
    }

    /// Authenticate the connection to the backend.
    pub async fn authenticate(
        &self,
        cancel: &CancellationToken,
        credentials: &Credentials,
    ) -> Result<()> {
        let authenticator = self
            .inner
            .authenticator()
            .ok_or_else(|| absent("authenticate"))?;
        authenticator.authenticate(cancel, credentials).await
    }
}

fn absent(capability: &str) -> Error {
    Error::NotImplemented(format!("driver does not support {capability}"))
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("driver", &self.driver)
            .field("dsn", &self.dsn)
            .field("defaults", &self.defaults)
            .finish_non_exhaustive()
    }
}

/// A handle on one database.
#[derive(Clone)]
pub struct Db {
    name: String,
    inner: Arc<dyn DriverDb>,
    defaults: Options,
}

impl Db {
    pub fn name(&self) -> &str {
        &self.name
    }

    fn effective(&self, options: &Options) -> Options {
        self.defaults.clone().layer(options.clone())
    }

    pub async fn info(&self, cancel: &CancellationToken) -> Result<DbInfo> {
        self.inner.info(cancel).await
    }

    /// Create or update a document. `rev` is the revision being replaced.
    pub async fn put(
        &self,
        cancel: &CancellationToken,
        id: &str,
        body: Value,
        rev: Option<&RevisionId>,
        options: &Options,
    ) -> Result<RevisionId> {
        self.inner
            .put(cancel, id, body, rev, &self.effective(options))
            .await
    }

    /// Create a document under a backend-assigned id.
    pub async fn create_doc(
        &self,
        cancel: &CancellationToken,
        body: Value,
        options: &Options,
    ) -> Result<(DocId, RevisionId)> {
        self.inner
            .create_doc(cancel, body, &self.effective(options))
            .await
    }

    pub async fn get(
        &self,
        cancel: &CancellationToken,
        id: &str,
        rev: Option<&RevisionId>,
        options: &Options,
    ) -> Result<Document> {
        self.inner
            .get(cancel, id, rev, &self.effective(options))
            .await
    }

    pub async fn delete(
        &self,
        cancel: &CancellationToken,
        id: &str,
        rev: &RevisionId,
        options: &Options,
    ) -> Result<RevisionId> {
        self.inner
            .delete(cancel, id, rev, &self.effective(options))
            .await
    }

    pub async fn bulk_docs(
        &self,
        cancel: &CancellationToken,
        edits: Vec<BulkEdit>,
        options: &Options,
    ) -> Result<Vec<BulkResult>> {
        self.inner
            .bulk_docs(cancel, edits, &self.effective(options))
            .await
    }

    pub async fn all_docs(&self, cancel: &CancellationToken, options: &Options) -> Result<Rows> {
        self.inner.all_docs(cancel, &self.effective(options)).await
    }

    pub async fn changes(&self, cancel: &CancellationToken, options: &Options) -> Result<ChangesFeed> {
        self.inner.changes(cancel, &self.effective(options)).await
    }
}

impl fmt::Debug for Db {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Db")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}
