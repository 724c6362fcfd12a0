//! The in-memory reference backend.
//!
//! Every client owns a catalog of databases. Each database is a
//! [`Store`](store::Store) behind its own async lock; the catalog itself sits
//! behind a `parking_lot` lock that is only held for lookups and lifecycle
//! changes, never across an await.

mod changes;
pub mod database;
pub mod store;

use crate::driver::UuidGenerator;
use crate::{
    BulkEdit, BulkResult, ChangesFeed, ChangesQuery, DbInfo, DocId, Document, Driver,
    DriverClient, DriverDb, Error, Options, Result, RevisionId, Rows, ServerInfo, Since,
};
use crate::{AllDocsQuery, Cluster, Membership};
use async_trait::async_trait;
use database::Database;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Name the memory driver is conventionally registered under.
pub const DRIVER_NAME: &str = "memory";

/// Name reported as the cluster node of a memory client.
const NODE_NAME: &str = "settee@localhost";

/// The in-memory driver. Every client it creates starts empty.
#[derive(Debug, Clone, Copy, Default)]
pub struct MemoryDriver;

#[async_trait]
impl Driver for MemoryDriver {
    async fn new_client(
        &self,
        cancel: &CancellationToken,
        dsn: &str,
    ) -> Result<Arc<dyn DriverClient>> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        tracing::info!(dsn = %dsn, "memory client created");
        Ok(Arc::new(MemoryClient::new()))
    }
}

/// Databases by name.
#[derive(Debug, Default)]
struct Catalog {
    dbs: RwLock<BTreeMap<String, Arc<Database>>>,
}

impl Catalog {
    fn lookup(&self, name: &str) -> Result<Arc<Database>> {
        self.dbs.read().get(name).cloned().ok_or_else(Error::missing)
    }
}

/// A client of the memory driver.
#[derive(Debug, Clone, Default)]
pub struct MemoryClient {
    catalog: Arc<Catalog>,
}

impl MemoryClient {
    pub fn new() -> Self {
        Self::default()
    }
}

fn ensure_live(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        return Err(Error::Cancelled);
    }
    Ok(())
}

#[async_trait]
impl DriverClient for MemoryClient {
    async fn server_info(
        &self,
        cancel: &CancellationToken,
        _options: &Options,
    ) -> Result<ServerInfo> {
        ensure_live(cancel)?;
        Ok(ServerInfo::new("Settee", env!("CARGO_PKG_VERSION")))
    }

    async fn all_dbs(&self, cancel: &CancellationToken, _options: &Options) -> Result<Vec<String>> {
        ensure_live(cancel)?;
        Ok(self.catalog.dbs.read().keys().cloned().collect())
    }

    async fn db_exists(
        &self,
        cancel: &CancellationToken,
        name: &str,
        _options: &Options,
    ) -> Result<bool> {
        ensure_live(cancel)?;
        Ok(self.catalog.dbs.read().contains_key(name))
    }

    async fn create_db(
        &self,
        cancel: &CancellationToken,
        name: &str,
        _options: &Options,
    ) -> Result<()> {
        ensure_live(cancel)?;
        let mut dbs = self.catalog.dbs.write();
        if dbs.contains_key(name) {
            return Err(Error::PreconditionFailed(
                "the database could not be created, the file already exists".into(),
            ));
        }
        dbs.insert(name.to_string(), Arc::new(Database::new(name)));
        tracing::info!(db = %name, "database created");
        Ok(())
    }

    async fn destroy_db(
        &self,
        cancel: &CancellationToken,
        name: &str,
        _options: &Options,
    ) -> Result<()> {
        ensure_live(cancel)?;
        let db = self.catalog.dbs.write().remove(name).ok_or_else(Error::missing)?;
        db.close();
        tracing::info!(db = %name, "database destroyed");
        Ok(())
    }

    async fn db(
        &self,
        cancel: &CancellationToken,
        name: &str,
        _options: &Options,
    ) -> Result<Arc<dyn DriverDb>> {
        ensure_live(cancel)?;
        self.catalog.lookup(name)?;
        Ok(Arc::new(MemoryDb {
            name: name.to_string(),
            catalog: Arc::clone(&self.catalog),
        }))
    }

    fn uuid_generator(&self) -> Option<&dyn UuidGenerator> {
        Some(self)
    }

    fn cluster(&self) -> Option<&dyn Cluster> {
        Some(self)
    }
}

#[async_trait]
impl UuidGenerator for MemoryClient {
    async fn uuids(&self, cancel: &CancellationToken, count: usize) -> Result<Vec<String>> {
        ensure_live(cancel)?;
        Ok((0..count).map(|_| new_doc_id()).collect())
    }
}

#[async_trait]
impl Cluster for MemoryClient {
    async fn membership(&self, cancel: &CancellationToken) -> Result<Membership> {
        ensure_live(cancel)?;
        Ok(Membership {
            all_nodes: vec![NODE_NAME.to_string()],
            cluster_nodes: vec![NODE_NAME.to_string()],
        })
    }
}

fn new_doc_id() -> DocId {
    uuid::Uuid::new_v4().simple().to_string()
}

/// A handle on one database of a [`MemoryClient`].
///
/// The handle resolves its database on every call, so a handle opened before
/// `destroy_db` reports `NotFound` afterwards, and one on a re-created
/// database sees the new one.
#[derive(Debug, Clone)]
pub struct MemoryDb {
    name: String,
    catalog: Arc<Catalog>,
}

impl MemoryDb {
    fn database(&self) -> Result<Arc<Database>> {
        self.catalog.lookup(&self.name)
    }
}

#[async_trait]
impl DriverDb for MemoryDb {
    async fn info(&self, cancel: &CancellationToken) -> Result<DbInfo> {
        let db = self.database()?;
        db.read(cancel, |store| store.info(&self.name)).await
    }

    async fn put(
        &self,
        cancel: &CancellationToken,
        id: &str,
        body: Value,
        rev: Option<&RevisionId>,
        _options: &Options,
    ) -> Result<RevisionId> {
        let db = self.database()?;
        let result = db.write(cancel, |store| store.put(id, body, rev)).await;
        if let Err(Error::Conflict(_)) = &result {
            tracing::debug!(db = %self.name, doc = %id, "update conflict");
        }
        result
    }

    async fn create_doc(
        &self,
        cancel: &CancellationToken,
        body: Value,
        options: &Options,
    ) -> Result<(DocId, RevisionId)> {
        let id = new_doc_id();
        let rev = self.put(cancel, &id, body, None, options).await?;
        Ok((id, rev))
    }

    async fn get(
        &self,
        cancel: &CancellationToken,
        id: &str,
        rev: Option<&RevisionId>,
        options: &Options,
    ) -> Result<Document> {
        let conflicts = options.get_bool("conflicts")?.unwrap_or(false);
        let db = self.database()?;
        db.read(cancel, |store| store.get(id, rev, conflicts)).await?
    }

    async fn delete(
        &self,
        cancel: &CancellationToken,
        id: &str,
        rev: &RevisionId,
        _options: &Options,
    ) -> Result<RevisionId> {
        let db = self.database()?;
        db.write(cancel, |store| store.delete(id, rev)).await
    }

    async fn bulk_docs(
        &self,
        cancel: &CancellationToken,
        edits: Vec<BulkEdit>,
        options: &Options,
    ) -> Result<Vec<BulkResult>> {
        let new_edits = options.get_bool("new_edits")?.unwrap_or(true);
        let db = self.database()?;

        let results = db
            .write(cancel, |store| {
                let results = edits
                    .into_iter()
                    .map(|mut edit| {
                        let id = match edit.id.take() {
                            Some(id) => id,
                            None if new_edits => new_doc_id(),
                            None => {
                                return BulkResult {
                                    id: String::new(),
                                    outcome: Err(Error::BadRequest(
                                        "replicated edits need a document id".into(),
                                    )),
                                };
                            }
                        };
                        let outcome = store.apply(&id, edit, new_edits);
                        BulkResult { id, outcome }
                    })
                    .collect::<Vec<_>>();
                Ok(results)
            })
            .await?;

        let failed = results.iter().filter(|r| r.outcome.is_err()).count();
        if failed > 0 {
            tracing::debug!(db = %self.name, total = results.len(), failed, "bulk write had rejected edits");
        }
        Ok(results)
    }

    async fn all_docs(&self, cancel: &CancellationToken, options: &Options) -> Result<Rows> {
        let query = AllDocsQuery::from_options(options)?;
        let db = self.database()?;
        db.read(cancel, |store| store.all_docs(&query)).await
    }

    async fn changes(&self, cancel: &CancellationToken, options: &Options) -> Result<ChangesFeed> {
        let query = ChangesQuery::from_options(options)?;
        let db = self.database()?;

        let rx = db.subscribe();
        let since = match query.since {
            Since::Seq(seq) => seq,
            Since::Now => db.read(cancel, |store| store.update_seq()).await?,
        };
        Ok(changes::feed(db, rx, since, &query, cancel.clone()))
    }
}
