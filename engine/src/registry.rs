//! Driver registry.
//!
//! Drivers are registered once at startup and looked up by name when a
//! client is created.

use crate::{Client, Driver, Error, Result};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Named drivers.
#[derive(Default)]
pub struct Registry {
    drivers: RwLock<HashMap<String, Arc<dyn Driver>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `driver` under `name`.
    ///
    /// # Panics
    ///
    /// Panics if a driver with the same name is already registered.
    pub fn register(&self, name: impl Into<String>, driver: Arc<dyn Driver>) {
        let name = name.into();
        let mut drivers = self.drivers.write();
        if drivers.contains_key(&name) {
            panic!("driver {name:?} is already registered");
        }
        tracing::info!(driver = %name, "driver registered");
        drivers.insert(name, driver);
    }

    /// Registered driver names, sorted.
    pub fn drivers(&self) -> Vec<String> {
        let mut names: Vec<_> = self.drivers.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Connect to `dsn` through the driver registered as `driver`.
    pub async fn new_client(
        &self,
        cancel: &CancellationToken,
        driver: &str,
        dsn: &str,
    ) -> Result<Client> {
        let found = self.drivers.read().get(driver).cloned();
        let found = found.ok_or_else(|| Error::DriverNotFound(driver.to_string()))?;

        let inner = found.new_client(cancel, dsn).await?;
        Ok(Client::new(driver, dsn, inner))
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("drivers", &self.drivers())
            .finish()
    }
}
