//! Users, credentials and credential validation.

use crate::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use tokio_util::sync::CancellationToken;

/// Role granted to server administrators.
pub const ADMIN_ROLE: &str = "_admin";

/// The identity attached to an authenticated request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserContext {
    /// User name; `None` for anonymous access
    pub name: Option<String>,
    pub roles: Vec<String>,
    /// Extra backend-supplied facts about the user
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub claims: Map<String, Value>,
}

impl UserContext {
    /// A named user with the given roles.
    pub fn new(name: impl Into<String>, roles: Vec<String>) -> Self {
        Self {
            name: Some(name.into()),
            roles,
            claims: Map::new(),
        }
    }

    /// The context used when no credentials are required.
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn is_admin(&self) -> bool {
        self.roles.iter().any(|r| r == ADMIN_ROLE)
    }
}

/// Credentials a client presents.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Credentials {
    Basic { username: String, password: String },
}

impl Credentials {
    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Credentials::Basic {
            username: username.into(),
            password: password.into(),
        }
    }
}

/// A service that confirms username/password pairs.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Return the user's context if `password` is correct, else
    /// [`Error::Unauthorized`].
    async fn validate(
        &self,
        cancel: &CancellationToken,
        username: &str,
        password: &str,
    ) -> Result<UserContext>;
}

#[derive(Debug, Clone)]
struct UserRecord {
    salt: String,
    digest: Vec<u8>,
    roles: Vec<String>,
}

/// An in-process user store with salted SHA-256 password digests.
#[derive(Debug, Clone, Default)]
pub struct MemoryUserStore {
    users: HashMap<String, UserRecord>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a user.
    pub fn add_user(&mut self, name: impl Into<String>, password: &str, roles: Vec<String>) {
        let salt = uuid::Uuid::new_v4().simple().to_string();
        let digest = digest(&salt, password);
        self.users.insert(
            name.into(),
            UserRecord {
                salt,
                digest,
                roles,
            },
        );
    }

    /// Builder-style variant of [`add_user`](Self::add_user) for admins.
    pub fn with_admin(mut self, name: impl Into<String>, password: &str) -> Self {
        self.add_user(name, password, vec![ADMIN_ROLE.to_string()]);
        self
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn validate(
        &self,
        cancel: &CancellationToken,
        username: &str,
        password: &str,
    ) -> Result<UserContext> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        let rejected = || Error::Unauthorized("name or password is incorrect".into());

        let user = self.users.get(username).ok_or_else(rejected)?;
        if !constant_time_eq(&digest(&user.salt, password), &user.digest) {
            tracing::debug!(user = %username, "password rejected");
            return Err(rejected());
        }
        Ok(UserContext::new(username, user.roles.clone()))
    }
}

fn digest(salt: &str, password: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    hasher.finalize().to_vec()
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
