//! Request authentication.
//!
//! An [`AuthChain`] holds the configured authenticators in priority order.
//! Each one inspects the request and either produces a [`UserContext`] or
//! declines with `Unauthorized`; the first success wins.

mod basic;
mod middleware;

pub use basic::BasicAuthenticator;
pub use middleware::AuthUser;

use async_trait::async_trait;
use axum::http::request::Parts;
use settee_engine::{CancellationToken, Error, UserContext, UserStore};
use std::sync::Arc;

/// One way of authenticating a request.
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Name reported in `/_session` when this method succeeded.
    fn method_name(&self) -> &'static str;

    async fn authenticate(
        &self,
        parts: &Parts,
        users: &dyn UserStore,
        cancel: &CancellationToken,
    ) -> Result<UserContext, Error>;
}

/// A successful authentication.
#[derive(Debug, Clone, PartialEq)]
pub struct Authenticated {
    pub user: UserContext,
    /// The method that accepted the request
    pub method: &'static str,
}

/// Authenticators tried in order.
#[derive(Clone, Default)]
pub struct AuthChain {
    authenticators: Vec<Arc<dyn Authenticator>>,
}

impl AuthChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an authenticator with lower priority than the existing ones.
    pub fn with(mut self, authenticator: Arc<dyn Authenticator>) -> Self {
        self.authenticators.push(authenticator);
        self
    }

    pub fn method_names(&self) -> Vec<&'static str> {
        self.authenticators.iter().map(|a| a.method_name()).collect()
    }

    /// Run the chain. Fails with the last `Unauthorized` if no method
    /// accepts the request; any other failure aborts the chain.
    pub async fn authenticate(
        &self,
        parts: &Parts,
        users: &dyn UserStore,
        cancel: &CancellationToken,
    ) -> Result<Authenticated, Error> {
        let mut last = Error::Unauthorized("authentication required".into());

        for authenticator in &self.authenticators {
            match authenticator.authenticate(parts, users, cancel).await {
                Ok(user) => {
                    return Ok(Authenticated {
                        user,
                        method: authenticator.method_name(),
                    })
                }
                Err(err @ Error::Unauthorized(_)) => last = err,
                Err(err) => return Err(err),
            }
        }

        Err(last)
    }
}
