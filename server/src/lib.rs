//! Settee Server - a CouchDB-style HTTP front end for Settee backends.
//!
//! The server translates the REST surface into client façade calls against
//! one configured driver, authenticates admin routes through an
//! authenticator chain and serves a read-only configuration tree.

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod routes;

use crate::auth::{AuthChain, BasicAuthenticator};
use crate::config::{Config, ConfigError, ConfigStore, ADMINS_SECTION};
use axum::Router;
use settee_engine::{CancellationToken, Client, MemoryUserStore, Registry, UserStore, ADMIN_ROLE};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub client: Client,
    /// Configuration served under `/_config`
    pub settings: Arc<ConfigStore>,
    pub auth: Arc<AuthChain>,
    pub users: Arc<dyn UserStore>,
    /// Whether admin routes demand credentials
    pub auth_required: bool,
    /// Root token; cancelling it ends every in-flight request
    pub shutdown: CancellationToken,
}

impl AppState {
    /// State with the Basic authenticator as the only chain member.
    pub fn new(
        client: Client,
        settings: ConfigStore,
        users: Arc<dyn UserStore>,
        auth_required: bool,
    ) -> Self {
        Self {
            client,
            settings: Arc::new(settings),
            auth: Arc::new(AuthChain::new().with(Arc::new(BasicAuthenticator))),
            users,
            auth_required,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn with_shutdown(mut self, shutdown: CancellationToken) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn with_auth_chain(mut self, chain: AuthChain) -> Self {
        self.auth = Arc::new(chain);
        self
    }

    /// A token for one request, cancelled on shutdown.
    pub fn request_token(&self) -> CancellationToken {
        self.shutdown.child_token()
    }
}

/// Build the application router.
pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(routes::create_routes())
        .layer(
            ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any),
            ),
        )
        .with_state(state)
}

/// Startup failures.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Engine(#[from] settee_engine::Error),
}

/// Load the served configuration, seed admin users and connect to the
/// configured driver.
pub async fn bootstrap(
    config: &Config,
    registry: &Registry,
    shutdown: CancellationToken,
) -> Result<AppState, StartupError> {
    let mut settings = match &config.config_file {
        Some(path) => {
            tracing::info!("Loading configuration from {}", path.display());
            ConfigStore::load(path)?
        }
        None => ConfigStore::new(),
    };

    let mut users = MemoryUserStore::new();
    for (name, password) in settings.take_section(ADMINS_SECTION).unwrap_or_default() {
        users.add_user(name, &password, vec![ADMIN_ROLE.to_string()]);
    }
    let auth_required = config.require_auth.unwrap_or(!users.is_empty());
    tracing::info!(
        admins = users.len(),
        auth_required,
        "Authentication configured"
    );

    let client = registry
        .new_client(&shutdown, &config.driver, &config.dsn)
        .await?;
    tracing::info!(driver = %config.driver, "Connected to storage driver");

    Ok(AppState::new(client, settings, Arc::new(users), auth_required).with_shutdown(shutdown))
}
