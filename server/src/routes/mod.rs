//! HTTP route definitions.

mod config;
mod database;
mod document;
mod server;

use crate::AppState;
use axum::Router;

/// Create all application routes.
pub fn create_routes() -> Router<AppState> {
    Router::new()
        .merge(server::routes())
        .merge(config::routes())
        .merge(database::routes())
        .merge(document::routes())
}
