//! Configuration endpoints. The configuration is read-only.

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use settee_engine::Error;
use std::collections::BTreeMap;

use crate::auth::AuthUser;
use crate::config::Section;
use crate::error::Result;
use crate::AppState;

/// Create config routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/_config", get(all_sections))
        .route("/_config/{section}", get(section))
        .route(
            "/_config/{section}/{key}",
            get(item).put(read_only).delete(read_only),
        )
}

/// GET /_config - Every section.
async fn all_sections(
    State(state): State<AppState>,
    _auth: AuthUser,
) -> Json<BTreeMap<String, Section>> {
    Json(state.settings.all().clone())
}

/// GET /_config/{section} - One section.
async fn section(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(section): Path<String>,
) -> Result<Json<Section>> {
    Ok(Json(state.settings.section(&section)?.clone()))
}

/// GET /_config/{section}/{key} - One value, as a JSON string.
async fn item(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path((section, key)): Path<(String, String)>,
) -> Result<Json<String>> {
    Ok(Json(state.settings.get(&section, &key)?.to_string()))
}

/// PUT/DELETE /_config/{section}/{key} - Rejected.
async fn read_only(_auth: AuthUser) -> Result<Json<String>> {
    Err(Error::NotImplemented("configuration is read-only".into()).into())
}
