//! Database lifecycle, enumeration, bulk and change endpoints.

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header::CONTENT_TYPE, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use settee_engine::{ChangesQuery, DbInfo, Feed, Options};

use crate::auth::AuthUser;
use crate::error::Result;
use crate::handlers::{
    all_docs_response, collect_changes, continuous_body, handle_bulk_docs, handle_post_doc,
    parse_json, AllDocsResponse, BulkDocResult, BulkDocsRequest, DocResponse, OkResponse,
};
use crate::AppState;

/// Create database routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/{db}",
            get(info).put(create).delete(destroy).post(post_doc),
        )
        .route("/{db}/_all_docs", get(all_docs))
        .route("/{db}/_bulk_docs", post(bulk_docs))
        .route("/{db}/_changes", get(changes))
}

/// GET/HEAD /{db} - Database info.
async fn info(State(state): State<AppState>, Path(db): Path<String>) -> Result<Json<DbInfo>> {
    let cancel = state.request_token();
    let db = state.client.db(&cancel, &db, &Options::new()).await?;
    Ok(Json(db.info(&cancel).await?))
}

/// PUT /{db} - Create a database.
async fn create(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(db): Path<String>,
) -> Result<(StatusCode, Json<OkResponse>)> {
    let cancel = state.request_token();
    state.client.create_db(&cancel, &db, &Options::new()).await?;
    tracing::info!(db = %db, user = ?auth.user.name, "Database created");
    Ok((StatusCode::CREATED, Json(OkResponse::new())))
}

/// DELETE /{db} - Destroy a database.
async fn destroy(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(db): Path<String>,
) -> Result<Json<OkResponse>> {
    let cancel = state.request_token();
    state.client.destroy_db(&cancel, &db, &Options::new()).await?;
    tracing::info!(db = %db, user = ?auth.user.name, "Database destroyed");
    Ok(Json(OkResponse::new()))
}

/// POST /{db} - Create a document.
async fn post_doc(
    State(state): State<AppState>,
    Path(db): Path<String>,
    Query(params): Query<Vec<(String, String)>>,
    body: Bytes,
) -> Result<(StatusCode, Json<DocResponse>)> {
    let options = Options::from_query(params);
    let cancel = state.request_token();
    let db = state.client.db(&cancel, &db, &Options::new()).await?;

    let response = handle_post_doc(&db, &cancel, parse_json(&body)?, &options).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// GET /{db}/_all_docs - Enumerate documents.
async fn all_docs(
    State(state): State<AppState>,
    Path(db): Path<String>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<Json<AllDocsResponse>> {
    let options = Options::from_query(params);
    let cancel = state.request_token();
    let db = state.client.db(&cancel, &db, &Options::new()).await?;

    let rows = db.all_docs(&cancel, &options).await?;
    Ok(Json(all_docs_response(rows)))
}

/// POST /{db}/_bulk_docs - Write many documents.
async fn bulk_docs(
    State(state): State<AppState>,
    Path(db): Path<String>,
    Query(params): Query<Vec<(String, String)>>,
    body: Bytes,
) -> Result<(StatusCode, Json<Vec<BulkDocResult>>)> {
    let options = Options::from_query(params);
    let request: BulkDocsRequest = parse_json(&body)?;
    let cancel = state.request_token();
    let db = state.client.db(&cancel, &db, &Options::new()).await?;

    let results = handle_bulk_docs(&db, &cancel, request, options).await?;
    Ok((StatusCode::CREATED, Json(results)))
}

/// GET /{db}/_changes - Read the change log.
async fn changes(
    State(state): State<AppState>,
    Path(db): Path<String>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<Response> {
    let options = Options::from_query(params);
    let query = ChangesQuery::from_options(&options)?;
    let cancel = state.request_token();
    let db = state.client.db(&cancel, &db, &Options::new()).await?;

    let feed = db.changes(&cancel, &options).await?;
    if query.feed == Feed::Continuous {
        let body = continuous_body(feed);
        return Ok(([(CONTENT_TYPE, "application/json")], body).into_response());
    }

    let mut response = collect_changes(feed).await?;
    // Nothing new: report where the log currently ends
    if response.results.is_empty() {
        response.last_seq = db.info(&cancel).await?.update_seq;
    }
    Ok(Json(response).into_response())
}
