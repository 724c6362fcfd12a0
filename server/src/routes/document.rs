//! Single-document endpoints.

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde_json::Value;
use settee_engine::{Error, Options};

use crate::error::Result;
use crate::handlers::{handle_put_doc, parse_json, rev_option, DocResponse};
use crate::AppState;

/// Create document routes.
pub fn routes() -> Router<AppState> {
    Router::new().route(
        "/{db}/{docid}",
        get(get_doc).put(put_doc).delete(delete_doc),
    )
}

/// GET /{db}/{docid}?rev=&conflicts= - Fetch a document.
async fn get_doc(
    State(state): State<AppState>,
    Path((db, doc_id)): Path<(String, String)>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<Json<Value>> {
    let options = Options::from_query(params);
    let rev = rev_option(&options)?;
    let cancel = state.request_token();
    let db = state.client.db(&cancel, &db, &Options::new()).await?;

    let doc = db.get(&cancel, &doc_id, rev.as_ref(), &options).await?;
    Ok(Json(doc.to_json()))
}

/// PUT /{db}/{docid}?rev= - Create or update a document.
async fn put_doc(
    State(state): State<AppState>,
    Path((db, doc_id)): Path<(String, String)>,
    Query(params): Query<Vec<(String, String)>>,
    body: Bytes,
) -> Result<(StatusCode, Json<DocResponse>)> {
    let options = Options::from_query(params);
    let rev = rev_option(&options)?;
    let body = parse_json(&body)?;
    let cancel = state.request_token();
    let db = state.client.db(&cancel, &db, &Options::new()).await?;

    let response = handle_put_doc(&db, &cancel, &doc_id, body, rev, &options).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// DELETE /{db}/{docid}?rev= - Delete a document.
async fn delete_doc(
    State(state): State<AppState>,
    Path((db, doc_id)): Path<(String, String)>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<Json<DocResponse>> {
    let options = Options::from_query(params);
    let cancel = state.request_token();
    let db = state.client.db(&cancel, &db, &Options::new()).await?;

    // A delete without rev is a conflict
    let rev = rev_option(&options)?
        .ok_or_else(|| Error::Conflict("document update conflict".into()))?;
    let rev = db.delete(&cancel, &doc_id, &rev, &options).await?;
    Ok(Json(DocResponse::new(doc_id, rev)))
}
