//! Server-level endpoints.

use axum::{
    extract::{Query, State},
    http::header::CONTENT_TYPE,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Serialize;
use settee_engine::{Error, Membership, Options, ServerInfo, UserContext};

use crate::auth::AuthUser;
use crate::error::Result;
use crate::AppState;

/// Bytes of log returned when `bytes` is not given.
const DEFAULT_LOG_BYTES: u64 = 1000;

/// Create server routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(root))
        .route("/_all_dbs", get(all_dbs))
        .route("/_uuids", get(uuids))
        .route("/_membership", get(membership))
        .route("/_log", get(log))
        .route("/_session", get(session))
}

/// GET / - Server welcome and version.
async fn root(State(state): State<AppState>) -> Result<Json<ServerInfo>> {
    let cancel = state.request_token();
    let info = state.client.server_info(&cancel, &Options::new()).await?;
    Ok(Json(info))
}

/// GET /_all_dbs - Sorted database names.
async fn all_dbs(State(state): State<AppState>) -> Result<Json<Vec<String>>> {
    let cancel = state.request_token();
    Ok(Json(state.client.all_dbs(&cancel, &Options::new()).await?))
}

#[derive(Serialize)]
struct UuidsResponse {
    uuids: Vec<String>,
}

/// GET /_uuids?count=N - Fresh identifiers from the backend.
async fn uuids(
    State(state): State<AppState>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<Json<UuidsResponse>> {
    let count = uuid_count(&Options::from_query(params))?;

    let cancel = state.request_token();
    let uuids = state.client.uuids(&cancel, count).await?;
    Ok(Json(UuidsResponse { uuids }))
}

/// The `count` parameter, defaulting to 1.
fn uuid_count(options: &Options) -> Result<usize> {
    let count = options.get_u64("count")?.unwrap_or(1);
    let count = usize::try_from(count)
        .map_err(|_| Error::BadRequest(format!("count {count} is too large")))?;
    Ok(count)
}

/// GET /_membership - Cluster nodes.
async fn membership(State(state): State<AppState>, _auth: AuthUser) -> Result<Json<Membership>> {
    let cancel = state.request_token();
    Ok(Json(state.client.membership(&cancel).await?))
}

/// GET /_log?bytes=&offset= - Tail of the backend log.
async fn log(
    State(state): State<AppState>,
    _auth: AuthUser,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<impl IntoResponse> {
    let options = Options::from_query(params);
    let length = options.get_u64("bytes")?.unwrap_or(DEFAULT_LOG_BYTES);
    let offset = options.get_u64("offset")?.unwrap_or(0);

    let cancel = state.request_token();
    let bytes = state.client.log(&cancel, length, offset).await?;
    Ok(([(CONTENT_TYPE, "text/plain; charset=utf-8")], bytes))
}

#[derive(Serialize)]
struct SessionResponse {
    ok: bool,
    #[serde(rename = "userCtx")]
    user_ctx: UserContext,
    info: SessionInfo,
}

#[derive(Serialize)]
struct SessionInfo {
    authentication_handlers: Vec<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    authenticated: Option<&'static str>,
}

/// GET /_session - The identity the request authenticated as.
async fn session(State(state): State<AppState>, auth: AuthUser) -> Json<SessionResponse> {
    Json(SessionResponse {
        ok: true,
        user_ctx: auth.user,
        info: SessionInfo {
            authentication_handlers: state.auth.method_names(),
            authenticated: auth.method,
        },
    })
}
