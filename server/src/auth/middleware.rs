//! Authentication extractor.
//!
//! Handlers that need an identity take an [`AuthUser`] argument. When the
//! server does not require authentication the extractor yields the anonymous
//! user; otherwise it runs the authenticator chain and rejects with 401.

use axum::{extract::FromRequestParts, http::request::Parts};
use settee_engine::UserContext;

use crate::error::AppError;
use crate::AppState;

/// Authenticated user extracted from request.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user: UserContext,
    /// Method that authenticated the request, `None` for anonymous access
    pub method: Option<&'static str>,
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if !state.auth_required {
            return Ok(AuthUser {
                user: UserContext::anonymous(),
                method: None,
            });
        }

        let cancel = state.request_token();
        let authed = state
            .auth
            .authenticate(parts, state.users.as_ref(), &cancel)
            .await
            .inspect_err(|err| tracing::debug!(path = %parts.uri.path(), "authentication failed: {err}"))?;

        tracing::debug!(user = ?authed.user.name, method = authed.method, "request authenticated");
        Ok(AuthUser {
            user: authed.user,
            method: Some(authed.method),
        })
    }
}
