//! HTTP Basic authentication.

use super::Authenticator;
use async_trait::async_trait;
use axum::http::{header::AUTHORIZATION, request::Parts, HeaderMap};
use base64::{engine::general_purpose::STANDARD, Engine};
use settee_engine::{CancellationToken, Credentials, Error, UserContext, UserStore};

/// Validates `Authorization: Basic ...` credentials against the user store.
#[derive(Debug, Clone, Copy, Default)]
pub struct BasicAuthenticator;

/// Extract Basic credentials from request headers.
pub fn basic_credentials(headers: &HeaderMap) -> Option<Credentials> {
    let header = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, encoded) = header.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }

    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (username, password) = decoded.split_once(':')?;
    Some(Credentials::basic(username, password))
}

#[async_trait]
impl Authenticator for BasicAuthenticator {
    fn method_name(&self) -> &'static str {
        // The name CouchDB uses for its Basic handler
        "default"
    }

    async fn authenticate(
        &self,
        parts: &Parts,
        users: &dyn UserStore,
        cancel: &CancellationToken,
    ) -> Result<UserContext, Error> {
        let credentials = basic_credentials(&parts.headers)
            .ok_or_else(|| Error::Unauthorized("missing or malformed basic credentials".into()))?;

        match credentials {
            Credentials::Basic { username, password } => {
                users.validate(cancel, &username, &password).await
            }
            _ => Err(Error::Unauthorized("unsupported credentials".into())),
        }
    }
}
