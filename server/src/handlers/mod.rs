//! Request handlers.
//!
//! Handlers translate between CouchDB wire formats and façade calls. The
//! route modules only extract request parts and pick a handler.

mod changes;
mod documents;

pub use changes::{collect_changes, continuous_body, ChangeRow, ChangesResponse, RevRef};
pub use documents::{
    all_docs_response, handle_bulk_docs, handle_post_doc, handle_put_doc, AllDocsResponse,
    AllDocsRow, BulkDocResult, BulkDocsRequest, DocResponse, RowValue,
};

use crate::error::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;
use settee_engine::{Options, RevisionId};

/// `{"ok": true}`.
#[derive(Debug, Serialize)]
pub struct OkResponse {
    pub ok: bool,
}

impl OkResponse {
    pub fn new() -> Self {
        Self { ok: true }
    }
}

impl Default for OkResponse {
    fn default() -> Self {
        Self::new()
    }
}

/// Decode a JSON request body.
///
/// Bodies are read as raw bytes so that clients which omit the
/// `Content-Type` header still work.
pub fn parse_json<T: DeserializeOwned>(body: &[u8]) -> Result<T> {
    Ok(serde_json::from_slice(body)?)
}

/// The `rev` query option, if present.
pub fn rev_option(options: &Options) -> Result<Option<RevisionId>> {
    Ok(options
        .get_str("rev")?
        .map(|rev| RevisionId::parse(&rev))
        .transpose()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;

    #[test]
    fn parse_json_reports_bad_request() {
        let err = parse_json::<serde_json::Value>(b"{not json").unwrap_err();
        assert!(matches!(err, AppError::InvalidJson(_)));
    }

    #[test]
    fn rev_option_parses() {
        let opts = Options::from_query([("rev", "2-abc")]);
        assert_eq!(rev_option(&opts).unwrap(), Some(RevisionId::new(2, "abc")));
        assert_eq!(rev_option(&Options::new()).unwrap(), None);
        assert!(rev_option(&Options::from_query([("rev", "nope")])).is_err());
    }
}
