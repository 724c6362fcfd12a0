//! Document writes and enumeration in CouchDB wire format.

use crate::error::{describe, AppError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use settee_engine::{
    BulkEdit, BulkResult, CancellationToken, Db, DocId, Document, Error, Options, RevisionId, Row,
    Rows,
};

/// Response for a single document write.
#[derive(Debug, Serialize)]
pub struct DocResponse {
    pub ok: bool,
    pub id: DocId,
    pub rev: RevisionId,
}

impl DocResponse {
    pub fn new(id: DocId, rev: RevisionId) -> Self {
        Self { ok: true, id, rev }
    }
}

/// Response for `_all_docs`.
#[derive(Debug, Serialize)]
pub struct AllDocsResponse {
    pub total_rows: usize,
    pub offset: usize,
    pub rows: Vec<AllDocsRow>,
}

#[derive(Debug, Serialize)]
pub struct AllDocsRow {
    pub id: DocId,
    pub key: DocId,
    pub value: RowValue,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doc: Option<Value>,
}

#[derive(Debug, Serialize)]
pub struct RowValue {
    pub rev: RevisionId,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub deleted: bool,
}

impl From<Row> for AllDocsRow {
    fn from(row: Row) -> Self {
        let doc = row.doc.map(|body| {
            Document {
                id: row.id.clone(),
                rev: row.rev.clone(),
                deleted: row.deleted,
                body,
                conflicts: Vec::new(),
            }
            .to_json()
        });
        Self {
            key: row.id.clone(),
            id: row.id,
            value: RowValue {
                rev: row.rev,
                deleted: row.deleted,
            },
            doc,
        }
    }
}

/// Render an `all_docs` result.
pub fn all_docs_response(rows: Rows) -> AllDocsResponse {
    AllDocsResponse {
        total_rows: rows.total_rows(),
        offset: rows.offset(),
        rows: rows.map(AllDocsRow::from).collect(),
    }
}

/// Request body for `_bulk_docs`.
#[derive(Debug, Deserialize)]
pub struct BulkDocsRequest {
    pub docs: Vec<Value>,
    #[serde(default)]
    pub new_edits: Option<bool>,
}

/// Per-document outcome of `_bulk_docs`.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum BulkDocResult {
    Ok {
        ok: bool,
        id: DocId,
        rev: RevisionId,
    },
    Err {
        id: DocId,
        error: &'static str,
        reason: String,
    },
}

impl From<BulkResult> for BulkDocResult {
    fn from(result: BulkResult) -> Self {
        match result.outcome {
            Ok(rev) => BulkDocResult::Ok {
                ok: true,
                id: result.id,
                rev,
            },
            Err(err) => {
                let (_, error, reason) = describe(&err);
                BulkDocResult::Err {
                    id: result.id,
                    error,
                    reason,
                }
            }
        }
    }
}

/// Apply a `_bulk_docs` request. A malformed document fails the whole
/// request; write conflicts are reported per document.
pub async fn handle_bulk_docs(
    db: &Db,
    cancel: &CancellationToken,
    request: BulkDocsRequest,
    mut options: Options,
) -> Result<Vec<BulkDocResult>> {
    let edits = request
        .docs
        .into_iter()
        .map(BulkEdit::from_json)
        .collect::<std::result::Result<Vec<_>, _>>()?;
    if let Some(new_edits) = request.new_edits {
        options.set("new_edits", new_edits);
    }

    let results = db.bulk_docs(cancel, edits, &options).await?;
    Ok(results.into_iter().map(BulkDocResult::from).collect())
}

/// Create, update or delete `id` from a wire document.
///
/// The revision may come from the body's `_rev` or the `rev` query option;
/// when both are given they must agree.
pub async fn handle_put_doc(
    db: &Db,
    cancel: &CancellationToken,
    id: &str,
    body: Value,
    query_rev: Option<RevisionId>,
    options: &Options,
) -> Result<DocResponse> {
    let edit = BulkEdit::from_json(body)?;
    if let Some(body_id) = &edit.id {
        if body_id != id {
            return Err(AppError::BadRequest(
                "document id in body does not match the URL".into(),
            ));
        }
    }

    let rev = match (edit.rev, query_rev) {
        (Some(a), Some(b)) if a != b => {
            return Err(AppError::BadRequest(
                "document rev in body does not match the rev parameter".into(),
            ));
        }
        (a, b) => a.or(b),
    };

    let rev = if edit.deleted {
        let rev = rev.ok_or_else(|| Error::Conflict("document update conflict".into()))?;
        db.delete(cancel, id, &rev, options).await?
    } else {
        db.put(cancel, id, edit.body, rev.as_ref(), options).await?
    };
    Ok(DocResponse::new(id.to_string(), rev))
}

/// `POST /{db}`: write under the body's `_id`, or a generated one.
pub async fn handle_post_doc(
    db: &Db,
    cancel: &CancellationToken,
    body: Value,
    options: &Options,
) -> Result<DocResponse> {
    let id = match &body {
        Value::Object(map) => match map.get("_id") {
            Some(Value::String(id)) => Some(id.clone()),
            _ => None,
        },
        _ => None,
    };

    match id {
        Some(id) => handle_put_doc(db, cancel, &id, body, None, options).await,
        None => {
            let edit = BulkEdit::from_json(body)?;
            let (id, rev) = db.create_doc(cancel, edit.body, options).await?;
            Ok(DocResponse::new(id, rev))
        }
    }
}
