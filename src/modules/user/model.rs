use bson::{Bson, Document};
use thiserror::Error;

use crate::services::store::document_key;

/// A user as the job sees it: its id and the stored counter, nothing else.
#[derive(Debug, Clone, PartialEq)]
pub struct Subject {
    pub id: Bson,
    pub key: String,
    pub current: Option<i64>,
}

#[derive(Error, Debug, Clone, PartialEq)]
#[error("document id {raw_id} cannot be used as a reference key")]
pub struct MalformedSubject {
    pub raw_id: String,
}

impl Subject {
    pub fn from_document(doc: &Document, aggregate_field: &str) -> Result<Self, MalformedSubject> {
        let id = doc.get("_id").cloned().unwrap_or(Bson::Null);
        let key = document_key(&id).ok_or_else(|| MalformedSubject { raw_id: id.to_string() })?;

        Ok(Self {
            current: doc.get(aggregate_field).and_then(as_counter),
            id,
            key,
        })
    }
}

/// Numeric counter values as other writers may have stored them.
fn as_counter(value: &Bson) -> Option<i64> {
    match value {
        Bson::Int32(n) => Some(i64::from(*n)),
        Bson::Int64(n) => Some(*n),
        Bson::Double(f) if f.fract() == 0.0 && f.is_finite() => Some(*f as i64),
        _ => None,
    }
}
