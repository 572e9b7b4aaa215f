//! The document-store seam the reconciliation job is written against.
//!
//! The job needs little from a store: a full scan of the subjects, the
//! names of the fact collections, a containment count over them (or,
//! failing that, a scan of every fact's reference field), and a partial
//! update of one subject.

use std::fmt;

use async_trait::async_trait;
use bson::{Bson, Document};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] mongodb::error::Error),
    #[error("document {id} not found in {collection}")]
    NotFound { collection: String, id: String },
    #[error("containment queries are not supported by this store")]
    Unsupported,
    #[error("store error: {0}")]
    Other(String),
}

/// Where the facts live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FactSource {
    /// A single collection with exactly this name.
    Collection(String),
    /// Every collection named `name` or ending in `.name`, e.g. `events.e1.slots`.
    Group(String),
}

impl FactSource {
    pub fn name(&self) -> &str {
        match self {
            FactSource::Collection(name) | FactSource::Group(name) => name,
        }
    }

    pub fn matches(&self, collection: &str) -> bool {
        match self {
            FactSource::Collection(name) => collection == name,
            FactSource::Group(name) => {
                collection == name
                    || collection
                        .strip_suffix(name.as_str())
                        .is_some_and(|prefix| prefix.ends_with('.'))
            }
        }
    }
}

impl fmt::Display for FactSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FactSource::Collection(name) => write!(f, "collection `{}`", name),
            FactSource::Group(name) => write!(f, "collection group `{}`", name),
        }
    }
}

/// String form of a document id as it appears in reference fields.
/// ObjectIds use their hex form; other id types have no key.
pub fn document_key(id: &Bson) -> Option<String> {
    match id {
        Bson::String(s) => Some(s.clone()),
        Bson::ObjectId(oid) => Some(oid.to_hex()),
        _ => None,
    }
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Every document in `collection`, in store order. An empty projection
    /// returns whole documents; `_id` is always included.
    async fn list_all(&self, collection: &str, projection: &[&str]) -> Result<Vec<Document>, StoreError>;

    /// Names of the collections `source` covers. Resolved once per run.
    async fn resolve_facts(&self, source: &FactSource) -> Result<Vec<String>, StoreError>;

    /// Number of documents across `collections` whose `field` is an array
    /// containing `value`. Scalar fields never match.
    async fn count_contains(&self, collections: &[String], field: &str, value: &str) -> Result<u64, StoreError>;

    /// Every document across `collections` projected down to `field`.
    async fn scan_references(&self, collections: &[String], field: &str) -> Result<Vec<Document>, StoreError>;

    /// Merges `fields` into the document with `_id == id`. Other fields are untouched.
    async fn update_fields(&self, collection: &str, id: &Bson, fields: Document) -> Result<(), StoreError>;

    fn supports_contains_query(&self) -> bool {
        true
    }
}
