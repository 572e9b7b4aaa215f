use std::time::Duration;

use thiserror::Error;

use crate::modules::reconcile::schema::FailureStage;
use crate::modules::user::model::MalformedSubject;
use crate::services::store::StoreError;

/// Errors that stop the whole run before or instead of processing subjects.
#[derive(Error, Debug)]
pub enum FatalError {
    #[error("could not connect to the document store: {0}")]
    Connection(#[from] mongodb::error::Error),
    #[error("invalid settings: {0}")]
    InvalidSettings(#[from] validator::ValidationErrors),
    #[error("scanning subjects failed: {0}")]
    SubjectScan(#[source] StoreError),
    #[error("scanning facts failed: {0}")]
    FactScan(#[source] StoreError),
    #[error("the query strategy needs a containment query, which this store does not support")]
    QueryUnsupported,
}

/// Errors confined to one subject. The run records them and moves on.
#[derive(Error, Debug)]
pub enum SubjectError {
    #[error("{0}")]
    MalformedKey(#[from] MalformedSubject),
    #[error("counting references failed: {0}")]
    Query(#[source] StoreError),
    #[error("writing aggregate failed: {0}")]
    Write(#[source] StoreError),
    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

impl SubjectError {
    pub fn stage(&self) -> FailureStage {
        match self {
            SubjectError::MalformedKey(_) => FailureStage::Key,
            SubjectError::Query(_) => FailureStage::Query,
            SubjectError::Write(_) => FailureStage::Write,
            SubjectError::Timeout(_) => FailureStage::Timeout,
        }
    }
}
