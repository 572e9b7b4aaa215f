use std::sync::Arc;

use bson::{doc, Bson};

use crate::config::settings::JobSettings;
use crate::modules::user::model::{MalformedSubject, Subject};
use crate::services::store::{DocumentStore, StoreError};

#[derive(Clone)]
pub struct UserCrud {
    store: Arc<dyn DocumentStore>,
    collection: String,
    aggregate_field: String,
}

impl UserCrud {
    pub fn new(store: Arc<dyn DocumentStore>, settings: &JobSettings) -> Self {
        Self {
            store,
            collection: settings.subjects.clone(),
            aggregate_field: settings.aggregate_field.clone(),
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Scans the whole collection, keeping store order. Documents whose id
    /// cannot be turned into a key are returned as errors in place.
    pub async fn list_subjects(&self) -> Result<Vec<Result<Subject, MalformedSubject>>, StoreError> {
        let docs = self
            .store
            .list_all(&self.collection, &[self.aggregate_field.as_str()])
            .await?;

        Ok(docs
            .iter()
            .map(|d| Subject::from_document(d, &self.aggregate_field))
            .collect())
    }

    pub async fn set_total_bookings(&self, subject: &Subject, total: u64) -> Result<(), StoreError> {
        let value = Bson::Int64(i64::try_from(total).unwrap_or(i64::MAX));
        let mut fields = doc! {};
        fields.insert(self.aggregate_field.as_str(), value);

        self.store.update_fields(&self.collection, &subject.id, fields).await
    }
}
