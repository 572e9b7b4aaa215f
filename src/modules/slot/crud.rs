use std::collections::HashMap;
use std::sync::Arc;

use crate::config::settings::JobSettings;
use crate::modules::slot::model;
use crate::services::store::{DocumentStore, FactSource, StoreError};

#[derive(Clone)]
pub struct SlotCrud {
    store: Arc<dyn DocumentStore>,
    source: FactSource,
    reference_field: String,
}

impl SlotCrud {
    pub fn new(store: Arc<dyn DocumentStore>, settings: &JobSettings) -> Self {
        Self {
            store,
            source: settings.fact_source(),
            reference_field: settings.reference_field.clone(),
        }
    }

    pub fn source(&self) -> &FactSource {
        &self.source
    }

    pub async fn resolve_collections(&self) -> Result<Vec<String>, StoreError> {
        self.store.resolve_facts(&self.source).await
    }

    pub async fn count_booked_by(&self, collections: &[String], key: &str) -> Result<u64, StoreError> {
        self.store
            .count_contains(collections, &self.reference_field, key)
            .await
    }

    /// One pass over every slot, for stores without a containment query.
    pub async fn tally_all(&self, collections: &[String]) -> Result<HashMap<String, u64>, StoreError> {
        let docs = self
            .store
            .scan_references(collections, &self.reference_field)
            .await?;
        Ok(model::tally(&docs, &self.reference_field))
    }
}
