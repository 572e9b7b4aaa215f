use async_trait::async_trait;
use bson::{doc, Bson, Document};
use futures::TryStreamExt;
use mongodb::Database;
use tracing::debug;

use crate::services::store::{document_key, DocumentStore, FactSource, StoreError};

#[derive(Clone)]
pub struct MongoStore {
    db: Database,
}

impl MongoStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

fn projection_of(fields: &[&str]) -> Document {
    let mut projection = Document::new();
    for field in fields {
        projection.insert(*field, 1);
    }
    projection
}

/// `$elemMatch` only matches arrays, unlike `{ field: value }` which also
/// matches a scalar equal to `value`.
pub(crate) fn contains_filter(field: &str, value: &str) -> Document {
    let mut filter = Document::new();
    filter.insert(field, doc! { "$elemMatch": { "$eq": value } });
    filter
}

#[async_trait]
impl DocumentStore for MongoStore {
    async fn list_all(&self, collection: &str, projection: &[&str]) -> Result<Vec<Document>, StoreError> {
        let cursor = self
            .db
            .collection::<Document>(collection)
            .find(doc! {})
            .projection(projection_of(projection))
            .await?;

        Ok(cursor.try_collect().await?)
    }

    async fn resolve_facts(&self, source: &FactSource) -> Result<Vec<String>, StoreError> {
        match source {
            FactSource::Collection(name) => Ok(vec![name.clone()]),
            FactSource::Group(_) => {
                let names = self.db.list_collection_names().await?;
                let mut matched: Vec<String> = names.into_iter().filter(|n| source.matches(n)).collect();
                matched.sort();
                debug!(source = %source, collections = ?matched, "resolved fact collections");
                Ok(matched)
            }
        }
    }

    async fn count_contains(&self, collections: &[String], field: &str, value: &str) -> Result<u64, StoreError> {
        let filter = contains_filter(field, value);

        let mut total = 0;
        for name in collections {
            total += self
                .db
                .collection::<Document>(name)
                .count_documents(filter.clone())
                .await?;
        }
        Ok(total)
    }

    async fn scan_references(&self, collections: &[String], field: &str) -> Result<Vec<Document>, StoreError> {
        let mut docs = Vec::new();
        for name in collections {
            let cursor = self
                .db
                .collection::<Document>(name)
                .find(doc! {})
                .projection(projection_of(&[field]))
                .await?;
            let mut batch: Vec<Document> = cursor.try_collect().await?;
            docs.append(&mut batch);
        }
        Ok(docs)
    }

    async fn update_fields(&self, collection: &str, id: &Bson, fields: Document) -> Result<(), StoreError> {
        let result = self
            .db
            .collection::<Document>(collection)
            .update_one(doc! { "_id": id.clone() }, doc! { "$set": fields })
            .await?;

        if result.matched_count == 0 {
            return Err(StoreError::NotFound {
                collection: collection.to_string(),
                id: document_key(id).unwrap_or_else(|| id.to_string()),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contains_filter_only_matches_array_elements() {
        assert_eq!(
            contains_filter("bookedBy", "u1"),
            doc! { "bookedBy": { "$elemMatch": { "$eq": "u1" } } }
        );
    }
}
