#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use bson::{Bson, Document};
use recount::services::store::{document_key, DocumentStore, FactSource, StoreError};

/// In-memory store with knobs for injecting failures and latency.
#[derive(Default)]
pub struct MemoryStore {
    collections: Mutex<BTreeMap<String, Vec<Document>>>,
    failing_queries: HashSet<String>,
    failing_writes: HashSet<String>,
    delays: HashMap<String, Duration>,
    write_delays: HashMap<String, Duration>,
    no_contains_query: bool,
    writes: AtomicUsize,
    resolves: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, collection: &str, docs: Vec<Document>) -> Self {
        self.collections
            .lock()
            .unwrap()
            .entry(collection.to_string())
            .or_default()
            .extend(docs);
        self
    }

    pub fn fail_query_for(mut self, key: &str) -> Self {
        self.failing_queries.insert(key.to_string());
        self
    }

    pub fn fail_write_for(mut self, key: &str) -> Self {
        self.failing_writes.insert(key.to_string());
        self
    }

    pub fn delay_query_for(mut self, key: &str, delay: Duration) -> Self {
        self.delays.insert(key.to_string(), delay);
        self
    }

    pub fn delay_write_for(mut self, key: &str, delay: Duration) -> Self {
        self.write_delays.insert(key.to_string(), delay);
        self
    }

    pub fn without_contains_query(mut self) -> Self {
        self.no_contains_query = true;
        self
    }

    pub fn remove(&self, collection: &str, key: &str) {
        if let Some(docs) = self.collections.lock().unwrap().get_mut(collection) {
            docs.retain(|d| d.get("_id").and_then(document_key).as_deref() != Some(key));
        }
    }

    pub fn get(&self, collection: &str, key: &str) -> Option<Document> {
        self.collections
            .lock()
            .unwrap()
            .get(collection)?
            .iter()
            .find(|d| d.get("_id").and_then(document_key).as_deref() == Some(key))
            .cloned()
    }

    pub fn snapshot(&self, collection: &str) -> Vec<Document> {
        self.collections
            .lock()
            .unwrap()
            .get(collection)
            .cloned()
            .unwrap_or_default()
    }

    pub fn total_bookings(&self, key: &str) -> Option<i64> {
        self.get("users", key)?.get_i64("totalBookings").ok()
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn resolves(&self) -> usize {
        self.resolves.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn facts(&self, collections: &[String]) -> Vec<Document> {
        self.collections
            .lock()
            .unwrap()
            .iter()
            .filter(|(name, _)| collections.contains(*name))
            .flat_map(|(_, docs)| docs.iter().cloned())
            .collect()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn list_all(&self, collection: &str, projection: &[&str]) -> Result<Vec<Document>, StoreError> {
        let docs = self.snapshot(collection);
        if projection.is_empty() {
            return Ok(docs);
        }
        Ok(docs
            .into_iter()
            .map(|d| {
                d.into_iter()
                    .filter(|(k, _)| k == "_id" || projection.contains(&k.as_str()))
                    .collect()
            })
            .collect())
    }

    async fn resolve_facts(&self, source: &FactSource) -> Result<Vec<String>, StoreError> {
        self.resolves.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .collections
            .lock()
            .unwrap()
            .keys()
            .filter(|name| source.matches(name))
            .cloned()
            .collect())
    }

    async fn count_contains(&self, collections: &[String], field: &str, value: &str) -> Result<u64, StoreError> {
        if self.no_contains_query {
            return Err(StoreError::Unsupported);
        }

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.delays.get(value) {
            tokio::time::sleep(*delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.failing_queries.contains(value) {
            return Err(StoreError::Other(format!("injected query failure for {}", value)));
        }

        let needle = Bson::String(value.to_string());
        let count = self
            .facts(collections)
            .iter()
            .filter(|d| matches!(d.get(field), Some(Bson::Array(items)) if items.contains(&needle)))
            .count();
        Ok(count as u64)
    }

    async fn scan_references(&self, collections: &[String], field: &str) -> Result<Vec<Document>, StoreError> {
        Ok(self
            .facts(collections)
            .into_iter()
            .map(|d| {
                d.into_iter()
                    .filter(|(k, _)| k == "_id" || k == field)
                    .collect()
            })
            .collect())
    }

    async fn update_fields(&self, collection: &str, id: &Bson, fields: Document) -> Result<(), StoreError> {
        let key = document_key(id).unwrap_or_else(|| id.to_string());
        if let Some(delay) = self.write_delays.get(&key) {
            tokio::time::sleep(*delay).await;
        }
        if self.failing_writes.contains(&key) {
            return Err(StoreError::Other(format!("injected write failure for {}", key)));
        }

        let mut collections = self.collections.lock().unwrap();
        let doc = collections
            .get_mut(collection)
            .and_then(|docs| docs.iter_mut().find(|d| d.get("_id") == Some(id)))
            .ok_or_else(|| StoreError::NotFound {
                collection: collection.to_string(),
                id: key.clone(),
            })?;

        for (k, v) in fields {
            doc.insert(k, v);
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn supports_contains_query(&self) -> bool {
        !self.no_contains_query
    }
}
