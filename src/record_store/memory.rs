//! In-memory record store.
//!
//! DESIGN
//! ======
//! One table per entity, kept in insertion order so fetches are stable.
//! Lookup writes (`{lookup}@odata.bind`) are stored the way the Web API
//! reads them back (`_{lookup}_value`), which lets the follow service and
//! secondary-lane refresh run unchanged against this store.

use std::collections::HashMap;

use serde_json::Value;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use super::{RecordQuery, RecordStore, RecordStoreError};
use crate::metadata::Metadata;
use crate::record::{Data, Record, lookup_value_key, normalize_id, parse_bind};

#[derive(Default)]
pub struct InMemoryRecordStore {
    tables: RwLock<HashMap<String, Vec<Record>>>,
    /// Entity → primary id attribute. Entities not listed use `{entity}id`.
    primary_ids: HashMap<String, String>,
}

impl InMemoryRecordStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store keyed by the primary id attributes of the given entities.
    pub fn from_metadata<'a>(metadata: impl IntoIterator<Item = &'a Metadata>) -> Self {
        let primary_ids = metadata
            .into_iter()
            .map(|m| (m.logical_name.clone(), m.primary_id_attribute.clone()))
            .collect();
        Self { tables: RwLock::default(), primary_ids }
    }

    /// Seed a table, appending to anything already there.
    #[must_use]
    pub fn with_records(mut self, entity: &str, records: Vec<Record>) -> Self {
        self.tables
            .get_mut()
            .entry(entity.to_string())
            .or_default()
            .extend(records);
        self
    }

    /// Seed from a fixture document shaped `{ "<entity>": [ {..}, .. ], .. }`.
    #[must_use]
    pub fn with_fixture(mut self, fixture: Value) -> Self {
        if let Value::Object(tables) = fixture {
            for (entity, rows) in tables {
                let records = match rows {
                    Value::Array(rows) => rows.into_iter().map(Record::from_value).collect(),
                    _ => Vec::new(),
                };
                self = self.with_records(&entity, records);
            }
        }
        self
    }

    pub async fn insert(&self, entity: &str, record: Record) {
        self.tables
            .write()
            .await
            .entry(entity.to_string())
            .or_default()
            .push(record);
    }

    /// Number of stored records for `entity`.
    pub async fn count(&self, entity: &str) -> usize {
        self.tables.read().await.get(entity).map_or(0, Vec::len)
    }

    fn primary_id(&self, entity: &str) -> String {
        self.primary_ids
            .get(entity)
            .cloned()
            .unwrap_or_else(|| format!("{entity}id"))
    }

    fn position(&self, table: &[Record], entity: &str, id: &str) -> Option<usize> {
        let id_attr = self.primary_id(entity);
        let wanted = normalize_id(id);
        table.iter().position(|r| {
            r.get(&id_attr)
                .and_then(Value::as_str)
                .is_some_and(|v| normalize_id(v) == wanted)
        })
    }
}

/// Rewrite `{lookup}@odata.bind` entries into `_{lookup}_value`.
fn resolve_binds(patch: &Data) -> Data {
    let mut out = Data::new();
    for (key, value) in patch {
        match parse_bind(key, value) {
            Some((lookup, id)) => {
                out.insert(lookup_value_key(&lookup), Value::String(id));
            }
            None => {
                out.insert(key.clone(), value.clone());
            }
        }
    }
    out
}

#[async_trait::async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn fetch(&self, entity: &str, query: &RecordQuery) -> Result<Vec<Record>, RecordStoreError> {
        let tables = self.tables.read().await;
        let records: Vec<Record> = tables
            .get(entity)
            .map(|table| table.iter().filter(|r| query.matches(r)).cloned().collect())
            .unwrap_or_default();
        debug!(entity, count = records.len(), "in-memory fetch");
        Ok(records)
    }

    async fn update(&self, entity: &str, id: &str, patch: &Data) -> Result<(), RecordStoreError> {
        let mut tables = self.tables.write().await;
        let not_found = || RecordStoreError::NotFound { entity: entity.to_string(), id: id.to_string() };
        let table = tables.get_mut(entity).ok_or_else(not_found)?;
        let index = self.position(table, entity, id).ok_or_else(not_found)?;
        table[index].merge(&resolve_binds(patch));
        Ok(())
    }

    async fn create(&self, entity: &str, attributes: &Data) -> Result<String, RecordStoreError> {
        let id_attr = self.primary_id(entity);
        let mut fields = resolve_binds(attributes);
        let id = match fields.get(&id_attr).and_then(Value::as_str) {
            Some(existing) => normalize_id(existing),
            None => Uuid::new_v4().to_string(),
        };
        fields.insert(id_attr, Value::String(id.clone()));
        self.insert(entity, Record::new(fields)).await;
        Ok(id)
    }

    async fn delete(&self, entity: &str, id: &str) -> Result<(), RecordStoreError> {
        let mut tables = self.tables.write().await;
        let not_found = || RecordStoreError::NotFound { entity: entity.to_string(), id: id.to_string() };
        let table = tables.get_mut(entity).ok_or_else(not_found)?;
        let index = self.position(table, entity, id).ok_or_else(not_found)?;
        table.remove(index);
        Ok(())
    }
}

#[cfg(test)]
#[path = "memory_test.rs"]
mod tests;
