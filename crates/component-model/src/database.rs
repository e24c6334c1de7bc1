use std::sync::Arc;

use field_query::Field;
use indexmap::{IndexMap, IndexSet};
use serde_json::Value;

use crate::{EntityId, FieldSet};

/// output key -> value, for one entity.
pub type DbItem = IndexMap<String, Arc<Value>>;

/// bucket -> entity type -> id -> output key -> value
pub type DbData = IndexMap<String, IndexMap<String, IndexMap<EntityId, DbItem>>>;

/// bucket -> entity type -> id -> relation output key -> composite id (or ids)
pub type ConvertibleIdMap = IndexMap<String, IndexMap<String, IndexMap<EntityId, IndexMap<String, Value>>>>;

/// Values resolved by the current pipeline batch: id -> output key -> value.
pub type DbItems = IndexMap<EntityId, IndexMap<String, Value>>;

/// Resolved values of one execution, split into buckets.
#[derive(Debug, Default)]
pub struct Database {
    data: DbData,
}

impl Database {
    pub fn insert(&mut self, bucket: &str, type_name: &str, id: &EntityId, key: &str, value: Arc<Value>) {
        self.data
            .entry(bucket.to_owned())
            .or_default()
            .entry(type_name.to_owned())
            .or_default()
            .entry(id.clone())
            .or_default()
            .insert(key.to_owned(), value);
    }

    pub fn get(&self, bucket: &str, type_name: &str, id: &EntityId, key: &str) -> Option<&Value> {
        self.data.get(bucket)?.get(type_name)?.get(id)?.get(key).map(Arc::as_ref)
    }

    pub fn into_data(self) -> DbData {
        self.data
    }
}

/// Read-only view of everything merged so far, whatever the bucket. Values are shared with the
/// [`Database`].
#[derive(Debug, Default)]
pub struct PreviousResults {
    items: IndexMap<String, IndexMap<EntityId, DbItem>>,
}

impl PreviousResults {
    pub(crate) fn publish(&mut self, type_name: &str, id: &EntityId, key: &str, value: Arc<Value>) {
        self.items
            .entry(type_name.to_owned())
            .or_default()
            .entry(id.clone())
            .or_default()
            .insert(key.to_owned(), value);
    }

    pub fn get(&self, type_name: &str, id: &EntityId, key: &str) -> Option<&Value> {
        self.item(type_name, id)?.get(key).map(Arc::as_ref)
    }

    pub fn item(&self, type_name: &str, id: &EntityId) -> Option<&DbItem> {
        self.items.get(type_name)?.get(id)
    }
}

/// Every (concrete type, id, field) already handed to a pipeline.
#[derive(Debug, Default)]
pub(crate) struct AlreadyLoaded {
    fields: IndexMap<String, IndexMap<EntityId, IndexSet<Field>>>,
}

impl AlreadyLoaded {
    pub(crate) fn seen(&self, type_name: &str, id: &EntityId) -> Option<&IndexSet<Field>> {
        self.fields.get(type_name)?.get(id)
    }

    /// Records the direct fields and gates of `fields`.
    pub(crate) fn record(&mut self, type_name: &str, id: &EntityId, fields: &FieldSet) {
        let seen = self
            .fields
            .entry(type_name.to_owned())
            .or_default()
            .entry(id.clone())
            .or_default();
        for field in fields.fields() {
            if !seen.insert(field.clone()) {
                tracing::trace!(type_name, %id, field = %field, "field recorded twice");
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn count(&self, type_name: &str, id: &EntityId, field: &Field) -> usize {
        self.seen(type_name, id).map_or(0, |seen| usize::from(seen.contains(field)))
    }
}
