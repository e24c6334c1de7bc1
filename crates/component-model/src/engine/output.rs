use std::{hash::Hash, sync::Arc};

use indexmap::{map::Entry, IndexMap, IndexSet};
use serde_json::Value;
use strum::IntoEnumIterator as _;

use crate::{
    database::{ConvertibleIdMap, Database, DbData},
    feedback::{FeedbackParts, ResultEntries, SchemaEntries},
    EngineConfig, FeedbackKind, FeedbackStore, OutputMode,
};

/// The result of one execution.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryOutput {
    pub db_data: DbData,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub db_errors: ResultEntries,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub db_warnings: ResultEntries,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub schema_errors: SchemaEntries,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub schema_warnings: SchemaEntries,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub schema_deprecations: SchemaEntries,
    #[serde(skip_serializing_if = "IndexSet::is_empty")]
    pub query_errors: IndexSet<String>,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub convertible_id_map: ConvertibleIdMap,
    #[serde(skip_serializing_if = "IndexSet::is_empty")]
    pub log_entries: IndexSet<String>,
}

impl QueryOutput {
    /// A resolved value, `dbData[bucket][type][id][key]`.
    pub fn value(&self, bucket: &str, type_name: &str, id: &str, key: &str) -> Option<&Value> {
        self.db_data.get(bucket)?.get(type_name)?.get(id)?.get(key).map(Arc::as_ref)
    }

    /// Every message of one kind, whatever its bucket, type or entity.
    pub fn messages(&self, kind: FeedbackKind) -> Vec<&str> {
        match kind {
            FeedbackKind::QueryError => self.query_errors.iter().map(String::as_str).collect(),
            FeedbackKind::LogEntry => self.log_entries.iter().map(String::as_str).collect(),
            FeedbackKind::SchemaError => schema_messages(&self.schema_errors),
            FeedbackKind::SchemaWarning => schema_messages(&self.schema_warnings),
            FeedbackKind::SchemaDeprecation => schema_messages(&self.schema_deprecations),
            FeedbackKind::ResultError => result_messages(&self.db_errors),
            FeedbackKind::ResultWarning => result_messages(&self.db_warnings),
        }
    }

    /// Number of messages per kind, every kind included.
    pub fn feedback_counts(&self) -> IndexMap<FeedbackKind, usize> {
        FeedbackKind::iter().map(|kind| (kind, self.messages(kind).len())).collect()
    }
}

fn schema_messages(entries: &SchemaEntries) -> Vec<&str> {
    entries
        .values()
        .flat_map(IndexMap::values)
        .flatten()
        .map(|entry| entry.message.as_str())
        .collect()
}

fn result_messages(entries: &ResultEntries) -> Vec<&str> {
    entries
        .values()
        .flat_map(IndexMap::values)
        .flat_map(IndexMap::values)
        .flatten()
        .map(|entry| entry.message.as_str())
        .collect()
}

pub(super) fn build(
    config: &EngineConfig,
    database: Database,
    feedback: FeedbackStore,
    convertible_id_map: ConvertibleIdMap,
) -> QueryOutput {
    let FeedbackParts {
        query_errors,
        log_entries,
        schema_errors,
        schema_warnings,
        schema_deprecations,
        db_errors,
        db_warnings,
    } = feedback.into_parts();

    let output = QueryOutput {
        db_data: database.into_data(),
        db_errors,
        db_warnings,
        schema_errors,
        schema_warnings,
        schema_deprecations,
        query_errors,
        convertible_id_map,
        log_entries: if config.show_log_entries {
            log_entries
        } else {
            IndexSet::new()
        },
    };

    match config.output_mode {
        OutputMode::Split => output,
        OutputMode::Combined => {
            let bucket = config.default_bucket.as_str();
            QueryOutput {
                db_data: combine(output.db_data, bucket),
                db_errors: combine(output.db_errors, bucket),
                db_warnings: combine(output.db_warnings, bucket),
                schema_errors: combine(output.schema_errors, bucket),
                schema_warnings: combine(output.schema_warnings, bucket),
                schema_deprecations: combine(output.schema_deprecations, bucket),
                convertible_id_map: combine(output.convertible_id_map, bucket),
                ..output
            }
        }
    }
}

/// Deep merge of output sections. Later leaves win, feedback sets unite.
trait Fold {
    fn fold(&mut self, other: Self);
}

impl<K: Hash + Eq, V: Fold> Fold for IndexMap<K, V> {
    fn fold(&mut self, other: Self) {
        for (key, value) in other {
            match self.entry(key) {
                Entry::Occupied(mut entry) => entry.get_mut().fold(value),
                Entry::Vacant(entry) => {
                    entry.insert(value);
                }
            }
        }
    }
}

impl<T: Hash + Eq> Fold for IndexSet<T> {
    fn fold(&mut self, other: Self) {
        self.extend(other);
    }
}

impl Fold for Value {
    fn fold(&mut self, other: Self) {
        *self = other;
    }
}

impl Fold for Arc<Value> {
    fn fold(&mut self, other: Self) {
        *self = other;
    }
}

fn combine<V: Fold>(buckets: IndexMap<String, V>, into: &str) -> IndexMap<String, V> {
    let mut combined = IndexMap::new();
    for section in buckets.into_values() {
        combined.fold(IndexMap::from([(into.to_owned(), section)]));
    }
    combined
}
