use indexmap::{IndexMap, IndexSet};

use crate::EntityId;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    strum_macros::Display,
    strum_macros::AsRefStr,
    strum_macros::EnumIter,
)]
#[strum(serialize_all = "camelCase")]
pub enum FeedbackKind {
    QueryError,
    SchemaError,
    SchemaWarning,
    SchemaDeprecation,
    ResultError,
    ResultWarning,
    LogEntry,
}

impl FeedbackKind {
    pub fn is_schema_level(self) -> bool {
        matches!(
            self,
            FeedbackKind::SchemaError | FeedbackKind::SchemaWarning | FeedbackKind::SchemaDeprecation
        )
    }

    pub fn is_result_level(self) -> bool {
        matches!(self, FeedbackKind::ResultError | FeedbackKind::ResultWarning)
    }
}

/// A message with the path of fields and directives it concerns, outermost first.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize)]
pub struct FeedbackEntry {
    pub path: Vec<String>,
    pub message: String,
}

impl FeedbackEntry {
    pub fn new(message: impl Into<String>) -> Self {
        FeedbackEntry {
            path: Vec::new(),
            message: message.into(),
        }
    }

    #[must_use]
    pub fn with_path<I>(mut self, path: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.path = path.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn prefixed(mut self, segment: impl Into<String>) -> Self {
        self.path.insert(0, segment.into());
        self
    }
}

/// Schema-level outcome of validating one field or directive.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchemaFeedback {
    pub errors: Vec<FeedbackEntry>,
    pub warnings: Vec<FeedbackEntry>,
    pub deprecations: Vec<FeedbackEntry>,
}

impl SchemaFeedback {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty() && self.warnings.is_empty() && self.deprecations.is_empty()
    }

    pub fn extend(&mut self, other: SchemaFeedback) {
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
        self.deprecations.extend(other.deprecations);
    }

    #[must_use]
    pub fn prefixed(self, segment: &str) -> Self {
        let prefix = |entries: Vec<FeedbackEntry>| -> Vec<FeedbackEntry> {
            entries.into_iter().map(|entry| entry.prefixed(segment)).collect()
        };
        SchemaFeedback {
            errors: prefix(self.errors),
            warnings: prefix(self.warnings),
            deprecations: prefix(self.deprecations),
        }
    }

    pub(crate) fn entries(self) -> impl Iterator<Item = (FeedbackKind, FeedbackEntry)> {
        let tag = |kind: FeedbackKind| move |entry: FeedbackEntry| (kind, entry);
        self.errors
            .into_iter()
            .map(tag(FeedbackKind::SchemaError))
            .chain(self.warnings.into_iter().map(tag(FeedbackKind::SchemaWarning)))
            .chain(self.deprecations.into_iter().map(tag(FeedbackKind::SchemaDeprecation)))
    }
}

/// bucket -> entity type -> entries
pub type SchemaEntries = IndexMap<String, IndexMap<String, IndexSet<FeedbackEntry>>>;

/// bucket -> entity type -> id -> entries
pub type ResultEntries = IndexMap<String, IndexMap<String, IndexMap<EntityId, IndexSet<FeedbackEntry>>>>;

/// Everything reported during one execution. Entries are sets, so the same validation surfacing
/// twice, at schema time and again while resolving an entity, is only reported once.
#[derive(Debug, Default)]
pub struct FeedbackStore {
    query_errors: IndexSet<String>,
    log_entries: IndexSet<String>,
    schema: IndexMap<FeedbackKind, SchemaEntries>,
    results: IndexMap<FeedbackKind, ResultEntries>,
}

impl FeedbackStore {
    pub fn add_query_error(&mut self, message: impl Into<String>) {
        self.query_errors.insert(message.into());
    }

    pub fn add_log_entry(&mut self, message: impl Into<String>) {
        self.log_entries.insert(message.into());
    }

    pub fn add_schema(&mut self, kind: FeedbackKind, bucket: &str, type_name: &str, entry: FeedbackEntry) {
        debug_assert!(kind.is_schema_level());
        self.schema
            .entry(kind)
            .or_default()
            .entry(bucket.to_owned())
            .or_default()
            .entry(type_name.to_owned())
            .or_default()
            .insert(entry);
    }

    pub fn add_result(
        &mut self,
        kind: FeedbackKind,
        bucket: &str,
        type_name: &str,
        id: &EntityId,
        entry: FeedbackEntry,
    ) {
        debug_assert!(kind.is_result_level());
        self.results
            .entry(kind)
            .or_default()
            .entry(bucket.to_owned())
            .or_default()
            .entry(type_name.to_owned())
            .or_default()
            .entry(id.clone())
            .or_default()
            .insert(entry);
    }

    pub fn query_errors(&self) -> impl Iterator<Item = &str> {
        self.query_errors.iter().map(String::as_str)
    }

    pub fn log_entries(&self) -> impl Iterator<Item = &str> {
        self.log_entries.iter().map(String::as_str)
    }

    pub(crate) fn into_parts(mut self) -> FeedbackParts {
        FeedbackParts {
            query_errors: self.query_errors,
            log_entries: self.log_entries,
            schema_errors: self.schema.shift_remove(&FeedbackKind::SchemaError).unwrap_or_default(),
            schema_warnings: self.schema.shift_remove(&FeedbackKind::SchemaWarning).unwrap_or_default(),
            schema_deprecations: self
                .schema
                .shift_remove(&FeedbackKind::SchemaDeprecation)
                .unwrap_or_default(),
            db_errors: self.results.shift_remove(&FeedbackKind::ResultError).unwrap_or_default(),
            db_warnings: self.results.shift_remove(&FeedbackKind::ResultWarning).unwrap_or_default(),
        }
    }
}

pub(crate) struct FeedbackParts {
    pub query_errors: IndexSet<String>,
    pub log_entries: IndexSet<String>,
    pub schema_errors: SchemaEntries,
    pub schema_warnings: SchemaEntries,
    pub schema_deprecations: SchemaEntries,
    pub db_errors: ResultEntries,
    pub db_warnings: ResultEntries,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_print_like_output_keys() {
        assert_eq!(FeedbackKind::SchemaDeprecation.to_string(), "schemaDeprecation");
        assert_eq!(FeedbackKind::ResultError.as_ref(), "resultError");
    }

    #[test]
    fn identical_entries_are_stored_once() {
        let mut store = FeedbackStore::default();
        let entry = FeedbackEntry::new("No FieldResolver resolves field 'nope'").with_path(["nope"]);
        store.add_schema(FeedbackKind::SchemaError, "primary", "post", entry.clone());
        store.add_schema(FeedbackKind::SchemaError, "primary", "post", entry.clone());
        store.add_schema(FeedbackKind::SchemaError, "primary", "user", entry);
        store.add_query_error("Variable 'limit' is undefined");
        store.add_query_error("Variable 'limit' is undefined");

        let parts = store.into_parts();
        assert_eq!(parts.schema_errors["primary"]["post"].len(), 1);
        assert_eq!(parts.schema_errors["primary"]["user"].len(), 1);
        assert_eq!(parts.query_errors.len(), 1);
        assert!(parts.schema_warnings.is_empty());
    }

    #[test]
    fn prefixes_stack_outermost_first() {
        let feedback = SchemaFeedback {
            errors: vec![FeedbackEntry::new("boom").with_path(["inner()"])],
            ..Default::default()
        }
        .prefixed("outer");

        assert_eq!(feedback.errors[0].path, vec!["outer", "inner()"]);
    }
}
