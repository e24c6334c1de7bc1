use std::{borrow::Borrow, fmt, sync::Arc};

pub use serde_json::Value;

/// Raw data of one entity, as returned by a [`crate::DataLoader`].
pub type Entity = Value;

/// Opaque identifier of one entity.
///
/// Entities of convertible types travel as composite ids, `typeKey/rawId`, until the engine
/// classifies them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct EntityId(Arc<str>);

impl EntityId {
    const COMPOSITE_SEPARATOR: char = '/';

    pub fn new(id: impl Into<Arc<str>>) -> Self {
        EntityId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn composite(type_key: &str, raw: &EntityId) -> Self {
        EntityId(format!("{type_key}{}{raw}", Self::COMPOSITE_SEPARATOR).into())
    }

    /// Splits a composite id into its type key and raw id.
    pub fn split_composite(&self) -> Option<(&str, EntityId)> {
        self.0
            .split_once(Self::COMPOSITE_SEPARATOR)
            .map(|(type_key, raw)| (type_key, EntityId::from(raw)))
    }

    /// Reads an id out of a resolved relation value. Strings and numbers are ids.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(id) => Some(EntityId::from(id.as_str())),
            Value::Number(id) => Some(EntityId::new(id.to_string())),
            _ => None,
        }
    }

    pub fn to_value(&self) -> Value {
        Value::String(self.0.to_string())
    }
}

impl Borrow<str> for EntityId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityId {
    fn from(id: &str) -> Self {
        EntityId(id.into())
    }
}

impl From<String> for EntityId {
    fn from(id: String) -> Self {
        EntityId(id.into())
    }
}

impl From<u64> for EntityId {
    fn from(id: u64) -> Self {
        EntityId(id.to_string().into())
    }
}

/// The ids a relation value points to: a single id, a list of ids, or nothing.
pub(crate) fn ids_in(value: &Value) -> Vec<EntityId> {
    match value {
        Value::Array(values) => values.iter().filter_map(EntityId::from_value).collect(),
        value => EntityId::from_value(value).into_iter().collect(),
    }
}

/// Loose truthiness used for conditional gates and boolean directive arguments.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(value) => *value,
        Value::Number(number) => number.as_f64().is_some_and(|number| number != 0.0),
        Value::String(string) => !string.is_empty() && string != "0",
        Value::Array(values) => !values.is_empty(),
        Value::Object(entries) => !entries.is_empty(),
    }
}

/// Renders a value for feedback messages: strings as they are, everything else in query syntax.
pub(crate) fn describe(value: &Value) -> String {
    match value {
        Value::String(string) => string.clone(),
        value => field_query::ConstDisplay(value).to_string(),
    }
}
