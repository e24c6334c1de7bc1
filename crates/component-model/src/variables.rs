use std::{
    collections::BTreeMap,
    fmt::{self, Display, Formatter},
    ops::Deref,
};

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Variables of a query execution, referenced as `$name` in arguments.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Variables(BTreeMap<String, Value>);

impl Display for Variables {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (name, value)) in self.0.iter().enumerate() {
            write!(f, "{}{name}: {value}", if i == 0 { "" } else { ", " })?;
        }
        f.write_str("}")
    }
}

impl<'de> Deserialize<'de> for Variables {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(Self(
            <Option<BTreeMap<String, Value>>>::deserialize(deserializer)?.unwrap_or_default(),
        ))
    }
}

impl Variables {
    /// Get the variables from a JSON value.
    ///
    /// If the value is not a map, then no variables will be returned.
    #[must_use]
    pub fn from_json(value: Value) -> Self {
        match value {
            Value::Object(entries) => Self(entries.into_iter().collect()),
            _ => Self::default(),
        }
    }

    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: Value) -> Self {
        self.0.insert(name.into(), value);
        self
    }

    /// Stable digest of the whole variable set, part of every argument memo key.
    pub fn digest(&self) -> blake3::Hash {
        let mut hasher = blake3::Hasher::new();
        for (name, value) in &self.0 {
            hasher.update(name.as_bytes());
            hasher.update(&[0]);
            hasher.update(value.to_string().as_bytes());
            hasher.update(&[0]);
        }
        hasher.finalize()
    }
}

impl FromIterator<(String, Value)> for Variables {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Deref for Variables {
    type Target = BTreeMap<String, Value>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}
