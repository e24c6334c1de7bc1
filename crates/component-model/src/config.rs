use std::collections::BTreeMap;

use crate::EngineResult;

#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// What happens to the fields of a failing directive.
    pub failure_policy: FailurePolicy,
    /// Bucket receiving every field that is not routed elsewhere.
    #[serde(default = "EngineConfig::default_bucket")]
    pub default_bucket: String,
    /// bucket -> entity type -> fields stored in that bucket
    pub buckets: BTreeMap<String, BTreeMap<String, Vec<String>>>,
    pub output_mode: OutputMode,
    pub show_log_entries: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            failure_policy: FailurePolicy::default(),
            default_bucket: Self::default_bucket(),
            buckets: BTreeMap::new(),
            output_mode: OutputMode::default(),
            show_log_entries: false,
        }
    }
}

impl EngineConfig {
    pub const DEFAULT_BUCKET: &'static str = "primary";

    fn default_bucket() -> String {
        String::from(Self::DEFAULT_BUCKET)
    }

    pub fn from_toml(input: &str) -> EngineResult<Self> {
        Ok(toml::from_str(input)?)
    }

    /// Bucket of a field, by field name. Aliases and arguments don't change the routing.
    pub fn bucket_for(&self, type_name: &str, field_name: &str) -> &str {
        self.buckets
            .iter()
            .find(|(_, types)| {
                types
                    .get(type_name)
                    .is_some_and(|fields| fields.iter().any(|field| field == field_name))
            })
            .map_or(self.default_bucket.as_str(), |(bucket, _)| bucket.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Drop the affected (id, field) pairs from everything still queued and report a schema error.
    #[default]
    RemoveIfError,
    /// Keep the pairs queued, skip only the failing directive and report a schema warning.
    IgnoreAndWarn,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputMode {
    /// One section per bucket.
    #[default]
    Split,
    /// Every bucket folded into the default one.
    Combined,
}
