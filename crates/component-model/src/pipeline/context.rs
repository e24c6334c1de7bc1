use field_query::Field;
use indexmap::{IndexMap, IndexSet};
use serde_json::Value;

use crate::{
    database::{ConvertibleIdMap, DbItems, PreviousResults},
    Entity, EntityId, EntityRef, Expressions, FailurePolicy, FeedbackEntry, FeedbackKind, ObligationSet, Variables,
};

/// State folded through the stages of one pipeline batch.
///
/// Stages mutate the remaining obligations and this batch's output. Everything merged by
/// earlier batches is only reachable through the read-only `previous` view.
pub struct PipelineContext<'a> {
    pub type_name: &'a str,
    pub policy: FailurePolicy,
    /// Pairs still to process. Removing one hides it from every succeeding stage.
    pub obligations: ObligationSet,
    pub entities: &'a IndexMap<EntityId, Entity>,
    pub convertible_ids: &'a ConvertibleIdMap,
    pub previous: &'a PreviousResults,
    pub variables: &'a Variables,
    pub output: DbItems,
    pub expressions: Expressions,
    /// Conditional fields whose gate held, to resolve in a follow-up pass.
    pub promoted: ObligationSet,
    schema_feedback: Vec<(FeedbackKind, FeedbackEntry)>,
    result_feedback: Vec<(FeedbackKind, EntityId, FeedbackEntry)>,
}

/// What a finished batch hands back to the engine.
pub(crate) struct PipelineOutcome {
    pub output: DbItems,
    pub expressions: Expressions,
    pub promoted: ObligationSet,
    pub schema_feedback: Vec<(FeedbackKind, FeedbackEntry)>,
    pub result_feedback: Vec<(FeedbackKind, EntityId, FeedbackEntry)>,
}

impl<'a> PipelineContext<'a> {
    pub fn new(
        type_name: &'a str,
        policy: FailurePolicy,
        obligations: ObligationSet,
        entities: &'a IndexMap<EntityId, Entity>,
        previous: &'a PreviousResults,
        convertible_ids: &'a ConvertibleIdMap,
        variables: &'a Variables,
    ) -> Self {
        PipelineContext {
            type_name,
            policy,
            obligations,
            entities,
            convertible_ids,
            previous,
            variables,
            output: DbItems::new(),
            expressions: Expressions::new(),
            promoted: ObligationSet::new(),
            schema_feedback: Vec::new(),
            result_feedback: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_expressions(mut self, expressions: Expressions) -> Self {
        self.expressions = expressions;
        self
    }

    /// The loaded entity, if it exists.
    pub fn entity(&self, id: &EntityId) -> Option<EntityRef<'a>> {
        let entities: &'a IndexMap<EntityId, Entity> = self.entities;
        let (id, data) = entities.get_key_value(id)?;
        Some(EntityRef {
            type_name: self.type_name,
            id,
            data,
        })
    }

    pub fn output_value(&self, id: &EntityId, key: &str) -> Option<&Value> {
        self.output.get(id)?.get(key)
    }

    pub fn set_output(&mut self, id: &EntityId, key: impl Into<String>, value: Value) {
        self.output.entry(id.clone()).or_default().insert(key.into(), value);
    }

    pub fn expressions_for(&self, id: &EntityId) -> Option<&IndexMap<String, Value>> {
        self.expressions.get(id)
    }

    pub fn add_schema_error(&mut self, entry: FeedbackEntry) {
        self.schema_feedback.push((FeedbackKind::SchemaError, entry));
    }

    pub fn add_schema_warning(&mut self, entry: FeedbackEntry) {
        self.schema_feedback.push((FeedbackKind::SchemaWarning, entry));
    }

    pub fn add_schema_deprecation(&mut self, entry: FeedbackEntry) {
        self.schema_feedback.push((FeedbackKind::SchemaDeprecation, entry));
    }

    pub fn add_result_error(&mut self, id: &EntityId, entry: FeedbackEntry) {
        self.result_feedback.push((FeedbackKind::ResultError, id.clone(), entry));
    }

    pub fn add_result_warning(&mut self, id: &EntityId, entry: FeedbackEntry) {
        self.result_feedback.push((FeedbackKind::ResultWarning, id.clone(), entry));
    }

    /// Applies the failure policy to `entries`, which concern every pair in `pairs`. Entries get
    /// prefixed with each affected field. Returns whether the pairs were removed.
    pub fn process_failure(&mut self, entries: &[FeedbackEntry], pairs: &[(EntityId, Field)]) -> bool {
        let kind = match self.policy {
            FailurePolicy::RemoveIfError => FeedbackKind::SchemaError,
            FailurePolicy::IgnoreAndWarn => FeedbackKind::SchemaWarning,
        };
        let fields: IndexSet<&Field> = pairs.iter().map(|(_, field)| field).collect();
        for field in fields {
            let key = field.output_key();
            for entry in entries {
                self.schema_feedback.push((kind, entry.clone().prefixed(key.as_str())));
            }
        }

        match self.policy {
            FailurePolicy::RemoveIfError => {
                for (id, field) in pairs {
                    self.obligations.remove(id, field);
                }
                true
            }
            FailurePolicy::IgnoreAndWarn => false,
        }
    }

    pub(crate) fn finish(self) -> PipelineOutcome {
        PipelineOutcome {
            output: self.output,
            expressions: self.expressions,
            promoted: self.promoted,
            schema_feedback: self.schema_feedback,
            result_feedback: self.result_feedback,
        }
    }
}
