use field_query::{DirectiveNode, FieldNode};
use indexmap::IndexMap;
use serde_json::Value;

use crate::{
    pipeline::{BoundDirective, PipelineContext, PipelinePosition},
    ArgumentDefinition, Entity, EntityId, FieldError, ObligationSet, Resolution, ResolvedArguments, SchemaFeedback,
};

/// Parameters handed to every [`DataLoader`] call of one execution.
pub type LoadParams = serde_json::Map<String, Value>;

/// Fetches raw entities of one concrete entity type.
pub trait DataLoader: Send + Sync {
    /// Returns an entry for every requested id. A `None` (or missing) entry means the entity
    /// doesn't exist.
    fn load(&self, ids: &[EntityId], params: &LoadParams) -> IndexMap<EntityId, Option<Entity>>;
}

/// One loaded entity, as seen by resolvers.
#[derive(Debug, Clone, Copy)]
pub struct EntityRef<'a> {
    pub type_name: &'a str,
    pub id: &'a EntityId,
    pub data: &'a Entity,
}

impl EntityRef<'_> {
    /// A property of the raw entity, `null` when absent.
    pub fn get(&self, key: &str) -> Value {
        self.data.get(key).cloned().unwrap_or(Value::Null)
    }
}

/// Resolves the values of a set of fields.
///
/// Several resolvers may claim the same field name; the registry orders them by scope
/// specificity and priority, and the first one accepting the field wins.
pub trait FieldResolver: Send + Sync {
    fn field_names(&self) -> Vec<&str>;

    fn argument_definitions(&self, _field_name: &str) -> Vec<ArgumentDefinition> {
        Vec::new()
    }

    /// Whether unnamed arguments may be named after the declared argument order.
    fn enable_ordered_arguments(&self, _field_name: &str) -> bool {
        true
    }

    /// Schema-time selection, given the statically known arguments.
    fn can_process(&self, _field: &FieldNode, _arguments: &ResolvedArguments) -> bool {
        true
    }

    /// Result-time selection.
    fn can_process_entity(&self, _entity: &EntityRef<'_>, _field: &FieldNode) -> bool {
        true
    }

    /// Extra schema validation once the arguments have been cast.
    fn validate_schema(&self, _field_name: &str, _arguments: &ResolvedArguments) -> SchemaFeedback {
        SchemaFeedback::default()
    }

    fn deprecation(&self, _field_name: &str, _arguments: &ResolvedArguments) -> Option<String> {
        None
    }

    /// Checked before resolving the field for one entity. An error becomes the field's value.
    fn validate_entity(
        &self,
        _entity: &EntityRef<'_>,
        _field_name: &str,
        _arguments: &ResolvedArguments,
    ) -> Result<(), FieldError> {
        Ok(())
    }

    /// The entity type a relationship field points to. Relationship fields resolve to an id or
    /// a list of ids.
    fn relation_target(&self, _type_name: &str, _field: &FieldNode) -> Option<String> {
        None
    }

    fn resolve(
        &self,
        entity: &EntityRef<'_>,
        field_name: &str,
        arguments: &ResolvedArguments,
    ) -> Result<Value, FieldError>;
}

/// A stage of the directive pipeline.
pub trait DirectiveResolver: Send + Sync {
    fn directive_name(&self) -> &str;

    fn argument_definitions(&self) -> Vec<ArgumentDefinition> {
        Vec::new()
    }

    fn position(&self) -> PipelinePosition {
        PipelinePosition::Middle
    }

    fn is_repeatable(&self) -> bool {
        true
    }

    fn can_process(&self, _directive: &DirectiveNode, _arguments: &ResolvedArguments) -> bool {
        true
    }

    fn validate_schema(&self, _arguments: &ResolvedArguments) -> SchemaFeedback {
        SchemaFeedback::default()
    }

    fn deprecation(&self, _arguments: &ResolvedArguments) -> Option<String> {
        None
    }

    /// Restricts the directive to these fields. The others are skipped with a warning.
    fn field_names_to_apply_to(&self) -> Option<Vec<&str>> {
        None
    }

    /// Runs the directive over `fields`, the obligations it applies to.
    fn resolve(
        &self,
        directive: &BoundDirective,
        fields: &ObligationSet,
        resolution: &Resolution<'_>,
        ctx: &mut PipelineContext<'_>,
    );
}

/// Resolves `id` and `self` for every entity type.
pub(crate) struct CoreFieldResolver;

impl CoreFieldResolver {
    pub(crate) const SELF: &'static str = "self";
}

impl FieldResolver for CoreFieldResolver {
    fn field_names(&self) -> Vec<&str> {
        vec![field_query::Field::IDENTITY, Self::SELF]
    }

    fn relation_target(&self, type_name: &str, field: &FieldNode) -> Option<String> {
        (field.name == Self::SELF).then(|| type_name.to_owned())
    }

    fn resolve(
        &self,
        entity: &EntityRef<'_>,
        _field_name: &str,
        _arguments: &ResolvedArguments,
    ) -> Result<Value, FieldError> {
        Ok(entity.id.to_value())
    }
}
