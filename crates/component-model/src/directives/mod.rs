//! Directives every registry starts with.

mod apply_if;
mod case;
mod default_value;
mod export_expression;
mod inclusion;
mod resolve_value_and_merge;
mod validate;

use std::sync::Arc;

use crate::{
    pipeline::{BoundDirective, PipelineContext},
    DirectiveResolver, EntityId, FeedbackEntry, FieldSet, Resolution, ResolvedArguments,
};

pub const VALIDATE: &str = "validate";
pub const RESOLVE_VALUE_AND_MERGE: &str = "resolveValueAndMerge";

pub(crate) fn builtins() -> Vec<Arc<dyn DirectiveResolver>> {
    vec![
        Arc::new(validate::Validate),
        Arc::new(resolve_value_and_merge::ResolveValueAndMerge),
        Arc::new(inclusion::Inclusion::Skip),
        Arc::new(inclusion::Inclusion::Include),
        Arc::new(default_value::DefaultValue),
        Arc::new(case::Case::Upper),
        Arc::new(case::Case::Lower),
        Arc::new(apply_if::ApplyIf),
        Arc::new(export_expression::ExportExpression),
    ]
}

/// The arguments of `directive` for entity `id`. Failures are reported on each of `fields` and
/// yield `None`.
pub(crate) fn arguments_for(
    directive: &BoundDirective,
    resolution: &Resolution<'_>,
    ctx: &mut PipelineContext<'_>,
    id: &EntityId,
    fields: &FieldSet,
) -> Option<ResolvedArguments> {
    if !directive.extraction.is_dynamic() {
        return Some(directive.static_arguments());
    }
    let entity = ctx.entity(id)?;
    let item = resolution.directive_arguments(directive, &entity, ctx.expressions_for(id));
    for field in fields.fields() {
        let key = field.output_key();
        for warning in &item.warnings {
            ctx.add_result_warning(id, warning.clone().prefixed(directive.name()).prefixed(key.as_str()));
        }
        for error in &item.errors {
            ctx.add_result_error(id, error.clone().prefixed(directive.name()).prefixed(key.as_str()));
        }
    }
    item.errors.is_empty().then_some(item.arguments)
}

/// An entry about `field`'s directive `directive`.
pub(crate) fn directive_entry(field_key: &str, directive: &str, message: String) -> FeedbackEntry {
    FeedbackEntry::new(message).with_path([field_key, directive])
}
