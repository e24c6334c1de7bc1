use field_query::Field;

use crate::{
    pipeline::{BoundDirective, PipelineContext, PipelinePosition},
    resolution::ResolvedValue,
    value::is_truthy,
    DirectiveResolver, EntityId, FeedbackEntry, ObligationSet, Resolution,
};

/// Resolves every field for every entity into the batch output. Gates that hold promote the
/// fields they guard.
pub(crate) struct ResolveValueAndMerge;

impl DirectiveResolver for ResolveValueAndMerge {
    fn directive_name(&self) -> &str {
        super::RESOLVE_VALUE_AND_MERGE
    }

    fn position(&self) -> PipelinePosition {
        PipelinePosition::Back
    }

    fn is_repeatable(&self) -> bool {
        false
    }

    fn resolve(
        &self,
        _directive: &BoundDirective,
        fields: &ObligationSet,
        resolution: &Resolution<'_>,
        ctx: &mut PipelineContext<'_>,
    ) {
        for (id, field_set) in fields.iter() {
            let Some(entity) = ctx.entity(id) else {
                for field in field_set.fields() {
                    ctx.add_result_error(
                        id,
                        FeedbackEntry::new(format!("Corrupted data: Object with ID '{id}' doesn't exist"))
                            .with_path([field.output_key()]),
                    );
                }
                continue;
            };

            for field in &field_set.direct {
                let resolved = resolution.resolve_value(&entity, field, ctx.expressions_for(id));
                merge(ctx, id, field, resolved);
            }
            for (gate, nested) in &field_set.conditional {
                let resolved = resolution.resolve_value(&entity, gate, ctx.expressions_for(id));
                if merge(ctx, id, gate, resolved) {
                    ctx.promoted.insert(id.clone(), nested.clone());
                }
            }
        }
    }
}

/// Stores the value, or `null` and its errors. Returns whether the value is truthy.
fn merge(ctx: &mut PipelineContext<'_>, id: &EntityId, field: &Field, resolved: ResolvedValue) -> bool {
    let key = field.output_key();
    for warning in resolved.warnings {
        ctx.add_result_warning(id, warning.prefixed(key.as_str()));
    }
    match resolved.value {
        Ok(value) => {
            let truthy = is_truthy(&value);
            ctx.set_output(id, key, value);
            truthy
        }
        Err(error) => {
            for entry in error.entries {
                ctx.add_result_error(id, entry.prefixed(key.as_str()));
            }
            ctx.set_output(id, key, serde_json::Value::Null);
            false
        }
    }
}
