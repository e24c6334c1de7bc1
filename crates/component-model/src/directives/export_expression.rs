use crate::{
    pipeline::{BoundDirective, PipelineContext, PipelinePosition},
    ArgType, ArgumentDefinition, DirectiveResolver, ObligationSet, Resolution,
};

/// `exportExpression(as: name)` makes the resolved value available to later fields of the same
/// entity as `%name%`.
pub(crate) struct ExportExpression;

impl DirectiveResolver for ExportExpression {
    fn directive_name(&self) -> &str {
        "exportExpression"
    }

    fn argument_definitions(&self) -> Vec<ArgumentDefinition> {
        vec![ArgumentDefinition::new("as", ArgType::String).mandatory()]
    }

    fn position(&self) -> PipelinePosition {
        PipelinePosition::Back
    }

    fn resolve(
        &self,
        directive: &BoundDirective,
        fields: &ObligationSet,
        resolution: &Resolution<'_>,
        ctx: &mut PipelineContext<'_>,
    ) {
        for (id, field_set) in fields.iter() {
            let Some(arguments) = super::arguments_for(directive, resolution, ctx, id, field_set) else {
                continue;
            };
            let Some(name) = arguments.get("as").and_then(|name| name.as_str()) else {
                continue;
            };
            for field in field_set.fields() {
                if let Some(value) = ctx.output_value(id, &field.output_key()).cloned() {
                    ctx.expressions
                        .entry(id.clone())
                        .or_default()
                        .insert(name.to_owned(), value);
                }
            }
        }
    }
}
