use crate::{
    pipeline::{BoundDirective, PipelineContext, PipelinePosition},
    value::is_truthy,
    ArgType, ArgumentDefinition, DirectiveResolver, ObligationSet, Resolution,
};

/// `skip(if: …)` and `include(if: …)`: drop fields from the rest of the pipeline, per entity.
pub(crate) enum Inclusion {
    Skip,
    Include,
}

impl DirectiveResolver for Inclusion {
    fn directive_name(&self) -> &str {
        match self {
            Inclusion::Skip => "skip",
            Inclusion::Include => "include",
        }
    }

    fn argument_definitions(&self) -> Vec<ArgumentDefinition> {
        vec![ArgumentDefinition::new("if", ArgType::Bool).mandatory()]
    }

    fn position(&self) -> PipelinePosition {
        PipelinePosition::Middle
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
            let condition = arguments.get("if").is_some_and(is_truthy);
            let drop = match self {
                Inclusion::Skip => condition,
                Inclusion::Include => !condition,
            };
            if drop {
                for field in field_set.fields() {
                    ctx.obligations.remove(id, field);
                }
            }
        }
    }
}
