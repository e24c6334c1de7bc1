use indexmap::IndexSet;

use crate::{
    pipeline::{run_stages, BoundDirective, PipelineContext, PipelinePosition},
    value::is_truthy,
    ArgType, ArgumentDefinition, DirectiveResolver, EntityId, ObligationSet, Resolution,
};

/// `if(condition: …)<nested>` runs its nested directives for the entities whose condition holds.
pub(crate) struct ApplyIf;

impl DirectiveResolver for ApplyIf {
    fn directive_name(&self) -> &str {
        "if"
    }

    fn argument_definitions(&self) -> Vec<ArgumentDefinition> {
        vec![ArgumentDefinition::new("condition", ArgType::Bool).mandatory()]
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
        if directive.nested.is_empty() {
            return;
        }
        let mut passing = IndexSet::<EntityId>::new();
        for (id, field_set) in fields.iter() {
            let holds = super::arguments_for(directive, resolution, ctx, id, field_set)
                .is_some_and(|arguments| arguments.get("condition").is_some_and(is_truthy));
            if holds {
                passing.insert(id.clone());
            }
        }
        let subset = fields.filter_ids(|id| passing.contains(id));
        run_stages(&directive.nested, &subset, resolution, ctx);
    }
}
