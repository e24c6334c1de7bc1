use crate::{
    pipeline::{BoundDirective, PipelineContext, PipelinePosition},
    DirectiveResolver, ObligationSet, Resolution,
};

/// Validates every queued field and gate against the schema. Invalid fields go through the
/// failure policy.
pub(crate) struct Validate;

impl DirectiveResolver for Validate {
    fn directive_name(&self) -> &str {
        super::VALIDATE
    }

    fn position(&self) -> PipelinePosition {
        PipelinePosition::Middle
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
        for field in fields.distinct_fields() {
            let validation = resolution.validate_field(ctx.type_name, &field);
            let key = field.output_key();
            for warning in &validation.feedback.warnings {
                ctx.add_schema_warning(warning.clone().prefixed(key.as_str()));
            }
            for deprecation in &validation.feedback.deprecations {
                ctx.add_schema_deprecation(deprecation.clone().prefixed(key.as_str()));
            }
            if validation.has_errors() {
                let pairs = fields.pairs_for(&field);
                ctx.process_failure(&validation.feedback.errors, &pairs);
            }
        }
    }
}
