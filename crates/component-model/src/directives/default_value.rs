use serde_json::Value;

use crate::{
    pipeline::{BoundDirective, PipelineContext, PipelinePosition},
    value::is_truthy,
    ArgType, ArgumentDefinition, DirectiveResolver, ObligationSet, Resolution,
};

const IS_NULL: &str = "is_null";
const IS_EMPTY: &str = "is_empty";

/// `default(value: …, condition: is_null|is_empty)` replaces missing resolved values.
pub(crate) struct DefaultValue;

impl DirectiveResolver for DefaultValue {
    fn directive_name(&self) -> &str {
        "default"
    }

    fn argument_definitions(&self) -> Vec<ArgumentDefinition> {
        vec![
            ArgumentDefinition::new("value", ArgType::Mixed).mandatory(),
            ArgumentDefinition::new("condition", ArgType::enumeration([IS_NULL, IS_EMPTY]))
                .with_description("When to use the default value, `is_null` unless given"),
        ]
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
            let Some(mut arguments) = super::arguments_for(directive, resolution, ctx, id, field_set) else {
                continue;
            };
            let Some(default) = arguments.shift_remove("value") else {
                continue;
            };
            let when_empty = arguments.get("condition").and_then(Value::as_str) == Some(IS_EMPTY);
            for field in field_set.fields() {
                let key = field.output_key();
                let replace = match ctx.output_value(id, &key) {
                    None | Some(Value::Null) => true,
                    Some(value) => when_empty && !is_truthy(value),
                };
                if replace {
                    ctx.set_output(id, key, default.clone());
                }
            }
        }
    }
}
