use serde_json::Value;

use crate::{
    pipeline::{BoundDirective, PipelineContext, PipelinePosition},
    value::describe,
    DirectiveResolver, ObligationSet, Resolution,
};

/// `upperCase` and `lowerCase`. Lists are transformed item by item.
pub(crate) enum Case {
    Upper,
    Lower,
}

impl Case {
    fn apply(&self, value: &mut Value, rejected: &mut Vec<Value>) {
        match value {
            Value::String(string) => {
                *string = match self {
                    Case::Upper => string.to_uppercase(),
                    Case::Lower => string.to_lowercase(),
                };
            }
            Value::Null => {}
            Value::Array(values) => values.iter_mut().for_each(|value| self.apply(value, rejected)),
            value => rejected.push(value.clone()),
        }
    }
}

impl DirectiveResolver for Case {
    fn directive_name(&self) -> &str {
        match self {
            Case::Upper => "upperCase",
            Case::Lower => "lowerCase",
        }
    }

    fn position(&self) -> PipelinePosition {
        PipelinePosition::Back
    }

    fn resolve(
        &self,
        directive: &BoundDirective,
        fields: &ObligationSet,
        _resolution: &Resolution<'_>,
        ctx: &mut PipelineContext<'_>,
    ) {
        for (id, field_set) in fields.iter() {
            for field in field_set.fields() {
                let key = field.output_key();
                let Some(value) = ctx.output.get_mut(id).and_then(|items| items.get_mut(&key)) else {
                    continue;
                };
                let mut rejected = Vec::new();
                self.apply(value, &mut rejected);
                for value in rejected {
                    ctx.add_result_warning(
                        id,
                        super::directive_entry(
                            &key,
                            directive.name(),
                            format!(
                                "Directive '{}' can only transform strings, so value '{}' has been left unchanged",
                                directive.name(),
                                describe(&value)
                            ),
                        ),
                    );
                }
            }
        }
    }
}
