use std::{cell::RefCell, collections::HashMap, rc::Rc};

use field_query::{FieldNode, InputValue, Invocation, ListItem};
use indexmap::IndexMap;
use serde_json::Value;

use crate::{
    schema::{cast, ArgumentDefinition},
    value::describe,
    FeedbackEntry, ResolvedValue, SchemaFeedback, Variables,
};

/// Arguments after schema-time processing. Values depending on an entity or an expression
/// context are still unresolved.
pub type Arguments = IndexMap<String, InputValue>;

/// Arguments with every value known.
pub type ResolvedArguments = IndexMap<String, Value>;

/// Per-entity expression context: id -> expression name -> value.
pub type Expressions = IndexMap<crate::EntityId, IndexMap<String, Value>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum_macros::Display)]
#[strum(serialize_all = "lowercase")]
pub enum SubjectKind {
    Field,
    Directive,
}

/// What the interpreter needs to know about the resolver owning a field or directive.
#[derive(Debug, Clone, Copy)]
pub struct ArgumentSchema<'a> {
    pub type_name: &'a str,
    pub kind: SubjectKind,
    pub owner: usize,
    pub definitions: &'a [ArgumentDefinition],
    /// Whether unnamed arguments are named after the order of `definitions`.
    pub ordered: bool,
}

impl ArgumentSchema<'_> {
    fn definition(&self, name: &str) -> Option<&ArgumentDefinition> {
        self.definitions.iter().find(|definition| definition.name == name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SchemaExtraction {
    /// The subject printed back with every argument named and every variable substituted.
    pub resolved: String,
    pub name: String,
    pub arguments: Arguments,
    pub feedback: SchemaFeedback,
    pub query_errors: Vec<String>,
    pub log_entries: Vec<String>,
}

impl SchemaExtraction {
    pub fn has_errors(&self) -> bool {
        self.feedback.has_errors()
    }

    /// Whether some argument can only be resolved per entity.
    pub fn is_dynamic(&self) -> bool {
        self.arguments.values().any(InputValue::is_dynamic)
    }

    /// The arguments known at schema time.
    pub fn static_arguments(&self) -> ResolvedArguments {
        self.arguments
            .iter()
            .filter_map(|(name, value)| Some((name.clone(), value.as_const()?.clone())))
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultItemExtraction {
    pub arguments: ResolvedArguments,
    pub errors: Vec<FeedbackEntry>,
    pub warnings: Vec<FeedbackEntry>,
    pub query_errors: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ExtractionKey {
    type_name: String,
    kind: SubjectKind,
    owner: usize,
    subject: String,
    variables: blake3::Hash,
}

/// Turns the arguments of fields and directives into values, memoizing schema-time extractions
/// for the lifetime of one execution.
#[derive(Debug, Default)]
pub struct FieldQueryInterpreter {
    extractions: RefCell<HashMap<ExtractionKey, Rc<SchemaExtraction>>>,
}

impl FieldQueryInterpreter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Literal values only, used to pick the resolver before its schema is known. Unnamed
    /// arguments are keyed by position, dynamic values are kept as their source text.
    pub fn parse_static(&self, subject: &impl Invocation) -> ResolvedArguments {
        subject
            .arguments()
            .iter()
            .enumerate()
            .map(|(position, argument)| {
                let name = argument.name.clone().unwrap_or_else(|| position.to_string());
                (name, static_value(&argument.value))
            })
            .collect()
    }

    pub fn parse_for_schema<N: Invocation>(
        &self,
        schema: &ArgumentSchema<'_>,
        subject: &N,
        variables: &Variables,
        validate_call: &dyn Fn(&FieldNode) -> SchemaFeedback,
    ) -> Rc<SchemaExtraction> {
        let key = ExtractionKey {
            type_name: schema.type_name.to_owned(),
            kind: schema.kind,
            owner: schema.owner,
            subject: invocation_text(subject),
            variables: variables.digest(),
        };
        let cached = self.extractions.borrow().get(&key).cloned();
        if let Some(extraction) = cached {
            return extraction;
        }
        tracing::trace!(subject = %key.subject, kind = %schema.kind, "argument extraction cache miss");

        let extraction = Rc::new(extract_for_schema(schema, subject, variables, validate_call));
        self.extractions.borrow_mut().insert(key, Rc::clone(&extraction));
        extraction
    }

    /// Resolves the remaining dynamic arguments for one entity. Field calls are evaluated
    /// through `evaluate`, expressions are read from the entity's context.
    pub fn parse_for_result_item(
        &self,
        schema: &ArgumentSchema<'_>,
        extraction: &SchemaExtraction,
        expressions: Option<&IndexMap<String, Value>>,
        evaluate: &mut dyn FnMut(&FieldNode) -> ResolvedValue,
    ) -> ResultItemExtraction {
        let mut item = ResultItemExtraction::default();
        for (name, value) in &extraction.arguments {
            let value = match value {
                InputValue::Const(value) => {
                    item.arguments.insert(name.clone(), value.clone());
                    continue;
                }
                value => {
                    let mut evaluator = Evaluator {
                        argument: name,
                        expressions,
                        evaluate: &mut *evaluate,
                        item: &mut item,
                    };
                    match evaluator.value(value) {
                        Some(value) => value,
                        None => continue,
                    }
                }
            };
            let value = match schema.definition(name) {
                Some(definition) => match cast(&definition.ty, value.clone()) {
                    Ok(value) => value,
                    Err(error) => {
                        item.warnings.push(cast_failure(schema.kind, &extraction.name, &value, definition, &error));
                        continue;
                    }
                },
                None => value,
            };
            item.arguments.insert(name.clone(), value);
        }
        item
    }
}

struct Evaluator<'a, 'b> {
    argument: &'a str,
    expressions: Option<&'a IndexMap<String, Value>>,
    evaluate: &'b mut dyn FnMut(&FieldNode) -> ResolvedValue,
    item: &'b mut ResultItemExtraction,
}

impl Evaluator<'_, '_> {
    /// `None` drops the value: its reference was undefined or its field call failed.
    fn value(&mut self, value: &InputValue) -> Option<Value> {
        match value {
            InputValue::Const(value) => Some(value.clone()),
            InputValue::Expression(name) => {
                let value = self.expressions.and_then(|expressions| expressions.get(name)).cloned();
                if value.is_none() {
                    self.item.query_errors.push(format!("Expression '{name}' is undefined"));
                }
                value
            }
            InputValue::Variable(_) => None,
            InputValue::Field(call) => {
                let resolved = (self.evaluate)(call);
                let argument = self.argument;
                self.item
                    .warnings
                    .extend(resolved.warnings.into_iter().map(|entry| entry.prefixed(argument)));
                match resolved.value {
                    Ok(value) => Some(value),
                    Err(error) => {
                        self.item.errors.push(FeedbackEntry::new(format!(
                            "Executing field '{}' produced error: {error}",
                            call.to_call_string()
                        )));
                        None
                    }
                }
            }
            InputValue::List(items) => {
                let values = items
                    .iter()
                    .map(|item| (item.key.clone(), self.value(&item.value).unwrap_or(Value::Null)))
                    .collect();
                Some(fold_list(values))
            }
        }
    }
}

fn extract_for_schema<N: Invocation>(
    schema: &ArgumentSchema<'_>,
    subject: &N,
    variables: &Variables,
    validate_call: &dyn Fn(&FieldNode) -> SchemaFeedback,
) -> SchemaExtraction {
    let kind = schema.kind;
    let subject_name = subject.name();
    let mut extraction = SchemaExtraction {
        resolved: String::new(),
        name: subject_name.to_owned(),
        arguments: Arguments::new(),
        feedback: SchemaFeedback::default(),
        query_errors: Vec::new(),
        log_entries: Vec::new(),
    };

    for (position, argument) in subject.arguments().iter().enumerate() {
        let name = match &argument.name {
            Some(name) => name.clone(),
            None => match schema.definitions.get(position).filter(|_| schema.ordered) {
                Some(definition) => {
                    extraction.log_entries.push(format!(
                        "In {kind} '{subject_name}', argument on position {} has been named '{}'",
                        position + 1,
                        definition.name
                    ));
                    definition.name.clone()
                }
                None => {
                    extraction.feedback.warnings.push(FeedbackEntry::new(format!(
                        "The argument on position number {} (with value '{}') has its name missing, and documentation for this field/directive does not exist, so it has been ignored",
                        position + 1,
                        describe_input(&argument.value)
                    )));
                    continue;
                }
            },
        };

        let Some(value) = substitute(&argument.value, variables, &mut extraction.query_errors) else {
            continue;
        };

        for call in value.field_calls() {
            extraction.feedback.extend(validate_call(call).prefixed(&name));
        }

        let Some(definition) = schema.definition(&name) else {
            extraction.feedback.warnings.push(FeedbackEntry::new(format!(
                "Argument with name '{name}' has not been documented in the schema, so it may have no effect (it has not been removed from the query, though)"
            )));
            extraction.arguments.insert(name, value);
            continue;
        };

        if let Some(reason) = &definition.deprecation {
            extraction.feedback.deprecations.push(FeedbackEntry::new(format!(
                "Argument '{name}' in {kind} '{subject_name}' is deprecated: {reason}"
            )));
        }

        let value = match value {
            InputValue::Const(value) => match cast(&definition.ty, value.clone()) {
                Ok(value) => InputValue::Const(value),
                Err(error) => {
                    extraction
                        .feedback
                        .warnings
                        .push(cast_failure(kind, subject_name, &value, definition, &error));
                    continue;
                }
            },
            value => value,
        };
        extraction.arguments.insert(name, value);
    }

    for definition in schema.definitions.iter().filter(|definition| definition.mandatory) {
        if !extraction.arguments.contains_key(&definition.name) {
            extraction.feedback.errors.push(FeedbackEntry::new(format!(
                "Mandatory argument '{}' in {kind} '{subject_name}' has not been provided",
                definition.name
            )));
        }
    }

    let arguments = extraction
        .arguments
        .iter()
        .map(|(name, value)| field_query::Argument::named(name.clone(), value.clone()))
        .collect();
    extraction.resolved = invocation_text(&subject.with_arguments(arguments));
    extraction
}

fn cast_failure(
    kind: SubjectKind,
    subject: &str,
    value: &Value,
    definition: &ArgumentDefinition,
    error: &crate::schema::CastError,
) -> FeedbackEntry {
    FeedbackEntry::new(format!(
        "For {kind} '{subject}', casting value '{}' for argument '{}' to type '{}' failed: {error}. It has been ignored",
        describe(value),
        definition.name,
        definition.ty
    ))
}

/// Replaces variables. An undefined variable drops the argument, or becomes `null` inside a
/// list. Lists whose items are all known fold into a single value.
fn substitute(value: &InputValue, variables: &Variables, query_errors: &mut Vec<String>) -> Option<InputValue> {
    match value {
        InputValue::Variable(name) => match variables.get(name) {
            Some(value) => Some(InputValue::Const(value.clone())),
            None => {
                query_errors.push(format!("Variable '{name}' is undefined"));
                None
            }
        },
        InputValue::List(items) => {
            let items: Vec<ListItem> = items
                .iter()
                .map(|item| ListItem {
                    key: item.key.clone(),
                    value: substitute(&item.value, variables, query_errors)
                        .unwrap_or(InputValue::Const(Value::Null)),
                })
                .collect();
            if items.iter().any(|item| item.value.is_dynamic()) {
                return Some(InputValue::List(items));
            }
            let values = items
                .into_iter()
                .map(|item| (item.key, static_value(&item.value)))
                .collect();
            Some(InputValue::Const(fold_list(values)))
        }
        value => Some(value.clone()),
    }
}

fn static_value(value: &InputValue) -> Value {
    match value {
        InputValue::Const(value) => value.clone(),
        InputValue::List(items) => fold_list(
            items
                .iter()
                .map(|item| (item.key.clone(), static_value(&item.value)))
                .collect(),
        ),
        value => Value::String(value.to_string()),
    }
}

/// A list becomes an array, or an object keyed by position when some item carries a key.
fn fold_list(items: Vec<(Option<String>, Value)>) -> Value {
    if items.iter().all(|(key, _)| key.is_none()) {
        return Value::Array(items.into_iter().map(|(_, value)| value).collect());
    }
    Value::Object(
        items
            .into_iter()
            .enumerate()
            .map(|(position, (key, value))| (key.unwrap_or_else(|| position.to_string()), value))
            .collect(),
    )
}

fn describe_input(value: &InputValue) -> String {
    match value {
        InputValue::Const(value) => describe(value),
        value => value.to_string(),
    }
}

/// `name(arguments)` without alias or directives.
pub(crate) fn invocation_text(subject: &impl Invocation) -> String {
    if subject.arguments().is_empty() {
        return subject.name().to_owned();
    }
    format!(
        "{}({})",
        subject.name(),
        itertools::join(subject.arguments().iter(), ", ")
    )
}

#[cfg(test)]
mod tests {
    use field_query::parse_field;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::{schema::ArgType, FieldError};

    fn definitions() -> Vec<ArgumentDefinition> {
        vec![
            ArgumentDefinition::new("limit", ArgType::Int),
            ArgumentDefinition::new("order", ArgType::array_of(ArgType::String)),
            ArgumentDefinition::new("status", ArgType::enumeration(["draft", "publish"])).mandatory(),
            ArgumentDefinition::new("since", ArgType::Date).deprecated("use `after`"),
        ]
    }

    fn schema(definitions: &[ArgumentDefinition]) -> ArgumentSchema<'_> {
        ArgumentSchema {
            type_name: "root",
            kind: SubjectKind::Field,
            owner: 0,
            definitions,
            ordered: true,
        }
    }

    fn no_calls(_: &FieldNode) -> SchemaFeedback {
        SchemaFeedback::default()
    }

    fn messages(entries: &[FeedbackEntry]) -> Vec<&str> {
        entries.iter().map(|entry| entry.message.as_str()).collect()
    }

    #[test]
    fn static_parsing_keeps_dynamic_values_as_text() {
        let interpreter = FieldQueryInterpreter::new();
        let field = parse_field("posts(limit: $limit, draft, order: [title, dir=desc], isStatus(status: draft))").unwrap();

        assert_eq!(
            serde_json::to_value(interpreter.parse_static(&field)).unwrap(),
            json!({
                "limit": "$limit",
                "1": "draft",
                "order": {"0": "title", "dir": "desc"},
                "3": "isStatus(status: draft)",
            })
        );
    }

    #[test]
    fn schema_parsing_names_substitutes_and_casts() {
        let interpreter = FieldQueryInterpreter::new();
        let definitions = definitions();
        let field = parse_field("posts($limit, [title, $missing], status: draft, since: 2020-01-01, color: red)").unwrap();
        let variables = Variables::default().with("limit", json!("5"));

        let extraction = interpreter.parse_for_schema(&schema(&definitions), &field, &variables, &no_calls);

        assert_eq!(
            serde_json::to_value(extraction.static_arguments()).unwrap(),
            json!({
                "limit": 5,
                "status": "draft",
                "since": "2020-01-01",
                "color": "red",
            })
        );
        assert_eq!(extraction.query_errors, vec!["Variable 'missing' is undefined"]);
        assert_eq!(
            extraction.log_entries,
            vec![
                "In field 'posts', argument on position 1 has been named 'limit'",
                "In field 'posts', argument on position 2 has been named 'order'",
            ]
        );
        assert_eq!(
            messages(&extraction.feedback.warnings),
            vec![
                "For field 'posts', casting value '[\"title\", null]' for argument 'order' to type 'array:string' failed: element '1': the value is not a string. It has been ignored",
                "Argument with name 'color' has not been documented in the schema, so it may have no effect (it has not been removed from the query, though)",
            ]
        );
        assert_eq!(
            messages(&extraction.feedback.deprecations),
            vec!["Argument 'since' in field 'posts' is deprecated: use `after`"]
        );
        assert!(!extraction.has_errors());
    }

    #[test]
    fn failed_casts_drop_only_that_argument() {
        let interpreter = FieldQueryInterpreter::new();
        let definitions = definitions();
        let field = parse_field("posts(limit: abc, status: publish)").unwrap();

        let extraction = interpreter.parse_for_schema(&schema(&definitions), &field, &Variables::default(), &no_calls);

        assert_eq!(
            messages(&extraction.feedback.warnings),
            vec!["For field 'posts', casting value 'abc' for argument 'limit' to type 'int' failed: the value is not an integer. It has been ignored"]
        );
        assert_eq!(
            serde_json::to_value(extraction.static_arguments()).unwrap(),
            json!({"status": "publish"})
        );
        assert_eq!(extraction.resolved, r#"posts(status: "publish")"#);
    }

    #[test]
    fn missing_mandatory_argument_is_an_error() {
        let interpreter = FieldQueryInterpreter::new();
        let definitions = definitions();
        let field = parse_field("posts(limit: 2)").unwrap();

        let extraction = interpreter.parse_for_schema(&schema(&definitions), &field, &Variables::default(), &no_calls);

        assert!(extraction.has_errors());
        assert_eq!(
            messages(&extraction.feedback.errors),
            vec!["Mandatory argument 'status' in field 'posts' has not been provided"]
        );
    }

    #[test]
    fn unnamed_arguments_without_documentation_are_ignored() {
        let interpreter = FieldQueryInterpreter::new();
        let field = parse_field("echo(hello)").unwrap();

        let extraction = interpreter.parse_for_schema(&schema(&[]), &field, &Variables::default(), &no_calls);

        assert_eq!(
            messages(&extraction.feedback.warnings),
            vec!["The argument on position number 1 (with value 'hello') has its name missing, and documentation for this field/directive does not exist, so it has been ignored"]
        );
        assert!(extraction.arguments.is_empty());
    }

    #[test]
    fn resolved_text_reparses_to_the_same_arguments() {
        let interpreter = FieldQueryInterpreter::new();
        let definitions = definitions();
        let variables = Variables::default().with("order", json!(["title", "date"]));
        let field = parse_field(r#"posts("7", $order, draft, since: "2021-03-04")"#).unwrap();

        let first = interpreter.parse_for_schema(&schema(&definitions), &field, &variables, &no_calls);
        let reparsed = parse_field(&first.resolved).unwrap();
        let second = interpreter.parse_for_schema(&schema(&definitions), &reparsed, &variables, &no_calls);

        assert_eq!(first.arguments, second.arguments);
        assert_eq!(first.resolved, second.resolved);
    }

    #[test]
    fn extractions_are_memoized_per_variable_set() {
        let interpreter = FieldQueryInterpreter::new();
        let definitions = definitions();
        let field = parse_field("posts(limit: $limit, status: draft)").unwrap();
        let one = Variables::default().with("limit", json!(1));
        let two = Variables::default().with("limit", json!(2));

        let a = interpreter.parse_for_schema(&schema(&definitions), &field, &one, &no_calls);
        let b = interpreter.parse_for_schema(&schema(&definitions), &field, &one, &no_calls);
        let c = interpreter.parse_for_schema(&schema(&definitions), &field, &two, &no_calls);

        assert!(Rc::ptr_eq(&a, &b));
        assert_eq!(c.static_arguments()["limit"], json!(2));
    }

    #[test]
    fn result_items_evaluate_calls_and_expressions() {
        let interpreter = FieldQueryInterpreter::new();
        let definitions = vec![
            ArgumentDefinition::new("value", ArgType::Mixed),
            ArgumentDefinition::new("times", ArgType::Int),
        ];
        let field = parse_field("repeat(value: %greeting%, times: count(), extra: [%nope%, 1])").unwrap();
        let extraction = interpreter.parse_for_schema(&schema(&definitions), &field, &Variables::default(), &no_calls);
        assert!(extraction.is_dynamic());

        let expressions: IndexMap<String, Value> = [("greeting".to_owned(), json!("hi"))].into_iter().collect();
        let mut evaluate = |call: &FieldNode| {
            assert_eq!(call.name, "count");
            ResolvedValue {
                value: Ok(json!("3")),
                warnings: vec![FeedbackEntry::new("count is approximate")],
            }
        };
        let item = interpreter.parse_for_result_item(&schema(&definitions), &extraction, Some(&expressions), &mut evaluate);

        assert_eq!(
            serde_json::to_value(&item.arguments).unwrap(),
            json!({"value": "hi", "times": 3, "extra": [null, 1]})
        );
        assert_eq!(item.query_errors, vec!["Expression 'nope' is undefined"]);
        assert!(item.errors.is_empty());
        assert_eq!(item.warnings, vec![FeedbackEntry::new("count is approximate").with_path(["times"])]);

        let mut failing = |_: &FieldNode| ResolvedValue {
            value: Err(FieldError::new("no count")),
            warnings: Vec::new(),
        };
        let item = interpreter.parse_for_result_item(&schema(&definitions), &extraction, Some(&expressions), &mut failing);
        assert_eq!(
            messages(&item.errors),
            vec!["Executing field 'count()' produced error: no count"]
        );
        assert!(!item.arguments.contains_key("times"));
    }
}
