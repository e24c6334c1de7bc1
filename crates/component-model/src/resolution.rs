use std::{
    cell::{RefCell, RefMut},
    collections::HashMap,
    rc::Rc,
};

use field_query::{DirectiveNode, FieldNode};
use indexmap::IndexMap;
use serde_json::Value;

use crate::{
    interpreter::{invocation_text, ArgumentSchema, SubjectKind},
    pipeline::{self, BoundDirective, DirectivePipeline},
    registry::FieldCandidate,
    EngineConfig, EntityId, EntityRef, FeedbackEntry, FeedbackKind, FeedbackStore, FieldError, FieldQueryInterpreter,
    Registry, ResultItemExtraction, SchemaExtraction, SchemaFeedback, Variables,
};

/// Schema-time outcome for one field on one entity type.
#[derive(Clone)]
pub struct FieldValidation {
    /// The resolver selected from the statically known arguments.
    pub candidate: Option<FieldCandidate>,
    pub extraction: Option<Rc<SchemaExtraction>>,
    /// Entries relative to the field.
    pub feedback: SchemaFeedback,
}

impl FieldValidation {
    pub fn has_errors(&self) -> bool {
        self.feedback.has_errors()
    }
}

/// The value of one field for one entity.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedValue {
    pub value: Result<Value, FieldError>,
    pub warnings: Vec<FeedbackEntry>,
}

impl ResolvedValue {
    fn error(error: FieldError) -> Self {
        ResolvedValue {
            value: Err(error),
            warnings: Vec::new(),
        }
    }
}

/// Everything field and directive resolution needs during one execution: the registry, the
/// configuration, the variables, the memoized schema work and the feedback collected so far.
pub struct Resolution<'a> {
    registry: &'a Registry,
    config: &'a EngineConfig,
    variables: &'a Variables,
    interpreter: FieldQueryInterpreter,
    validations: RefCell<HashMap<(String, String), Rc<FieldValidation>>>,
    pipelines: RefCell<HashMap<(String, String), Rc<DirectivePipeline>>>,
    /// (entity type, output key) -> field name
    field_names: RefCell<HashMap<(String, String), String>>,
    feedback: RefCell<FeedbackStore>,
}

impl<'a> Resolution<'a> {
    pub fn new(registry: &'a Registry, config: &'a EngineConfig, variables: &'a Variables) -> Self {
        Resolution {
            registry,
            config,
            variables,
            interpreter: FieldQueryInterpreter::new(),
            validations: RefCell::default(),
            pipelines: RefCell::default(),
            field_names: RefCell::default(),
            feedback: RefCell::default(),
        }
    }

    pub fn registry(&self) -> &'a Registry {
        self.registry
    }

    pub fn config(&self) -> &'a EngineConfig {
        self.config
    }

    pub fn variables(&self) -> &'a Variables {
        self.variables
    }

    pub fn interpreter(&self) -> &FieldQueryInterpreter {
        &self.interpreter
    }

    pub fn feedback(&self) -> RefMut<'_, FeedbackStore> {
        self.feedback.borrow_mut()
    }

    pub fn into_feedback(self) -> FeedbackStore {
        self.feedback.into_inner()
    }

    /// Bucket of the field stored under `output_key`. Keys of fields never validated are read
    /// as `name(arguments)`.
    pub fn bucket_for(&self, type_name: &str, output_key: &str) -> &'a str {
        let names = self.field_names.borrow();
        let name = match names.get(&(type_name.to_owned(), output_key.to_owned())) {
            Some(name) => name.as_str(),
            None => output_key.split_once('(').map_or(output_key, |(name, _)| name),
        };
        self.config.bucket_for(type_name, name)
    }

    pub(crate) fn record_field_name(&self, type_name: &str, field: &FieldNode) {
        self.field_names
            .borrow_mut()
            .entry((type_name.to_owned(), field.output_key()))
            .or_insert_with(|| field.name.clone());
    }

    /// Bucket of a feedback entry, decided by the field it starts at.
    fn bucket_for_path(&self, type_name: &str, path: &[String]) -> &'a str {
        match path.first() {
            Some(output_key) => self.bucket_for(type_name, output_key),
            None => &self.config.default_bucket,
        }
    }

    /// Routes a schema entry of `type_name` to the bucket of the field it starts at.
    pub fn add_schema_entry(&self, kind: FeedbackKind, type_name: &str, entry: FeedbackEntry) {
        let bucket = self.bucket_for_path(type_name, &entry.path);
        self.feedback.borrow_mut().add_schema(kind, bucket, type_name, entry);
    }

    pub fn add_result_entry(&self, kind: FeedbackKind, type_name: &str, id: &EntityId, entry: FeedbackEntry) {
        let bucket = self.bucket_for_path(type_name, &entry.path);
        self.feedback.borrow_mut().add_result(kind, bucket, type_name, id, entry);
    }

    pub(crate) fn record_extraction(&self, extraction: &SchemaExtraction) {
        let mut feedback = self.feedback.borrow_mut();
        for message in &extraction.query_errors {
            feedback.add_query_error(message.as_str());
        }
        for message in &extraction.log_entries {
            feedback.add_log_entry(message.as_str());
        }
    }

    fn record_query_errors(&self, messages: Vec<String>) {
        let mut feedback = self.feedback.borrow_mut();
        for message in messages {
            feedback.add_query_error(message);
        }
    }

    /// Selects the resolver of `field` and validates its arguments. Memoized per type and
    /// argument text, so aliases and directives share the outcome.
    pub fn validate_field(&self, type_name: &str, field: &FieldNode) -> Rc<FieldValidation> {
        self.record_field_name(type_name, field);
        let key = (type_name.to_owned(), invocation_text(field));
        let cached = self.validations.borrow().get(&key).cloned();
        if let Some(validation) = cached {
            return validation;
        }

        let static_arguments = self.interpreter.parse_static(field);
        let validation = match self.registry.select_field_resolver(type_name, field, &static_arguments) {
            None => FieldValidation {
                candidate: None,
                extraction: None,
                feedback: SchemaFeedback {
                    errors: vec![FeedbackEntry::new(format!(
                        "No FieldResolver resolves field '{}'",
                        field.name
                    ))],
                    ..Default::default()
                },
            },
            Some(candidate) => {
                let extraction = self.field_extraction(type_name, candidate, field);
                let mut feedback = extraction.feedback.clone();
                if !feedback.has_errors() {
                    let arguments = extraction.static_arguments();
                    feedback.extend(candidate.resolver.validate_schema(&field.name, &arguments));
                    if let Some(reason) = candidate.resolver.deprecation(&field.name, &arguments) {
                        feedback.deprecations.push(FeedbackEntry::new(format!(
                            "Field '{}' is deprecated: {reason}",
                            field.name
                        )));
                    }
                }
                FieldValidation {
                    candidate: Some(candidate.clone()),
                    extraction: Some(extraction),
                    feedback,
                }
            }
        };

        let validation = Rc::new(validation);
        self.validations.borrow_mut().insert(key, Rc::clone(&validation));
        validation
    }

    fn field_extraction(&self, type_name: &str, candidate: &FieldCandidate, field: &FieldNode) -> Rc<SchemaExtraction> {
        let definitions = candidate.resolver.argument_definitions(&field.name);
        let schema = ArgumentSchema {
            type_name,
            kind: SubjectKind::Field,
            owner: candidate.owner,
            definitions: &definitions,
            ordered: candidate.resolver.enable_ordered_arguments(&field.name),
        };
        let extraction = self.interpreter.parse_for_schema(&schema, field, self.variables, &|call| {
            self.validate_field(type_name, call).feedback.clone()
        });
        self.record_extraction(&extraction);
        extraction
    }

    /// Resolves `field` for one entity. Field calls among its arguments are resolved against
    /// the same entity.
    pub fn resolve_value(
        &self,
        entity: &EntityRef<'_>,
        field: &FieldNode,
        expressions: Option<&IndexMap<String, Value>>,
    ) -> ResolvedValue {
        let validation = self.validate_field(entity.type_name, field);
        if validation.has_errors() {
            return ResolvedValue::error(FieldError::from_entries(validation.feedback.errors.clone()));
        }

        let Some(candidate) = self.registry.select_field_resolver_for_entity(field, entity) else {
            return ResolvedValue::error(FieldError::new(format!(
                "No FieldResolver processes field '{}' for object with ID '{}'",
                field.name, entity.id
            )));
        };
        let extraction = match (&validation.candidate, &validation.extraction) {
            (Some(selected), Some(extraction)) if selected.owner == candidate.owner => Rc::clone(extraction),
            _ => self.field_extraction(entity.type_name, candidate, field),
        };
        if extraction.has_errors() {
            return ResolvedValue::error(FieldError::from_entries(extraction.feedback.errors.clone()));
        }

        if !extraction.is_dynamic() {
            return ResolvedValue {
                value: self.invoke(candidate, entity, field, &extraction.static_arguments()),
                warnings: Vec::new(),
            };
        }

        let definitions = candidate.resolver.argument_definitions(&field.name);
        let schema = ArgumentSchema {
            type_name: entity.type_name,
            kind: SubjectKind::Field,
            owner: candidate.owner,
            definitions: &definitions,
            ordered: candidate.resolver.enable_ordered_arguments(&field.name),
        };
        let item = self.interpreter.parse_for_result_item(&schema, &extraction, expressions, &mut |call| {
            self.resolve_value(entity, call, expressions)
        });
        self.record_query_errors(item.query_errors);
        let value = if item.errors.is_empty() {
            self.invoke(candidate, entity, field, &item.arguments)
        } else {
            Err(FieldError::from_entries(item.errors))
        };
        ResolvedValue {
            value,
            warnings: item.warnings,
        }
    }

    fn invoke(
        &self,
        candidate: &FieldCandidate,
        entity: &EntityRef<'_>,
        field: &FieldNode,
        arguments: &crate::ResolvedArguments,
    ) -> Result<Value, FieldError> {
        candidate.resolver.validate_entity(entity, &field.name, arguments)?;
        candidate.resolver.resolve(entity, &field.name, arguments)
    }

    /// The arguments of a bound directive for one entity.
    pub fn directive_arguments(
        &self,
        directive: &BoundDirective,
        entity: &EntityRef<'_>,
        expressions: Option<&IndexMap<String, Value>>,
    ) -> ResultItemExtraction {
        if !directive.extraction.is_dynamic() {
            return ResultItemExtraction {
                arguments: directive.extraction.static_arguments(),
                ..Default::default()
            };
        }
        let mut item = self.interpreter.parse_for_result_item(
            &directive.schema(entity.type_name),
            &directive.extraction,
            expressions,
            &mut |call| self.resolve_value(entity, call, expressions),
        );
        self.record_query_errors(std::mem::take(&mut item.query_errors));
        item
    }

    /// The entity type a relationship field points to.
    pub fn relation_target(&self, type_name: &str, field: &FieldNode) -> Option<String> {
        let validation = self.validate_field(type_name, field);
        validation
            .candidate
            .as_ref()?
            .resolver
            .relation_target(type_name, field)
    }

    /// The pipeline for a directive annotation, built once per entity type.
    pub fn directive_pipeline(&self, type_name: &str, directives: &[DirectiveNode]) -> Rc<DirectivePipeline> {
        let annotation = itertools::join(directives, ", ");
        let key = (annotation, type_name.to_owned());
        let cached = self.pipelines.borrow().get(&key).cloned();
        if let Some(pipeline) = cached {
            return pipeline;
        }

        let pipeline = Rc::new(pipeline::build(self, type_name, directives));
        tracing::debug!(
            type_name,
            annotation = %key.0,
            stages = ?pipeline.stage_names(),
            "built directive pipeline"
        );
        self.pipelines.borrow_mut().insert(key, Rc::clone(&pipeline));
        pipeline
    }
}
