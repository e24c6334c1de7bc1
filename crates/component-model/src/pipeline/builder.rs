use std::collections::{BTreeMap, HashMap};

use field_query::DirectiveNode;

use super::{BoundDirective, DirectivePipeline, PipelinePosition};
use crate::{
    directives,
    interpreter::{ArgumentSchema, SubjectKind},
    FeedbackEntry, Resolution, SchemaFeedback,
};

/// Binds `directives`, preceded by the mandatory `validate` and `resolveValueAndMerge`, and
/// orders them by position.
pub(crate) fn build(resolution: &Resolution<'_>, type_name: &str, directives: &[DirectiveNode]) -> DirectivePipeline {
    let nodes: Vec<DirectiveNode> = [directives::VALIDATE, directives::RESOLVE_VALUE_AND_MERGE]
        .into_iter()
        .map(DirectiveNode::new)
        .chain(directives.iter().cloned())
        .collect();

    let mut feedback = SchemaFeedback::default();
    let mut failures = Vec::new();
    let bound = bind_level(resolution, type_name, &nodes, &mut feedback, &mut failures);

    let mut positions = BTreeMap::<PipelinePosition, Vec<BoundDirective>>::new();
    for directive in bound {
        positions.entry(directive.position()).or_default().push(directive);
    }

    DirectivePipeline {
        stages: positions.into_values().flatten().collect(),
        feedback,
        failures,
    }
}

/// Binds sibling directives. Repetitions of a non-repeatable directive are counted among
/// siblings only. Every entry is prefixed with the directive it concerns.
fn bind_level(
    resolution: &Resolution<'_>,
    type_name: &str,
    nodes: &[DirectiveNode],
    feedback: &mut SchemaFeedback,
    failures: &mut Vec<FeedbackEntry>,
) -> Vec<BoundDirective> {
    let mut executions = HashMap::<&str, usize>::new();
    let mut bound = Vec::with_capacity(nodes.len());
    for node in nodes {
        match bind(resolution, type_name, node) {
            Ok((directive, directive_feedback)) => {
                feedback.extend(directive_feedback.prefixed(&node.name));
                let execution = executions.entry(node.name.as_str()).or_default();
                *execution += 1;
                if *execution > 1 && !directive.candidate.resolver.is_repeatable() {
                    feedback.errors.push(
                        FeedbackEntry::new(format!(
                            "Directive '{}' can be executed only once within a field, so the current execution (number {execution}) has been ignored",
                            node.name
                        ))
                        .with_path([node.name.as_str()]),
                    );
                    continue;
                }
                bound.push(directive);
            }
            Err(errors) => failures.extend(errors.into_iter().map(|entry| entry.prefixed(node.name.as_str()))),
        }
    }
    bound
}

fn bind(
    resolution: &Resolution<'_>,
    type_name: &str,
    node: &DirectiveNode,
) -> Result<(BoundDirective, SchemaFeedback), Vec<FeedbackEntry>> {
    let mut nested_feedback = SchemaFeedback::default();
    let mut nested_failures = Vec::new();
    let nested = bind_level(resolution, type_name, &node.nested, &mut nested_feedback, &mut nested_failures);
    if !nested_failures.is_empty() {
        nested_failures.push(FeedbackEntry::new(
            "This directive can't be processed due to errors from its nested directives",
        ));
        return Err(nested_failures);
    }

    let candidates = resolution.registry().directive_candidates(type_name, &node.name);
    if candidates.is_empty() {
        return Err(vec![FeedbackEntry::new(format!(
            "No DirectiveResolver resolves directive with name '{}'",
            node.name
        ))]);
    }

    let static_arguments = resolution.interpreter().parse_static(node);
    let mut rejected = None;
    for candidate in candidates {
        if !candidate.resolver.can_process(node, &static_arguments) {
            continue;
        }
        let definitions = candidate.resolver.argument_definitions();
        let schema = ArgumentSchema {
            type_name,
            kind: SubjectKind::Directive,
            owner: candidate.owner,
            definitions: &definitions,
            ordered: true,
        };
        let extraction =
            resolution
                .interpreter()
                .parse_for_schema(&schema, node, resolution.variables(), &|call| {
                    resolution.validate_field(type_name, call).feedback.clone()
                });
        resolution.record_extraction(&extraction);

        let mut feedback = extraction.feedback.clone();
        if !feedback.has_errors() {
            let arguments = extraction.static_arguments();
            feedback.extend(candidate.resolver.validate_schema(&arguments));
            if let Some(reason) = candidate.resolver.deprecation(&arguments) {
                feedback
                    .deprecations
                    .push(FeedbackEntry::new(format!("Directive '{}' is deprecated: {reason}", node.name)));
            }
        }
        if feedback.has_errors() {
            rejected.get_or_insert(feedback.errors);
            continue;
        }

        feedback.extend(nested_feedback);
        let directive = BoundDirective {
            node: node.clone(),
            candidate: candidate.clone(),
            definitions,
            extraction,
            nested,
        };
        return Ok((directive, feedback));
    }

    Err(match rejected {
        Some(mut errors) => {
            errors.push(FeedbackEntry::new("This directive can't be processed due to previous errors"));
            errors
        }
        None => vec![FeedbackEntry::new(format!(
            "No DirectiveResolver processes directive with name '{}' and arguments '{}'",
            node.name,
            itertools::join(&node.arguments, ", ")
        ))],
    })
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use field_query::parse_directives;
    use indexmap::IndexMap;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{
        ArgType, ArgumentDefinition, DataLoader, DirectiveResolver, EngineConfig, Entity, EntityId, LoadParams,
        ObligationSet, PipelineContext, Registry, Variables,
    };

    struct NoLoader;

    impl DataLoader for NoLoader {
        fn load(&self, _ids: &[EntityId], _params: &LoadParams) -> IndexMap<EntityId, Option<Entity>> {
            IndexMap::new()
        }
    }

    struct Recording {
        name: &'static str,
        position: PipelinePosition,
        repeatable: bool,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl DirectiveResolver for Recording {
        fn directive_name(&self) -> &str {
            self.name
        }

        fn argument_definitions(&self) -> Vec<ArgumentDefinition> {
            vec![ArgumentDefinition::new("times", ArgType::Int)]
        }

        fn position(&self) -> PipelinePosition {
            self.position
        }

        fn is_repeatable(&self) -> bool {
            self.repeatable
        }

        fn resolve(
            &self,
            _directive: &BoundDirective,
            _fields: &ObligationSet,
            _resolution: &Resolution<'_>,
            _ctx: &mut PipelineContext<'_>,
        ) {
            self.log.lock().unwrap().push(self.name.to_owned());
        }
    }

    fn registry(log: &Arc<Mutex<Vec<String>>>) -> Registry {
        let directive = |name, position, repeatable| Recording {
            name,
            position,
            repeatable,
            log: Arc::clone(log),
        };
        Registry::builder()
            .fixed_type("post", NoLoader)
            .directive_resolver("post", 0, directive("a", PipelinePosition::Middle, true))
            .directive_resolver("post", 0, directive("b", PipelinePosition::Front, true))
            .directive_resolver("post", 0, directive("once", PipelinePosition::Back, false))
            .build()
            .unwrap()
    }

    fn messages(entries: &[FeedbackEntry]) -> Vec<(String, &str)> {
        entries
            .iter()
            .map(|entry| (entry.path.join("."), entry.message.as_str()))
            .collect()
    }

    #[test]
    fn stages_are_ordered_by_position_then_query_order() {
        let log = Arc::default();
        let registry = registry(&log);
        let config = EngineConfig::default();
        let variables = Variables::default();
        let resolution = Resolution::new(&registry, &config, &variables);

        let pipeline = build(&resolution, "post", &parse_directives("<a, b>").unwrap());

        assert_eq!(pipeline.stage_names(), vec!["b", "validate", "a", "resolveValueAndMerge"]);
        assert!(pipeline.feedback().is_empty());
        assert!(pipeline.failures().is_empty());
    }

    #[test]
    fn repeated_non_repeatable_directive_is_reported_once_per_extra_execution() {
        let log = Arc::default();
        let registry = registry(&log);
        let config = EngineConfig::default();
        let variables = Variables::default();
        let resolution = Resolution::new(&registry, &config, &variables);

        let pipeline = build(&resolution, "post", &parse_directives("<once, a, once(times: 2)>").unwrap());

        assert_eq!(pipeline.stage_names(), vec!["validate", "a", "resolveValueAndMerge", "once"]);
        assert_eq!(
            messages(&pipeline.feedback().errors),
            vec![(
                "once".to_owned(),
                "Directive 'once' can be executed only once within a field, so the current execution (number 2) has been ignored"
            )]
        );
    }

    #[test]
    fn unknown_and_invalid_directives_fail() {
        let log = Arc::default();
        let registry = registry(&log);
        let config = EngineConfig::default();
        let variables = Variables::default();
        let resolution = Resolution::new(&registry, &config, &variables);

        let pipeline = build(&resolution, "post", &parse_directives("<nope, a<missing>>").unwrap());

        assert_eq!(pipeline.stage_names(), vec!["validate", "resolveValueAndMerge"]);
        assert_eq!(
            messages(pipeline.failures()),
            vec![
                ("nope".to_owned(), "No DirectiveResolver resolves directive with name 'nope'"),
                (
                    "a.missing".to_owned(),
                    "No DirectiveResolver resolves directive with name 'missing'"
                ),
                (
                    "a".to_owned(),
                    "This directive can't be processed due to errors from its nested directives"
                ),
            ]
        );
    }

    #[test]
    fn pipelines_are_cached_per_annotation_and_type() {
        let log = Arc::default();
        let registry = registry(&log);
        let config = EngineConfig::default();
        let variables = Variables::default();
        let resolution = Resolution::new(&registry, &config, &variables);
        let directives = parse_directives("<b(times: 1)>").unwrap();

        let first = resolution.directive_pipeline("post", &directives);
        let second = resolution.directive_pipeline("post", &directives);

        assert!(std::rc::Rc::ptr_eq(&first, &second));
        assert_eq!(first.stages()[0].static_arguments()["times"], serde_json::json!(1));
    }
}
