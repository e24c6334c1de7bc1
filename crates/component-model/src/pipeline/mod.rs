//! Directive pipelines: every field runs through `validate`, its own directives and
//! `resolveValueAndMerge`, ordered by position.

mod builder;
mod context;

use std::rc::Rc;

use field_query::{DirectiveNode, InputValue};

pub(crate) use builder::build;
pub(crate) use context::PipelineOutcome;
pub use context::PipelineContext;

use crate::{
    interpreter::{ArgumentSchema, SubjectKind},
    registry::DirectiveCandidate,
    ArgumentDefinition, FeedbackEntry, ObligationSet, Resolution, ResolvedArguments, SchemaExtraction,
    SchemaFeedback,
};

/// Where a directive runs within a pipeline. Stages keep their query order within a position.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, strum_macros::Display, strum_macros::AsRefStr,
)]
#[strum(serialize_all = "lowercase")]
pub enum PipelinePosition {
    Front,
    Middle,
    Back,
}

/// A directive bound to the resolver that runs it.
pub struct BoundDirective {
    pub node: DirectiveNode,
    pub candidate: DirectiveCandidate,
    pub definitions: Vec<ArgumentDefinition>,
    pub extraction: Rc<SchemaExtraction>,
    /// Nested directives, bound and in query order.
    pub nested: Vec<BoundDirective>,
}

impl BoundDirective {
    pub fn name(&self) -> &str {
        &self.node.name
    }

    pub fn position(&self) -> PipelinePosition {
        self.candidate.resolver.position()
    }

    /// The arguments known at schema time.
    pub fn static_arguments(&self) -> ResolvedArguments {
        self.extraction.static_arguments()
    }

    pub fn argument(&self, name: &str) -> Option<&InputValue> {
        self.extraction.arguments.get(name)
    }

    pub(crate) fn schema<'a>(&'a self, type_name: &'a str) -> ArgumentSchema<'a> {
        ArgumentSchema {
            type_name,
            kind: SubjectKind::Directive,
            owner: self.candidate.owner,
            definitions: &self.definitions,
            ordered: true,
        }
    }
}

/// The ordered stages for one directive annotation on one entity type.
pub struct DirectivePipeline {
    stages: Vec<BoundDirective>,
    /// Warnings, deprecations and ignored repetitions, relative to the field.
    feedback: SchemaFeedback,
    /// Directives that could not be bound, handled through the failure policy.
    failures: Vec<FeedbackEntry>,
}

impl DirectivePipeline {
    pub fn stages(&self) -> &[BoundDirective] {
        &self.stages
    }

    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(BoundDirective::name).collect()
    }

    pub fn feedback(&self) -> &SchemaFeedback {
        &self.feedback
    }

    pub fn failures(&self) -> &[FeedbackEntry] {
        &self.failures
    }

    /// Folds the context through every stage.
    pub fn execute<'c>(&self, resolution: &Resolution<'_>, mut ctx: PipelineContext<'c>) -> PipelineContext<'c> {
        let fields = ctx.obligations.clone();
        run_stages(&self.stages, &fields, resolution, &mut ctx);
        ctx
    }
}

/// Runs `stages` in order over `fields`. Each stage sees the pairs of `fields` that earlier
/// stages left in the context, minus the fields the directive doesn't apply to.
pub fn run_stages(
    stages: &[BoundDirective],
    fields: &ObligationSet,
    resolution: &Resolution<'_>,
    ctx: &mut PipelineContext<'_>,
) {
    for stage in stages {
        let mut view = fields.intersect(&ctx.obligations);
        if let Some(supported) = stage.candidate.resolver.field_names_to_apply_to() {
            for field in view.distinct_fields() {
                if supported.contains(&field.name.as_str()) {
                    continue;
                }
                ctx.add_schema_warning(
                    FeedbackEntry::new(format!(
                        "Directive '{}' doesn't support field '{}', so it has been ignored for it",
                        stage.name(),
                        field.name
                    ))
                    .with_path([field.output_key(), stage.name().to_owned()]),
                );
                view.retain_fields(|other| other != &field);
            }
        }
        if view.has_no_fields() {
            continue;
        }
        tracing::trace!(type_name = ctx.type_name, stage = stage.name(), ids = view.len(), "running stage");
        stage.candidate.resolver.resolve(stage, &view, resolution, ctx);
    }
}
