//! Breadth-first resolution of field queries over typed entities.
//!
//! A query such as `posts(limit: 3).title<upperCase>` is parsed into an [`ObligationTree`]. The
//! [`Engine`] then resolves it one entity type at a time: all the ids queued for a type are loaded
//! in one [`DataLoader`] call, and their fields run through one [`DirectivePipeline`] per directive
//! annotation. Fields are resolved by the [`FieldResolver`]s and directives applied by the
//! [`DirectiveResolver`]s of the [`Registry`], chosen by scope and priority.
//!
//! Problems never abort an execution. They are collected as feedback, keyed by bucket, entity
//! type and entity, next to the resolved data in the [`QueryOutput`].

mod config;
mod database;
pub mod directives;
mod engine;
mod error;
mod feedback;
mod interpreter;
mod obligation;
pub mod pipeline;
mod registry;
mod resolution;
mod resolver;
mod schema;
mod value;
mod variables;

pub use config::{EngineConfig, FailurePolicy, OutputMode};
pub use database::{ConvertibleIdMap, Database, DbData, DbItem, DbItems, PreviousResults};
pub use engine::{DataloadRequest, Engine, QueryOutput};
pub use error::{EngineError, EngineResult, FieldError, RegistryError};
pub use feedback::{FeedbackEntry, FeedbackKind, FeedbackStore, ResultEntries, SchemaEntries, SchemaFeedback};
pub use field_query;
pub use interpreter::{
    ArgumentSchema, Arguments, Expressions, FieldQueryInterpreter, ResolvedArguments, ResultItemExtraction,
    SchemaExtraction, SubjectKind,
};
pub use obligation::{FieldSet, ObligationSet, ObligationTree};
pub use pipeline::{BoundDirective, DirectivePipeline, PipelineContext, PipelinePosition};
pub use registry::{
    Candidate, Classifier, DirectiveCandidate, EntityTypeKind, FieldCandidate, Registry, RegistryBuilder,
    TypeResolver, GLOBAL_SCOPE,
};
pub use resolution::{FieldValidation, Resolution, ResolvedValue};
pub use resolver::{DataLoader, DirectiveResolver, EntityRef, FieldResolver, LoadParams};
pub use schema::{cast, ArgType, ArgumentDefinition, CastError};
pub use value::{is_truthy, Entity, EntityId, Value};
pub use variables::Variables;
