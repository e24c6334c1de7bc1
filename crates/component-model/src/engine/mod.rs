//! Breadth-first resolution of a query over registered entity types.
//!
//! Every entity type gets one pipeline run per directive annotation and dequeue, whatever the
//! number of ids queued for it. Relationships are followed once the entities holding them have
//! been resolved, and each (entity, field) pair is handed to a pipeline at most once.

mod execution;
mod output;
mod queue;

pub use output::QueryOutput;

use tracing::{debug, info_span};

use crate::{
    EngineConfig, EngineError, EngineResult, EntityId, LoadParams, ObligationTree, Registry,
    Variables,
};

/// Entry point of an execution: the ids to start from and the fields to resolve on them.
#[derive(Debug, Clone)]
pub struct DataloadRequest {
    pub type_name: String,
    pub ids: Vec<EntityId>,
    pub tree: ObligationTree,
    /// Passed untouched to every loader.
    pub params: LoadParams,
}

impl DataloadRequest {
    pub const ROOT_TYPE: &'static str = "root";
    pub const ROOT_ID: &'static str = "root";

    pub fn new(type_name: impl Into<String>, ids: Vec<EntityId>, tree: ObligationTree) -> Self {
        DataloadRequest {
            type_name: type_name.into(),
            ids,
            tree,
            params: LoadParams::new(),
        }
    }

    /// The query resolved from the single root entity.
    pub fn root(query: &str) -> EngineResult<Self> {
        Ok(Self::new(
            Self::ROOT_TYPE,
            vec![EntityId::from(Self::ROOT_ID)],
            ObligationTree::from_query(query)?,
        ))
    }

    #[must_use]
    pub fn with_params(mut self, params: LoadParams) -> Self {
        self.params = params;
        self
    }
}

pub struct Engine {
    registry: Registry,
    config: EngineConfig,
}

impl Engine {
    pub fn new(registry: Registry, config: EngineConfig) -> Self {
        Engine { registry, config }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Resolves `request`. Only an entry point that can't be started from is an error; any other
    /// problem ends up in the output's feedback.
    pub fn execute(&self, request: &DataloadRequest, variables: &Variables) -> EngineResult<QueryOutput> {
        let span = info_span!("execute", type_name = %request.type_name, ids = request.ids.len());
        let _guard = span.enter();

        if self.registry.entity_type(&request.type_name).is_none() {
            return Err(EngineError::UnknownEntryPoint(request.type_name.clone()));
        }
        if request.ids.is_empty() {
            return Err(EngineError::EmptyEntryPoint(request.type_name.clone()));
        }

        let output = execution::Execution::new(&self.registry, &self.config, variables, &request.params).run(request);

        for (kind, count) in output.feedback_counts() {
            if count > 0 {
                debug!(%kind, count, "feedback");
            }
        }
        Ok(output)
    }
}
