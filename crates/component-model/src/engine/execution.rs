use std::sync::Arc;

use field_query::{DirectiveNode, Field};
use indexmap::IndexMap;
use itertools::Itertools as _;
use serde_json::Value;
use tracing::{debug, trace, warn};

use super::{
    queue::{PendingRelations, RelationBatch, WorkQueue},
    DataloadRequest,
};
use crate::{
    database::{AlreadyLoaded, ConvertibleIdMap, Database, DbItems, PreviousResults},
    pipeline::{PipelineContext, PipelineOutcome},
    registry::TypeResolver,
    value::{ids_in, is_truthy},
    Entity, EngineConfig, EntityId, EntityTypeKind, Expressions, FeedbackEntry, FeedbackKind, FieldSet, LoadParams,
    ObligationSet, ObligationTree, QueryOutput, Registry, Resolution, Variables,
};

/// State of one execution: the queue, the memo of what was already handed to a pipeline, and
/// everything merged so far.
pub(super) struct Execution<'a> {
    registry: &'a Registry,
    config: &'a EngineConfig,
    params: &'a LoadParams,
    resolution: Resolution<'a>,
    queue: WorkQueue,
    pending: PendingRelations,
    memo: AlreadyLoaded,
    database: Database,
    previous: PreviousResults,
    convertible_ids: ConvertibleIdMap,
}

impl<'a> Execution<'a> {
    pub(super) fn new(
        registry: &'a Registry,
        config: &'a EngineConfig,
        variables: &'a Variables,
        params: &'a LoadParams,
    ) -> Self {
        Execution {
            registry,
            config,
            params,
            resolution: Resolution::new(registry, config, variables),
            queue: WorkQueue::default(),
            pending: PendingRelations::default(),
            memo: AlreadyLoaded::default(),
            database: Database::default(),
            previous: PreviousResults::default(),
            convertible_ids: ConvertibleIdMap::new(),
        }
    }

    pub(super) fn run(mut self, request: &DataloadRequest) -> QueryOutput {
        for id in &request.ids {
            let mut fields = FieldSet::with_identity();
            fields.merge(request.tree.fields.clone());
            self.queue.push(&request.type_name, id.clone(), fields);
        }
        if request.tree.has_relations() {
            self.pending.push(
                &request.type_name,
                RelationBatch {
                    ids: request.ids.clone(),
                    tree: request.tree.clone(),
                },
            );
        }

        while let Some((type_name, obligations)) = self.queue.pop() {
            debug!(type_name = type_name.as_str(), ids = obligations.len(), "processing entity type");
            self.process(&type_name, obligations);
            for batch in self.pending.take(&type_name) {
                self.discover(&type_name, batch);
            }
        }

        super::output::build(
            self.config,
            self.database,
            self.resolution.into_feedback(),
            self.convertible_ids,
        )
    }

    fn process(&mut self, type_name: &str, obligations: ObligationSet) {
        let registry = self.registry;
        match registry.entity_type(type_name) {
            Some(EntityTypeKind::Fixed(resolver)) => self.process_concrete(resolver, obligations),
            Some(EntityTypeKind::Convertible { .. }) => {
                let mut groups = IndexMap::<String, (Arc<TypeResolver>, ObligationSet)>::new();
                for (id, fields) in obligations {
                    match registry.resolve_concrete(type_name, &id) {
                        Some((resolver, raw)) => groups
                            .entry(resolver.name().to_owned())
                            .or_insert_with(|| (resolver, ObligationSet::new()))
                            .1
                            .insert(raw, fields),
                        None => self.classification_failed(type_name, &id),
                    }
                }
                for (resolver, obligations) in groups.into_values() {
                    self.process_concrete(&resolver, obligations);
                }
            }
            None => warn!(type_name, "dropping obligations for an unregistered entity type"),
        }
    }

    fn classification_failed(&self, type_name: &str, id: &EntityId) {
        warn!(type_name, %id, "could not classify id of convertible type");
        self.resolution.add_schema_entry(
            FeedbackKind::SchemaError,
            type_name,
            FeedbackEntry::new(format!(
                "Object with ID '{id}' can't be classified into any of the possible types of '{type_name}'"
            )),
        );
    }

    fn process_concrete(&mut self, resolver: &TypeResolver, obligations: ObligationSet) {
        let type_name = resolver.name();
        let obligations: ObligationSet = obligations
            .into_iter()
            .map(|(id, fields)| {
                let unseen = self.unseen(type_name, &id, &fields);
                (id, unseen)
            })
            .filter(|(_, fields)| !fields.is_empty())
            .collect();
        for (id, fields) in obligations.iter() {
            self.memo.record(type_name, id, fields);
        }
        if obligations.is_empty() {
            trace!(type_name, "nothing left to load");
            return;
        }

        let ids: Vec<EntityId> = obligations.keys().cloned().collect();
        let entities: IndexMap<EntityId, Entity> = resolver
            .loader()
            .load(&ids, self.params)
            .into_iter()
            .filter_map(|(id, entity)| Some((id, entity?)))
            .collect();
        trace!(type_name, requested = ids.len(), loaded = entities.len(), "loaded entities");

        let mut expressions = Expressions::new();
        let mut pending = obligations;
        loop {
            let promoted = self.run_groups(type_name, pending, &entities, &mut expressions);
            let promoted: ObligationSet = promoted
                .into_iter()
                .map(|(id, fields)| {
                    let unseen = self.unseen(type_name, &id, &fields);
                    (id, unseen)
                })
                .filter(|(_, fields)| !fields.is_empty())
                .collect();
            if promoted.is_empty() {
                break;
            }
            debug!(type_name, ids = promoted.len(), "resolving promoted conditional fields");
            for (id, fields) in promoted.iter() {
                self.memo.record(type_name, id, fields);
            }
            pending = promoted;
        }
    }

    /// The part of `fields` never handed to a pipeline for the entity. Gates already handed over
    /// are answered by their resolved value.
    fn unseen(&self, type_name: &str, id: &EntityId, fields: &FieldSet) -> FieldSet {
        let gate_value = |gate: &Field| self.previous.get(type_name, id, &gate.output_key()).map(is_truthy);
        fields.unseen(self.memo.seen(type_name, id), &gate_value)
    }

    /// Runs one pipeline per directive annotation. Returns the promoted conditional fields.
    fn run_groups(
        &mut self,
        type_name: &str,
        obligations: ObligationSet,
        entities: &IndexMap<EntityId, Entity>,
        expressions: &mut Expressions,
    ) -> ObligationSet {
        let mut promoted = ObligationSet::new();
        for (directives, group) in group_by_annotation(obligations).into_values() {
            let pipeline = self.resolution.directive_pipeline(type_name, &directives);
            let mut ctx = PipelineContext::new(
                type_name,
                self.config.failure_policy,
                group,
                entities,
                &self.previous,
                &self.convertible_ids,
                self.resolution.variables(),
            )
            .with_expressions(std::mem::take(expressions));

            let fields = ctx.obligations.distinct_fields();
            for field in &fields {
                self.resolution.record_field_name(type_name, field);
                let key = field.output_key();
                for (kind, entry) in pipeline.feedback().clone().entries() {
                    let entry = entry.prefixed(key.as_str());
                    match kind {
                        FeedbackKind::SchemaError => ctx.add_schema_error(entry),
                        FeedbackKind::SchemaWarning => ctx.add_schema_warning(entry),
                        _ => ctx.add_schema_deprecation(entry),
                    }
                }
            }
            if !pipeline.failures().is_empty() {
                let pairs: Vec<(EntityId, Field)> = fields
                    .iter()
                    .flat_map(|field| ctx.obligations.pairs_for(field))
                    .collect();
                ctx.process_failure(pipeline.failures(), &pairs);
            }

            let outcome = pipeline.execute(&self.resolution, ctx).finish();
            *expressions = self.merge(type_name, outcome, &mut promoted);
        }
        promoted
    }

    /// Publishes a batch's output and feedback. Returns the expression context for the next
    /// batch of the same entities.
    fn merge(&mut self, type_name: &str, outcome: PipelineOutcome, promoted: &mut ObligationSet) -> Expressions {
        let PipelineOutcome {
            output,
            expressions,
            promoted: batch_promoted,
            schema_feedback,
            result_feedback,
        } = outcome;
        self.merge_output(type_name, output);
        for (kind, entry) in schema_feedback {
            self.resolution.add_schema_entry(kind, type_name, entry);
        }
        for (kind, id, entry) in result_feedback {
            self.resolution.add_result_entry(kind, type_name, &id, entry);
        }
        promoted.merge(batch_promoted);
        expressions
    }

    fn merge_output(&mut self, type_name: &str, output: DbItems) {
        for (id, items) in output {
            for (key, value) in items {
                let bucket = self.resolution.bucket_for(type_name, &key);
                let value = Arc::new(value);
                self.database.insert(bucket, type_name, &id, &key, Arc::clone(&value));
                self.previous.publish(type_name, &id, &key, value);
            }
        }
    }

    /// Follows the relationships of `batch` from the entities just resolved, enqueueing the
    /// fields of their targets that were never handed to a pipeline.
    fn discover(&mut self, queued_as: &str, batch: RelationBatch) {
        let registry = self.registry;
        for id in batch.ids.iter().unique() {
            let Some((source, raw)) = registry.resolve_concrete(queued_as, id) else {
                continue;
            };
            for (field, tree) in &batch.tree.relations {
                let key = field.output_key();
                let Some(target) = self.resolution.relation_target(source.name(), field) else {
                    self.resolution.add_schema_entry(
                        FeedbackKind::SchemaError,
                        source.name(),
                        FeedbackEntry::new(format!(
                            "Field '{}' is not a relationship, so its sub-fields cannot be resolved",
                            field.name
                        ))
                        .with_path([key]),
                    );
                    continue;
                };
                let Some(value) = self.previous.get(source.name(), &raw, &key) else {
                    trace!(type_name = source.name(), id = %raw, relation = %key, "relation has no value");
                    continue;
                };
                let is_list = value.is_array();
                let targets = ids_in(value);

                let enqueued = match registry.entity_type(&target) {
                    Some(EntityTypeKind::Fixed(_)) => {
                        let count = targets.len();
                        for target_id in targets {
                            self.enqueue(&target, &target, target_id.clone(), target_id, tree);
                        }
                        count
                    }
                    Some(EntityTypeKind::Convertible { .. }) => {
                        let mut composites = Vec::new();
                        for target_id in targets {
                            let Some((concrete, target_raw)) = registry.resolve_concrete(&target, &target_id) else {
                                self.classification_failed(&target, &target_id);
                                continue;
                            };
                            let composite = EntityId::composite(concrete.name(), &target_raw);
                            self.enqueue(&target, concrete.name(), composite.clone(), target_raw, tree);
                            composites.push(composite);
                        }
                        let mapped = if is_list {
                            Value::Array(composites.iter().map(EntityId::to_value).collect())
                        } else {
                            composites.first().map_or(Value::Null, EntityId::to_value)
                        };
                        self.convertible_ids
                            .entry(self.resolution.bucket_for(source.name(), &key).to_owned())
                            .or_default()
                            .entry(source.name().to_owned())
                            .or_default()
                            .entry(raw.clone())
                            .or_default()
                            .insert(key.clone(), mapped);
                        composites.len()
                    }
                    None => {
                        self.resolution.add_schema_entry(
                            FeedbackKind::SchemaError,
                            source.name(),
                            FeedbackEntry::new(format!(
                                "Field '{}' points to entity type '{target}', which is not registered",
                                field.name
                            ))
                            .with_path([key]),
                        );
                        continue;
                    }
                };
                debug!(
                    type_name = source.name(),
                    relation = %key,
                    target = %target,
                    ids = enqueued,
                    "enqueued relationship"
                );
            }
        }
    }

    /// Queues `id` under `queued_as`, with the fields of `tree` not yet seen for the entity it
    /// designates, and remembers to follow `tree`'s own relationships from it.
    fn enqueue(&mut self, queued_as: &str, concrete: &str, id: EntityId, raw: EntityId, tree: &ObligationTree) {
        let mut fields = FieldSet::with_identity();
        fields.merge(tree.fields.clone());
        let unseen = self.unseen(concrete, &raw, &fields);
        // Queued even when nothing is unseen, so the relationships below it are still followed.
        self.queue.push(queued_as, id.clone(), unseen);
        if tree.has_relations() {
            self.pending.push(
                queued_as,
                RelationBatch {
                    ids: vec![id],
                    tree: tree.clone(),
                },
            );
        }
    }
}

/// Splits obligations by directive annotation, in first-seen order. Conditional fields follow
/// their gate.
fn group_by_annotation(obligations: ObligationSet) -> IndexMap<String, (Vec<DirectiveNode>, ObligationSet)> {
    let mut groups = IndexMap::<String, (Vec<DirectiveNode>, ObligationSet)>::new();
    for (id, fields) in obligations {
        for field in fields.direct {
            groups
                .entry(field.directives_key())
                .or_insert_with(|| (field.directives.clone(), ObligationSet::new()))
                .1
                .entry(id.clone())
                .insert(field);
        }
        for (gate, nested) in fields.conditional {
            groups
                .entry(gate.directives_key())
                .or_insert_with(|| (gate.directives.clone(), ObligationSet::new()))
                .1
                .entry(id.clone())
                .insert_conditional(gate, nested);
        }
    }
    groups
}

#[cfg(test)]
mod tests {
    use field_query::Field;

    use super::*;

    #[test]
    fn fields_group_by_annotation() {
        let mut fields = FieldSet::with_identity();
        fields.insert(Field::parse("title<upperCase>").unwrap());
        fields.insert(Field::parse("excerpt").unwrap());
        let mut nested = FieldSet::default();
        nested.insert(Field::parse("content").unwrap());
        fields.insert_conditional(Field::parse("isPublished<upperCase>").unwrap(), nested);
        let obligations: ObligationSet = [(EntityId::from(1u64), fields)].into_iter().collect();

        let groups = group_by_annotation(obligations);

        assert_eq!(groups.keys().collect::<Vec<_>>(), vec!["", "<upperCase>"]);
        let (directives, upper) = &groups["<upperCase>"];
        assert_eq!(directives.len(), 1);
        let upper = &upper[&EntityId::from(1u64)];
        assert_eq!(upper.direct.len(), 1);
        assert_eq!(upper.conditional.len(), 1);
        assert_eq!(groups[""].1[&EntityId::from(1u64)].direct.len(), 2);
    }
}
