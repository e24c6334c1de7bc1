use indexmap::IndexMap;

use crate::{EntityId, FieldSet, ObligationSet, ObligationTree};

/// Pending obligations, one entry per entity type, served first in first out. Obligations for
/// a type already queued merge into its entry.
#[derive(Debug, Default)]
pub(super) struct WorkQueue {
    entries: IndexMap<String, ObligationSet>,
}

impl WorkQueue {
    pub(super) fn push(&mut self, type_name: &str, id: EntityId, fields: FieldSet) {
        self.entries.entry(type_name.to_owned()).or_default().insert(id, fields);
    }

    pub(super) fn pop(&mut self) -> Option<(String, ObligationSet)> {
        self.entries.shift_remove_index(0)
    }
}

/// Relationships to follow once the entities of `ids` have been resolved.
#[derive(Debug, Clone)]
pub(super) struct RelationBatch {
    pub ids: Vec<EntityId>,
    pub tree: ObligationTree,
}

/// Relation batches keyed by the queue entry they wait for.
#[derive(Debug, Default)]
pub(super) struct PendingRelations {
    batches: IndexMap<String, Vec<RelationBatch>>,
}

impl PendingRelations {
    pub(super) fn push(&mut self, type_name: &str, batch: RelationBatch) {
        self.batches.entry(type_name.to_owned()).or_default().push(batch);
    }

    pub(super) fn take(&mut self, type_name: &str) -> Vec<RelationBatch> {
        self.batches.shift_remove(type_name).unwrap_or_default()
    }
}
