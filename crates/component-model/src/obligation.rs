use std::ops::Deref;

use field_query::{Field, FieldNode, ParseResult};
use indexmap::{IndexMap, IndexSet};

use crate::EntityId;

/// Fields requested for one entity. Conditional fields only become direct once their gate
/// resolved to a truthy value for that entity.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldSet {
    pub direct: IndexSet<Field>,
    pub conditional: IndexMap<Field, FieldSet>,
}

impl FieldSet {
    pub fn with_identity() -> Self {
        let mut fields = FieldSet::default();
        fields.insert(Field::identity());
        fields
    }

    pub fn insert(&mut self, field: Field) -> bool {
        self.direct.insert(field)
    }

    pub fn insert_conditional(&mut self, gate: Field, nested: FieldSet) {
        self.conditional.entry(gate).or_default().merge(nested);
    }

    pub fn merge(&mut self, other: FieldSet) {
        self.direct.extend(other.direct);
        for (gate, nested) in other.conditional {
            self.insert_conditional(gate, nested);
        }
    }

    /// Removes a direct field or a gate, along with everything it gates.
    pub fn remove(&mut self, field: &Field) -> bool {
        let direct = self.direct.shift_remove(field);
        let gate = self.conditional.shift_remove(field).is_some();
        direct || gate
    }

    pub fn contains(&self, field: &Field) -> bool {
        self.direct.contains(field) || self.conditional.contains_key(field)
    }

    pub fn is_empty(&self) -> bool {
        self.direct.is_empty() && self.conditional.is_empty()
    }

    /// Direct fields, then gates.
    pub fn fields(&self) -> impl Iterator<Item = &Field> {
        self.direct.iter().chain(self.conditional.keys())
    }

    pub fn retain(&mut self, mut keep: impl FnMut(&Field) -> bool) {
        self.direct.retain(|field| keep(field));
        self.conditional.retain(|gate, _| keep(gate));
    }

    /// The fields and gates not in `seen`. A gate in `seen` is answered by `gate_value`: its
    /// unseen nested fields become direct when it held a truthy value, are dropped when it held
    /// a falsy one, and stay behind the gate when it holds no value.
    #[must_use]
    pub fn unseen(&self, seen: Option<&IndexSet<Field>>, gate_value: &dyn Fn(&Field) -> Option<bool>) -> FieldSet {
        let Some(seen) = seen else {
            return self.clone();
        };
        let mut unseen = FieldSet {
            direct: self.direct.iter().filter(|field| !seen.contains(*field)).cloned().collect(),
            conditional: IndexMap::new(),
        };
        for (gate, nested) in &self.conditional {
            let nested = nested.unseen(Some(seen), gate_value);
            if !seen.contains(gate) {
                unseen.insert_conditional(gate.clone(), nested);
                continue;
            }
            if nested.is_empty() {
                continue;
            }
            match gate_value(gate) {
                Some(true) => unseen.merge(nested),
                Some(false) => {}
                None => unseen.insert_conditional(gate.clone(), nested),
            }
        }
        unseen
    }
}

/// Per entity id of one type, the fields still to resolve.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObligationSet(IndexMap<EntityId, FieldSet>);

impl ObligationSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: EntityId, fields: FieldSet) {
        self.0.entry(id).or_default().merge(fields);
    }

    pub fn entry(&mut self, id: EntityId) -> &mut FieldSet {
        self.0.entry(id).or_default()
    }

    pub fn get_mut(&mut self, id: &EntityId) -> Option<&mut FieldSet> {
        self.0.get_mut(id)
    }

    pub fn merge(&mut self, other: ObligationSet) {
        for (id, fields) in other.0 {
            self.insert(id, fields);
        }
    }

    pub fn remove(&mut self, id: &EntityId, field: &Field) -> bool {
        self.0.get_mut(id).is_some_and(|fields| fields.remove(field))
    }

    /// Whether no field is requested for any id.
    pub fn has_no_fields(&self) -> bool {
        self.0.values().all(FieldSet::is_empty)
    }

    /// Every requested field and gate, each once, in first-seen order.
    pub fn distinct_fields(&self) -> IndexSet<Field> {
        self.0.values().flat_map(|fields| fields.fields().cloned()).collect()
    }

    /// The (id, field) pairs where `field` is requested.
    pub fn pairs_for(&self, field: &Field) -> Vec<(EntityId, Field)> {
        self.0
            .iter()
            .filter(|(_, fields)| fields.contains(field))
            .map(|(id, _)| (id.clone(), field.clone()))
            .collect()
    }

    /// This set restricted to the pairs still present in `remaining`.
    #[must_use]
    pub fn intersect(&self, remaining: &ObligationSet) -> ObligationSet {
        let mut view = ObligationSet::new();
        for (id, fields) in &self.0 {
            let Some(present) = remaining.0.get(id) else {
                continue;
            };
            let mut fields = fields.clone();
            fields.retain(|field| present.contains(field));
            if !fields.is_empty() {
                view.0.insert(id.clone(), fields);
            }
        }
        view
    }

    #[must_use]
    pub fn filter_ids(&self, mut keep: impl FnMut(&EntityId) -> bool) -> ObligationSet {
        ObligationSet(
            self.0
                .iter()
                .filter(|(id, _)| keep(id))
                .map(|(id, fields)| (id.clone(), fields.clone()))
                .collect(),
        )
    }

    pub fn retain_fields(&mut self, mut keep: impl FnMut(&Field) -> bool) {
        for fields in self.0.values_mut() {
            fields.retain(&mut keep);
        }
    }
}

impl Deref for ObligationSet {
    type Target = IndexMap<EntityId, FieldSet>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl IntoIterator for ObligationSet {
    type Item = (EntityId, FieldSet);
    type IntoIter = indexmap::map::IntoIter<EntityId, FieldSet>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl FromIterator<(EntityId, FieldSet)> for ObligationSet {
    fn from_iter<T: IntoIterator<Item = (EntityId, FieldSet)>>(iter: T) -> Self {
        let mut set = ObligationSet::new();
        for (id, fields) in iter {
            set.insert(id, fields);
        }
        set
    }
}

/// The fields a request wants from its root entities, and through relationships from the
/// entities they point to.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObligationTree {
    pub fields: FieldSet,
    pub relations: IndexMap<Field, ObligationTree>,
}

impl ObligationTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a tree from query paths, `posts(limit: 3).title|author.name, me.name`.
    pub fn from_query(query: &str) -> ParseResult<Self> {
        let mut tree = ObligationTree::new();
        for path in field_query::parse_query(query)? {
            tree.add_path(&path.groups);
        }
        Ok(tree)
    }

    fn add_path(&mut self, groups: &[Vec<FieldNode>]) {
        let Some((group, rest)) = groups.split_first() else {
            return;
        };
        for node in group {
            let field = Field::new(node.clone());
            self.fields.insert(field.clone());
            if !rest.is_empty() {
                self.relations.entry(field).or_default().add_path(rest);
            }
        }
    }

    #[must_use]
    pub fn field(mut self, field: Field) -> Self {
        self.fields.insert(field);
        self
    }

    #[must_use]
    pub fn conditional(mut self, gate: Field, nested: FieldSet) -> Self {
        self.fields.insert_conditional(gate, nested);
        self
    }

    /// Adds a relationship field, whose targets are resolved against `tree`.
    #[must_use]
    pub fn relation(mut self, field: Field, tree: ObligationTree) -> Self {
        self.fields.insert(field.clone());
        self.relations.entry(field).or_default().merge(tree);
        self
    }

    pub fn merge(&mut self, other: ObligationTree) {
        self.fields.merge(other.fields);
        for (field, tree) in other.relations {
            self.relations.entry(field).or_default().merge(tree);
        }
    }

    pub fn has_relations(&self) -> bool {
        !self.relations.is_empty()
    }
}
