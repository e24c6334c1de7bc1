use std::{collections::HashMap, fmt, sync::Arc};

use indexmap::IndexMap;

use crate::{
    directives, resolver::CoreFieldResolver, DataLoader, DirectiveResolver, EntityId, EntityRef, FieldResolver,
    RegistryError, ResolvedArguments,
};

/// Scope every entity type falls back to.
pub const GLOBAL_SCOPE: &str = "*";

/// Classifies an id of a convertible type into one of its possible types.
pub type Classifier = Arc<dyn Fn(&EntityId) -> Option<String> + Send + Sync>;

/// A concrete entity type: its loader and the scopes its resolvers are looked up in, most
/// specific first.
pub struct TypeResolver {
    name: String,
    chain: Vec<String>,
    loader: Arc<dyn DataLoader>,
}

impl TypeResolver {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn chain(&self) -> &[String] {
        &self.chain
    }

    pub fn loader(&self) -> &dyn DataLoader {
        self.loader.as_ref()
    }
}

impl fmt::Debug for TypeResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeResolver")
            .field("name", &self.name)
            .field("chain", &self.chain)
            .finish_non_exhaustive()
    }
}

#[derive(Clone)]
pub enum EntityTypeKind {
    Fixed(Arc<TypeResolver>),
    Convertible {
        possible_types: Vec<Arc<TypeResolver>>,
        classify: Classifier,
    },
}

impl EntityTypeKind {
    pub fn is_convertible(&self) -> bool {
        matches!(self, EntityTypeKind::Convertible { .. })
    }
}

impl fmt::Debug for EntityTypeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityTypeKind::Fixed(resolver) => f.debug_tuple("Fixed").field(&resolver.name).finish(),
            EntityTypeKind::Convertible { possible_types, .. } => f
                .debug_struct("Convertible")
                .field(
                    "possible_types",
                    &possible_types.iter().map(|ty| ty.name.as_str()).collect::<Vec<_>>(),
                )
                .finish_non_exhaustive(),
        }
    }
}

/// A registered resolver. `owner` identifies it within its kind and keys the argument caches.
pub struct Candidate<R: ?Sized> {
    pub owner: usize,
    pub priority: i32,
    pub resolver: Arc<R>,
}

impl<R: ?Sized> Clone for Candidate<R> {
    fn clone(&self) -> Self {
        Candidate {
            owner: self.owner,
            priority: self.priority,
            resolver: Arc::clone(&self.resolver),
        }
    }
}

pub type FieldCandidate = Candidate<dyn FieldResolver>;
pub type DirectiveCandidate = Candidate<dyn DirectiveResolver>;

struct Registration<R: ?Sized> {
    scope: String,
    candidate: Candidate<R>,
}

enum TypeDefinition {
    Fixed {
        chain: Vec<String>,
        loader: Arc<dyn DataLoader>,
    },
    Convertible {
        possible_types: Vec<String>,
        classify: Classifier,
    },
}

/// Collects entity types and resolvers, then flattens them into a [`Registry`].
pub struct RegistryBuilder {
    types: Vec<(String, TypeDefinition)>,
    field_resolvers: Vec<Registration<dyn FieldResolver>>,
    directive_resolvers: Vec<Registration<dyn DirectiveResolver>>,
}

impl Default for RegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RegistryBuilder {
    /// A builder with the core field resolver and the built-in directives registered globally.
    pub fn new() -> Self {
        let builder = RegistryBuilder {
            types: Vec::new(),
            field_resolvers: Vec::new(),
            directive_resolvers: Vec::new(),
        };
        directives::builtins()
            .into_iter()
            .fold(
                builder.field_resolver(GLOBAL_SCOPE, i32::MIN, CoreFieldResolver),
                |builder, directive| builder.register_directive(GLOBAL_SCOPE.to_owned(), 0, directive),
            )
    }

    #[must_use]
    pub fn fixed_type(self, name: &str, loader: impl DataLoader + 'static) -> Self {
        self.fixed_type_with_chain(name, std::iter::empty::<&str>(), loader)
    }

    /// A fixed type whose resolvers are also looked up in `specializations`, in order, before
    /// the global scope.
    #[must_use]
    pub fn fixed_type_with_chain<'a>(
        mut self,
        name: &str,
        specializations: impl IntoIterator<Item = &'a str>,
        loader: impl DataLoader + 'static,
    ) -> Self {
        let chain = std::iter::once(name.to_owned())
            .chain(specializations.into_iter().map(str::to_owned))
            .chain(std::iter::once(GLOBAL_SCOPE.to_owned()))
            .collect();
        self.types.push((
            name.to_owned(),
            TypeDefinition::Fixed {
                chain,
                loader: Arc::new(loader),
            },
        ));
        self
    }

    #[must_use]
    pub fn convertible_type<F>(mut self, name: &str, possible_types: &[&str], classify: F) -> Self
    where
        F: Fn(&EntityId) -> Option<String> + Send + Sync + 'static,
    {
        self.types.push((
            name.to_owned(),
            TypeDefinition::Convertible {
                possible_types: possible_types.iter().map(|ty| (*ty).to_owned()).collect(),
                classify: Arc::new(classify),
            },
        ));
        self
    }

    #[must_use]
    pub fn field_resolver(mut self, scope: &str, priority: i32, resolver: impl FieldResolver + 'static) -> Self {
        let owner = self.field_resolvers.len();
        self.field_resolvers.push(Registration {
            scope: scope.to_owned(),
            candidate: Candidate {
                owner,
                priority,
                resolver: Arc::new(resolver),
            },
        });
        self
    }

    #[must_use]
    pub fn directive_resolver(self, scope: &str, priority: i32, resolver: impl DirectiveResolver + 'static) -> Self {
        self.register_directive(scope.to_owned(), priority, Arc::new(resolver))
    }

    fn register_directive(mut self, scope: String, priority: i32, resolver: Arc<dyn DirectiveResolver>) -> Self {
        let owner = self.directive_resolvers.len();
        self.directive_resolvers.push(Registration {
            scope,
            candidate: Candidate {
                owner,
                priority,
                resolver,
            },
        });
        self
    }

    pub fn build(self) -> Result<Registry, RegistryError> {
        let mut fixed = IndexMap::<String, Arc<TypeResolver>>::new();
        let mut convertible = Vec::new();
        for (name, definition) in self.types {
            if fixed.contains_key(&name) || convertible.iter().any(|(other, _, _)| other == &name) {
                return Err(RegistryError::DuplicateType(name));
            }
            match definition {
                TypeDefinition::Fixed { chain, loader } => {
                    let resolver = TypeResolver {
                        name: name.clone(),
                        chain,
                        loader,
                    };
                    fixed.insert(name, Arc::new(resolver));
                }
                TypeDefinition::Convertible {
                    possible_types,
                    classify,
                } => convertible.push((name, possible_types, classify)),
            }
        }

        let known_scope = |scope: &str| scope == GLOBAL_SCOPE || fixed.values().any(|ty| ty.chain.iter().any(|s| s == scope));
        let scopes = self
            .field_resolvers
            .iter()
            .map(|registration| &registration.scope)
            .chain(self.directive_resolvers.iter().map(|registration| &registration.scope));
        for scope in scopes {
            if !known_scope(scope) {
                return Err(RegistryError::UnknownScope(scope.clone()));
            }
        }

        let mut types = IndexMap::new();
        let mut fields = HashMap::new();
        let mut directives = HashMap::new();
        for (name, ty) in &fixed {
            fields.insert(
                name.clone(),
                flatten(&ty.chain, &self.field_resolvers, |resolver| {
                    resolver.field_names().into_iter().map(str::to_owned).collect()
                }),
            );
            directives.insert(
                name.clone(),
                flatten(&ty.chain, &self.directive_resolvers, |resolver| {
                    vec![resolver.directive_name().to_owned()]
                }),
            );
            types.insert(name.clone(), EntityTypeKind::Fixed(Arc::clone(ty)));
        }

        for (name, possible_types, classify) in convertible {
            if possible_types.is_empty() {
                return Err(RegistryError::EmptyConvertible(name));
            }
            let possible_types: Vec<_> = possible_types
                .into_iter()
                .map(|possible| match fixed.get(&possible) {
                    Some(ty) => Ok(Arc::clone(ty)),
                    None => Err(RegistryError::UnknownPossibleType {
                        convertible: name.clone(),
                        possible,
                    }),
                })
                .collect::<Result<_, _>>()?;
            types.insert(
                name,
                EntityTypeKind::Convertible {
                    possible_types,
                    classify,
                },
            );
        }

        Ok(Registry {
            types,
            fields,
            directives,
        })
    }
}

/// Walks the chain from the most specific scope to the most general one. Within a scope,
/// candidates are ordered by descending priority, the most recently registered first.
fn flatten<R: ?Sized>(
    chain: &[String],
    registrations: &[Registration<R>],
    names: impl Fn(&R) -> Vec<String>,
) -> IndexMap<String, Vec<Candidate<R>>> {
    let mut flattened = IndexMap::<String, Vec<Candidate<R>>>::new();
    for scope in chain {
        let mut level: Vec<_> = registrations
            .iter()
            .filter(|registration| &registration.scope == scope)
            .map(|registration| &registration.candidate)
            .collect();
        level.sort_by(|a, b| b.priority.cmp(&a.priority).then(b.owner.cmp(&a.owner)));
        for candidate in level {
            for name in names(candidate.resolver.as_ref()) {
                flattened.entry(name).or_default().push(candidate.clone());
            }
        }
    }
    flattened
}

/// Entity types and resolver candidates, precomputed per (type, name).
pub struct Registry {
    types: IndexMap<String, EntityTypeKind>,
    fields: HashMap<String, IndexMap<String, Vec<FieldCandidate>>>,
    directives: HashMap<String, IndexMap<String, Vec<DirectiveCandidate>>>,
}

impl Registry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    pub fn entity_type(&self, name: &str) -> Option<&EntityTypeKind> {
        self.types.get(name)
    }

    pub fn type_resolver(&self, name: &str) -> Option<&Arc<TypeResolver>> {
        match self.types.get(name)? {
            EntityTypeKind::Fixed(resolver) => Some(resolver),
            EntityTypeKind::Convertible { .. } => None,
        }
    }

    pub fn field_candidates(&self, type_name: &str, field_name: &str) -> &[FieldCandidate] {
        self.fields
            .get(type_name)
            .and_then(|fields| fields.get(field_name))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn directive_candidates(&self, type_name: &str, directive_name: &str) -> &[DirectiveCandidate] {
        self.directives
            .get(type_name)
            .and_then(|directives| directives.get(directive_name))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Schema-time selection: the first candidate accepting the statically known arguments.
    pub fn select_field_resolver(
        &self,
        type_name: &str,
        field: &field_query::FieldNode,
        arguments: &ResolvedArguments,
    ) -> Option<&FieldCandidate> {
        self.field_candidates(type_name, &field.name)
            .iter()
            .find(|candidate| candidate.resolver.can_process(field, arguments))
    }

    /// Result-time selection: the first candidate accepting the entity.
    pub fn select_field_resolver_for_entity(
        &self,
        field: &field_query::FieldNode,
        entity: &EntityRef<'_>,
    ) -> Option<&FieldCandidate> {
        self.field_candidates(entity.type_name, &field.name)
            .iter()
            .find(|candidate| candidate.resolver.can_process_entity(entity, field))
    }

    /// The concrete type of an id of `type_name`. Composite ids carry their type; other ids of a
    /// convertible type go through its classifier.
    pub fn resolve_concrete(&self, type_name: &str, id: &EntityId) -> Option<(Arc<TypeResolver>, EntityId)> {
        match self.types.get(type_name)? {
            EntityTypeKind::Fixed(resolver) => Some((Arc::clone(resolver), id.clone())),
            EntityTypeKind::Convertible {
                possible_types,
                classify,
            } => {
                let find = |name: &str| possible_types.iter().find(|ty| ty.name == name).cloned();
                if let Some((type_key, raw)) = id.split_composite() {
                    if let Some(ty) = find(type_key) {
                        return Some((ty, raw));
                    }
                }
                let concrete = classify(id)?;
                find(&concrete).map(|ty| (ty, id.clone()))
            }
        }
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry").field("types", &self.types).finish_non_exhaustive()
    }
}
