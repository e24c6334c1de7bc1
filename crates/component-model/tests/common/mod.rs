//! An in-memory blog: a `root` entry point, posts, users, comments, a page and the `customPost`
//! convertible type over posts and pages.

#![allow(dead_code)]

use std::sync::{Arc, Mutex, Once};

use component_model::{
    field_query::{Field, FieldNode},
    ArgType, ArgumentDefinition, BoundDirective, DataLoader, DataloadRequest, DirectiveResolver, Engine,
    EngineConfig, Entity, EntityId, EntityRef, FieldError, FieldResolver, FieldSet, LoadParams, ObligationSet,
    ObligationTree, PipelineContext, PipelinePosition, QueryOutput, RegistryBuilder, Resolution, ResolvedArguments,
    Value, Variables, GLOBAL_SCOPE,
};
use indexmap::IndexMap;
use serde_json::json;

pub fn init_tracing() {
    static TRACING: Once = Once::new();
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

pub fn field(input: &str) -> Field {
    Field::parse(input).unwrap()
}

pub fn fields<'a>(inputs: impl IntoIterator<Item = &'a str>) -> FieldSet {
    let mut set = FieldSet::default();
    for input in inputs {
        set.insert(field(input));
    }
    set
}

/// Every loader call and every field resolution, in order.
#[derive(Debug, Default)]
pub struct Calls {
    loads: Mutex<Vec<(String, Vec<String>)>>,
    resolutions: Mutex<Vec<(String, String, String)>>,
}

impl Calls {
    fn load(&self, type_name: &str, ids: &[EntityId]) {
        let ids = ids.iter().map(ToString::to_string).collect();
        self.loads.lock().unwrap().push((type_name.to_owned(), ids));
    }

    fn resolve(&self, entity: &EntityRef<'_>, field_name: &str) {
        self.resolutions.lock().unwrap().push((
            entity.type_name.to_owned(),
            entity.id.to_string(),
            field_name.to_owned(),
        ));
    }

    pub fn loads(&self, type_name: &str) -> Vec<Vec<String>> {
        self.loads
            .lock()
            .unwrap()
            .iter()
            .filter(|(loaded, _)| loaded == type_name)
            .map(|(_, ids)| ids.clone())
            .collect()
    }

    pub fn resolutions(&self, type_name: &str, id: &str, field_name: &str) -> usize {
        self.resolutions
            .lock()
            .unwrap()
            .iter()
            .filter(|(ty, resolved, name)| ty == type_name && resolved == id && name == field_name)
            .count()
    }

    /// Resolutions of a (type, id, field) triple that happened more than once.
    pub fn repeated_resolutions(&self) -> Vec<(String, String, String)> {
        let mut counts = IndexMap::<(String, String, String), usize>::new();
        for triple in self.resolutions.lock().unwrap().iter() {
            *counts.entry(triple.clone()).or_default() += 1;
        }
        counts
            .into_iter()
            .filter(|(_, count)| *count > 1)
            .map(|(triple, _)| triple)
            .collect()
    }
}

struct MemoryLoader {
    type_name: &'static str,
    entities: IndexMap<EntityId, Entity>,
    calls: Arc<Calls>,
}

impl MemoryLoader {
    fn new(type_name: &'static str, entities: Vec<(&str, Entity)>, calls: &Arc<Calls>) -> Self {
        MemoryLoader {
            type_name,
            entities: entities
                .into_iter()
                .map(|(id, entity)| (EntityId::from(id), entity))
                .collect(),
            calls: Arc::clone(calls),
        }
    }
}

impl DataLoader for MemoryLoader {
    fn load(&self, ids: &[EntityId], _params: &LoadParams) -> IndexMap<EntityId, Option<Entity>> {
        self.calls.load(self.type_name, ids);
        ids.iter()
            .map(|id| (id.clone(), self.entities.get(id).cloned()))
            .collect()
    }
}

/// Fields read straight from the loaded entity, some of them relationships.
struct Properties {
    names: Vec<&'static str>,
    relations: Vec<(&'static str, &'static str)>,
    calls: Arc<Calls>,
}

impl FieldResolver for Properties {
    fn field_names(&self) -> Vec<&str> {
        self.names
            .iter()
            .chain(self.relations.iter().map(|(name, _)| name))
            .copied()
            .collect()
    }

    fn relation_target(&self, _type_name: &str, field: &FieldNode) -> Option<String> {
        self.relations
            .iter()
            .find(|(name, _)| *name == field.name)
            .map(|(_, target)| (*target).to_owned())
    }

    fn resolve(&self, entity: &EntityRef<'_>, field_name: &str, _arguments: &ResolvedArguments) -> Result<Value, FieldError> {
        self.calls.resolve(entity, field_name);
        Ok(entity.get(field_name))
    }
}

/// Entry points of the blog.
struct RootFields;

impl RootFields {
    const POST_IDS: [u64; 4] = [1, 2, 3, 4];
}

impl FieldResolver for RootFields {
    fn field_names(&self) -> Vec<&str> {
        vec!["posts", "post", "featured", "pinned"]
    }

    fn argument_definitions(&self, field_name: &str) -> Vec<ArgumentDefinition> {
        match field_name {
            "posts" => vec![
                ArgumentDefinition::new("limit", ArgType::Int),
                ArgumentDefinition::new("status", ArgType::enumeration(["published", "draft"])),
            ],
            "post" => vec![ArgumentDefinition::new("id", ArgType::Id).mandatory()],
            _ => Vec::new(),
        }
    }

    fn relation_target(&self, _type_name: &str, field: &FieldNode) -> Option<String> {
        match field.name.as_str() {
            "posts" | "post" => Some("post".to_owned()),
            "featured" | "pinned" => Some("customPost".to_owned()),
            _ => None,
        }
    }

    fn resolve(&self, _entity: &EntityRef<'_>, field_name: &str, arguments: &ResolvedArguments) -> Result<Value, FieldError> {
        match field_name {
            "posts" => {
                let status = arguments.get("status").and_then(Value::as_str);
                let limit = arguments
                    .get("limit")
                    .and_then(Value::as_u64)
                    .map_or(usize::MAX, |limit| limit as usize);
                let ids = Self::POST_IDS
                    .into_iter()
                    .filter(|id| status.is_none() || status == Some(post_status(*id)))
                    .take(limit)
                    .map(Value::from)
                    .collect();
                Ok(Value::Array(ids))
            }
            "post" => Ok(arguments.get("id").cloned().unwrap_or(Value::Null)),
            "featured" => Ok(json!(["1", "page-1"])),
            "pinned" => Ok(json!("ghost")),
            _ => Err(FieldError::new(format!("unexpected field '{field_name}'"))),
        }
    }
}

fn post_status(id: u64) -> &'static str {
    if id == 2 {
        "draft"
    } else {
        "published"
    }
}

/// Computed post fields.
struct PostFields {
    calls: Arc<Calls>,
}

impl FieldResolver for PostFields {
    fn field_names(&self) -> Vec<&str> {
        vec!["isPublished", "isStatus", "excerpt", "summary"]
    }

    fn argument_definitions(&self, field_name: &str) -> Vec<ArgumentDefinition> {
        match field_name {
            "isStatus" => vec![ArgumentDefinition::new("status", ArgType::String).mandatory()],
            "excerpt" => vec![
                ArgumentDefinition::new("length", ArgType::Int).with_description("Characters to keep"),
                ArgumentDefinition::new("ellipsis", ArgType::String).deprecated("use 'more' instead"),
            ],
            _ => Vec::new(),
        }
    }

    fn deprecation(&self, field_name: &str, _arguments: &ResolvedArguments) -> Option<String> {
        (field_name == "summary").then(|| "use 'excerpt' instead".to_owned())
    }

    fn validate_entity(
        &self,
        entity: &EntityRef<'_>,
        field_name: &str,
        _arguments: &ResolvedArguments,
    ) -> Result<(), FieldError> {
        if field_name == "excerpt" && entity.get("status") == "draft" {
            return Err(FieldError::new("Drafts have no excerpt"));
        }
        Ok(())
    }

    fn resolve(&self, entity: &EntityRef<'_>, field_name: &str, arguments: &ResolvedArguments) -> Result<Value, FieldError> {
        self.calls.resolve(entity, field_name);
        let status = entity.get("status");
        match field_name {
            "isPublished" => Ok(Value::Bool(status == "published")),
            "isStatus" => Ok(Value::Bool(arguments.get("status") == Some(&status))),
            "excerpt" | "summary" => {
                let content = entity.get("content");
                let content = content.as_str().unwrap_or_default();
                let length = arguments.get("length").and_then(Value::as_u64).unwrap_or(10) as usize;
                Ok(Value::String(content.chars().take(length).collect()))
            }
            _ => Err(FieldError::new(format!("unexpected field '{field_name}'"))),
        }
    }
}

/// `echo(value: …)` returns its argument, for every entity type.
struct Echo;

impl FieldResolver for Echo {
    fn field_names(&self) -> Vec<&str> {
        vec!["echo"]
    }

    fn argument_definitions(&self, _field_name: &str) -> Vec<ArgumentDefinition> {
        vec![ArgumentDefinition::new("value", ArgType::Mixed).mandatory()]
    }

    fn resolve(&self, _entity: &EntityRef<'_>, _field_name: &str, arguments: &ResolvedArguments) -> Result<Value, FieldError> {
        Ok(arguments.get("value").cloned().unwrap_or(Value::Null))
    }
}

/// `wrap(with: …)` surrounds titles and excerpts. It may appear once per field.
pub struct Wrap;

impl DirectiveResolver for Wrap {
    fn directive_name(&self) -> &str {
        "wrap"
    }

    fn argument_definitions(&self) -> Vec<ArgumentDefinition> {
        vec![ArgumentDefinition::new("with", ArgType::String).mandatory()]
    }

    fn position(&self) -> PipelinePosition {
        PipelinePosition::Back
    }

    fn is_repeatable(&self) -> bool {
        false
    }

    fn field_names_to_apply_to(&self) -> Option<Vec<&str>> {
        Some(vec!["title", "excerpt"])
    }

    fn resolve(
        &self,
        directive: &BoundDirective,
        fields: &ObligationSet,
        _resolution: &Resolution<'_>,
        ctx: &mut PipelineContext<'_>,
    ) {
        let arguments = directive.static_arguments();
        let with = arguments.get("with").and_then(Value::as_str).unwrap_or_default();
        for (id, field_set) in fields.iter() {
            for field in &field_set.direct {
                let key = field.output_key();
                if let Some(Value::String(value)) = ctx.output_value(id, &key) {
                    let wrapped = format!("{with}{value}{with}");
                    ctx.set_output(id, key, Value::String(wrapped));
                }
            }
        }
    }
}

pub fn registry(calls: &Arc<Calls>) -> RegistryBuilder {
    let properties = |names: &[&'static str], relations: &[(&'static str, &'static str)]| Properties {
        names: names.to_vec(),
        relations: relations.to_vec(),
        calls: Arc::clone(calls),
    };

    RegistryBuilder::new()
        .fixed_type("root", MemoryLoader::new("root", vec![("root", json!({}))], calls))
        .fixed_type(
            "post",
            MemoryLoader::new(
                "post",
                vec![
                    (
                        "1",
                        json!({
                            "title": "Hello world",
                            "subtitle": "An introduction",
                            "status": "published",
                            "content": "Welcome to the blog",
                            "author": 1,
                            "comments": [1, 2],
                            "isFavorite": true,
                        }),
                    ),
                    (
                        "2",
                        json!({
                            "title": "Draft notes",
                            "status": "draft",
                            "content": "Not ready yet",
                            "author": 2,
                            "comments": [],
                            "isFavorite": false,
                        }),
                    ),
                    (
                        "3",
                        json!({
                            "title": "Rust tips",
                            "status": "published",
                            "content": "Borrow wisely",
                            "author": 1,
                            "comments": [3],
                            "isFavorite": false,
                        }),
                    ),
                    (
                        "4",
                        json!({
                            "title": "Orphaned",
                            "status": "published",
                            "content": "Its author is gone",
                            "author": 9,
                            "comments": [],
                            "isFavorite": false,
                        }),
                    ),
                ],
                calls,
            ),
        )
        .fixed_type(
            "user",
            MemoryLoader::new(
                "user",
                vec![
                    ("1", json!({"name": "Ada", "email": "ada@example.com", "posts": [1, 3]})),
                    ("2", json!({"name": "Linus", "email": "linus@example.com", "posts": [2]})),
                ],
                calls,
            ),
        )
        .fixed_type(
            "comment",
            MemoryLoader::new(
                "comment",
                vec![
                    ("1", json!({"body": "First!", "author": 2, "post": 1})),
                    ("2", json!({"body": "Nice post", "author": 1, "post": 1})),
                    ("3", json!({"body": "Thanks", "author": 2, "post": 3})),
                ],
                calls,
            ),
        )
        .fixed_type(
            "page",
            MemoryLoader::new("page", vec![("page-1", json!({"title": "About", "slug": "about"}))], calls),
        )
        .convertible_type("customPost", &["post", "page"], |id| {
            if id.as_str().starts_with("page-") {
                Some("page".to_owned())
            } else if id.as_str().parse::<u64>().is_ok() {
                Some("post".to_owned())
            } else {
                None
            }
        })
        .field_resolver("root", 0, RootFields)
        .field_resolver(
            "post",
            0,
            properties(
                &["title", "subtitle", "status", "content", "isFavorite"],
                &[("author", "user"), ("comments", "comment")],
            ),
        )
        .field_resolver(
            "post",
            0,
            PostFields {
                calls: Arc::clone(calls),
            },
        )
        .field_resolver("user", 0, properties(&["name", "email"], &[("posts", "post")]))
        .field_resolver("comment", 0, properties(&["body"], &[("author", "user"), ("post", "post")]))
        .field_resolver("page", 0, properties(&["title", "slug"], &[]))
        .field_resolver(GLOBAL_SCOPE, 0, Echo)
        .directive_resolver(GLOBAL_SCOPE, 0, Wrap)
}

pub struct Blog {
    pub calls: Arc<Calls>,
    pub engine: Engine,
}

impl Default for Blog {
    fn default() -> Self {
        Self::with_config(EngineConfig::default())
    }
}

impl Blog {
    pub fn with_config(config: EngineConfig) -> Self {
        init_tracing();
        let calls = Arc::new(Calls::default());
        let registry = registry(&calls).build().unwrap();
        Blog {
            calls,
            engine: Engine::new(registry, config),
        }
    }

    pub fn run(&self, query: &str) -> QueryOutput {
        self.run_with(query, &Variables::default())
    }

    pub fn run_with(&self, query: &str, variables: &Variables) -> QueryOutput {
        let request = DataloadRequest::root(query).unwrap();
        self.engine.execute(&request, variables).unwrap()
    }

    pub fn run_tree(&self, tree: ObligationTree) -> QueryOutput {
        let request = DataloadRequest::new(DataloadRequest::ROOT_TYPE, vec![EntityId::from("root")], tree);
        self.engine.execute(&request, &Variables::default()).unwrap()
    }
}

/// Ids stored for `type_name` in the primary bucket.
pub fn ids(output: &QueryOutput, type_name: &str) -> Vec<String> {
    output
        .db_data
        .get(EngineConfig::DEFAULT_BUCKET)
        .and_then(|types| types.get(type_name))
        .map(|items| items.keys().map(ToString::to_string).collect())
        .unwrap_or_default()
}

/// A value of the primary bucket.
pub fn value<'a>(output: &'a QueryOutput, type_name: &str, id: &str, key: &str) -> Option<&'a Value> {
    output.value(EngineConfig::DEFAULT_BUCKET, type_name, id, key)
}
