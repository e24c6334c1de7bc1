/// Fatal errors. Everything else is reported through feedback and never aborts an execution.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("entity type '{0}' is not registered, so the query has no entry point")]
    UnknownEntryPoint(String),
    #[error("no ids were requested for entity type '{0}', so the query has no entry point")]
    EmptyEntryPoint(String),
    #[error("invalid query: {0}")]
    Query(#[from] field_query::ParseError),
    #[error("invalid configuration: {0}")]
    Config(#[from] toml::de::Error),
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("entity type '{0}' is registered twice")]
    DuplicateType(String),
    #[error("resolvers are registered for scope '{0}', which no entity type specializes")]
    UnknownScope(String),
    #[error("convertible entity type '{0}' declares no possible types")]
    EmptyConvertible(String),
    #[error("convertible entity type '{convertible}' lists '{possible}', which is not a fixed entity type")]
    UnknownPossibleType { convertible: String, possible: String },
}

/// The error value a field resolves to for one entity.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{}", itertools::join(.entries.iter().map(|entry| entry.message.as_str()), "; "))]
pub struct FieldError {
    /// Messages with paths relative to the failing field.
    pub entries: Vec<crate::FeedbackEntry>,
}

impl FieldError {
    pub fn new(message: impl Into<String>) -> Self {
        FieldError {
            entries: vec![crate::FeedbackEntry::new(message)],
        }
    }

    pub fn from_entries(entries: Vec<crate::FeedbackEntry>) -> Self {
        FieldError { entries }
    }
}
