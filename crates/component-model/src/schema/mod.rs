mod cast;

use std::fmt;

use itertools::Itertools as _;

pub use cast::{cast, CastError};

/// Declared type of an argument. Arrays may nest, `array:array:int`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgType {
    Mixed,
    Id,
    String,
    Int,
    Float,
    Bool,
    Date,
    Url,
    Email,
    Ip,
    Object,
    Enum(Vec<String>),
    Array(Option<Box<ArgType>>),
}

impl ArgType {
    pub fn array_of(item: ArgType) -> Self {
        ArgType::Array(Some(Box::new(item)))
    }

    pub fn enumeration<I>(values: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        ArgType::Enum(values.into_iter().map(Into::into).collect())
    }
}

impl fmt::Display for ArgType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgType::Mixed => f.write_str("mixed"),
            ArgType::Id => f.write_str("id"),
            ArgType::String => f.write_str("string"),
            ArgType::Int => f.write_str("int"),
            ArgType::Float => f.write_str("float"),
            ArgType::Bool => f.write_str("bool"),
            ArgType::Date => f.write_str("date"),
            ArgType::Url => f.write_str("url"),
            ArgType::Email => f.write_str("email"),
            ArgType::Ip => f.write_str("ip"),
            ArgType::Object => f.write_str("object"),
            ArgType::Enum(values) => write!(f, "enum[{}]", values.iter().format(", ")),
            ArgType::Array(None) => f.write_str("array"),
            ArgType::Array(Some(item)) => write!(f, "array:{item}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArgumentDefinition {
    pub name: String,
    pub ty: ArgType,
    pub mandatory: bool,
    pub description: Option<String>,
    /// Reason reported whenever the argument is used.
    pub deprecation: Option<String>,
}

impl ArgumentDefinition {
    pub fn new(name: impl Into<String>, ty: ArgType) -> Self {
        ArgumentDefinition {
            name: name.into(),
            ty,
            mandatory: false,
            description: None,
            deprecation: None,
        }
    }

    #[must_use]
    pub fn mandatory(mut self) -> Self {
        self.mandatory = true;
        self
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn deprecated(mut self, reason: impl Into<String>) -> Self {
        self.deprecation = Some(reason.into());
        self
    }
}
