use std::fmt;

use itertools::Itertools as _;
use serde_json::Value;

/// A field as written in a query: `name(args)@alias<directives>`.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldNode {
    pub name: String,
    pub alias: Option<String>,
    pub arguments: Vec<Argument>,
    pub directives: Vec<DirectiveNode>,
}

impl FieldNode {
    pub fn new(name: impl Into<String>) -> Self {
        FieldNode {
            name: name.into(),
            alias: None,
            arguments: Vec::new(),
            directives: Vec::new(),
        }
    }

    /// The key under which the field's value is stored: the alias if there is one, otherwise the
    /// field with its arguments but without its directives.
    pub fn output_key(&self) -> String {
        if let Some(alias) = &self.alias {
            return alias.clone();
        }
        if self.arguments.is_empty() {
            return self.name.clone();
        }
        format!("{}({})", self.name, self.arguments.iter().format(", "))
    }

    /// The printed directive annotation, `<a, b(x: 1)>`, or an empty string.
    pub fn directives_key(&self) -> String {
        if self.directives.is_empty() {
            return String::new();
        }
        format!("<{}>", self.directives.iter().format(", "))
    }

    /// The field printed as a call, `isPublished()`, the way it reads as an argument value.
    pub fn to_call_string(&self) -> String {
        struct AsCall<'a>(&'a FieldNode);

        impl fmt::Display for AsCall<'_> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.write(f, true)
            }
        }

        AsCall(self).to_string()
    }

    pub fn without_directives(&self) -> FieldNode {
        FieldNode {
            directives: Vec::new(),
            ..self.clone()
        }
    }
}

impl FieldNode {
    /// Field calls used as argument values always keep their parentheses, `isPublished()`, so
    /// they don't read back as bare strings.
    fn write(&self, f: &mut fmt::Formatter<'_>, as_call: bool) -> fmt::Result {
        f.write_str(&self.name)?;
        if !self.arguments.is_empty() || as_call {
            write!(f, "({})", self.arguments.iter().format(", "))?;
        }
        if let Some(alias) = &self.alias {
            write!(f, "@{alias}")?;
        }
        f.write_str(&self.directives_key())
    }
}

impl fmt::Display for FieldNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write(f, false)
    }
}

/// A directive application: `name(args)<nested directives>`.
#[derive(Debug, Clone, PartialEq)]
pub struct DirectiveNode {
    pub name: String,
    pub arguments: Vec<Argument>,
    pub nested: Vec<DirectiveNode>,
}

impl DirectiveNode {
    pub fn new(name: impl Into<String>) -> Self {
        DirectiveNode {
            name: name.into(),
            arguments: Vec::new(),
            nested: Vec::new(),
        }
    }
}

impl fmt::Display for DirectiveNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if !self.arguments.is_empty() {
            write!(f, "({})", self.arguments.iter().format(", "))?;
        }
        if !self.nested.is_empty() {
            write!(f, "<{}>", self.nested.iter().format(", "))?;
        }
        Ok(())
    }
}

/// Anything invoked with an argument list.
pub trait Invocation: fmt::Display {
    fn name(&self) -> &str;

    fn arguments(&self) -> &[Argument];

    fn with_arguments(&self, arguments: Vec<Argument>) -> Self
    where
        Self: Sized;
}

impl Invocation for FieldNode {
    fn name(&self) -> &str {
        &self.name
    }

    fn arguments(&self) -> &[Argument] {
        &self.arguments
    }

    fn with_arguments(&self, arguments: Vec<Argument>) -> Self {
        FieldNode {
            arguments,
            ..self.clone()
        }
    }
}

impl Invocation for DirectiveNode {
    fn name(&self) -> &str {
        &self.name
    }

    fn arguments(&self) -> &[Argument] {
        &self.arguments
    }

    fn with_arguments(&self, arguments: Vec<Argument>) -> Self {
        DirectiveNode {
            arguments,
            ..self.clone()
        }
    }
}

/// An argument; `name` is `None` for positional arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct Argument {
    pub name: Option<String>,
    pub value: InputValue,
}

impl Argument {
    pub fn named(name: impl Into<String>, value: InputValue) -> Self {
        Argument {
            name: Some(name.into()),
            value,
        }
    }

    pub fn positional(value: InputValue) -> Self {
        Argument { name: None, value }
    }
}

impl fmt::Display for Argument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{name}: {}", self.value),
            None => write!(f, "{}", self.value),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum InputValue {
    /// A literal, or a value that has already been resolved.
    Const(Value),
    /// `$name`
    Variable(String),
    /// `%name%`
    Expression(String),
    /// A field call evaluated against the current entity.
    Field(Box<FieldNode>),
    /// `[a, key=b]`
    List(Vec<ListItem>),
}

impl InputValue {
    pub fn as_const(&self) -> Option<&Value> {
        match self {
            InputValue::Const(value) => Some(value),
            _ => None,
        }
    }

    /// Whether the value can only be known once an entity, a variable set or an expression
    /// context is available.
    pub fn is_dynamic(&self) -> bool {
        match self {
            InputValue::Const(_) => false,
            InputValue::Variable(_) | InputValue::Expression(_) | InputValue::Field(_) => true,
            InputValue::List(items) => items.iter().any(|item| item.value.is_dynamic()),
        }
    }

    /// Every field call in the value, lists included.
    pub fn field_calls(&self) -> Vec<&FieldNode> {
        let mut fields = Vec::new();
        self.collect_field_calls(&mut fields);
        fields
    }

    fn collect_field_calls<'a>(&'a self, fields: &mut Vec<&'a FieldNode>) {
        match self {
            InputValue::Field(field) => fields.push(field),
            InputValue::List(items) => items.iter().for_each(|item| item.value.collect_field_calls(fields)),
            _ => {}
        }
    }
}

impl From<Value> for InputValue {
    fn from(value: Value) -> Self {
        InputValue::Const(value)
    }
}

impl fmt::Display for InputValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputValue::Const(value) => write!(f, "{}", ConstDisplay(value)),
            InputValue::Variable(name) => write!(f, "${name}"),
            InputValue::Expression(name) => write!(f, "%{name}%"),
            InputValue::Field(field) => field.write(f, true),
            InputValue::List(items) => write!(f, "[{}]", items.iter().format(", ")),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ListItem {
    pub key: Option<String>,
    pub value: InputValue,
}

impl fmt::Display for ListItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.key {
            Some(key) => write!(f, "{key}={}", self.value),
            None => write!(f, "{}", self.value),
        }
    }
}

/// Prints a resolved value back into the query syntax. Objects print as keyed lists.
pub struct ConstDisplay<'a>(pub &'a Value);

impl fmt::Display for ConstDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Value::Null => f.write_str("null"),
            Value::Bool(value) => write!(f, "{value}"),
            Value::Number(number) => write!(f, "{number}"),
            Value::String(string) => write_quoted(f, string),
            Value::Array(values) => write!(
                f,
                "[{}]",
                values
                    .iter()
                    .format_with(", ", |value, f| f(&format_args!("{}", ConstDisplay(value))))
            ),
            Value::Object(entries) => write!(
                f,
                "[{}]",
                entries
                    .iter()
                    .format_with(", ", |(key, value), f| f(&format_args!("{key}={}", ConstDisplay(value))))
            ),
        }
    }
}

fn write_quoted(f: &mut fmt::Formatter<'_>, string: &str) -> fmt::Result {
    f.write_str("\"")?;
    for c in string.chars() {
        match c {
            '"' => f.write_str("\\\"")?,
            '\\' => f.write_str("\\\\")?,
            '\n' => f.write_str("\\n")?,
            '\t' => f.write_str("\\t")?,
            c => write!(f, "{c}")?,
        }
    }
    f.write_str("\"")
}
