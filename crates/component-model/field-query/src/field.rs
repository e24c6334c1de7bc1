use std::{
    cmp::Ordering,
    fmt,
    hash::{Hash, Hasher},
    ops::Deref,
    sync::Arc,
};

use crate::{FieldNode, ParseResult};

/// A parsed field, cheap to clone, compared and hashed by its canonical printed form.
#[derive(Clone)]
pub struct Field {
    node: Arc<FieldNode>,
    key: Arc<str>,
}

impl Field {
    pub const IDENTITY: &'static str = "id";

    pub fn new(node: FieldNode) -> Self {
        let key = node.to_string().into();
        Field {
            node: Arc::new(node),
            key,
        }
    }

    pub fn parse(input: &str) -> ParseResult<Self> {
        crate::parse_field(input).map(Field::new)
    }

    /// The field every entity resolves to its own id.
    pub fn identity() -> Self {
        Field::new(FieldNode::new(Self::IDENTITY))
    }

    pub fn node(&self) -> &FieldNode {
        &self.node
    }

    /// Canonical text of the field, directives included.
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl From<FieldNode> for Field {
    fn from(node: FieldNode) -> Self {
        Field::new(node)
    }
}

impl Deref for Field {
    type Target = FieldNode;

    fn deref(&self) -> &Self::Target {
        &self.node
    }
}

impl PartialEq for Field {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for Field {}

impl Hash for Field {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl PartialOrd for Field {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Field {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key.cmp(&other.key)
    }
}

impl fmt::Debug for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Field").field(&self.key).finish()
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key)
    }
}
