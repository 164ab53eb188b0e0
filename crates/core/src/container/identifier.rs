use std::any::TypeId;
use std::fmt;
use std::sync::Arc;

/// Key under which bindings are registered
///
/// Either a string key (the equivalent of a string or symbol token) or a type key
/// derived from a Rust type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ServiceIdentifier {
    Key(Arc<str>),
    Type {
        type_id: TypeId,
        type_name: &'static str,
    },
}

impl ServiceIdentifier {
    /// Create a type identifier
    pub fn of<T: 'static + ?Sized>() -> Self {
        Self::Type {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
        }
    }

    /// Create a string identifier
    pub fn key(key: impl AsRef<str>) -> Self {
        Self::Key(Arc::from(key.as_ref()))
    }

    /// Check if this identifier was derived from `T`
    pub fn is_type<T: 'static + ?Sized>(&self) -> bool {
        matches!(self, Self::Type { type_id, .. } if *type_id == TypeId::of::<T>())
    }

    /// Full type name for type identifiers, the key otherwise
    pub fn full_name(&self) -> &str {
        match self {
            Self::Key(key) => key,
            Self::Type { type_name, .. } => type_name,
        }
    }
}

/// Strip module paths, keeping generic arguments readable
fn short_type_name(full: &str) -> String {
    let mut out = String::with_capacity(full.len());
    let mut segment = String::new();
    for ch in full.chars() {
        match ch {
            ':' => segment.clear(),
            '<' | '>' | ',' | ' ' | '&' | '(' | ')' | '[' | ']' => {
                out.push_str(&segment);
                segment.clear();
                out.push(ch);
            }
            _ => segment.push(ch),
        }
    }
    out.push_str(&segment);
    out
}

impl fmt::Display for ServiceIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Key(key) => f.write_str(key),
            Self::Type { type_name, .. } => f.write_str(&short_type_name(type_name)),
        }
    }
}

impl From<&str> for ServiceIdentifier {
    fn from(key: &str) -> Self {
        Self::key(key)
    }
}

impl From<String> for ServiceIdentifier {
    fn from(key: String) -> Self {
        Self::Key(Arc::from(key))
    }
}

impl From<&String> for ServiceIdentifier {
    fn from(key: &String) -> Self {
        Self::key(key)
    }
}

impl From<&ServiceIdentifier> for ServiceIdentifier {
    fn from(id: &ServiceIdentifier) -> Self {
        id.clone()
    }
}
