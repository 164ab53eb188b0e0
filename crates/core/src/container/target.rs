use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

use crate::container::identifier::ServiceIdentifier;

/// Where an injection point lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetKind {
    ConstructorArgument(usize),
    ClassProperty(String),
    /// A lookup made directly against the container
    Variable,
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetKind::ConstructorArgument(index) => write!(f, "constructor argument {}", index),
            TargetKind::ClassProperty(name) => write!(f, "property `{}`", name),
            TargetKind::Variable => f.write_str("variable"),
        }
    }
}

/// One injection point being filled
#[derive(Debug, Clone, PartialEq)]
pub struct Target {
    pub kind: TargetKind,
    pub service_identifier: ServiceIdentifier,
    pub name: Option<String>,
    pub tags: BTreeMap<String, Value>,
    pub multi: bool,
    pub optional: bool,
}

impl Target {
    /// Create a lookup target for an identifier
    pub fn variable(service_identifier: impl Into<ServiceIdentifier>) -> Self {
        Self::new(TargetKind::Variable, service_identifier)
    }

    pub fn new(kind: TargetKind, service_identifier: impl Into<ServiceIdentifier>) -> Self {
        Self {
            kind,
            service_identifier: service_identifier.into(),
            name: None,
            tags: BTreeMap::new(),
            multi: false,
            optional: false,
        }
    }

    /// Attach a name constraint
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Attach a tag constraint
    pub fn tagged(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    /// Mark as a multi-injection target
    pub fn multi(mut self) -> Self {
        self.multi = true;
        self
    }

    /// Mark as optional
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn is_named(&self) -> bool {
        self.name.is_some()
    }

    pub fn is_tagged(&self) -> bool {
        !self.tags.is_empty()
    }

    /// True when the target carries neither a name nor tags
    pub fn is_default(&self) -> bool {
        !self.is_named() && !self.is_tagged()
    }

    pub fn named_tag(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn matches_named(&self, name: &str) -> bool {
        self.name.as_deref() == Some(name)
    }

    pub fn matches_tag(&self, key: &str, value: &Value) -> bool {
        self.tags.get(key) == Some(value)
    }

    /// Human readable name/tag listing, empty for default targets
    pub fn metadata_description(&self) -> String {
        let mut out = String::new();
        if let Some(name) = &self.name {
            out.push_str(&format!("\n named: {}", name));
        }
        for (key, value) in &self.tags {
            out.push_str(&format!("\n tagged: {{ key: {}, value: {} }}", key, value));
        }
        out
    }
}
