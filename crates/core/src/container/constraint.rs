use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use crate::container::identifier::ServiceIdentifier;
use crate::container::plan::RequestRef;

/// Predicate a binding places on the requests it may satisfy
#[derive(Clone)]
pub enum Constraint {
    /// Target name equals the value
    Named(String),
    /// Target carries the tag with this value
    Tagged(String, Value),
    /// Target has neither name nor tags
    TargetIsDefault,
    /// Direct parent request is for this identifier
    ParentIs(ServiceIdentifier),
    /// Some ancestor request is for this identifier
    AncestorIs(ServiceIdentifier),
    /// No ancestor request is for this identifier
    NoAncestorIs(ServiceIdentifier),
    /// Direct parent's target carries this name
    ParentNamed(String),
    /// Direct parent's target carries this tag
    ParentTagged(String, Value),
    Custom(Arc<dyn Fn(&RequestRef<'_>) -> bool + Send + Sync>),
}

impl Constraint {
    /// Build a custom predicate constraint
    pub fn custom<F>(predicate: F) -> Self
    where
        F: Fn(&RequestRef<'_>) -> bool + Send + Sync + 'static,
    {
        Constraint::Custom(Arc::new(predicate))
    }

    /// Evaluate against a request; always false without one
    pub fn matches(&self, request: Option<&RequestRef<'_>>) -> bool {
        let Some(request) = request else {
            return false;
        };
        match self {
            Constraint::Named(name) => request.target().matches_named(name),
            Constraint::Tagged(key, value) => request.target().matches_tag(key, value),
            Constraint::TargetIsDefault => request.target().is_default(),
            Constraint::ParentIs(id) => request
                .parent()
                .map_or(false, |parent| parent.service_identifier() == id),
            Constraint::AncestorIs(id) => request
                .ancestors()
                .any(|ancestor| ancestor.service_identifier() == id),
            Constraint::NoAncestorIs(id) => !request
                .ancestors()
                .any(|ancestor| ancestor.service_identifier() == id),
            Constraint::ParentNamed(name) => request
                .parent()
                .map_or(false, |parent| parent.target().matches_named(name)),
            Constraint::ParentTagged(key, value) => request
                .parent()
                .map_or(false, |parent| parent.target().matches_tag(key, value)),
            Constraint::Custom(predicate) => predicate(request),
        }
    }

    /// Short description used in ambiguity reports
    pub fn describe(&self) -> String {
        match self {
            Constraint::Named(name) => format!("named: {}", name),
            Constraint::Tagged(key, value) => format!("tagged: {{ key: {}, value: {} }}", key, value),
            Constraint::TargetIsDefault => "default target".to_string(),
            Constraint::ParentIs(id) => format!("injected into: {}", id),
            Constraint::AncestorIs(id) => format!("ancestor: {}", id),
            Constraint::NoAncestorIs(id) => format!("no ancestor: {}", id),
            Constraint::ParentNamed(name) => format!("parent named: {}", name),
            Constraint::ParentTagged(key, value) => {
                format!("parent tagged: {{ key: {}, value: {} }}", key, value)
            }
            Constraint::Custom(_) => "custom constraint".to_string(),
        }
    }
}

impl fmt::Debug for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Constraint({})", self.describe())
    }
}

/// Constraint satisfied when any ancestor request is for `id`
pub fn type_constraint(id: impl Into<ServiceIdentifier>) -> Constraint {
    Constraint::AncestorIs(id.into())
}
