use std::collections::HashMap;
use std::sync::Arc;

use crate::container::binding::{Binding, BindingId};
use crate::container::identifier::ServiceIdentifier;

/// Bindings grouped by service identifier, in registration order
#[derive(Debug)]
pub struct BindingRegistry {
    bindings: HashMap<ServiceIdentifier, Vec<Arc<Binding>>>,
    next_id: u64,
}

impl BindingRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            bindings: HashMap::new(),
            next_id: 1,
        }
    }

    /// Reserve the next binding id
    pub fn next_id(&mut self) -> BindingId {
        let id = BindingId::new(self.next_id);
        self.next_id += 1;
        id
    }

    /// Append a binding after any existing ones for its identifier
    pub fn add(&mut self, binding: Binding) -> Arc<Binding> {
        let binding = Arc::new(binding);
        tracing::trace!(
            service = %binding.service_identifier,
            binding = %binding.id,
            strategy = binding.strategy.kind(),
            scope = %binding.scope,
            "binding registered"
        );
        self.bindings
            .entry(binding.service_identifier.clone())
            .or_default()
            .push(binding.clone());
        binding
    }

    /// Remove every binding for an identifier
    pub fn remove_all(&mut self, service_identifier: &ServiceIdentifier) -> Vec<Arc<Binding>> {
        self.bindings.remove(service_identifier).unwrap_or_default()
    }

    /// Bindings for an identifier, oldest first
    pub fn get_bindings(&self, service_identifier: &ServiceIdentifier) -> Vec<Arc<Binding>> {
        self.bindings
            .get(service_identifier)
            .cloned()
            .unwrap_or_default()
    }

    pub fn is_bound(&self, service_identifier: &ServiceIdentifier) -> bool {
        self.bindings
            .get(service_identifier)
            .map_or(false, |bindings| !bindings.is_empty())
    }

    /// Drop every binding, returning what was removed
    pub fn clear(&mut self) -> Vec<Arc<Binding>> {
        self.bindings.drain().flat_map(|(_, bindings)| bindings).collect()
    }

    /// Total number of bindings
    pub fn len(&self) -> usize {
        self.bindings.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Identifiers with at least one binding
    pub fn service_identifiers(&self) -> Vec<ServiceIdentifier> {
        let mut ids = self
            .bindings
            .iter()
            .filter(|(_, bindings)| !bindings.is_empty())
            .map(|(id, _)| id.clone())
            .collect::<Vec<_>>();
        ids.sort();
        ids
    }
}

impl Default for BindingRegistry {
    fn default() -> Self {
        Self::new()
    }
}
