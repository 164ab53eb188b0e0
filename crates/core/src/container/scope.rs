use futures::future::{BoxFuture, FutureExt, Shared};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::container::activation::{Activation, Instance};
use crate::container::binding::BindingId;
use crate::errors::ContainerError;

/// Binding lifetime policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BindingScope {
    /// One instance per container
    Singleton,
    /// A new instance for every request
    Transient,
    /// One instance per root resolution
    Request,
}

impl BindingScope {
    pub fn is_singleton(&self) -> bool {
        matches!(self, BindingScope::Singleton)
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, BindingScope::Transient)
    }

    pub fn is_request(&self) -> bool {
        matches!(self, BindingScope::Request)
    }

    /// Get the scope name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            BindingScope::Singleton => "singleton",
            BindingScope::Transient => "transient",
            BindingScope::Request => "request",
        }
    }
}

impl Default for BindingScope {
    fn default() -> Self {
        BindingScope::Transient
    }
}

impl std::fmt::Display for BindingScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for BindingScope {
    type Err = ContainerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "singleton" => Ok(BindingScope::Singleton),
            "transient" => Ok(BindingScope::Transient),
            "request" => Ok(BindingScope::Request),
            _ => Err(ContainerError::Configuration {
                message: format!("invalid binding scope: {}", s),
            }),
        }
    }
}

type SharedConstruction = Shared<BoxFuture<'static, Result<Instance, ContainerError>>>;

enum Slot {
    Ready(Instance),
    /// Construction in flight, tagged with the generation that reserved it
    Pending(u64, SharedConstruction),
}

/// Instance cache for one lifetime (a container's singletons, or one resolution's
/// request-scoped values)
///
/// A miss reserves the slot with a shared in-flight construction before the
/// strategy runs, so concurrent lookups of the same key wait on one construction.
pub struct ScopeCache {
    label: &'static str,
    slots: Mutex<HashMap<BindingId, Slot>>,
    generation: AtomicU64,
}

impl ScopeCache {
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            slots: Mutex::new(HashMap::new()),
            generation: AtomicU64::new(0),
        }
    }

    /// Return the cached instance for `key`, or construct it at most once
    pub fn get_or_activate<F>(
        self: &Arc<Self>,
        key: BindingId,
        activate: F,
    ) -> Result<Activation<Instance>, ContainerError>
    where
        F: FnOnce() -> Result<Activation<Instance>, ContainerError> + Send + 'static,
    {
        if let Some(hit) = self.lookup(key)? {
            return hit;
        }

        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        let cache = Arc::clone(self);
        let construction: BoxFuture<'static, Result<Instance, ContainerError>> = async move {
            let outcome = match activate() {
                Ok(Activation::Ready(instance)) => Ok(instance),
                Ok(Activation::Pending(pending)) => pending.await,
                Err(error) => Err(error),
            };
            cache.settle(key, generation, &outcome);
            outcome
        }
        .boxed();
        let shared = construction.shared();

        {
            let mut slots = self.slots.lock().map_err(|_| ContainerError::lock(self.label))?;
            match slots.get(&key) {
                Some(Slot::Ready(instance)) => return Ok(Activation::Ready(instance.clone())),
                Some(Slot::Pending(_, existing)) => {
                    let existing = existing.clone();
                    drop(slots);
                    return Self::poll_shared(existing);
                }
                None => {
                    tracing::trace!(cache = self.label, binding = %key, "reserving scope slot");
                    slots.insert(key, Slot::Pending(generation, shared.clone()));
                }
            }
        }

        Self::poll_shared(shared)
    }

    fn lookup(&self, key: BindingId) -> Result<Option<Result<Activation<Instance>, ContainerError>>, ContainerError> {
        let slots = self.slots.lock().map_err(|_| ContainerError::lock(self.label))?;
        match slots.get(&key) {
            Some(Slot::Ready(instance)) => {
                tracing::trace!(cache = self.label, binding = %key, "scope cache hit");
                Ok(Some(Ok(Activation::Ready(instance.clone()))))
            }
            Some(Slot::Pending(_, shared)) => {
                let shared = shared.clone();
                drop(slots);
                tracing::trace!(cache = self.label, binding = %key, "awaiting in-flight construction");
                Ok(Some(Self::poll_shared(shared)))
            }
            None => Ok(None),
        }
    }

    /// Drive a shared construction as far as it goes without suspending
    fn poll_shared(shared: SharedConstruction) -> Result<Activation<Instance>, ContainerError> {
        match shared.clone().now_or_never() {
            Some(Ok(instance)) => Ok(Activation::Ready(instance)),
            Some(Err(error)) => Err(error),
            None => Ok(Activation::Pending(shared.boxed())),
        }
    }

    /// Publish or release a slot once its construction finished
    fn settle(&self, key: BindingId, generation: u64, outcome: &Result<Instance, ContainerError>) {
        let Ok(mut slots) = self.slots.lock() else {
            return;
        };
        let owned = matches!(slots.get(&key), Some(Slot::Pending(g, _)) if *g == generation);
        if !owned {
            return;
        }
        match outcome {
            Ok(instance) => {
                slots.insert(key, Slot::Ready(instance.clone()));
            }
            Err(error) => {
                tracing::warn!(cache = self.label, binding = %key, %error, "construction failed, releasing slot");
                slots.remove(&key);
            }
        }
    }

    /// Ready instance for `key`, if constructed
    pub fn get(&self, key: BindingId) -> Option<Instance> {
        let slots = self.slots.lock().ok()?;
        match slots.get(&key) {
            Some(Slot::Ready(instance)) => Some(instance.clone()),
            _ => None,
        }
    }

    pub fn contains(&self, key: BindingId) -> bool {
        self.slots
            .lock()
            .map(|slots| slots.contains_key(&key))
            .unwrap_or(false)
    }

    /// Evict a slot, returning the instance if it was ready
    pub fn remove(&self, key: BindingId) -> Option<Instance> {
        let mut slots = self.slots.lock().ok()?;
        match slots.remove(&key) {
            Some(Slot::Ready(instance)) => Some(instance),
            _ => None,
        }
    }

    /// Evict every slot, returning ready instances
    pub fn clear(&self) -> Vec<(BindingId, Instance)> {
        let Ok(mut slots) = self.slots.lock() else {
            return Vec::new();
        };
        slots
            .drain()
            .filter_map(|(key, slot)| match slot {
                Slot::Ready(instance) => Some((key, instance)),
                Slot::Pending(..) => None,
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.slots.lock().map(|slots| slots.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for ScopeCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopeCache")
            .field("label", &self.label)
            .field("entries", &self.len())
            .finish()
    }
}
