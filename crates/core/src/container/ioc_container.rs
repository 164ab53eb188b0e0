use serde_json::Value;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use uuid::Uuid;

use crate::config::ContainerOptions;
use crate::container::activation::{Activation, Injected};
use crate::container::binding::{Binding, BindingBuilder, BindingId, BindingStrategy};
use crate::container::identifier::ServiceIdentifier;
use crate::container::metadata::{MetadataReader, MetadataTable};
use crate::container::plan::{Plan, Planner, RequestNode, RequestRef};
use crate::container::registry::BindingRegistry;
use crate::container::resolver::Resolver;
use crate::container::scope::ScopeCache;
use crate::container::target::Target;
use crate::errors::ContainerError;

struct ContainerInner {
    id: Uuid,
    options: ContainerOptions,
    registry: RwLock<BindingRegistry>,
    singletons: Arc<ScopeCache>,
    metadata: Arc<dyn MetadataReader>,
}

/// Inversion-of-control container
///
/// A cheap handle: clones share the same registry and singleton cache, so
/// dynamic values and providers can capture the container they run in.
#[derive(Clone)]
pub struct Container {
    inner: Arc<ContainerInner>,
}

impl Container {
    /// Create a container with default options
    pub fn new() -> Self {
        Self::with_options(ContainerOptions::default())
    }

    pub fn with_options(options: ContainerOptions) -> Self {
        Self::with_metadata_reader(options, Arc::new(MetadataTable::new()))
    }

    /// Create a container reading injection metadata through `metadata`
    pub fn with_metadata_reader(options: ContainerOptions, metadata: Arc<dyn MetadataReader>) -> Self {
        let id = Uuid::new_v4();
        tracing::debug!(container = %id, default_scope = %options.default_scope, "container created");
        Self {
            inner: Arc::new(ContainerInner {
                id,
                options,
                registry: RwLock::new(BindingRegistry::new()),
                singletons: Arc::new(ScopeCache::new("singleton_scope")),
                metadata,
            }),
        }
    }

    /// Create a container configured from `BINDERY_*` environment variables
    pub fn from_env() -> Result<Self, ContainerError> {
        Ok(Self::with_options(ContainerOptions::from_env()?))
    }

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    pub fn options(&self) -> &ContainerOptions {
        &self.inner.options
    }

    pub(crate) fn singletons(&self) -> &Arc<ScopeCache> {
        &self.inner.singletons
    }

    pub(crate) fn metadata_reader(&self) -> &dyn MetadataReader {
        self.inner.metadata.as_ref()
    }

    fn read_registry(&self) -> Result<RwLockReadGuard<'_, BindingRegistry>, ContainerError> {
        self.inner
            .registry
            .read()
            .map_err(|_| ContainerError::lock("binding_registry"))
    }

    fn write_registry(&self) -> Result<RwLockWriteGuard<'_, BindingRegistry>, ContainerError> {
        self.inner
            .registry
            .write()
            .map_err(|_| ContainerError::lock("binding_registry"))
    }

    /// Register a binding described by `configure`
    ///
    /// ```ignore
    /// container.bind("Weapon", |b| b.to_type::<Katana>().when_target_named("katana"))?;
    /// ```
    pub fn bind<F>(&self, service_identifier: impl Into<ServiceIdentifier>, configure: F) -> Result<BindingId, ContainerError>
    where
        F: FnOnce(BindingBuilder) -> BindingBuilder,
    {
        let builder = configure(BindingBuilder::new(service_identifier));
        let mut registry = self.write_registry()?;
        let id = registry.next_id();
        let binding = registry.add(builder.build(id, self.inner.options.default_scope)?);
        tracing::debug!(
            service = %binding.service_identifier,
            binding = %binding.id,
            strategy = binding.strategy.kind(),
            "bound"
        );
        Ok(id)
    }

    /// Replace every binding of an identifier with a new one in one step
    pub fn rebind<F>(&self, service_identifier: impl Into<ServiceIdentifier>, configure: F) -> Result<BindingId, ContainerError>
    where
        F: FnOnce(BindingBuilder) -> BindingBuilder,
    {
        let builder = configure(BindingBuilder::new(service_identifier));
        let (id, removed) = {
            let mut registry = self.write_registry()?;
            let id = registry.next_id();
            let binding = builder.build(id, self.inner.options.default_scope)?;
            let removed = registry.remove_all(&binding.service_identifier);
            registry.add(binding);
            (id, removed)
        };
        tracing::debug!(binding = %id, replaced = removed.len(), "rebound");
        self.deactivate(&removed);
        Ok(id)
    }

    /// Remove every binding of an identifier, deactivating cached singletons
    pub fn unbind(&self, service_identifier: impl Into<ServiceIdentifier>) -> Result<(), ContainerError> {
        let service_identifier = service_identifier.into();
        let removed = self.write_registry()?.remove_all(&service_identifier);
        if removed.is_empty() {
            return Err(ContainerError::InvalidBinding {
                service: service_identifier.to_string(),
                message: "could not unbind, no bindings are registered".to_string(),
            });
        }
        tracing::debug!(service = %service_identifier, removed = removed.len(), "unbound");
        self.deactivate(&removed);
        Ok(())
    }

    /// Remove every binding of every identifier
    pub fn unbind_all(&self) -> Result<(), ContainerError> {
        let removed = self.write_registry()?.clear();
        tracing::debug!(removed = removed.len(), "unbound all");
        self.deactivate(&removed);
        Ok(())
    }

    /// Evict cached singletons and constructor metadata of removed bindings, then run deactivation hooks
    fn deactivate(&self, removed: &[Arc<Binding>]) {
        for binding in removed {
            if let BindingStrategy::Constructor(class) = &binding.strategy {
                self.metadata_reader().evict(class);
            }
            let Some(instance) = self.inner.singletons.remove(binding.id) else {
                continue;
            };
            let Some(hook) = &binding.on_deactivation else {
                continue;
            };
            if let Err(error) = hook(&instance) {
                tracing::warn!(
                    service = %binding.service_identifier,
                    binding = %binding.id,
                    %error,
                    "deactivation hook failed"
                );
            }
        }
    }

    pub fn is_bound(&self, service_identifier: impl Into<ServiceIdentifier>) -> bool {
        let service_identifier = service_identifier.into();
        self.read_registry()
            .map(|registry| registry.is_bound(&service_identifier))
            .unwrap_or(false)
    }

    /// Whether some binding would satisfy a lookup with this name
    pub fn is_bound_named(&self, service_identifier: impl Into<ServiceIdentifier>, name: impl Into<String>) -> bool {
        self.is_bound_for(Target::variable(service_identifier).named(name))
    }

    /// Whether some binding would satisfy a lookup with this tag
    pub fn is_bound_tagged(
        &self,
        service_identifier: impl Into<ServiceIdentifier>,
        key: impl Into<String>,
        value: impl Into<Value>,
    ) -> bool {
        self.is_bound_for(Target::variable(service_identifier).tagged(key, value))
    }

    fn is_bound_for(&self, target: Target) -> bool {
        let Ok(registry) = self.read_registry() else {
            return false;
        };
        let bindings = registry.get_bindings(&target.service_identifier);
        let nodes = [RequestNode::new(0, target, None)];
        let request = RequestRef::new(&nodes, 0);
        bindings.iter().any(|binding| binding.matches(Some(&request)))
    }

    /// Bind each alias to `service`, so they all resolve through its bindings
    pub fn multi_bind_to_service<I, S>(
        &self,
        service: impl Into<ServiceIdentifier>,
        aliases: I,
    ) -> Result<Vec<BindingId>, ContainerError>
    where
        I: IntoIterator<Item = S>,
        S: Into<ServiceIdentifier>,
    {
        let service = service.into();
        aliases
            .into_iter()
            .map(|alias| self.bind(alias, |b| b.to_service(&service)))
            .collect()
    }

    /// Build the resolution plan for a target without resolving it
    pub fn plan(&self, target: Target) -> Result<Plan, ContainerError> {
        let registry = self.read_registry()?;
        Planner::new(&registry, self.metadata_reader(), &self.inner.options).build(target)
    }

    /// Plan and resolve a target, returning the untyped result
    pub fn resolve_target(&self, target: Target) -> Result<Activation<Injected>, ContainerError> {
        // registry lock is released before any strategy runs
        let plan = Arc::new(self.plan(target)?);
        Resolver::new(self.clone(), plan).resolve()
    }

    fn resolve_now(&self, target: Target) -> Result<Injected, ContainerError> {
        let service = target.service_identifier.to_string();
        match self.resolve_target(target)? {
            Activation::Ready(injected) => Ok(injected),
            Activation::Pending(_) => Err(ContainerError::AsyncResolutionRequired { service }),
        }
    }

    async fn resolve_later(&self, target: Target) -> Result<Injected, ContainerError> {
        self.resolve_target(target)?.into_future().await
    }

    fn expect_one<T: Send + Sync + 'static>(target: &Target, injected: Injected) -> Result<Arc<T>, ContainerError> {
        injected
            .one::<T>(target.service_identifier.full_name())?
            .ok_or_else(|| ContainerError::UnresolvedBinding {
                service: target.service_identifier.to_string(),
                location: String::new(),
                metadata: target.metadata_description(),
            })
    }

    fn get_target<T: Send + Sync + 'static>(&self, target: Target) -> Result<Arc<T>, ContainerError> {
        let injected = self.resolve_now(target.clone())?;
        Self::expect_one(&target, injected)
    }

    fn get_all_target<T: Send + Sync + 'static>(&self, target: Target) -> Result<Vec<Arc<T>>, ContainerError> {
        let injected = self.resolve_now(target.clone())?;
        injected.all::<T>(target.service_identifier.full_name())
    }

    async fn get_target_async<T: Send + Sync + 'static>(&self, target: Target) -> Result<Arc<T>, ContainerError> {
        let injected = self.resolve_later(target.clone()).await?;
        Self::expect_one(&target, injected)
    }

    async fn get_all_target_async<T: Send + Sync + 'static>(&self, target: Target) -> Result<Vec<Arc<T>>, ContainerError> {
        let injected = self.resolve_later(target.clone()).await?;
        injected.all::<T>(target.service_identifier.full_name())
    }

    /// Resolve exactly one value synchronously
    pub fn get<T: Send + Sync + 'static>(&self, service_identifier: impl Into<ServiceIdentifier>) -> Result<Arc<T>, ContainerError> {
        self.get_target(Target::variable(service_identifier))
    }

    pub fn get_named<T: Send + Sync + 'static>(
        &self,
        service_identifier: impl Into<ServiceIdentifier>,
        name: impl Into<String>,
    ) -> Result<Arc<T>, ContainerError> {
        self.get_target(Target::variable(service_identifier).named(name))
    }

    pub fn get_tagged<T: Send + Sync + 'static>(
        &self,
        service_identifier: impl Into<ServiceIdentifier>,
        key: impl Into<String>,
        value: impl Into<Value>,
    ) -> Result<Arc<T>, ContainerError> {
        self.get_target(Target::variable(service_identifier).tagged(key, value))
    }

    /// Resolve every matching binding, in registration order
    pub fn get_all<T: Send + Sync + 'static>(&self, service_identifier: impl Into<ServiceIdentifier>) -> Result<Vec<Arc<T>>, ContainerError> {
        self.get_all_target(Target::variable(service_identifier).multi())
    }

    pub fn get_all_named<T: Send + Sync + 'static>(
        &self,
        service_identifier: impl Into<ServiceIdentifier>,
        name: impl Into<String>,
    ) -> Result<Vec<Arc<T>>, ContainerError> {
        self.get_all_target(Target::variable(service_identifier).named(name).multi())
    }

    pub fn get_all_tagged<T: Send + Sync + 'static>(
        &self,
        service_identifier: impl Into<ServiceIdentifier>,
        key: impl Into<String>,
        value: impl Into<Value>,
    ) -> Result<Vec<Arc<T>>, ContainerError> {
        self.get_all_target(Target::variable(service_identifier).tagged(key, value).multi())
    }

    /// Resolve a value if one is bound, `None` otherwise
    pub fn try_get<T: Send + Sync + 'static>(
        &self,
        service_identifier: impl Into<ServiceIdentifier>,
    ) -> Result<Option<Arc<T>>, ContainerError> {
        let target = Target::variable(service_identifier).optional();
        let injected = self.resolve_now(target.clone())?;
        injected.one::<T>(target.service_identifier.full_name())
    }

    /// Resolve exactly one value, awaiting asynchronous strategies
    pub async fn get_async<T: Send + Sync + 'static>(
        &self,
        service_identifier: impl Into<ServiceIdentifier>,
    ) -> Result<Arc<T>, ContainerError> {
        self.get_target_async(Target::variable(service_identifier)).await
    }

    pub async fn get_named_async<T: Send + Sync + 'static>(
        &self,
        service_identifier: impl Into<ServiceIdentifier>,
        name: impl Into<String>,
    ) -> Result<Arc<T>, ContainerError> {
        self.get_target_async(Target::variable(service_identifier).named(name)).await
    }

    pub async fn get_tagged_async<T: Send + Sync + 'static>(
        &self,
        service_identifier: impl Into<ServiceIdentifier>,
        key: impl Into<String>,
        value: impl Into<Value>,
    ) -> Result<Arc<T>, ContainerError> {
        self.get_target_async(Target::variable(service_identifier).tagged(key, value)).await
    }

    pub async fn get_all_async<T: Send + Sync + 'static>(
        &self,
        service_identifier: impl Into<ServiceIdentifier>,
    ) -> Result<Vec<Arc<T>>, ContainerError> {
        self.get_all_target_async(Target::variable(service_identifier).multi()).await
    }

    /// Number of registered bindings
    pub fn binding_count(&self) -> usize {
        self.read_registry().map(|registry| registry.len()).unwrap_or(0)
    }

    /// Identifiers with at least one binding
    pub fn registered_services(&self) -> Vec<ServiceIdentifier> {
        self.read_registry()
            .map(|registry| registry.service_identifiers())
            .unwrap_or_default()
    }
}

impl Default for Container {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Container")
            .field("id", &self.inner.id)
            .field("bindings", &self.binding_count())
            .field("singletons", &self.inner.singletons.len())
            .finish()
    }
}
