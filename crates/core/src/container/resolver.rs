//! Plan execution.
//!
//! Children are resolved before their parent. Every step returns an
//! [`Activation`], so a request only becomes pending when something below it
//! actually suspended; a graph of synchronous strategies resolves in one pass.

use std::sync::Arc;

use crate::container::activation::{Activation, Injected, Instance};
use crate::container::binding::{Binding, BindingStrategy};
use crate::container::context::Context;
use crate::container::ioc_container::Container;
use crate::container::metadata::{ClassBinding, InjectedArgs};
use crate::container::plan::{Plan, RequestId};
use crate::container::scope::{BindingScope, ScopeCache};
use crate::errors::ContainerError;

/// One execution of a plan, owning the request-scoped cache
#[derive(Clone)]
pub(crate) struct Resolver {
    container: Container,
    plan: Arc<Plan>,
    request_cache: Arc<ScopeCache>,
}

impl Resolver {
    pub(crate) fn new(container: Container, plan: Arc<Plan>) -> Self {
        Self {
            container,
            plan,
            request_cache: Arc::new(ScopeCache::new("request_scope")),
        }
    }

    /// Resolve the root request of the plan
    pub(crate) fn resolve(&self) -> Result<Activation<Injected>, ContainerError> {
        let root = self.plan.root();
        tracing::debug!(
            resolution = %self.plan.id(),
            service = %root.service_identifier(),
            "resolving"
        );
        self.resolve_request(root.id())
    }

    fn resolve_request(&self, id: RequestId) -> Result<Activation<Injected>, ContainerError> {
        let node = self.plan.node(id);
        let mut values = Vec::with_capacity(node.bindings.len());
        for index in 0..node.bindings.len() {
            values.push(self.resolve_binding(id, index)?);
        }

        if node.target.multi {
            return Ok(Activation::join_all(values).map(Injected::Many));
        }
        match values.into_iter().next() {
            Some(value) => Ok(value.map(Injected::One)),
            None => Ok(Activation::Ready(Injected::Missing)),
        }
    }

    fn resolve_binding(&self, id: RequestId, index: usize) -> Result<Activation<Instance>, ContainerError> {
        let binding = &self.plan.node(id).bindings[index];
        let cache = match binding.scope {
            BindingScope::Singleton => self.container.singletons(),
            BindingScope::Request => &self.request_cache,
            BindingScope::Transient => return self.activate(id, index),
        };
        let this = self.clone();
        cache.get_or_activate(binding.id, move || this.activate(id, index))
    }

    /// Run a binding's strategy followed by its activation hook
    fn activate(&self, id: RequestId, index: usize) -> Result<Activation<Instance>, ContainerError> {
        let node = self.plan.node(id);
        let binding = node.bindings[index].clone();
        let service = binding.service_identifier.to_string();
        let context = Context::new(self.container.clone(), self.plan.clone(), id);

        tracing::debug!(
            service = %service,
            binding = %binding.id,
            strategy = binding.strategy.kind(),
            scope = %binding.scope,
            "activating"
        );

        let activation = match &binding.strategy {
            BindingStrategy::Constant(value) => Activation::Ready(value.clone()),
            BindingStrategy::Type(class) | BindingStrategy::Constructor(class) => {
                self.construct_class(id, index, class, &service)?
            }
            BindingStrategy::DynamicValue(value) => {
                let wrap_service = service.clone();
                value(&context)
                    .map_err(|error| user_error(&service, error))?
                    .map_err(move |error| user_error(&wrap_service, error))
            }
            BindingStrategy::Factory(factory) | BindingStrategy::Provider(factory) => {
                Activation::Ready(factory(&context).map_err(|error| user_error(&service, error))?)
            }
            BindingStrategy::Service(alias) => {
                let child = node.dependencies[index].first().copied().ok_or_else(|| {
                    ContainerError::activation_failed(&service, format!("alias {} was not planned", alias))
                })?;
                let alias_service = service.clone();
                self.resolve_request(child)?.and_then(move |injected| match injected {
                    Injected::One(instance) => Ok(Activation::Ready(instance)),
                    _ => Err(ContainerError::activation_failed(
                        alias_service,
                        "alias did not resolve to a single value",
                    )),
                })?
            }
        };

        self.apply_activation_hook(&binding, context, activation)
    }

    fn construct_class(
        &self,
        id: RequestId,
        index: usize,
        class: &ClassBinding,
        service: &str,
    ) -> Result<Activation<Instance>, ContainerError> {
        let metadata = self.container.metadata_reader().class_metadata(class)?;
        let children = &self.plan.node(id).dependencies[index];
        let mut values = Vec::with_capacity(children.len());
        for child in children {
            values.push(self.resolve_request(*child)?);
        }

        let class = class.clone();
        let service = service.to_string();
        Activation::join_all(values).and_then(move |values| {
            let args = InjectedArgs::new(metadata.type_name.clone(), metadata.targets.clone(), values);
            let instance = class
                .construct(args)
                .map_err(|error| user_error(&service, error))?;

            let Some(hook) = metadata.post_construct.as_deref() else {
                return Ok(Activation::Ready(instance));
            };
            let type_name = metadata.type_name.clone();
            let hook_failed = move |error: ContainerError| {
                ContainerError::post_construct_failed(service.as_str(), &type_name, error)
            };
            let done = match class.run_post_construct(&instance, hook) {
                Ok(done) => done,
                Err(error) => return Err(hook_failed(error)),
            };
            Ok(done.map_err(hook_failed).map(move |()| instance))
        })
    }

    fn apply_activation_hook(
        &self,
        binding: &Binding,
        context: Context,
        activation: Activation<Instance>,
    ) -> Result<Activation<Instance>, ContainerError> {
        let Some(hook) = binding.on_activation.clone() else {
            return Ok(activation);
        };
        let service = binding.service_identifier.to_string();
        activation.and_then(move |instance| {
            hook(&context, instance)
                .map(Activation::Ready)
                .map_err(|error| user_error(&service, error))
        })
    }
}

/// Attribute a failure raised by user code to the service being activated,
/// keeping the innermost activation failure intact
fn user_error(service: &str, error: ContainerError) -> ContainerError {
    match error {
        ContainerError::ActivationFailed { .. } => error,
        other => {
            tracing::warn!(service = %service, error = %other, "activation failed");
            ContainerError::activation_failed(service, other.to_string())
        }
    }
}
