use futures::future::TryFutureExt;
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use crate::container::activation::{downcast, Activation, Instance};
use crate::container::constraint::Constraint;
use crate::container::context::Context;
use crate::container::factory::{Factory, Provider};
use crate::container::identifier::ServiceIdentifier;
use crate::container::metadata::{ClassBinding, ClassMetadata, Injectable, InjectedArgs};
use crate::container::plan::RequestRef;
use crate::container::scope::BindingScope;
use crate::errors::ContainerError;

/// Registration-order-stable binding identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BindingId(u64);

impl BindingId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for BindingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

pub type DynamicValueFn =
    Arc<dyn Fn(&Context) -> Result<Activation<Instance>, ContainerError> + Send + Sync>;
pub type ContextFn = Arc<dyn Fn(&Context) -> Result<Instance, ContainerError> + Send + Sync>;
pub type ActivationHook =
    Arc<dyn Fn(&Context, Instance) -> Result<Instance, ContainerError> + Send + Sync>;
pub type DeactivationHook = Arc<dyn Fn(&Instance) -> Result<(), ContainerError> + Send + Sync>;

/// How a binding produces its value
#[derive(Clone)]
pub enum BindingStrategy {
    /// Construct an [`Injectable`] type
    Type(ClassBinding),
    /// Construct through an explicit constructor closure and metadata
    Constructor(ClassBinding),
    Constant(Instance),
    DynamicValue(DynamicValueFn),
    /// Produces a synchronous [`Factory`]
    Factory(ContextFn),
    /// Produces an asynchronous [`Provider`]
    Provider(ContextFn),
    /// Forward to another identifier
    Service(ServiceIdentifier),
}

impl BindingStrategy {
    pub fn kind(&self) -> &'static str {
        match self {
            BindingStrategy::Type(_) => "Type",
            BindingStrategy::Constructor(_) => "Constructor",
            BindingStrategy::Constant(_) => "Constant",
            BindingStrategy::DynamicValue(_) => "DynamicValue",
            BindingStrategy::Factory(_) => "Factory",
            BindingStrategy::Provider(_) => "Provider",
            BindingStrategy::Service(_) => "Service",
        }
    }

    /// Class backing a `Type` or `Constructor` strategy
    pub fn class(&self) -> Option<&ClassBinding> {
        match self {
            BindingStrategy::Type(class) | BindingStrategy::Constructor(class) => Some(class),
            _ => None,
        }
    }
}

impl fmt::Debug for BindingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BindingStrategy::Type(class) | BindingStrategy::Constructor(class) => {
                write!(f, "{}({})", self.kind(), class.type_name)
            }
            BindingStrategy::Service(id) => write!(f, "Service({})", id),
            _ => write!(f, "{}(<fn>)", self.kind()),
        }
    }
}

/// One registered identifier → strategy record
#[derive(Clone)]
pub struct Binding {
    pub id: BindingId,
    pub service_identifier: ServiceIdentifier,
    pub strategy: BindingStrategy,
    pub scope: BindingScope,
    pub constraints: Vec<Constraint>,
    pub on_activation: Option<ActivationHook>,
    pub on_deactivation: Option<DeactivationHook>,
}

impl Binding {
    pub fn is_constrained(&self) -> bool {
        !self.constraints.is_empty()
    }

    /// All constraints hold for the request (AND composition)
    pub fn matches(&self, request: Option<&RequestRef<'_>>) -> bool {
        if self.constraints.is_empty() {
            return true;
        }
        self.constraints.iter().all(|c| c.matches(request))
    }

    /// Line used when listing candidate bindings
    pub fn describe(&self) -> String {
        let implementation = match &self.strategy {
            BindingStrategy::Type(class) | BindingStrategy::Constructor(class) => {
                class.type_name.clone()
            }
            BindingStrategy::Service(id) => format!("{} (alias)", id),
            other => format!("{} ({})", self.service_identifier, other.kind()),
        };
        if self.constraints.is_empty() {
            implementation
        } else {
            let constraints = self
                .constraints
                .iter()
                .map(Constraint::describe)
                .collect::<Vec<_>>()
                .join(", ");
            format!("{} - {}", implementation, constraints)
        }
    }
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("id", &self.id)
            .field("service_identifier", &self.service_identifier)
            .field("strategy", &self.strategy)
            .field("scope", &self.scope)
            .field("constraints", &self.constraints)
            .field("on_activation", &self.on_activation.is_some())
            .field("on_deactivation", &self.on_deactivation.is_some())
            .finish()
    }
}

/// Fluent description of a binding, turned into a [`Binding`] on registration
pub struct BindingBuilder {
    service_identifier: ServiceIdentifier,
    strategy: Option<BindingStrategy>,
    scope: Option<BindingScope>,
    constraints: Vec<Constraint>,
    on_activation: Option<ActivationHook>,
    on_deactivation: Option<DeactivationHook>,
    self_type_check: Option<(bool, &'static str)>,
}

impl BindingBuilder {
    pub fn new(service_identifier: impl Into<ServiceIdentifier>) -> Self {
        Self {
            service_identifier: service_identifier.into(),
            strategy: None,
            scope: None,
            constraints: Vec::new(),
            on_activation: None,
            on_deactivation: None,
            self_type_check: None,
        }
    }

    pub fn service_identifier(&self) -> &ServiceIdentifier {
        &self.service_identifier
    }

    fn strategy(mut self, strategy: BindingStrategy) -> Self {
        self.strategy = Some(strategy);
        self
    }

    /// Construct `T` from its [`Injectable`] metadata
    pub fn to_type<T: Injectable>(self) -> Self {
        self.strategy(BindingStrategy::Type(ClassBinding::of::<T>()))
    }

    /// Construct `T` where the identifier is `T`'s own type key
    pub fn to_self<T: Injectable>(mut self) -> Self {
        self.self_type_check = Some((
            self.service_identifier.is_type::<T>(),
            std::any::type_name::<T>(),
        ));
        self.to_type::<T>()
    }

    /// Construct through a closure, with explicitly declared injection points
    pub fn to_constructor<T, F>(self, metadata: ClassMetadata, constructor: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(InjectedArgs) -> Result<T, ContainerError> + Send + Sync + 'static,
    {
        self.to_class(ClassBinding::from_constructor(metadata, constructor))
    }

    /// Construct through a prepared [`ClassBinding`]
    pub fn to_class(self, class: ClassBinding) -> Self {
        self.strategy(BindingStrategy::Constructor(class))
    }

    /// Always resolve to the given value
    pub fn to_constant_value<T: Send + Sync + 'static>(self, value: T) -> Self {
        self.strategy(BindingStrategy::Constant(Arc::new(value)))
    }

    /// Resolve through a function of the resolution context
    pub fn to_dynamic_value<T, F>(self, f: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(&Context) -> Result<T, ContainerError> + Send + Sync + 'static,
    {
        self.strategy(BindingStrategy::DynamicValue(Arc::new(move |context: &Context| {
            Ok(Activation::Ready(Arc::new(f(context)?) as Instance))
        })))
    }

    /// Resolve through an asynchronous function of the resolution context
    pub fn to_async_dynamic_value<T, F, Fut>(self, f: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(&Context) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, ContainerError>> + Send + 'static,
    {
        self.strategy(BindingStrategy::DynamicValue(Arc::new(move |context: &Context| {
            let future = f(context);
            Activation::from_future(future.map_ok(|value| Arc::new(value) as Instance))
        })))
    }

    /// Resolve to a synchronous factory built from the resolution context
    pub fn to_factory<A, T, F>(self, f: F) -> Self
    where
        A: 'static,
        T: 'static,
        F: Fn(&Context) -> Factory<A, T> + Send + Sync + 'static,
    {
        self.strategy(BindingStrategy::Factory(Arc::new(move |context: &Context| {
            Ok(Arc::new(f(context)) as Instance)
        })))
    }

    /// Resolve to an asynchronous provider built from the resolution context
    pub fn to_provider<A, T, F>(self, f: F) -> Self
    where
        A: 'static,
        T: 'static,
        F: Fn(&Context) -> Provider<A, T> + Send + Sync + 'static,
    {
        self.strategy(BindingStrategy::Provider(Arc::new(move |context: &Context| {
            Ok(Arc::new(f(context)) as Instance)
        })))
    }

    /// Forward to another identifier
    pub fn to_service(self, target: impl Into<ServiceIdentifier>) -> Self {
        self.strategy(BindingStrategy::Service(target.into()))
    }

    pub fn in_scope(mut self, scope: BindingScope) -> Self {
        self.scope = Some(scope);
        self
    }

    pub fn in_singleton_scope(self) -> Self {
        self.in_scope(BindingScope::Singleton)
    }

    pub fn in_transient_scope(self) -> Self {
        self.in_scope(BindingScope::Transient)
    }

    pub fn in_request_scope(self) -> Self {
        self.in_scope(BindingScope::Request)
    }

    /// Add a constraint, ANDed with the others
    pub fn with_constraint(mut self, constraint: Constraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    pub fn when<F>(self, predicate: F) -> Self
    where
        F: Fn(&RequestRef<'_>) -> bool + Send + Sync + 'static,
    {
        self.with_constraint(Constraint::custom(predicate))
    }

    pub fn when_target_named(self, name: impl Into<String>) -> Self {
        self.with_constraint(Constraint::Named(name.into()))
    }

    pub fn when_target_tagged(self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with_constraint(Constraint::Tagged(key.into(), value.into()))
    }

    pub fn when_target_is_default(self) -> Self {
        self.with_constraint(Constraint::TargetIsDefault)
    }

    pub fn when_injected_into(self, parent: impl Into<ServiceIdentifier>) -> Self {
        self.with_constraint(Constraint::ParentIs(parent.into()))
    }

    pub fn when_parent_named(self, name: impl Into<String>) -> Self {
        self.with_constraint(Constraint::ParentNamed(name.into()))
    }

    pub fn when_parent_tagged(self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with_constraint(Constraint::ParentTagged(key.into(), value.into()))
    }

    pub fn when_any_ancestor_is(self, ancestor: impl Into<ServiceIdentifier>) -> Self {
        self.with_constraint(Constraint::AncestorIs(ancestor.into()))
    }

    pub fn when_no_ancestor_is(self, ancestor: impl Into<ServiceIdentifier>) -> Self {
        self.with_constraint(Constraint::NoAncestorIs(ancestor.into()))
    }

    /// Run after each construction; may replace the instance
    pub fn on_activation<T, F>(mut self, hook: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(&Context, Arc<T>) -> Result<Arc<T>, ContainerError> + Send + Sync + 'static,
    {
        self.on_activation = Some(Arc::new(move |context: &Context, instance: Instance| {
            let typed = downcast::<T>(&instance, context.target().service_identifier.full_name())?;
            Ok(hook(context, typed)? as Instance)
        }));
        self
    }

    /// Run when a cached instance is evicted by unbinding
    pub fn on_deactivation<T, F>(mut self, hook: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(Arc<T>) -> Result<(), ContainerError> + Send + Sync + 'static,
    {
        self.on_deactivation = Some(Arc::new(move |instance: &Instance| {
            hook(downcast::<T>(instance, std::any::type_name::<T>())?)
        }));
        self
    }

    pub(crate) fn build(self, id: BindingId, default_scope: BindingScope) -> Result<Binding, ContainerError> {
        let service = self.service_identifier.to_string();
        let strategy = self.strategy.ok_or_else(|| ContainerError::InvalidBinding {
            service: service.clone(),
            message: "no strategy given, call one of the to_* methods".to_string(),
        })?;

        if let Some((is_self, type_name)) = self.self_type_check {
            if !is_self {
                return Err(ContainerError::InvalidBinding {
                    service,
                    message: format!("to_self requires the identifier to be the type key of {}", type_name),
                });
            }
        }

        let scope = match (&strategy, self.scope) {
            (BindingStrategy::Constant(_), _) => BindingScope::Singleton,
            (BindingStrategy::Service(_), Some(scope)) if scope != BindingScope::Transient => {
                return Err(ContainerError::InvalidBinding {
                    service,
                    message: "an alias forwards the target's scope and cannot declare its own".to_string(),
                });
            }
            (BindingStrategy::Service(_), _) => BindingScope::Transient,
            (_, Some(scope)) => scope,
            (_, None) => default_scope,
        };

        Ok(Binding {
            id,
            service_identifier: self.service_identifier,
            strategy,
            scope,
            constraints: self.constraints,
            on_activation: self.on_activation,
            on_deactivation: self.on_deactivation,
        })
    }
}
