pub mod activation;
pub mod binding;
pub mod constraint;
pub mod context;
pub mod factory;
pub mod identifier;
pub mod ioc_container;
pub mod metadata;
pub mod plan;
pub mod registry;
pub(crate) mod resolver;
pub mod scope;
pub mod target;

pub use activation::{downcast, Activation, Injected, Instance};
pub use binding::{Binding, BindingBuilder, BindingId, BindingStrategy};
pub use constraint::{type_constraint, Constraint};
pub use context::Context;
pub use factory::{Factory, Provider};
pub use identifier::ServiceIdentifier;
pub use ioc_container::Container;
pub use metadata::{
    inject, ClassBinding, ClassMetadata, Injectable, InjectedArgs, MetadataReader, MetadataTable,
    ResolvedMetadata,
};
pub use plan::{Plan, RequestId, RequestNode, RequestRef};
pub use registry::BindingRegistry;
pub use scope::{BindingScope, ScopeCache};
pub use target::{Target, TargetKind};
