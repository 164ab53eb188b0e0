pub mod config;
pub mod container;
pub mod errors;

// Re-export key types for convenience
pub use config::{ConfigError, ContainerOptions};
pub use container::{
    inject, Activation, Binding, BindingBuilder, BindingId, BindingScope, ClassBinding, ClassMetadata,
    Constraint, Container, Context, Factory, Injectable, Injected, InjectedArgs, Instance, MetadataReader,
    MetadataTable, Plan, Provider, RequestRef, ServiceIdentifier, Target, TargetKind,
};
pub use errors::ContainerError;

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const LIBRARY_NAME: &str = "bindery";

/// Get library version
pub fn version() -> &'static str {
    VERSION
}

/// Get library name
pub fn name() -> &'static str {
    LIBRARY_NAME
}
