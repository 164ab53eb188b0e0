use thiserror::Error;

use crate::config::ConfigError;
use crate::errors::messages;

/// Error type for binding, planning and resolution
///
/// Every variant carries plain strings so the error can be cloned and handed to
/// every waiter of a shared in-flight construction.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ContainerError {
    #[error("{} {chain}", messages::CIRCULAR_DEPENDENCY)]
    CircularDependency { chain: String },

    #[error("{} {service}{location}{metadata}", messages::NOT_REGISTERED)]
    UnresolvedBinding {
        service: String,
        location: String,
        metadata: String,
    },

    #[error("{} {service}{location}{metadata}\nRegistered bindings:{candidates}", messages::AMBIGUOUS_MATCH)]
    AmbiguousBinding {
        service: String,
        location: String,
        metadata: String,
        candidates: String,
    },

    #[error("{} {class}", messages::MULTIPLE_POST_CONSTRUCT_METHODS)]
    MultiplePostConstructHooks { class: String },

    #[error("Activation failed for serviceIdentifier {service}: {message}")]
    ActivationFailed { service: String, message: String },

    #[error("Service {service} resolved asynchronously, use the async lookup instead")]
    AsyncResolutionRequired { service: String },

    #[error("Type mismatch for serviceIdentifier {service}: expected {expected}")]
    TypeMismatch { service: String, expected: String },

    #[error("Invalid binding for {service}: {message}")]
    InvalidBinding { service: String, message: String },

    #[error("Plan for {service} exceeds the maximum depth of {max_depth}")]
    PlanTooDeep { service: String, max_depth: usize },

    #[error("Post-construct hook {hook} declared on {class} has no runner")]
    MissingPostConstruct { class: String, hook: String },

    #[error("Missing injection point {point} in {class}")]
    MissingInjection { class: String, point: String },

    #[error("Lock error on resource: {resource}")]
    LockError { resource: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("{message}")]
    Custom { message: String },
}

impl ContainerError {
    /// Create a circular dependency error from an identifier chain
    pub fn circular_dependency<I, S>(chain: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let chain = chain
            .into_iter()
            .map(|s| s.as_ref().to_string())
            .collect::<Vec<_>>()
            .join(" --> ");
        Self::CircularDependency { chain }
    }

    /// Create an activation failure for a service
    pub fn activation_failed(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ActivationFailed {
            service: service.into(),
            message: message.into(),
        }
    }

    /// Create a post-construction failure for a class
    pub fn post_construct_failed(
        service: impl Into<String>,
        class: &str,
        reason: impl std::fmt::Display,
    ) -> Self {
        Self::ActivationFailed {
            service: service.into(),
            message: messages::post_construct_error(class, reason),
        }
    }

    /// Create a free-form error, typically returned from user strategies
    pub fn custom(message: impl Into<String>) -> Self {
        Self::Custom {
            message: message.into(),
        }
    }

    /// Create a type mismatch error
    pub fn type_mismatch<T: ?Sized>(service: impl Into<String>) -> Self {
        Self::TypeMismatch {
            service: service.into(),
            expected: std::any::type_name::<T>().to_string(),
        }
    }

    /// Create a lock error
    pub fn lock(resource: impl Into<String>) -> Self {
        Self::LockError {
            resource: resource.into(),
        }
    }

    /// Check if the error was raised while planning
    pub fn is_planning(&self) -> bool {
        matches!(
            self,
            Self::CircularDependency { .. }
                | Self::UnresolvedBinding { .. }
                | Self::AmbiguousBinding { .. }
                | Self::MultiplePostConstructHooks { .. }
        )
    }

    /// Check if the error is a circular dependency
    pub fn is_circular(&self) -> bool {
        matches!(self, Self::CircularDependency { .. })
    }

    /// Check if the error is an activation failure
    pub fn is_activation(&self) -> bool {
        matches!(self, Self::ActivationFailed { .. })
    }
}

impl From<ConfigError> for ContainerError {
    fn from(error: ConfigError) -> Self {
        Self::Configuration {
            message: error.to_string(),
        }
    }
}
