use serde::{Deserialize, Serialize};
use std::env;

use crate::config::ConfigError;
use crate::container::scope::BindingScope;

pub const ENV_DEFAULT_SCOPE: &str = "BINDERY_DEFAULT_SCOPE";
pub const ENV_PREFER_DEFAULT_BINDING: &str = "BINDERY_PREFER_DEFAULT_BINDING";
pub const ENV_MAX_PLAN_DEPTH: &str = "BINDERY_MAX_PLAN_DEPTH";

/// Container-wide options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ContainerOptions {
    /// Scope given to bindings that do not pick one explicitly
    pub default_scope: BindingScope,
    /// Resolve a single-value lookup to the only unconstrained binding when the
    /// lookup carries no name or tags (and to the only constrained one when it does)
    pub prefer_default_binding: bool,
    /// Upper bound on plan depth, guards against runaway graphs built by alias chains
    pub max_plan_depth: usize,
}

impl Default for ContainerOptions {
    fn default() -> Self {
        Self {
            default_scope: BindingScope::Transient,
            prefer_default_binding: true,
            max_plan_depth: 256,
        }
    }
}

impl ContainerOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the default binding scope
    pub fn with_default_scope(mut self, scope: BindingScope) -> Self {
        self.default_scope = scope;
        self
    }

    /// Enable or disable default-binding preference during disambiguation
    pub fn with_prefer_default_binding(mut self, prefer: bool) -> Self {
        self.prefer_default_binding = prefer;
        self
    }

    /// Set the maximum plan depth
    pub fn with_max_plan_depth(mut self, depth: usize) -> Self {
        self.max_plan_depth = depth;
        self
    }

    /// Load options from environment variables, falling back to defaults
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut options = Self::default();

        if let Ok(value) = env::var(ENV_DEFAULT_SCOPE) {
            options.default_scope = value.parse().map_err(|_| {
                ConfigError::invalid_value(
                    ENV_DEFAULT_SCOPE,
                    value.clone(),
                    "singleton, transient or request",
                )
            })?;
        }

        if let Ok(value) = env::var(ENV_PREFER_DEFAULT_BINDING) {
            options.prefer_default_binding = parse_bool(ENV_PREFER_DEFAULT_BINDING, &value)?;
        }

        if let Ok(value) = env::var(ENV_MAX_PLAN_DEPTH) {
            options.max_plan_depth = value.parse().map_err(|_| {
                ConfigError::invalid_value(ENV_MAX_PLAN_DEPTH, value.clone(), "a positive integer")
            })?;
        }

        options.validate()?;
        Ok(options)
    }

    /// Load options from a YAML document
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let options: Self = serde_yaml::from_str(yaml)?;
        options.validate()?;
        Ok(options)
    }

    /// Validate the options
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_plan_depth == 0 {
            return Err(ConfigError::validation_failed(
                "max_plan_depth must be greater than zero",
            ));
        }
        Ok(())
    }
}

fn parse_bool(field: &str, value: &str) -> Result<bool, ConfigError> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::invalid_value(field, value, "true or false")),
    }
}
