//! Message prefixes surfaced by [`ContainerError`](super::ContainerError).

pub const CIRCULAR_DEPENDENCY: &str = "Circular dependency found:";
pub const NOT_REGISTERED: &str = "No matching bindings found for serviceIdentifier:";
pub const AMBIGUOUS_MATCH: &str = "Ambiguous match found for serviceIdentifier:";
pub const MULTIPLE_POST_CONSTRUCT_METHODS: &str =
    "Cannot declare more than one post-construct hook in the same class:";

/// Message for a post-construction hook that failed
pub fn post_construct_error(class: &str, reason: impl std::fmt::Display) -> String {
    format!("post-construct error in class {}: {}", class, reason)
}
