pub mod core;
pub mod messages;

pub use self::core::ContainerError;

/// Result alias used throughout the crate
pub type Result<T, E = ContainerError> = std::result::Result<T, E>;
