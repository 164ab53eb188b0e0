use futures::future::{self, BoxFuture, FutureExt, TryFutureExt};
use std::any::Any;
use std::future::Future;
use std::sync::Arc;

use crate::errors::ContainerError;

/// Type-erased constructed service
pub type Instance = Arc<dyn Any + Send + Sync>;

/// A value that is either available now or still being produced
///
/// Strategies, post-construction hooks and the resolver all speak this type, so
/// the fan-in logic at each request is written once whether or not anything
/// below it suspended.
pub enum Activation<T> {
    Ready(T),
    Pending(BoxFuture<'static, Result<T, ContainerError>>),
}

impl<T: Send + 'static> Activation<T> {
    /// Wrap a future
    pub fn pending<F>(future: F) -> Self
    where
        F: Future<Output = Result<T, ContainerError>> + Send + 'static,
    {
        Activation::Pending(future.boxed())
    }

    /// Poll a future once and keep it pending only if it did not complete
    pub fn from_future<F>(future: F) -> Result<Self, ContainerError>
    where
        F: Future<Output = Result<T, ContainerError>> + Send + 'static,
    {
        let mut future = future.boxed();
        match (&mut future).now_or_never() {
            Some(result) => result.map(Activation::Ready),
            None => Ok(Activation::Pending(future)),
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Activation::Ready(_))
    }

    /// Transform the eventual value
    pub fn map<U, F>(self, f: F) -> Activation<U>
    where
        U: Send + 'static,
        F: FnOnce(T) -> U + Send + 'static,
    {
        match self {
            Activation::Ready(value) => Activation::Ready(f(value)),
            Activation::Pending(fut) => Activation::Pending(fut.map(|r| r.map(f)).boxed()),
        }
    }

    /// Transform the eventual error
    pub fn map_err<F>(self, f: F) -> Self
    where
        F: FnOnce(ContainerError) -> ContainerError + Send + 'static,
    {
        match self {
            Activation::Ready(value) => Activation::Ready(value),
            Activation::Pending(fut) => Activation::Pending(fut.map(|r| r.map_err(f)).boxed()),
        }
    }

    /// Chain a fallible step that may itself suspend
    pub fn and_then<U, F>(self, f: F) -> Result<Activation<U>, ContainerError>
    where
        U: Send + 'static,
        F: FnOnce(T) -> Result<Activation<U>, ContainerError> + Send + 'static,
    {
        match self {
            Activation::Ready(value) => f(value),
            Activation::Pending(fut) => Ok(Activation::Pending(
                fut.and_then(move |value| match f(value) {
                    Ok(next) => next.into_future(),
                    Err(error) => future::ready(Err(error)).boxed(),
                })
                .boxed(),
            )),
        }
    }

    /// Turn into a future regardless of readiness
    pub fn into_future(self) -> BoxFuture<'static, Result<T, ContainerError>> {
        match self {
            Activation::Ready(value) => future::ready(Ok(value)).boxed(),
            Activation::Pending(fut) => fut,
        }
    }

    /// Wait for every activation, preserving order
    pub fn join_all(activations: Vec<Activation<T>>) -> Activation<Vec<T>> {
        if activations.iter().all(Activation::is_ready) {
            let values = activations
                .into_iter()
                .filter_map(|activation| match activation {
                    Activation::Ready(value) => Some(value),
                    Activation::Pending(_) => None,
                })
                .collect();
            return Activation::Ready(values);
        }

        let futures = activations
            .into_iter()
            .map(Activation::into_future)
            .collect::<Vec<_>>();
        Activation::Pending(future::try_join_all(futures).boxed())
    }
}

impl<T> std::fmt::Debug for Activation<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Activation::Ready(_) => write!(f, "Ready(<value>)"),
            Activation::Pending(_) => write!(f, "Pending(<future>)"),
        }
    }
}

/// Resolved value of one request
#[derive(Clone)]
pub enum Injected {
    /// Optional target with no matching binding
    Missing,
    One(Instance),
    Many(Vec<Instance>),
}

impl Injected {
    pub fn is_missing(&self) -> bool {
        matches!(self, Injected::Missing)
    }

    /// Downcast a single value
    pub fn one<T: Send + Sync + 'static>(&self, service: &str) -> Result<Option<Arc<T>>, ContainerError> {
        match self {
            Injected::Missing => Ok(None),
            Injected::One(instance) => downcast::<T>(instance, service).map(Some),
            Injected::Many(_) => Err(ContainerError::type_mismatch::<T>(service)),
        }
    }

    /// Downcast every value, a single value becomes a one-element list
    pub fn all<T: Send + Sync + 'static>(&self, service: &str) -> Result<Vec<Arc<T>>, ContainerError> {
        match self {
            Injected::Missing => Ok(Vec::new()),
            Injected::One(instance) => Ok(vec![downcast::<T>(instance, service)?]),
            Injected::Many(instances) => instances
                .iter()
                .map(|instance| downcast::<T>(instance, service))
                .collect(),
        }
    }
}

impl std::fmt::Debug for Injected {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Injected::Missing => write!(f, "Missing"),
            Injected::One(_) => write!(f, "One(<instance>)"),
            Injected::Many(values) => write!(f, "Many({} instances)", values.len()),
        }
    }
}

/// Downcast a type-erased instance
pub fn downcast<T: Send + Sync + 'static>(instance: &Instance, service: &str) -> Result<Arc<T>, ContainerError> {
    instance
        .clone()
        .downcast::<T>()
        .map_err(|_| ContainerError::type_mismatch::<T>(service))
}
