use futures::future::{BoxFuture, FutureExt};
use std::future::Future;
use std::sync::Arc;

use crate::errors::ContainerError;

/// Synchronous callable produced by a `to_factory` binding
pub struct Factory<A, T> {
    f: Arc<dyn Fn(A) -> Result<T, ContainerError> + Send + Sync>,
}

impl<A, T> Factory<A, T> {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(A) -> Result<T, ContainerError> + Send + Sync + 'static,
    {
        Self { f: Arc::new(f) }
    }

    pub fn call(&self, args: A) -> Result<T, ContainerError> {
        (self.f)(args)
    }
}

impl<A, T> Clone for Factory<A, T> {
    fn clone(&self) -> Self {
        Self { f: self.f.clone() }
    }
}

/// Asynchronous callable produced by a `to_provider` binding
///
/// Each call is independent: nothing is cached between calls.
pub struct Provider<A, T> {
    f: Arc<dyn Fn(A) -> BoxFuture<'static, Result<T, ContainerError>> + Send + Sync>,
}

impl<A, T> Provider<A, T> {
    pub fn new<F, Fut>(f: F) -> Self
    where
        A: 'static,
        T: 'static,
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, ContainerError>> + Send + 'static,
    {
        Self {
            f: Arc::new(move |args: A| f(args).boxed()),
        }
    }

    pub fn call(&self, args: A) -> BoxFuture<'static, Result<T, ContainerError>> {
        (self.f)(args)
    }
}

impl<A, T> Clone for Provider<A, T> {
    fn clone(&self) -> Self {
        Self { f: self.f.clone() }
    }
}
