//! Middleware registry.
//!
//! Routes reference middleware by identifier. The registry maps each
//! identifier to either a type resolved through the [`Resolver`] (and so
//! cached like any other service) or a pre-built instance.

use crate::middleware::Middleware;
use mochi_core::di::Injectable;
use mochi_core::{ResolutionError, Resolver};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Resolves a middleware instance as a trait object.
pub type MiddlewareFactory = fn(&Resolver) -> Result<Arc<dyn Middleware>, ResolutionError>;

fn resolve_middleware<M: Middleware + Injectable>(
    resolver: &Resolver,
) -> Result<Arc<dyn Middleware>, ResolutionError> {
    resolver.resolve::<M>().map(|m| m as Arc<dyn Middleware>)
}

#[derive(Clone)]
enum Source {
    Resolved(MiddlewareFactory),
    Instance(Arc<dyn Middleware>),
}

/// Errors produced when turning middleware identifiers into instances.
#[derive(Error, Debug)]
pub enum MiddlewareError {
    /// No middleware is registered under the identifier.
    #[error("unknown middleware `{0}`")]
    Unknown(String),

    /// The middleware type could not be constructed.
    #[error(transparent)]
    Resolution(#[from] ResolutionError),
}

/// Maps middleware identifiers to their sources.
#[derive(Clone, Default)]
pub struct MiddlewareRegistry {
    entries: HashMap<String, Source>,
}

impl MiddlewareRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `M` under `id` and adds its provider to `resolver`.
    ///
    /// Instances are created lazily on first use and shared afterwards.
    /// Registering the same identifier again replaces the earlier entry.
    pub fn register<M>(&mut self, id: impl Into<String>, resolver: &mut Resolver)
    where
        M: Middleware + Injectable,
    {
        resolver.provide::<M>();
        let id = id.into();
        tracing::debug!(middleware = %id, "registered middleware type");
        self.entries
            .insert(id, Source::Resolved(resolve_middleware::<M>));
    }

    /// Registers a ready-made instance under `id`.
    pub fn register_instance(&mut self, id: impl Into<String>, middleware: Arc<dyn Middleware>) {
        let id = id.into();
        tracing::debug!(middleware = %id, name = middleware.name(), "registered middleware instance");
        self.entries.insert(id, Source::Instance(middleware));
    }

    /// Returns `true` if `id` is registered.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    /// Returns the number of registered identifiers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the registered identifiers, sorted.
    #[must_use]
    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    /// Resolves one middleware.
    pub fn resolve(
        &self,
        id: &str,
        resolver: &Resolver,
    ) -> Result<Arc<dyn Middleware>, MiddlewareError> {
        match self.entries.get(id) {
            Some(Source::Resolved(factory)) => Ok(factory(resolver)?),
            Some(Source::Instance(instance)) => Ok(Arc::clone(instance)),
            None => Err(MiddlewareError::Unknown(id.to_string())),
        }
    }

    /// Resolves a list of middleware, preserving order.
    pub fn resolve_all<S: AsRef<str>>(
        &self,
        ids: &[S],
        resolver: &Resolver,
    ) -> Result<Vec<Arc<dyn Middleware>>, MiddlewareError> {
        ids.iter()
            .map(|id| self.resolve(id.as_ref(), resolver))
            .collect()
    }
}

impl fmt::Debug for MiddlewareRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MiddlewareRegistry")
            .field("ids", &self.ids())
            .finish()
    }
}
