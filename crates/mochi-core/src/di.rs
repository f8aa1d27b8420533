//! Dependency resolution.
//!
//! Handlers and middleware are not built by hand. Each type declares its
//! constructor parameters through [`Injectable`], is registered with a
//! [`Resolver`] at startup, and is constructed lazily the first time a request
//! needs it. Constructed instances are cached for the life of the process.
//!
//! Parameters come in two kinds:
//!
//! - [`Parameter::service`] names another type. If a provider (or a seeded
//!   instance) exists for it, it is resolved recursively; otherwise the
//!   argument is absent.
//! - [`Parameter::value`] is a plain value. It is never resolved and is
//!   absent unless a default was declared.
//!
//! # Example
//!
//! ```rust
//! use mochi_core::di::{Arguments, Injectable, Parameter, Resolver};
//! use mochi_core::ResolutionError;
//! use std::sync::Arc;
//!
//! struct Database {
//!     url: String,
//! }
//!
//! impl Injectable for Database {
//!     fn parameters() -> Vec<Parameter> {
//!         vec![Parameter::value_or("url", "postgres://localhost/app")]
//!     }
//!
//!     fn construct(args: &Arguments<'_>) -> Result<Self, ResolutionError> {
//!         Ok(Self { url: args.value("url")? })
//!     }
//! }
//!
//! struct UserRepository {
//!     db: Arc<Database>,
//! }
//!
//! impl Injectable for UserRepository {
//!     fn parameters() -> Vec<Parameter> {
//!         vec![Parameter::service::<Database>("db")]
//!     }
//!
//!     fn construct(args: &Arguments<'_>) -> Result<Self, ResolutionError> {
//!         Ok(Self { db: args.service("db")? })
//!     }
//! }
//!
//! let mut resolver = Resolver::new();
//! resolver.provide::<Database>();
//! resolver.provide::<UserRepository>();
//!
//! let repo = resolver.resolve::<UserRepository>().unwrap();
//! assert_eq!(repo.db.url, "postgres://localhost/app");
//! assert!(Arc::ptr_eq(&repo, &resolver.resolve::<UserRepository>().unwrap()));
//! ```

use crate::error::{ResolutionChain, ResolutionError};
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// A type-erased, shareable instance held by the resolver cache.
pub type Instance = Arc<dyn Any + Send + Sync>;

/// Identifies a resolvable type.
///
/// Equality and hashing use the [`TypeId`]; the name is carried for
/// diagnostics.
#[derive(Clone, Copy)]
pub struct TypeKey {
    id: TypeId,
    name: &'static str,
}

impl TypeKey {
    /// Returns the key for `T`.
    #[must_use]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// Returns the fully qualified type name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Returns the type name without its module path.
    #[must_use]
    pub fn short_name(&self) -> &'static str {
        let base = self.name.split('<').next().unwrap_or(self.name);
        base.rsplit("::").next().unwrap_or(base)
    }
}

impl PartialEq for TypeKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeKey {}

impl Hash for TypeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TypeKey").field(&self.name).finish()
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// One declared constructor parameter.
#[derive(Debug, Clone)]
pub enum Parameter {
    /// A dependency on another resolvable type.
    Service {
        /// Parameter name used by [`Arguments`].
        name: &'static str,
        /// The type to resolve.
        key: TypeKey,
    },
    /// A plain value that the resolver never constructs.
    Value {
        /// Parameter name used by [`Arguments`].
        name: &'static str,
        /// Value supplied when nothing else is available.
        default: Option<serde_json::Value>,
    },
}

impl Parameter {
    /// Declares a dependency on `T`.
    #[must_use]
    pub fn service<T: Send + Sync + 'static>(name: &'static str) -> Self {
        Self::Service {
            name,
            key: TypeKey::of::<T>(),
        }
    }

    /// Declares a plain value with no default.
    #[must_use]
    pub const fn value(name: &'static str) -> Self {
        Self::Value {
            name,
            default: None,
        }
    }

    /// Declares a plain value with a default.
    #[must_use]
    pub fn value_or(name: &'static str, default: impl Into<serde_json::Value>) -> Self {
        Self::Value {
            name,
            default: Some(default.into()),
        }
    }

    /// Returns the parameter name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Service { name, .. } | Self::Value { name, .. } => name,
        }
    }
}

/// A type the resolver knows how to construct.
pub trait Injectable: Send + Sync + Sized + 'static {
    /// Constructor parameters, in declaration order.
    fn parameters() -> Vec<Parameter> {
        Vec::new()
    }

    /// Builds the instance from resolved arguments.
    fn construct(args: &Arguments<'_>) -> Result<Self, ResolutionError>;
}

enum Slot {
    Service(Instance),
    Value(serde_json::Value),
}

/// Arguments handed to [`Injectable::construct`].
///
/// Arguments are looked up by parameter name.
pub struct Arguments<'a> {
    owner: TypeKey,
    parameters: &'a [Parameter],
    slots: Vec<Option<Slot>>,
    chain: &'a [TypeKey],
}

impl Arguments<'_> {
    /// Returns the type being constructed.
    #[must_use]
    pub const fn owner(&self) -> TypeKey {
        self.owner
    }

    /// Returns a required service argument.
    ///
    /// An absent argument fails with [`ResolutionError::Unregistered`] naming `T`.
    pub fn service<T: Send + Sync + 'static>(
        &self,
        name: &'static str,
    ) -> Result<Arc<T>, ResolutionError> {
        self.optional_service::<T>(name)?
            .ok_or_else(|| ResolutionError::Unregistered {
                type_name: std::any::type_name::<T>(),
                chain: self.chain_with(None),
            })
    }

    /// Returns a service argument, `None` when its type is not resolvable.
    pub fn optional_service<T: Send + Sync + 'static>(
        &self,
        name: &'static str,
    ) -> Result<Option<Arc<T>>, ResolutionError> {
        match self.slot(name)? {
            None => Ok(None),
            Some(Slot::Service(instance)) => instance
                .clone()
                .downcast::<T>()
                .map(Some)
                .map_err(|_| self.mismatch::<T>(name)),
            Some(Slot::Value(_)) => Err(self.mismatch::<T>(name)),
        }
    }

    /// Returns a required value argument.
    pub fn value<T: DeserializeOwned>(&self, name: &'static str) -> Result<T, ResolutionError> {
        self.optional_value(name)?
            .ok_or_else(|| self.missing(name))
    }

    /// Returns a value argument, `None` when it has no default.
    pub fn optional_value<T: DeserializeOwned>(
        &self,
        name: &'static str,
    ) -> Result<Option<T>, ResolutionError> {
        match self.slot(name)? {
            None => Ok(None),
            Some(Slot::Value(value)) => serde_json::from_value(value.clone())
                .map(Some)
                .map_err(|_| self.mismatch::<T>(name)),
            Some(Slot::Service(_)) => Err(self.mismatch::<T>(name)),
        }
    }

    /// Builds a construction failure attributed to the owner type.
    #[must_use]
    pub fn fail(&self, reason: impl Into<String>) -> ResolutionError {
        ResolutionError::Construction {
            type_name: self.owner.name(),
            reason: reason.into(),
            chain: self.chain_with(None),
        }
    }

    fn slot(&self, name: &'static str) -> Result<Option<&Slot>, ResolutionError> {
        let index = self
            .parameters
            .iter()
            .position(|p| p.name() == name)
            .ok_or_else(|| self.missing(name))?;
        Ok(self.slots[index].as_ref())
    }

    fn missing(&self, parameter: &'static str) -> ResolutionError {
        ResolutionError::MissingArgument {
            type_name: self.owner.name(),
            parameter,
            chain: self.chain_with(None),
        }
    }

    fn mismatch<T>(&self, parameter: &'static str) -> ResolutionError {
        ResolutionError::TypeMismatch {
            type_name: self.owner.name(),
            parameter,
            expected: std::any::type_name::<T>(),
            chain: self.chain_with(None),
        }
    }

    fn chain_with(&self, tail: Option<TypeKey>) -> ResolutionChain {
        chain_names(self.chain, tail)
    }
}

fn chain_names(chain: &[TypeKey], tail: Option<TypeKey>) -> ResolutionChain {
    ResolutionChain::new(
        chain
            .iter()
            .chain(tail.as_ref())
            .map(TypeKey::name)
            .collect(),
    )
}

type Construct = fn(&Arguments<'_>) -> Result<Instance, ResolutionError>;

struct Provider {
    parameters: Vec<Parameter>,
    construct: Construct,
}

fn construct_erased<T: Injectable>(args: &Arguments<'_>) -> Result<Instance, ResolutionError> {
    T::construct(args).map(|value| Arc::new(value) as Instance)
}

/// Constructs and caches instances of registered types.
///
/// Providers are registered through `&mut self` before serving begins; the
/// resolver is then shared (typically behind an `Arc`) and resolution only
/// needs `&self`.
///
/// # Thread Safety
///
/// The cache sits behind a read-write lock. Cache hits take the read lock.
/// A miss takes the write lock, re-checks, and builds the whole missing
/// object graph while holding it, so at most one instance is ever
/// constructed per type, even when many threads race on a cold cache.
/// Constructors receive only [`Arguments`] and cannot re-enter the resolver.
#[derive(Default)]
pub struct Resolver {
    providers: HashMap<TypeKey, Provider>,
    cache: RwLock<HashMap<TypeKey, Instance>>,
}

impl Resolver {
    /// Creates an empty resolver.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `T` for lazy construction.
    ///
    /// Registering a type twice replaces its provider.
    pub fn provide<T: Injectable>(&mut self) {
        let key = TypeKey::of::<T>();
        tracing::debug!(type_name = key.name(), "provider registered");
        self.providers.insert(
            key,
            Provider {
                parameters: T::parameters(),
                construct: construct_erased::<T>,
            },
        );
    }

    /// Seeds the cache with an already constructed instance.
    pub fn provide_instance<T: Send + Sync + 'static>(&mut self, instance: Arc<T>) {
        let key = TypeKey::of::<T>();
        tracing::debug!(type_name = key.name(), "instance registered");
        self.cache.get_mut().insert(key, instance);
    }

    /// Returns `true` if `T` can be resolved.
    #[must_use]
    pub fn contains<T: 'static>(&self) -> bool {
        self.contains_key(TypeKey::of::<T>())
    }

    /// Returns `true` if the type behind `key` can be resolved.
    #[must_use]
    pub fn contains_key(&self, key: TypeKey) -> bool {
        self.providers.contains_key(&key) || self.cache.read().contains_key(&key)
    }

    /// Returns `true` if an instance of `T` has already been constructed.
    #[must_use]
    pub fn is_cached<T: 'static>(&self) -> bool {
        self.cache.read().contains_key(&TypeKey::of::<T>())
    }

    /// Returns the number of registered providers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    /// Returns `true` if no providers are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Resolves `T`, constructing it and its dependencies on first use.
    pub fn resolve<T: Send + Sync + 'static>(&self) -> Result<Arc<T>, ResolutionError> {
        let key = TypeKey::of::<T>();
        self.resolve_key(key)?
            .downcast::<T>()
            .map_err(|_| ResolutionError::Construction {
                type_name: key.name(),
                reason: "cached instance has an unexpected type".to_string(),
                chain: chain_names(&[], Some(key)),
            })
    }

    /// Resolves the type behind `key` without downcasting.
    pub fn resolve_key(&self, key: TypeKey) -> Result<Instance, ResolutionError> {
        if let Some(instance) = self.cache.read().get(&key) {
            return Ok(Arc::clone(instance));
        }

        let mut cache = self.cache.write();
        let mut chain = Vec::new();
        self.build(key, &mut cache, &mut chain)
    }

    fn build(
        &self,
        key: TypeKey,
        cache: &mut HashMap<TypeKey, Instance>,
        chain: &mut Vec<TypeKey>,
    ) -> Result<Instance, ResolutionError> {
        if let Some(instance) = cache.get(&key) {
            return Ok(Arc::clone(instance));
        }

        if chain.contains(&key) {
            return Err(ResolutionError::Cycle {
                type_name: key.name(),
                chain: chain_names(chain, Some(key)),
            });
        }

        let provider = self
            .providers
            .get(&key)
            .ok_or_else(|| ResolutionError::Unregistered {
                type_name: key.name(),
                chain: chain_names(chain, Some(key)),
            })?;

        chain.push(key);

        let mut slots = Vec::with_capacity(provider.parameters.len());
        for parameter in &provider.parameters {
            let slot = match parameter {
                Parameter::Service { key: dependency, .. } => {
                    if self.providers.contains_key(dependency) || cache.contains_key(dependency) {
                        Some(Slot::Service(self.build(*dependency, cache, chain)?))
                    } else {
                        None
                    }
                }
                Parameter::Value { default, .. } => default.clone().map(Slot::Value),
            };
            slots.push(slot);
        }

        let args = Arguments {
            owner: key,
            parameters: &provider.parameters,
            slots,
            chain: chain.as_slice(),
        };
        let instance = (provider.construct)(&args)?;

        chain.pop();
        cache.insert(key, Arc::clone(&instance));
        tracing::debug!(type_name = key.name(), "instance constructed");

        Ok(instance)
    }
}

impl fmt::Debug for Resolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolver")
            .field("provider_count", &self.providers.len())
            .field("cached_count", &self.cache.read().len())
            .finish()
    }
}
