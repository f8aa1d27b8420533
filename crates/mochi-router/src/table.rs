//! The route table.
//!
//! Routes are kept in registration order, one entry per distinct template,
//! each entry holding a method map. Lookup scans entries in order and stops
//! at the first entry that matches the path *and* answers the method. An
//! entry that matches the path under other methods only is remembered, so a
//! miss can be reported as "method not allowed" rather than "not found".

use crate::metadata::{HandlerMetadata, Routes};
use crate::pattern::RoutePattern;
use http::Method;
use indexmap::IndexMap;
use mochi_core::{PathParams, RegistrationError, TypeKey};
use std::fmt;
use std::sync::Arc;

/// What runs for one (pattern, method) binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionDescriptor {
    handler: TypeKey,
    operation: String,
    middleware: Vec<String>,
}

impl ActionDescriptor {
    /// Creates a descriptor.
    #[must_use]
    pub fn new(handler: TypeKey, operation: impl Into<String>, middleware: Vec<String>) -> Self {
        Self {
            handler,
            operation: operation.into(),
            middleware,
        }
    }

    /// Returns the handler type.
    #[must_use]
    pub const fn handler(&self) -> TypeKey {
        self.handler
    }

    /// Returns the operation name.
    #[must_use]
    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// Returns the middleware identifiers, outermost first.
    #[must_use]
    pub fn middleware(&self) -> &[String] {
        &self.middleware
    }

    /// `Handler::operation`, for diagnostics.
    #[must_use]
    pub fn qualified_name(&self) -> String {
        format!("{}::{}", self.handler.short_name(), self.operation)
    }
}

#[derive(Debug)]
struct RouteEntry {
    pattern: RoutePattern,
    actions: IndexMap<Method, Arc<ActionDescriptor>>,
}

/// A successful lookup.
#[derive(Debug)]
pub struct RouteMatch<'a> {
    /// The bound action.
    pub action: &'a Arc<ActionDescriptor>,
    /// Captured path parameters.
    pub params: PathParams,
    /// The template that matched.
    pub template: &'a str,
}

/// Outcome of [`RouteTable::lookup`].
#[derive(Debug)]
pub enum RouteLookup<'a> {
    /// A route answers this method and path.
    Found(RouteMatch<'a>),
    /// The path matched, but only under other methods.
    MethodNotAllowed {
        /// Methods answered by the matching templates, in registration order.
        allowed: Vec<Method>,
    },
    /// No template matched the path.
    NotFound,
}

impl RouteLookup<'_> {
    /// Returns `true` for [`RouteLookup::Found`].
    #[must_use]
    pub const fn is_found(&self) -> bool {
        matches!(self, Self::Found(_))
    }
}

/// Ordered mapping from path patterns to per-method actions.
///
/// # Example
///
/// ```rust
/// use mochi_router::{HandlerMetadata, RouteDecl, RouteLookup, RouteTable, Routes};
/// use http::Method;
///
/// struct UserController;
///
/// impl Routes for UserController {
///     fn routes() -> HandlerMetadata {
///         HandlerMetadata::new().route(RouteDecl::get("show", "/users/{id}"))
///     }
/// }
///
/// let mut table = RouteTable::new();
/// table.register::<UserController>().unwrap();
///
/// match table.lookup(&Method::GET, "/users/42") {
///     RouteLookup::Found(found) => {
///         assert_eq!(found.action.operation(), "show");
///         assert_eq!(found.params.get("id"), Some("42"));
///     }
///     other => panic!("unexpected {other:?}"),
/// }
///
/// assert!(matches!(
///     table.lookup(&Method::POST, "/users/42"),
///     RouteLookup::MethodNotAllowed { .. }
/// ));
/// assert!(matches!(table.lookup(&Method::GET, "/unknown"), RouteLookup::NotFound));
/// ```
#[derive(Default)]
pub struct RouteTable {
    entries: IndexMap<String, RouteEntry>,
}

impl RouteTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers every route declared by `H`.
    ///
    /// Returns the number of (pattern, method) bindings written.
    pub fn register<H: Routes + 'static>(&mut self) -> Result<usize, RegistrationError> {
        self.register_metadata(TypeKey::of::<H>(), &H::routes())
    }

    /// Registers routes for `handler` from explicit metadata.
    ///
    /// Every declaration is validated before anything is written, so a
    /// failing handler leaves the table untouched. A (pattern, method) pair
    /// registered again is overwritten by the later registration.
    pub fn register_metadata(
        &mut self,
        handler: TypeKey,
        metadata: &HandlerMetadata,
    ) -> Result<usize, RegistrationError> {
        let mut pending = Vec::with_capacity(metadata.routes().len());

        for decl in metadata.routes() {
            let descriptor = Arc::new(ActionDescriptor::new(
                handler,
                decl.operation(),
                decl.middleware_ids().to_vec(),
            ));
            let owner = descriptor.qualified_name();

            if decl.method_names().is_empty() {
                return Err(RegistrationError::NoMethods { owner });
            }
            let methods = decl
                .method_names()
                .iter()
                .map(|name| parse_method(name, &owner))
                .collect::<Result<Vec<_>, _>>()?;

            let template = format!("{}{}", metadata.prefix_path(), decl.path());
            let pattern = RoutePattern::compile(&template)?;

            pending.push((template, pattern, methods, descriptor));
        }

        let mut written = 0;
        for (template, pattern, methods, descriptor) in pending {
            let entry = self
                .entries
                .entry(template)
                .or_insert_with(|| RouteEntry {
                    pattern,
                    actions: IndexMap::new(),
                });

            for method in methods {
                if let Some(previous) = entry.actions.insert(method.clone(), Arc::clone(&descriptor)) {
                    tracing::warn!(
                        template = entry.pattern.template(),
                        method = %method,
                        previous = %previous.qualified_name(),
                        current = %descriptor.qualified_name(),
                        "route binding overwritten"
                    );
                }
                written += 1;
            }
        }

        tracing::debug!(handler = handler.short_name(), bindings = written, "handler routes registered");
        Ok(written)
    }

    /// Finds the action for `method` and `path`.
    pub fn lookup(&self, method: &Method, path: &str) -> RouteLookup<'_> {
        let mut allowed: Vec<Method> = Vec::new();

        for (template, entry) in &self.entries {
            if !entry.pattern.is_match(path) {
                continue;
            }

            if let Some(action) = entry.actions.get(method) {
                return RouteLookup::Found(RouteMatch {
                    action,
                    params: entry.pattern.captures(path).unwrap_or_default(),
                    template,
                });
            }

            for candidate in entry.actions.keys() {
                if !allowed.contains(candidate) {
                    allowed.push(candidate.clone());
                }
            }
        }

        if allowed.is_empty() {
            RouteLookup::NotFound
        } else {
            RouteLookup::MethodNotAllowed { allowed }
        }
    }

    /// Returns the number of distinct patterns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns every binding as `(template, method, action)` in table order.
    pub fn bindings(&self) -> impl Iterator<Item = (&str, &Method, &Arc<ActionDescriptor>)> {
        self.entries.iter().flat_map(|(template, entry)| {
            entry
                .actions
                .iter()
                .map(move |(method, action)| (template.as_str(), method, action))
        })
    }

    /// Returns the distinct handler types referenced by the table.
    #[must_use]
    pub fn handlers(&self) -> Vec<TypeKey> {
        let mut handlers: Vec<TypeKey> = Vec::new();
        for (_, _, action) in self.bindings() {
            if !handlers.contains(&action.handler()) {
                handlers.push(action.handler());
            }
        }
        handlers
    }
}

impl fmt::Debug for RouteTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(
                self.entries
                    .iter()
                    .map(|(template, entry)| (template, entry.actions.keys().collect::<Vec<_>>())),
            )
            .finish()
    }
}

fn parse_method(name: &str, owner: &str) -> Result<Method, RegistrationError> {
    let normalized = name.trim().to_ascii_uppercase();
    if normalized.is_empty() {
        return Err(RegistrationError::InvalidMethod {
            owner: owner.to_string(),
            method: name.to_string(),
        });
    }
    Method::from_bytes(normalized.as_bytes()).map_err(|_| RegistrationError::InvalidMethod {
        owner: owner.to_string(),
        method: name.to_string(),
    })
}
