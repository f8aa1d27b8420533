//! Declarative route metadata attached to handler types.

/// Method used when a declaration names none explicitly.
pub const DEFAULT_METHOD: &str = "GET";

/// Implemented by handler types to declare their routes.
///
/// # Example
///
/// ```rust
/// use mochi_router::{HandlerMetadata, RouteDecl, Routes};
///
/// struct UserController;
///
/// impl Routes for UserController {
///     fn routes() -> HandlerMetadata {
///         HandlerMetadata::new()
///             .prefix("/users")
///             .route(RouteDecl::get("index", ""))
///             .route(RouteDecl::get("show", "/{id}"))
///             .route(RouteDecl::new("update", "/{id}").methods(["PUT", "PATCH"]).middleware(["json"]))
///     }
/// }
///
/// let metadata = UserController::routes();
/// assert_eq!(metadata.prefix_path(), "/users");
/// assert_eq!(metadata.routes().len(), 3);
/// ```
pub trait Routes {
    /// Returns the route declarations of this handler type.
    fn routes() -> HandlerMetadata;
}

/// Route declarations of one handler type, with an optional shared prefix.
#[derive(Debug, Clone, Default)]
pub struct HandlerMetadata {
    prefix: String,
    routes: Vec<RouteDecl>,
}

impl HandlerMetadata {
    /// Creates metadata with no prefix and no routes.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the path prefix prepended to every route template.
    #[must_use]
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Adds a route declaration.
    #[must_use]
    pub fn route(mut self, route: RouteDecl) -> Self {
        self.routes.push(route);
        self
    }

    /// Returns the prefix.
    #[must_use]
    pub fn prefix_path(&self) -> &str {
        &self.prefix
    }

    /// Returns the declarations in order.
    #[must_use]
    pub fn routes(&self) -> &[RouteDecl] {
        &self.routes
    }
}

/// One operation bound to a path template, HTTP methods and middleware.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteDecl {
    operation: String,
    path: String,
    methods: Vec<String>,
    middleware: Vec<String>,
}

impl RouteDecl {
    /// Declares `operation` at `path`, answering `GET` until
    /// [`RouteDecl::methods`] says otherwise.
    #[must_use]
    pub fn new(operation: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            path: path.into(),
            methods: vec![DEFAULT_METHOD.to_string()],
            middleware: Vec::new(),
        }
    }

    /// Declares a GET route.
    #[must_use]
    pub fn get(operation: impl Into<String>, path: impl Into<String>) -> Self {
        Self::new(operation, path)
    }

    /// Declares a POST route.
    #[must_use]
    pub fn post(operation: impl Into<String>, path: impl Into<String>) -> Self {
        Self::new(operation, path).methods(["POST"])
    }

    /// Declares a PUT route.
    #[must_use]
    pub fn put(operation: impl Into<String>, path: impl Into<String>) -> Self {
        Self::new(operation, path).methods(["PUT"])
    }

    /// Declares a PATCH route.
    #[must_use]
    pub fn patch(operation: impl Into<String>, path: impl Into<String>) -> Self {
        Self::new(operation, path).methods(["PATCH"])
    }

    /// Declares a DELETE route.
    #[must_use]
    pub fn delete(operation: impl Into<String>, path: impl Into<String>) -> Self {
        Self::new(operation, path).methods(["DELETE"])
    }

    /// Replaces the HTTP method list.
    #[must_use]
    pub fn methods<I, S>(mut self, methods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.methods = methods.into_iter().map(Into::into).collect();
        self
    }

    /// Appends middleware identifiers, outermost first.
    #[must_use]
    pub fn middleware<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.middleware.extend(ids.into_iter().map(Into::into));
        self
    }

    /// Returns the operation name.
    #[must_use]
    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// Returns the path template relative to the handler prefix.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns the declared HTTP methods as written.
    #[must_use]
    pub fn method_names(&self) -> &[String] {
        &self.methods
    }

    /// Returns the middleware identifiers.
    #[must_use]
    pub fn middleware_ids(&self) -> &[String] {
        &self.middleware
    }
}
