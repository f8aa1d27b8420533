//! The application kernel.
//!
//! A [`Kernel`] wraps the [`Dispatcher`] in the global middleware stack.
//! Global middleware runs for every request, matched or not, before routing
//! happens. The kernel always produces a response.

use crate::dispatcher::Dispatcher;
use crate::error::DispatchError;
use mochi_config::ViewsConfig;
use mochi_core::di::Injectable;
use mochi_core::renderer::{Renderer, TemplateRenderer};
use mochi_core::{
    handler_factory, Handler, HandlerFactory, RegistrationError, Request, Resolver, Response,
    TypeKey,
};
use mochi_middleware::{build_chain, Middleware, MiddlewareRegistry};
use mochi_router::{RouteTable, Routes};
use std::collections::HashMap;
use std::sync::Arc;

/// Dispatcher plus global middleware.
#[derive(Debug)]
pub struct Kernel {
    dispatcher: Dispatcher,
    global: Vec<String>,
}

impl Kernel {
    /// Returns a builder.
    #[must_use]
    pub fn builder() -> KernelBuilder {
        KernelBuilder::new()
    }

    /// Handles one request end to end.
    pub fn handle(&self, request: &Request) -> Response {
        let global = match self
            .dispatcher
            .middleware()
            .resolve_all(&self.global, self.dispatcher.resolver())
        {
            Ok(global) => global,
            Err(err) => return crate::dispatcher::fallback(request, &DispatchError::Middleware(err)),
        };

        let head = build_chain(&global, |req: &Request| self.dispatcher.dispatch(req));
        head.run(request)
    }

    /// Returns the dispatcher.
    #[must_use]
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Returns the global middleware ids, outermost first.
    #[must_use]
    pub fn global_middleware(&self) -> &[String] {
        &self.global
    }
}

/// Assembles a [`Kernel`].
///
/// # Example
///
/// ```rust
/// use mochi_core::di::{Arguments, Injectable};
/// use mochi_core::{Handler, HandlerResult, PathParams, Request, ResolutionError, Response};
/// use mochi_middleware::JsonMiddleware;
/// use mochi_router::{HandlerMetadata, RouteDecl, Routes};
/// use mochi_server::Kernel;
/// use http::{Method, StatusCode};
///
/// struct Ping;
///
/// impl Injectable for Ping {
///     fn construct(_args: &Arguments<'_>) -> Result<Self, ResolutionError> {
///         Ok(Ping)
///     }
/// }
///
/// impl Routes for Ping {
///     fn routes() -> HandlerMetadata {
///         HandlerMetadata::new().route(RouteDecl::get("ping", "/ping"))
///     }
/// }
///
/// impl Handler for Ping {
///     fn call(&self, _: &str, _: &Request, _: Response, _: &PathParams) -> HandlerResult {
///         Ok(Some(Response::text(StatusCode::OK, "pong")))
///     }
/// }
///
/// let kernel = Kernel::builder()
///     .handler::<Ping>()
///     .unwrap()
///     .build()
///     .unwrap();
///
/// let response = kernel.handle(&Request::new(Method::GET, "/ping"));
/// assert_eq!(response.body().to_bytes().as_ref(), b"pong");
/// ```
#[derive(Default)]
pub struct KernelBuilder {
    resolver: Resolver,
    routes: RouteTable,
    handlers: HashMap<TypeKey, HandlerFactory>,
    middleware: MiddlewareRegistry,
    global: Vec<String>,
}

impl KernelBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler: its provider, its factory and its routes.
    pub fn handler<H>(mut self) -> Result<Self, RegistrationError>
    where
        H: Handler + Injectable + Routes,
    {
        self.routes.register::<H>()?;
        self.resolver.provide::<H>();
        self.handlers
            .insert(TypeKey::of::<H>(), handler_factory::<H>());
        Ok(self)
    }

    /// Registers a constructible service.
    pub fn service<T: Injectable>(mut self) -> Self {
        self.resolver.provide::<T>();
        self
    }

    /// Registers a ready-made service instance.
    pub fn instance<T: Send + Sync + 'static>(mut self, instance: T) -> Self {
        self.resolver.provide_instance(Arc::new(instance));
        self
    }

    /// Registers a middleware type under `id`.
    pub fn middleware<M>(mut self, id: impl Into<String>) -> Self
    where
        M: Middleware + Injectable,
    {
        self.middleware.register::<M>(id, &mut self.resolver);
        self
    }

    /// Registers a middleware instance under `id`.
    pub fn middleware_instance(mut self, id: impl Into<String>, middleware: impl Middleware) -> Self {
        self.middleware.register_instance(id, Arc::new(middleware));
        self
    }

    /// Appends a registered middleware id to the global stack.
    pub fn global_middleware(mut self, id: impl Into<String>) -> Self {
        self.global.push(id.into());
        self
    }

    /// Provides the [`Renderer`], with templates when a views path is set.
    pub fn views(self, views: &ViewsConfig) -> Self {
        let renderer = match &views.path {
            Some(path) => Renderer::new().with_templates(TemplateRenderer::new(path)),
            None => Renderer::new(),
        };
        self.instance(renderer)
    }

    /// Validates the registrations and builds the kernel.
    pub fn build(mut self) -> Result<Kernel, RegistrationError> {
        for id in &self.global {
            if !self.middleware.contains(id) {
                return Err(RegistrationError::UnknownMiddleware {
                    owner: "global middleware".to_string(),
                    id: id.clone(),
                });
            }
        }

        if !self.resolver.contains::<Renderer>() {
            self.resolver.provide_instance(Arc::new(Renderer::new()));
        }

        tracing::debug!(
            patterns = self.routes.len(),
            handlers = self.handlers.len(),
            middleware = self.middleware.len(),
            global = self.global.len(),
            "kernel built"
        );

        let dispatcher = Dispatcher::new(
            self.routes,
            Arc::new(self.resolver),
            self.handlers,
            self.middleware,
        )?;

        Ok(Kernel {
            dispatcher,
            global: self.global,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::{Method, StatusCode};
    use mochi_core::di::{Arguments, Parameter};
    use mochi_core::{HandlerResult, PathParams, ResolutionError};
    use mochi_middleware::{FnMiddleware, Next};
    use mochi_router::{HandlerMetadata, RouteDecl};

    struct Pages {
        renderer: Arc<Renderer>,
    }

    impl Injectable for Pages {
        fn parameters() -> Vec<Parameter> {
            vec![Parameter::service::<Renderer>("renderer")]
        }

        fn construct(args: &Arguments<'_>) -> Result<Self, ResolutionError> {
            Ok(Self {
                renderer: args.service("renderer")?,
            })
        }
    }

    impl Routes for Pages {
        fn routes() -> HandlerMetadata {
            HandlerMetadata::new()
                .route(RouteDecl::get("about", "/about"))
                .route(RouteDecl::get("secret", "/secret").middleware(["deny"]))
        }
    }

    impl Handler for Pages {
        fn call(&self, operation: &str, _: &Request, _: Response, _: &PathParams) -> HandlerResult {
            match operation {
                "about" => Ok(Some(self.renderer.render_json(
                    StatusCode::OK,
                    http::HeaderMap::new(),
                    &serde_json::json!({"page": "about"}),
                ))),
                _ => Ok(None),
            }
        }
    }

    fn kernel() -> Kernel {
        Kernel::builder()
            .handler::<Pages>()
            .unwrap()
            .middleware_instance(
                "deny",
                FnMiddleware::new("deny", |_: &Request, _: Next<'_>| {
                    Response::with_status(StatusCode::FORBIDDEN)
                }),
            )
            .middleware_instance(
                "tag",
                FnMiddleware::new("tag", |req: &Request, next: Next<'_>| {
                    next.run(req).with_header(
                        http::header::HeaderName::from_static("x-tag"),
                        http::HeaderValue::from_static("global"),
                    )
                }),
            )
            .global_middleware("tag")
            .build()
            .unwrap()
    }

    #[test]
    fn test_default_renderer_is_injected() {
        let response = kernel().handle(&Request::new(Method::GET, "/about"));
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.is_json());
    }

    #[test]
    fn test_global_middleware_wraps_unmatched_requests() {
        let kernel = kernel();
        let missing = kernel.handle(&Request::new(Method::GET, "/nowhere"));
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
        assert_eq!(missing.header("x-tag"), Some("global"));

        let matched = kernel.handle(&Request::new(Method::GET, "/about"));
        assert_eq!(matched.header("x-tag"), Some("global"));
    }

    #[test]
    fn test_route_middleware_short_circuits() {
        let response = kernel().handle(&Request::new(Method::GET, "/secret"));
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(response.header("x-tag"), Some("global"));
    }

    #[test]
    fn test_unknown_global_middleware() {
        let err = Kernel::builder()
            .global_middleware("cors")
            .build()
            .unwrap_err();
        assert!(matches!(err, RegistrationError::UnknownMiddleware { ref id, .. } if id == "cors"));
    }

    #[test]
    fn test_views_enable_templates() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("hello.html"), "Hello {{ name }}").unwrap();

        let kernel = Kernel::builder()
            .views(&ViewsConfig {
                path: Some(dir.path().to_path_buf()),
            })
            .build()
            .unwrap();

        let renderer = kernel.dispatcher().resolver().resolve::<Renderer>().unwrap();
        let response = renderer
            .render_template(
                StatusCode::OK,
                "hello.html",
                serde_json::json!({"name": "Mochi"}),
                http::HeaderMap::new(),
            )
            .unwrap();
        assert_eq!(response.body().to_bytes().as_ref(), b"Hello Mochi");
    }
}
