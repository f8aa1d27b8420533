//! Request dispatch.
//!
//! The dispatcher looks the request up in the route table, resolves the
//! bound handler and the route's middleware through the shared resolver,
//! and runs the middleware chain around the handler operation.

use crate::error::DispatchError;
use mochi_core::{
    Handler, HandlerFactory, MochiError, PathParams, RegistrationError, Request, ResolutionChain,
    ResolutionError, Resolver, Response, TypeKey,
};
use mochi_middleware::{build_chain, MiddlewareError, MiddlewareRegistry, REQUEST_ID_HEADER};
use mochi_router::{ActionDescriptor, RouteLookup, RouteTable};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Routes requests to handler operations.
///
/// All state is read-only after construction except the resolver cache,
/// so one dispatcher serves any number of threads.
pub struct Dispatcher {
    routes: RouteTable,
    resolver: Arc<Resolver>,
    handlers: HashMap<TypeKey, HandlerFactory>,
    middleware: MiddlewareRegistry,
}

impl Dispatcher {
    /// Creates a dispatcher.
    ///
    /// Fails if a route references a handler with no factory, or a
    /// middleware id missing from `middleware`.
    pub fn new(
        routes: RouteTable,
        resolver: Arc<Resolver>,
        handlers: HashMap<TypeKey, HandlerFactory>,
        middleware: MiddlewareRegistry,
    ) -> Result<Self, RegistrationError> {
        for (template, method, action) in routes.bindings() {
            if !handlers.contains_key(&action.handler()) {
                return Err(RegistrationError::UnboundHandler {
                    handler: action.handler().name(),
                });
            }
            for id in action.middleware() {
                if !middleware.contains(id) {
                    return Err(RegistrationError::UnknownMiddleware {
                        owner: format!("{method} {template} ({})", action.qualified_name()),
                        id: id.clone(),
                    });
                }
            }
        }

        Ok(Self {
            routes,
            resolver,
            handlers,
            middleware,
        })
    }

    /// Returns the route table.
    #[must_use]
    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    /// Returns the resolver.
    #[must_use]
    pub fn resolver(&self) -> &Arc<Resolver> {
        &self.resolver
    }

    /// Returns the middleware registry.
    #[must_use]
    pub fn middleware(&self) -> &MiddlewareRegistry {
        &self.middleware
    }

    /// Dispatches a request, reporting misses and resolution failures.
    pub fn try_dispatch(&self, request: &Request) -> Result<Response, DispatchError> {
        let found = match self.routes.lookup(request.method(), request.path()) {
            RouteLookup::Found(found) => found,
            RouteLookup::MethodNotAllowed { allowed } => {
                return Err(DispatchError::MethodNotAllowed { allowed })
            }
            RouteLookup::NotFound => return Err(DispatchError::NotFound),
        };

        let action = found.action.as_ref();
        let handler = self.resolve_handler(action)?;
        let middleware = self
            .middleware
            .resolve_all(action.middleware(), &self.resolver)?;

        tracing::debug!(
            handler = action.handler().short_name(),
            operation = action.operation(),
            template = found.template,
            middleware = middleware.len(),
            "dispatching"
        );

        let params = found.params;
        let head = build_chain(&middleware, |req: &Request| {
            run_operation(handler.as_ref(), action, req, &params)
        });
        Ok(head.run(request))
    }

    /// Dispatches a request; misses and failures become fallback responses.
    ///
    /// - no route: 404
    /// - route under other methods only: 405 with `Allow`
    /// - handler or middleware not constructible: 500, logged with the
    ///   resolution chain
    pub fn dispatch(&self, request: &Request) -> Response {
        match self.try_dispatch(request) {
            Ok(response) => response,
            Err(err) => fallback(request, &err),
        }
    }

    fn resolve_handler(
        &self,
        action: &ActionDescriptor,
    ) -> Result<Arc<dyn Handler>, ResolutionError> {
        let key = action.handler();
        let factory = self
            .handlers
            .get(&key)
            .ok_or_else(|| ResolutionError::Unregistered {
                type_name: key.name(),
                chain: ResolutionChain::default(),
            })?;
        factory(&self.resolver)
    }
}

/// Invokes a handler operation. An operation that returns nothing yields
/// [`Response::absent`].
fn run_operation(
    handler: &dyn Handler,
    action: &ActionDescriptor,
    request: &Request,
    params: &PathParams,
) -> Response {
    match handler.call(action.operation(), request, Response::new(), params) {
        Ok(Some(response)) => response,
        Ok(None) => Response::absent(),
        Err(err) => {
            if let MochiError::Internal { source, .. } = &err {
                tracing::error!(
                    http.method = %request.method(),
                    http.path = request.path(),
                    handler = action.handler().short_name(),
                    operation = action.operation(),
                    error = %err,
                    cause = source.as_ref().map(|cause| format!("{cause:#}")).as_deref(),
                    "operation failed"
                );
            } else {
                tracing::debug!(
                    handler = action.handler().short_name(),
                    operation = action.operation(),
                    error = %err,
                    "operation returned an error"
                );
            }
            Response::from_error(&err, request.header(REQUEST_ID_HEADER))
        }
    }
}

pub(crate) fn fallback(request: &Request, err: &DispatchError) -> Response {
    match err {
        DispatchError::NotFound => {
            tracing::warn!(
                http.method = %request.method(),
                http.path = request.path(),
                "route not found"
            );
            Response::not_found()
        }
        DispatchError::MethodNotAllowed { allowed } => {
            tracing::warn!(
                http.method = %request.method(),
                http.path = request.path(),
                "method not allowed"
            );
            Response::method_not_allowed(allowed)
        }
        DispatchError::Resolution(e) => {
            tracing::error!(
                http.method = %request.method(),
                http.path = request.path(),
                type_name = e.type_name(),
                chain = %e.chain(),
                error = %e,
                "failed to resolve handler"
            );
            Response::server_error()
        }
        DispatchError::Middleware(MiddlewareError::Resolution(e)) => {
            tracing::error!(
                http.method = %request.method(),
                http.path = request.path(),
                type_name = e.type_name(),
                chain = %e.chain(),
                error = %e,
                "failed to resolve middleware"
            );
            Response::server_error()
        }
        DispatchError::Middleware(e) => {
            tracing::error!(
                http.method = %request.method(),
                http.path = request.path(),
                error = %e,
                "failed to resolve middleware"
            );
            Response::server_error()
        }
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("routes", &self.routes)
            .field("handlers", &self.handlers.len())
            .field("middleware", &self.middleware)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::{Method, StatusCode};
    use mochi_core::di::{Arguments, Injectable, Parameter};
    use mochi_core::{handler_factory, Body, HandlerResult};
    use mochi_middleware::{JsonMiddleware, Middleware, Next};
    use mochi_router::{HandlerMetadata, RouteDecl, Routes};
    use serde_json::json;
    use std::io;
    use std::sync::Mutex;

    struct Users;

    impl Injectable for Users {
        fn construct(_args: &Arguments<'_>) -> Result<Self, ResolutionError> {
            Ok(Self)
        }
    }

    impl Routes for Users {
        fn routes() -> HandlerMetadata {
            HandlerMetadata::new()
                .prefix("/users")
                .route(RouteDecl::get("show", "/{id}"))
                .route(RouteDecl::delete("destroy", "/{id}"))
                .route(RouteDecl::get("missing", "/{id}/missing"))
                .route(RouteDecl::get("export", "/{id}/export"))
        }
    }

    impl Handler for Users {
        fn call(
            &self,
            operation: &str,
            _request: &Request,
            _response: Response,
            params: &PathParams,
        ) -> HandlerResult {
            match operation {
                "show" => Ok(Some(Response::text(StatusCode::OK, params.require("id")?))),
                "destroy" => Ok(None),
                "missing" => Err(MochiError::not_found_resource("User", params.require("id")?)),
                "export" => Err(MochiError::internal_with_source(
                    "export failed",
                    io::Error::new(io::ErrorKind::TimedOut, "archive timed out"),
                )),
                other => Err(MochiError::unknown_operation("Users", other)),
            }
        }
    }

    struct Mailer;

    struct Orders;

    impl Injectable for Orders {
        fn parameters() -> Vec<Parameter> {
            vec![Parameter::service::<Mailer>("mailer")]
        }

        fn construct(args: &Arguments<'_>) -> Result<Self, ResolutionError> {
            args.service::<Mailer>("mailer")?;
            Ok(Self)
        }
    }

    impl Routes for Orders {
        fn routes() -> HandlerMetadata {
            HandlerMetadata::new().route(RouteDecl::get("index", "/orders"))
        }
    }

    impl Handler for Orders {
        fn call(&self, _: &str, _: &Request, response: Response, _: &PathParams) -> HandlerResult {
            Ok(Some(response))
        }
    }

    fn dispatcher() -> Dispatcher {
        let mut resolver = Resolver::new();
        resolver.provide::<Users>();
        resolver.provide::<Orders>();

        let mut routes = RouteTable::new();
        routes.register::<Users>().unwrap();
        routes.register::<Orders>().unwrap();

        let mut handlers: HashMap<TypeKey, HandlerFactory> = HashMap::new();
        handlers.insert(TypeKey::of::<Users>(), handler_factory::<Users>());
        handlers.insert(TypeKey::of::<Orders>(), handler_factory::<Orders>());

        Dispatcher::new(routes, Arc::new(resolver), handlers, MiddlewareRegistry::new()).unwrap()
    }

    struct Receipts;

    impl Injectable for Receipts {
        fn construct(_args: &Arguments<'_>) -> Result<Self, ResolutionError> {
            Ok(Self)
        }
    }

    impl Routes for Receipts {
        fn routes() -> HandlerMetadata {
            HandlerMetadata::new()
                .prefix("/receipts")
                .route(RouteDecl::post("store", "").middleware(["json"]))
                .route(RouteDecl::post("touch", "/touch").middleware(["json"]))
                .route(RouteDecl::post("audit", "/audit").middleware(["audit"]))
        }
    }

    impl Handler for Receipts {
        fn call(&self, operation: &str, _: &Request, response: Response, _: &PathParams) -> HandlerResult {
            match operation {
                "touch" | "audit" => Ok(Some(response)),
                _ => Ok(None),
            }
        }
    }

    /// Middleware whose construction needs the unregistered `Mailer`.
    struct Audit;

    impl Injectable for Audit {
        fn parameters() -> Vec<Parameter> {
            vec![Parameter::service::<Mailer>("mailer")]
        }

        fn construct(args: &Arguments<'_>) -> Result<Self, ResolutionError> {
            args.service::<Mailer>("mailer")?;
            Ok(Self)
        }
    }

    impl Middleware for Audit {
        fn name(&self) -> &'static str {
            "audit"
        }

        fn handle(&self, request: &Request, next: Next<'_>) -> Response {
            next.run(request)
        }
    }

    fn receipts() -> Dispatcher {
        let mut resolver = Resolver::new();
        resolver.provide::<Receipts>();

        let mut middleware = MiddlewareRegistry::new();
        middleware.register::<JsonMiddleware>("json", &mut resolver);
        middleware.register::<Audit>("audit", &mut resolver);

        let mut routes = RouteTable::new();
        routes.register::<Receipts>().unwrap();

        let mut handlers: HashMap<TypeKey, HandlerFactory> = HashMap::new();
        handlers.insert(TypeKey::of::<Receipts>(), handler_factory::<Receipts>());

        Dispatcher::new(routes, Arc::new(resolver), handlers, middleware).unwrap()
    }

    fn json_post(uri: &str) -> Request {
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .json(&json!({"total": 12}))
            .build()
            .unwrap()
    }

    #[derive(Clone, Default)]
    struct LogBuffer(Arc<Mutex<Vec<u8>>>);

    impl io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    /// Runs `f` with a plain-text subscriber and returns what it logged.
    fn logged(f: impl FnOnce()) -> String {
        let buffer = LogBuffer::default();
        let writer = buffer.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::DEBUG)
            .finish();
        tracing::subscriber::with_default(subscriber, f);
        let bytes = buffer.0.lock().unwrap().clone();
        String::from_utf8(bytes).unwrap()
    }

    fn text(response: &Response) -> String {
        String::from_utf8(response.body().to_bytes().to_vec()).unwrap()
    }

    #[test]
    fn test_dispatch_found_with_param() {
        let response = dispatcher().dispatch(&Request::new(Method::GET, "/users/42"));
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(text(&response), "42");
    }

    #[test]
    fn test_absent_response_becomes_default() {
        let response = dispatcher().dispatch(&Request::new(Method::DELETE, "/users/42"));
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.body().is_empty());
    }

    #[test]
    fn test_json_acknowledges_only_absent_response() {
        let dispatcher = receipts();

        let response = dispatcher.dispatch(&json_post("/receipts"));
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.body(),
            &Body::Json(json!({"message": "Request successfully processed"}))
        );

        let response = dispatcher.dispatch(&json_post("/receipts/touch"));
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.body().is_empty());
    }

    #[test]
    fn test_middleware_resolution_failure_logs_chain() {
        let dispatcher = receipts();
        let request = json_post("/receipts/audit");

        let Err(DispatchError::Middleware(MiddlewareError::Resolution(err))) =
            dispatcher.try_dispatch(&request)
        else {
            panic!("expected a middleware resolution error");
        };
        assert!(err.type_name().ends_with("Mailer"));

        let mut response = None;
        let output = logged(|| response = Some(dispatcher.dispatch(&request)));
        let response = response.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(output.contains("ERROR"), "{output}");
        assert!(output.contains("failed to resolve middleware"), "{output}");
        assert!(output.contains("type_name="), "{output}");
        assert!(output.contains("Mailer"), "{output}");
        assert!(output.contains("chain="), "{output}");
        assert!(output.contains("Audit"), "{output}");
    }

    #[test]
    fn test_internal_handler_error_logged_as_error() {
        let dispatcher = dispatcher();
        let request = Request::new(Method::GET, "/users/7/export");

        let mut response = None;
        let output = logged(|| response = Some(dispatcher.dispatch(&request)));
        let response = response.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let Body::Json(body) = response.body() else {
            panic!("expected a JSON error envelope");
        };
        assert_eq!(body["error"]["message"], "export failed");
        assert!(!body.to_string().contains("archive timed out"));

        assert!(output.contains("ERROR"), "{output}");
        assert!(output.contains("operation failed"), "{output}");
        assert!(output.contains("archive timed out"), "{output}");
    }

    #[test]
    fn test_client_error_not_logged_as_error() {
        let dispatcher = dispatcher();
        let output = logged(|| {
            dispatcher.dispatch(&Request::new(Method::GET, "/users/7/missing"));
        });
        assert!(output.contains("operation returned an error"), "{output}");
        assert!(!output.contains("ERROR"), "{output}");
    }

    #[test]
    fn test_method_not_allowed() {
        let dispatcher = dispatcher();
        let request = Request::new(Method::POST, "/users/42");

        let err = dispatcher.try_dispatch(&request).unwrap_err();
        assert!(matches!(err, DispatchError::MethodNotAllowed { ref allowed } if allowed == &[Method::GET, Method::DELETE]));

        let response = dispatcher.dispatch(&request);
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.header("allow"), Some("GET, DELETE"));
    }

    #[test]
    fn test_not_found_fallback() {
        let dispatcher = dispatcher();
        let request = Request::new(Method::GET, "/unknown");
        assert!(matches!(dispatcher.try_dispatch(&request), Err(DispatchError::NotFound)));

        let response = dispatcher.dispatch(&request);
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(text(&response), "<h1>404 Not Found</h1>");
    }

    #[test]
    fn test_handler_error_becomes_envelope() {
        let response = dispatcher().dispatch(&Request::new(Method::GET, "/users/7/missing"));
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let Body::Json(body) = response.body() else {
            panic!("expected a JSON error envelope");
        };
        assert_eq!(body["error"]["code"], "NOT_FOUND");
    }

    #[test]
    fn test_unresolvable_dependency_is_500() {
        let dispatcher = dispatcher();
        let request = Request::new(Method::GET, "/orders");

        let Err(DispatchError::Resolution(err)) = dispatcher.try_dispatch(&request) else {
            panic!("expected a resolution error");
        };
        assert!(err.type_name().ends_with("Mailer"));

        let response = dispatcher.dispatch(&request);
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_unknown_middleware_rejected() {
        struct Guarded;
        impl Routes for Guarded {
            fn routes() -> HandlerMetadata {
                HandlerMetadata::new().route(RouteDecl::get("index", "/admin").middleware(["auth"]))
            }
        }

        let mut routes = RouteTable::new();
        routes.register::<Guarded>().unwrap();
        let mut handlers: HashMap<TypeKey, HandlerFactory> = HashMap::new();
        handlers.insert(TypeKey::of::<Guarded>(), handler_factory::<Users>());

        let err = Dispatcher::new(routes, Arc::default(), handlers, MiddlewareRegistry::new())
            .unwrap_err();
        assert!(matches!(err, RegistrationError::UnknownMiddleware { ref id, .. } if id == "auth"));
    }

    #[test]
    fn test_unbound_handler_rejected() {
        let mut routes = RouteTable::new();
        routes.register::<Users>().unwrap();

        let err = Dispatcher::new(routes, Arc::default(), HashMap::new(), MiddlewareRegistry::new())
            .unwrap_err();
        assert!(matches!(err, RegistrationError::UnboundHandler { .. }));
    }
}
