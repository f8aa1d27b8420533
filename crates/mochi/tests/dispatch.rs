//! End-to-end dispatch through the kernel.

use http::{Method, StatusCode};
use mochi::prelude::*;
use mochi::server::DispatchError;
use mochi_test::TestClient;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

// Users: path params, validation, handler errors

struct Directory {
    names: Vec<&'static str>,
}

impl Injectable for Directory {
    fn construct(_args: &Arguments<'_>) -> Result<Self, ResolutionError> {
        Ok(Self {
            names: vec!["ada", "grace"],
        })
    }
}

struct Users {
    directory: Arc<Directory>,
}

impl Injectable for Users {
    fn parameters() -> Vec<Parameter> {
        vec![Parameter::service::<Directory>("directory")]
    }

    fn construct(args: &Arguments<'_>) -> Result<Self, ResolutionError> {
        Ok(Self {
            directory: args.service("directory")?,
        })
    }
}

impl Routes for Users {
    fn routes() -> HandlerMetadata {
        HandlerMetadata::new()
            .prefix("/users")
            .route(RouteDecl::get("index", ""))
            .route(RouteDecl::get("show", "/{id}"))
            .route(RouteDecl::post("store", "").middleware(["json"]))
            .route(RouteDecl::delete("forget", "/{id}"))
    }
}

impl Handler for Users {
    fn call(
        &self,
        operation: &str,
        request: &Request,
        response: Response,
        params: &PathParams,
    ) -> HandlerResult {
        match operation {
            "index" => Ok(Some(Response::json(StatusCode::OK, &self.directory.names))),
            "show" => {
                let id = params.require("id")?;
                Ok(Some(Response::json(StatusCode::OK, &json!({ "id": id }))))
            }
            "store" => {
                let rules = Rules::new()
                    .field("name", [Rule::Required])
                    .field("email", [Rule::Required, Rule::Email]);
                let data = request.validate(&rules)?;
                Ok(Some(Response::json(StatusCode::CREATED, data)))
            }
            "forget" => {
                let id = params.require("id")?;
                if self.directory.names.iter().any(|name| *name == id) {
                    Ok(Some(response))
                } else {
                    Err(MochiError::not_found(format!("no user {id}")))
                }
            }
            other => Err(MochiError::unknown_operation("Users", other)),
        }
    }
}

fn users_client() -> TestClient {
    let kernel = Kernel::builder()
        .handler::<Users>()
        .unwrap()
        .service::<Directory>()
        .middleware::<mochi::middleware::JsonMiddleware>("json")
        .build()
        .unwrap();
    TestClient::new(kernel)
}

#[test]
fn test_path_param_is_bound() {
    users_client()
        .get("/users/42")
        .send()
        .assert_status(StatusCode::OK)
        .assert_json_eq(&json!({"id": "42"}));
}

#[test]
fn test_empty_suffix_route() {
    users_client()
        .get("/users")
        .send()
        .assert_json_eq(&json!(["ada", "grace"]));
}

#[test]
fn test_unbound_method_is_not_allowed() {
    users_client()
        .put("/users/42")
        .send()
        .assert_status(StatusCode::METHOD_NOT_ALLOWED)
        .assert_header("allow", "GET, DELETE");
}

#[test]
fn test_unknown_path_is_not_found() {
    users_client()
        .get("/unknown")
        .send()
        .assert_status(StatusCode::NOT_FOUND)
        .assert_body_contains("404 Not Found");
}

#[test]
fn test_absent_response_defaults_to_empty_ok() {
    let response = users_client().delete("/users/ada").send();
    response.assert_status(StatusCode::OK).assert_body_eq("");
    assert_eq!(response.content_type(), None);
}

#[test]
fn test_handler_error_becomes_envelope() {
    users_client()
        .delete("/users/linus")
        .header("x-request-id", "req-7")
        .send()
        .assert_status(StatusCode::NOT_FOUND)
        .assert_json_field("error.code", &json!("NOT_FOUND"))
        .assert_json_field("request_id", &json!("req-7"));
}

#[test]
fn test_validated_json_store() {
    users_client()
        .post("/users")
        .json(&json!({"name": "Ada", "email": "ada@example.com"}))
        .send()
        .assert_status(StatusCode::CREATED)
        .assert_json_field("name", &json!("Ada"));
}

#[test]
fn test_validation_failure_lists_fields() {
    let response = users_client()
        .post("/users")
        .json(&json!({"name": "Ada", "email": "not-an-email"}))
        .send();
    response
        .assert_status(StatusCode::UNPROCESSABLE_ENTITY)
        .assert_json_field("error.category", &json!("validation"))
        .assert_body_contains("email");
}

#[test]
fn test_json_middleware_rejects_forms() {
    users_client()
        .post("/users")
        .form(&[("name", "Ada")])
        .send()
        .assert_status(StatusCode::BAD_REQUEST)
        .assert_json_field(
            "error",
            &json!("Invalid Content-Type, expected application/json"),
        );
}

// Resolution failures

struct Mailer;

struct Newsletter;

impl Injectable for Newsletter {
    fn parameters() -> Vec<Parameter> {
        vec![Parameter::service::<Mailer>("mailer")]
    }

    fn construct(args: &Arguments<'_>) -> Result<Self, ResolutionError> {
        args.service::<Mailer>("mailer")?;
        Ok(Self)
    }
}

impl Routes for Newsletter {
    fn routes() -> HandlerMetadata {
        HandlerMetadata::new().route(RouteDecl::post("send", "/newsletter"))
    }
}

impl Handler for Newsletter {
    fn call(&self, _: &str, _: &Request, response: Response, _: &PathParams) -> HandlerResult {
        Ok(Some(response))
    }
}

#[test]
fn test_unresolvable_dependency_names_the_type() {
    let kernel = Kernel::builder()
        .handler::<Newsletter>()
        .unwrap()
        .build()
        .unwrap();

    let request = Request::new(Method::POST, "/newsletter");
    match kernel.dispatcher().try_dispatch(&request) {
        Err(DispatchError::Resolution(err)) => {
            assert!(matches!(err, ResolutionError::Unregistered { .. }));
            assert!(err.type_name().ends_with("Mailer"), "{err}");
        }
        other => panic!("expected a resolution error, got {other:?}"),
    }

    TestClient::new(kernel)
        .post("/newsletter")
        .send()
        .assert_status(StatusCode::INTERNAL_SERVER_ERROR);
}

struct Ledger;

struct Audit;

impl Injectable for Ledger {
    fn parameters() -> Vec<Parameter> {
        vec![Parameter::service::<Audit>("audit")]
    }

    fn construct(_args: &Arguments<'_>) -> Result<Self, ResolutionError> {
        Ok(Self)
    }
}

impl Injectable for Audit {
    fn parameters() -> Vec<Parameter> {
        vec![Parameter::service::<Ledger>("ledger")]
    }

    fn construct(_args: &Arguments<'_>) -> Result<Self, ResolutionError> {
        Ok(Self)
    }
}

struct Reports;

impl Injectable for Reports {
    fn parameters() -> Vec<Parameter> {
        vec![Parameter::service::<Ledger>("ledger")]
    }

    fn construct(_args: &Arguments<'_>) -> Result<Self, ResolutionError> {
        Ok(Self)
    }
}

impl Routes for Reports {
    fn routes() -> HandlerMetadata {
        HandlerMetadata::new().route(RouteDecl::get("index", "/reports"))
    }
}

impl Handler for Reports {
    fn call(&self, _: &str, _: &Request, response: Response, _: &PathParams) -> HandlerResult {
        Ok(Some(response))
    }
}

#[test]
fn test_dependency_cycle_is_reported() {
    let kernel = Kernel::builder()
        .handler::<Reports>()
        .unwrap()
        .service::<Ledger>()
        .service::<Audit>()
        .build()
        .unwrap();

    let request = Request::new(Method::GET, "/reports");
    match kernel.dispatcher().try_dispatch(&request) {
        Err(DispatchError::Resolution(ResolutionError::Cycle { chain, .. })) => {
            let names: Vec<_> = chain
                .names()
                .iter()
                .map(|name| name.rsplit("::").next().unwrap())
                .collect();
            assert_eq!(names, ["Reports", "Ledger", "Audit", "Ledger"]);
        }
        other => panic!("expected a cycle, got {other:?}"),
    }

    assert!(!kernel.dispatcher().resolver().is_cached::<Ledger>());
}

// Instance sharing

static COUNTERS_BUILT: AtomicUsize = AtomicUsize::new(0);

struct Counter {
    hits: AtomicUsize,
}

impl Injectable for Counter {
    fn construct(_args: &Arguments<'_>) -> Result<Self, ResolutionError> {
        COUNTERS_BUILT.fetch_add(1, Ordering::SeqCst);
        Ok(Self {
            hits: AtomicUsize::new(0),
        })
    }
}

struct Hits {
    counter: Arc<Counter>,
}

impl Injectable for Hits {
    fn parameters() -> Vec<Parameter> {
        vec![Parameter::service::<Counter>("counter")]
    }

    fn construct(args: &Arguments<'_>) -> Result<Self, ResolutionError> {
        Ok(Self {
            counter: args.service("counter")?,
        })
    }
}

impl Routes for Hits {
    fn routes() -> HandlerMetadata {
        HandlerMetadata::new().route(RouteDecl::post("hit", "/hits"))
    }
}

impl Handler for Hits {
    fn call(&self, _: &str, _: &Request, _: Response, _: &PathParams) -> HandlerResult {
        let total = self.counter.hits.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(Some(Response::json(StatusCode::OK, &json!({ "total": total }))))
    }
}

#[test]
fn test_concurrent_first_requests_share_one_instance() {
    let kernel = Kernel::builder()
        .handler::<Hits>()
        .unwrap()
        .service::<Counter>()
        .build()
        .unwrap();
    let client = TestClient::new(kernel);

    std::thread::scope(|scope| {
        for _ in 0..16 {
            scope.spawn(|| {
                client.post("/hits").send().assert_success();
            });
        }
    });

    assert_eq!(COUNTERS_BUILT.load(Ordering::SeqCst), 1);
    client
        .post("/hits")
        .send()
        .assert_json_field("total", &json!(17));
}

// Re-registration

struct OldPing;

struct NewPing;

macro_rules! ping_handler {
    ($ty:ident, $body:literal) => {
        impl Injectable for $ty {
            fn construct(_args: &Arguments<'_>) -> Result<Self, ResolutionError> {
                Ok(Self)
            }
        }

        impl Routes for $ty {
            fn routes() -> HandlerMetadata {
                HandlerMetadata::new().route(RouteDecl::get("ping", "/ping"))
            }
        }

        impl Handler for $ty {
            fn call(&self, _: &str, _: &Request, _: Response, _: &PathParams) -> HandlerResult {
                Ok(Some(Response::text(StatusCode::OK, $body)))
            }
        }
    };
}

ping_handler!(OldPing, "old");
ping_handler!(NewPing, "new");

#[test]
fn test_later_registration_wins() {
    let kernel = Kernel::builder()
        .handler::<OldPing>()
        .unwrap()
        .handler::<NewPing>()
        .unwrap()
        .build()
        .unwrap();

    assert_eq!(kernel.dispatcher().routes().len(), 1);
    assert_eq!(kernel.dispatcher().routes().bindings().count(), 1);

    TestClient::new(kernel).get("/ping").send().assert_body_eq("new");
}
