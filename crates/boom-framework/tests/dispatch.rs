use std::sync::Arc;
use std::time::Duration;

use boom_core::{
    AppContext, Arguments, BoomError, BoxError, Component, FromApp, Parameter, Request,
    Response, Signature, Value, async_trait, from_fn,
};
use boom_framework::{Boom, MethodView, Phase, RouteOptions};
use boom_macros::endpoint;
use http::{Method, StatusCode};
use serde::Deserialize;
use tower::ServiceExt;

fn counting_middleware(name: &str) -> boom_core::BoxedCallable {
    from_fn(
        Signature::builder(name).request("request").build(),
        |args| async move {
            let request = args.request()?;
            let seen = request.get::<usize>("hello").map_or(0, |n| *n);
            request.set("hello", seen + 1);
            Ok::<_, BoomError>(())
        },
    )
}

fn report_hello(name: &str) -> boom_core::BoxedCallable {
    from_fn(
        Signature::builder(name).request("request").build(),
        |args| async move {
            let request = args.request()?;
            let seen = request.get::<usize>("hello").map_or(0, |n| *n);
            Ok::<_, BoomError>(Response::text(seen.to_string()))
        },
    )
}

async fn get(app: &Boom, uri: &str) -> Response {
    app.handle(Arc::new(Request::builder().uri(uri).build()))
        .await
}

#[tokio::test]
async fn test_layered_middlewares_apply_by_prefix() {
    let app = Boom::builder("layers")
        .layered_middleware("/hello", Phase::Request, counting_middleware("outer"))
        .unwrap()
        .layered_middleware("/hello", Phase::Request, counting_middleware("outer_again"))
        .unwrap()
        .layered_middleware("/hello/world", Phase::Request, counting_middleware("inner"))
        .unwrap()
        .route("/hello/world", report_hello("world"))
        .unwrap()
        .route("/foo", report_hello("foo"))
        .unwrap()
        .build();

    assert_eq!(get(&app, "/hello/world").await.body_text(), "3");
    assert_eq!(get(&app, "/foo").await.body_text(), "0");
    assert_eq!(get(&app, "/hello").await.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_layered_middleware_short_circuits_handler() {
    let deny = from_fn(Signature::empty("deny"), |_| async {
        Ok::<_, BoomError>(Response::text("denied").with_status(StatusCode::UNAUTHORIZED))
    });
    let app = Boom::builder("guarded")
        .layered_middleware_for("/admin", Phase::Request, [Method::POST], deny)
        .unwrap()
        .route_with(
            "/admin/users",
            [Method::GET, Method::POST],
            report_hello("admin_users"),
            RouteOptions::default(),
        )
        .unwrap()
        .build();

    let read = get(&app, "/admin/users").await;
    assert_eq!(read.status(), StatusCode::OK);

    let write = app
        .handle(Arc::new(
            Request::builder().method(Method::POST).uri("/admin/users").build(),
        ))
        .await;
    assert_eq!(write.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_layered_response_middleware_runs_before_global() {
    let stamp = |name: &'static str| {
        from_fn(
            Signature::builder(name).param::<Response>("response").build(),
            move |args| async move {
                let response = args.cloned::<Response>("response")?;
                Ok::<_, BoomError>(Response::text(format!("{}+{name}", response.body_text())))
            },
        )
    };
    let app = Boom::builder("stamps")
        .middleware(Phase::Response, stamp("global"))
        .layered_middleware("/api", Phase::Response, stamp("layered"))
        .unwrap()
        .route("/api/ping", from_fn(Signature::empty("ping"), |_| async {
            Ok::<_, BoomError>(Response::text("pong"))
        }))
        .unwrap()
        .build();

    // The layered middleware replaces the response and ends the chain.
    assert_eq!(get(&app, "/api/ping").await.body_text(), "pong+layered");
    // Without a match only global middlewares run, on the error response.
    assert_eq!(get(&app, "/missing").await.body_text(), "no route matches `/missing`+global");
}

#[endpoint]
async fn user(age: i64, accepted: bool, name: String) -> Response {
    Response::text(format!("{name}:{age}:{accepted}"))
}

#[tokio::test]
async fn test_endpoint_attribute_coerces_path_values() {
    let app = Boom::builder("users")
        .route("/users/:name/:age/:accepted", user())
        .unwrap()
        .build();

    assert_eq!(get(&app, "/users/john/22/ok").await.body_text(), "john:22:true");
    assert_eq!(get(&app, "/users/jane/30/tru").await.body_text(), "jane:30:false");
    assert_eq!(
        get(&app, "/users/john/old/true").await.status(),
        StatusCode::BAD_REQUEST
    );
}

#[tokio::test]
async fn test_method_view() {
    let list = from_fn(
        Signature::builder("list").view_method().var_positional("args").build(),
        |args| async move {
            let request = args.request()?;
            Ok::<_, BoomError>(Response::text(format!("list {}", request.path())))
        },
    );
    let create = from_fn(Signature::empty("create"), |_| async {
        Ok::<_, BoomError>(Response::text("created").with_status(StatusCode::CREATED))
    });
    let app = Boom::builder("views")
        .view("/items", MethodView::new("items").get(list).post(create))
        .unwrap()
        .build();

    assert_eq!(get(&app, "/items").await.body_text(), "list /items");
    let created = app
        .handle(Arc::new(Request::builder().method(Method::POST).uri("/items").build()))
        .await;
    assert_eq!(created.status(), StatusCode::CREATED);
    assert_eq!(app.url_for("items", Vec::<(&str, i64)>::new()).unwrap(), "/items");

    let deleted = app
        .handle(Arc::new(Request::builder().method(Method::DELETE).uri("/items").build()))
        .await;
    assert_eq!(deleted.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn test_allow_header_lists_methods_of_every_matching_route() {
    let app = Boom::builder("allow")
        .route("/users/me", report_hello("me"))
        .unwrap()
        .route_with(
            "/users/:id",
            [Method::DELETE],
            report_hello("delete_user"),
            RouteOptions::default(),
        )
        .unwrap()
        .build();

    let response = app
        .handle(Arc::new(Request::builder().method(Method::POST).uri("/users/me").build()))
        .await;
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(response.headers()[http::header::ALLOW], "DELETE, GET");
}

#[tokio::test(start_paused = true)]
async fn test_response_timeout() {
    let slow = from_fn(Signature::empty("slow"), |_| async {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok::<_, BoomError>(Response::text("late"))
    });
    let service = Boom::builder("slow")
        .route("/slow", slow)
        .unwrap()
        .response_timeout(Duration::from_secs(1))
        .build()
        .into_service();

    let request = Arc::new(Request::builder().uri("/slow").build());
    let response = service.oneshot(Arc::clone(&request)).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert!(request.cancellation().is_cancelled());
}

#[tokio::test]
async fn test_handler_error_is_internal() {
    let failing = from_fn(Signature::empty("failing"), |_| async {
        Err::<Response, BoxError>("disk on fire".into())
    });
    let app = Boom::builder("errors").route("/fail", failing).unwrap().build();

    let response = get(&app, "/fail").await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(!response.body_text().contains("disk on fire"));
}

// ============================================================================
// Generic JSON bodies
// ============================================================================

/// Origin tag of `JsonBody<T>` parameters.
struct JsonBody;

#[derive(Debug, Deserialize)]
struct ComplexBody {
    name: String,
    tags: Vec<String>,
}

struct JsonComponent<T>(std::marker::PhantomData<fn() -> T>);

impl<T> FromApp for JsonComponent<T> {
    fn from_app(_: &AppContext) -> Self {
        Self(std::marker::PhantomData)
    }
}

#[async_trait]
impl<T> Component for JsonComponent<T>
where
    T: serde::de::DeserializeOwned + Send + Sync + 'static,
{
    fn resolve(&self, param: &Parameter) -> bool {
        let annotation = param.annotation();
        annotation.origin().is_some_and(|o| o.is::<JsonBody>())
            && annotation.arg().is_some_and(|a| a.is::<T>())
    }

    async fn fetch(&self, args: Arguments) -> Result<Value, BoxError> {
        Ok(Value::new(args.request()?.json::<T>()?))
    }
}

#[tokio::test]
async fn test_generic_json_body_component() {
    let handler = from_fn(
        Signature::builder("create").generic::<JsonBody, ComplexBody>("body").build(),
        |args| async move {
            let body = args.get::<ComplexBody>("body")?;
            Ok::<_, BoomError>(Response::text(format!("{}:{}", body.name, body.tags.join(","))))
        },
    );
    let app = Boom::builder("json")
        .component::<JsonComponent<ComplexBody>>()
        .unwrap()
        .route_with("/things", [Method::POST], handler, RouteOptions::default())
        .unwrap()
        .build();

    let request = |body: &'static str| {
        Arc::new(
            Request::builder()
                .method(Method::POST)
                .uri("/things")
                .header("content-type", "application/json")
                .body(body)
                .build(),
        )
    };

    let ok = app
        .handle(request(r#"{"name":"widget","tags":["a","b"]}"#))
        .await;
    assert_eq!(ok.body_text(), "widget:a,b");

    let malformed = app.handle(request("{not json")).await;
    assert_eq!(malformed.status(), StatusCode::INTERNAL_SERVER_ERROR);
}
