use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use boom_core::{
    AppContext, Arguments, BoomError, BoxError, CacheLifecycle, Component, FromApp, Parameter,
    Request, Response, Signature, Value, WorkerId, async_trait, from_fn,
};
use boom_framework::{Boom, Phase, ProcessStore};
use boom_macros::endpoint;
use http::StatusCode;
use uuid::Uuid;

// ============================================================================
// Components
// ============================================================================

/// A fresh identifier per computation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct RequestId(Uuid);

struct RequestIdComponent {
    lifecycle: CacheLifecycle,
}

impl FromApp for RequestIdComponent {
    fn from_app(_: &AppContext) -> Self {
        Self {
            lifecycle: CacheLifecycle::Request,
        }
    }
}

#[async_trait]
impl Component for RequestIdComponent {
    fn resolve(&self, param: &Parameter) -> bool {
        param.annotation().is::<RequestId>()
    }

    async fn fetch(&self, _: Arguments) -> Result<Value, BoxError> {
        Ok(Value::new(RequestId(Uuid::new_v4())))
    }

    fn cache_lifecycle(&self) -> CacheLifecycle {
        self.lifecycle
    }
}

struct AuthService {
    secret: String,
}

struct AuthServiceComponent {
    builds: Arc<AtomicUsize>,
}

impl FromApp for AuthServiceComponent {
    fn from_app(app: &AppContext) -> Self {
        Self {
            builds: app
                .state::<AtomicUsize>()
                .unwrap_or_else(|| Arc::new(AtomicUsize::new(0))),
        }
    }
}

#[async_trait]
impl Component for AuthServiceComponent {
    fn resolve(&self, param: &Parameter) -> bool {
        param.annotation().is::<AuthService>()
    }

    async fn fetch(&self, _: Arguments) -> Result<Value, BoxError> {
        self.builds.fetch_add(1, Ordering::SeqCst);
        Ok(Value::new(AuthService {
            secret: "s3cret".to_string(),
        }))
    }

    fn cache_lifecycle(&self) -> CacheLifecycle {
        CacheLifecycle::App
    }
}

#[derive(Debug)]
struct AuthToken(String);

/// Depends on [`AuthService`] through its own fetch signature.
struct AuthTokenComponent {
    signature: Signature,
}

impl FromApp for AuthTokenComponent {
    fn from_app(_: &AppContext) -> Self {
        Self {
            signature: Signature::builder("auth_token")
                .param::<AuthService>("service")
                .request("request")
                .build(),
        }
    }
}

#[async_trait]
impl Component for AuthTokenComponent {
    fn resolve(&self, param: &Parameter) -> bool {
        param.annotation().is::<AuthToken>()
    }

    fn fetch_signature(&self) -> &Signature {
        &self.signature
    }

    async fn fetch(&self, args: Arguments) -> Result<Value, BoxError> {
        let service = args.get::<AuthService>("service")?;
        let request = args.request()?;
        let user = request.header("x-user").ok_or("missing x-user header")?;
        Ok(Value::new(AuthToken(format!("{user}@{}", service.secret))))
    }

    fn cache_lifecycle(&self) -> CacheLifecycle {
        CacheLifecycle::Request
    }
}

fn request(uri: &str) -> Arc<Request> {
    Arc::new(Request::builder().uri(uri).header("x-user", "alice").build())
}

// ============================================================================
// Tests
// ============================================================================

#[endpoint]
async fn whoami(token: Arc<AuthToken>) -> Response {
    Response::text(token.0.clone())
}

#[tokio::test]
async fn test_component_dependency_chain() {
    let store = Arc::new(ProcessStore::new());
    let app = Boom::builder("auth")
        .state(AtomicUsize::new(0))
        .component::<AuthServiceComponent>()
        .unwrap()
        .component::<AuthTokenComponent>()
        .unwrap()
        .app_store(store.clone())
        .route("/whoami", whoami())
        .unwrap()
        .build();

    for _ in 0..3 {
        let response = app.handle(request("/whoami")).await;
        assert_eq!(response.body_text(), "alice@s3cret");
    }
    // The app store keeps the service for the whole process.
    assert_eq!(store.len(), 1);
    let builds = app.context().state::<AtomicUsize>().unwrap();
    assert_eq!(builds.load(Ordering::SeqCst), 1);

    let anonymous = app
        .handle(Arc::new(Request::builder().uri("/whoami").build()))
        .await;
    assert_eq!(anonymous.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_request_id_shared_by_middleware_and_handler() {
    let remember = from_fn(
        Signature::builder("remember")
            .param::<RequestId>("req_id")
            .request("request")
            .build(),
        |args| async move {
            let id = args.get::<RequestId>("req_id")?;
            args.request()?.set("seen_id", RequestId::clone(&id));
            Ok::<_, BoomError>(())
        },
    );
    let compare = from_fn(
        Signature::builder("compare")
            .param::<RequestId>("req_id")
            .request("request")
            .build(),
        |args| async move {
            let id = args.get::<RequestId>("req_id")?;
            let seen = args.request()?.get::<RequestId>("seen_id");
            let same = seen.is_some_and(|seen| *seen == *id);
            Ok::<_, BoomError>(Response::text(format!("{same} {}", id.0)))
        },
    );
    let app = Boom::builder("ids")
        .component::<RequestIdComponent>()
        .unwrap()
        .middleware(Phase::Request, remember)
        .route("/id", compare)
        .unwrap()
        .build();

    let first = app.handle(request("/id")).await;
    let second = app.handle(request("/id")).await;
    let first = first.body_text();
    let second = second.body_text();

    assert!(first.starts_with("true "));
    assert!(second.starts_with("true "));
    assert_ne!(first, second);
}

#[tokio::test]
async fn test_endpoint_lifecycle_across_requests() {
    let component = Arc::new(RequestIdComponent {
        lifecycle: CacheLifecycle::Endpoint,
    });
    let echo = |name: &str| {
        from_fn(
            Signature::builder(name).param::<RequestId>("req_id").build(),
            |args| async move {
                let id = args.get::<RequestId>("req_id")?;
                Ok::<_, BoomError>(Response::text(id.0.to_string()))
            },
        )
    };
    let app = Boom::builder("endpoints")
        .component_instance(component)
        .unwrap()
        .route("/a", echo("a"))
        .unwrap()
        .route("/b", echo("b"))
        .unwrap()
        .build();

    let a1 = app.handle(request("/a")).await.body_text().into_owned();
    let a2 = app.handle(request("/a")).await.body_text().into_owned();
    let b1 = app.handle(request("/b")).await.body_text().into_owned();
    assert_eq!(a1, a2);
    assert_ne!(a1, b1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_worker_lifecycle_is_confined_per_worker() {
    const WORKERS: usize = 4;
    const CALLS: usize = 8;

    let component = Arc::new(RequestIdComponent {
        lifecycle: CacheLifecycle::WorkerThread,
    });
    let echo = from_fn(
        Signature::builder("echo").param::<RequestId>("req_id").build(),
        |args| async move {
            let id = args.get::<RequestId>("req_id")?;
            tokio::task::yield_now().await;
            Ok::<_, BoomError>(Response::text(id.0.to_string()))
        },
    );
    let app = Boom::builder("workers")
        .component_instance(component)
        .unwrap()
        .route("/echo", echo)
        .unwrap()
        .build();

    let mut tasks = Vec::new();
    for worker in 0..WORKERS {
        for _ in 0..CALLS {
            let app = app.clone();
            tasks.push(tokio::spawn(async move {
                let request = Request::builder()
                    .uri("/echo")
                    .worker(WorkerId::new(worker))
                    .build();
                let response = app.handle(Arc::new(request)).await;
                (worker, response.body_text().into_owned())
            }));
        }
    }

    let mut per_worker: Vec<HashSet<String>> = vec![HashSet::new(); WORKERS];
    for task in tasks {
        let (worker, id) = task.await.unwrap();
        per_worker[worker].insert(id);
    }

    let distinct: HashSet<&String> = per_worker.iter().flatten().collect();
    assert!(per_worker.iter().all(|ids| ids.len() == 1));
    assert_eq!(distinct.len(), WORKERS);
}

#[tokio::test]
async fn test_unstamped_requests_share_the_first_worker_store() {
    let component = Arc::new(RequestIdComponent {
        lifecycle: CacheLifecycle::WorkerThread,
    });
    let echo = from_fn(
        Signature::builder("echo").param::<RequestId>("req_id").build(),
        |args| async move {
            let id = args.get::<RequestId>("req_id")?;
            Ok::<_, BoomError>(Response::text(id.0.to_string()))
        },
    );
    let app = Boom::builder("unstamped")
        .component_instance(component)
        .unwrap()
        .route("/echo", echo)
        .unwrap()
        .build();

    let first = app.handle(request("/echo")).await.body_text().into_owned();
    let second = app.handle(request("/echo")).await.body_text().into_owned();
    let stamped = Request::builder()
        .uri("/echo")
        .worker(WorkerId::new(0))
        .build();
    let explicit = app.handle(Arc::new(stamped)).await.body_text().into_owned();

    assert_eq!(Request::builder().build().worker(), WorkerId::default());
    assert_eq!(first, second);
    assert_eq!(first, explicit);
}

#[tokio::test]
async fn test_unclaimed_parameter_is_server_error() {
    let handler = from_fn(
        Signature::builder("orphan").param::<AuthToken>("token").build(),
        |_| async { Ok::<_, BoomError>(Response::text("unreachable")) },
    );
    let app = Boom::builder("orphans").route("/orphan", handler).unwrap().build();

    let response = app.handle(request("/orphan")).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}
