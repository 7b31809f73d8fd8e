//! Tasker: a small task service built on strata.
//!
//! Run with:
//!   STRATA_LOG_JSON=false STRATA_AUTH_KEYS_FOLDER=tests/fixtures \
//!   STRATA_AUTH_ACTIVE_KID=signing cargo run --example tasker
//!
//! With an active kid configured, an admin token is logged at startup. Try:
//!   curl http://localhost:3000/v1/test
//!   curl -H "Authorization: Bearer $TOKEN" http://localhost:3000/v1/tasks/1
//!   curl -X POST -H "Authorization: Bearer $TOKEN" http://localhost:3000/v1/tasks \
//!        -d '{"url":"https://example.com/video.mp4"}'
//!   curl http://localhost:4000/debug/liveness
//!   curl http://localhost:4000/debug/vars

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use http::{Method, StatusCode};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use strata::auth::{Auth, Claims, KeyCache, KeyStore, Role, Rule};
use strata::config::Config;
use strata::health::Health;
use strata::metrics::{self, Metrics};
use strata::middleware::{self, Authenticate, Authorize, BoxedMiddleware};
use strata::shutdown::{self, Signal};
use strata::{App, Context, Error, FieldErrors, Request, Response, Server, respond};

type BoxResult<T> = Result<T, Box<dyn std::error::Error>>;

#[tokio::main]
async fn main() -> BoxResult<()> {
    let config = Config::load("STRATA")?;
    strata::logging::init(&config.log)?;

    info!(build = %config.build, "starting service");
    info!(config = %config, "startup config");

    // =========================================================================
    // Auth

    let store = KeyStore::from_dir(&config.auth.keys_folder)?;
    info!(keys = store.len(), folder = %config.auth.keys_folder.display(), "keys loaded");

    let cache = KeyCache::new(Arc::new(store)).coalesce_misses(config.auth.coalesce_key_misses);
    let auth = Arc::new(Auth::new(cache, config.auth.issuer.clone()));

    if !config.auth.active_kid.is_empty() {
        let claims = Claims::new("admin", auth.issuer(), Duration::from_secs(3600), vec![Role::Admin]);
        match auth.generate_token(&config.auth.active_kid, &claims).await {
            Ok(token) => info!(kid = %config.auth.active_kid, %token, "development token"),
            Err(e) => warn!(kid = %config.auth.active_kid, error = %e, "cannot mint development token"),
        }
    }

    // =========================================================================
    // Debug server

    let stats = Arc::new(Metrics::new());

    let (debug_tx, debug_rx) = shutdown::channel();
    let health = Health::new(config.build.clone());
    let debug = App::new(debug_tx.clone(), Vec::new())
        .handle(Method::GET, "debug", "/liveness", health.liveness())
        .handle(Method::GET, "debug", "/readiness", health.readiness())
        .handle(Method::GET, "debug", "/vars", metrics::vars(Arc::clone(&stats)));

    let debug_addr = config.api.debug_host;
    let debug_server = tokio::spawn(async move {
        info!(addr = %debug_addr, "debug server listening");
        if let Err(e) = Server::bind(debug_addr).serve(debug, debug_rx).await {
            warn!(error = %e, "debug server stopped");
        }
    });

    // =========================================================================
    // API server

    let (tx, rx) = shutdown::channel();
    shutdown::forward_os_signals(tx.clone())?;

    let api = api(tx, Arc::clone(&auth), Arc::clone(&stats));

    info!(addr = %config.api.api_host, "api server listening");
    let result = Server::bind(config.api.api_host)
        .shutdown_timeout(config.api.shutdown_timeout)
        .serve(api, rx)
        .await;

    debug_tx.signal(Signal::Terminate);
    let _ = debug_server.await;

    result?;
    info!("shutdown complete");
    Ok(())
}

fn api(tx: shutdown::ShutdownSender, auth: Arc<Auth>, stats: Arc<Metrics>) -> App {
    let tasks = Arc::new(Tasks::default());

    let authn: BoxedMiddleware = Arc::new(Authenticate::new(Arc::clone(&auth)));
    let any: BoxedMiddleware = Arc::new(Authorize::new(Arc::clone(&auth), Rule::Any));
    let admin: BoxedMiddleware = Arc::new(Authorize::new(auth, Rule::AdminOnly));

    let query = {
        let tasks = Arc::clone(&tasks);
        move |ctx: Context, req: Request| {
            let tasks = Arc::clone(&tasks);
            async move { query_task(&tasks, &ctx, &req) }
        }
    };
    let create = {
        let tasks = Arc::clone(&tasks);
        move |ctx: Context, req: Request| {
            let tasks = Arc::clone(&tasks);
            async move { create_task(&tasks, &ctx, &req) }
        }
    };
    let delete = move |_ctx: Context, req: Request| {
        let tasks = Arc::clone(&tasks);
        async move { delete_task(&tasks, &req) }
    };

    App::new(tx, middleware::standard(stats))
        .handle(Method::GET, "v1", "/test", test)
        .handle_with(Method::GET, "v1", "/tasks/{id}", query, &[authn.clone(), any.clone()])
        .handle_with(Method::POST, "v1", "/tasks", create, &[authn.clone(), any])
        .handle_with(Method::DELETE, "v1", "/tasks/{id}", delete, &[authn, admin])
}

// =============================================================================
// Handlers

#[derive(Serialize)]
struct Status {
    status: &'static str,
}

async fn test(ctx: Context, _req: Request) -> Result<Response, Error> {
    respond(&ctx, &Status { status: "OK" }, StatusCode::OK)
}

#[derive(Clone, Serialize)]
struct Task {
    id: u64,
    url: String,
    created_at: u64,
}

#[derive(Deserialize)]
struct NewTask {
    #[serde(default)]
    url: String,
}

#[derive(Default)]
struct Tasks {
    next: AtomicU64,
    items: Mutex<HashMap<u64, Task>>,
}

fn task_id(req: &Request) -> Result<u64, Error> {
    let id = req.param("id").unwrap_or_default();
    id.parse()
        .map_err(|_| Error::request(format!("invalid task id [{id}]"), StatusCode::BAD_REQUEST))
}

fn query_task(tasks: &Tasks, ctx: &Context, req: &Request) -> Result<Response, Error> {
    let id = task_id(req)?;
    let task = tasks.items.lock().get(&id).cloned();
    match task {
        Some(task) => respond(ctx, &task, StatusCode::OK),
        None => Err(Error::request(format!("task [{id}] not found"), StatusCode::NOT_FOUND)),
    }
}

fn create_task(tasks: &Tasks, ctx: &Context, req: &Request) -> Result<Response, Error> {
    let input: NewTask = req.json()?;

    let mut fields = FieldErrors::new();
    if input.url.is_empty() {
        fields.push("url", "url is a required field");
    } else if !input.url.starts_with("http://") && !input.url.starts_with("https://") {
        fields.push("url", "url must be an http or https address");
    }
    fields.into_result()?;

    let task = Task {
        id: tasks.next.fetch_add(1, Ordering::Relaxed) + 1,
        url: input.url,
        created_at: SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs(),
    };
    tasks.items.lock().insert(task.id, task.clone());

    respond(ctx, &task, StatusCode::CREATED)
}

fn delete_task(tasks: &Tasks, req: &Request) -> Result<StatusCode, Error> {
    let id = task_id(req)?;
    match tasks.items.lock().remove(&id) {
        Some(_) => Ok(StatusCode::NO_CONTENT),
        None => Err(Error::request(format!("task [{id}] not found"), StatusCode::NOT_FOUND)),
    }
}
