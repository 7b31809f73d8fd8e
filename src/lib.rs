//! # strata
//!
//! A layered HTTP request pipeline for backend services, with bearer-token
//! authentication.
//!
//! ## The contract
//!
//! Every route handler runs inside the same onion of middleware:
//!
//! - **Logger**: start and completion of every request, with a trace id
//! - **Errors**: handler errors become structured JSON responses
//! - **Metrics**: request, error and panic counters
//! - **Panics**: a panicking handler becomes an error, never a dead worker
//!
//! An error that still escapes all of that means the pipeline can no longer
//! answer correctly. The process shuts down gracefully instead of guessing.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use http::{Method, StatusCode};
//! use strata::{App, Context, Error, Request, Response, Server, middleware, metrics::Metrics, respond, shutdown};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let (tx, rx) = shutdown::channel();
//!     shutdown::forward_os_signals(tx.clone())?;
//!
//!     let app = App::new(tx, middleware::standard(Arc::new(Metrics::new())))
//!         .handle(Method::GET, "v1", "/tasks/{id}", get_task);
//!
//!     Server::bind("0.0.0.0:3000".parse()?).serve(app, rx).await?;
//!     Ok(())
//! }
//!
//! async fn get_task(ctx: Context, req: Request) -> Result<Response, Error> {
//!     match req.param("id") {
//!         Some("42") => respond(&ctx, &serde_json::json!({"id": 42}), StatusCode::OK),
//!         _ => Err(Error::request("task not found", StatusCode::NOT_FOUND)),
//!     }
//! }
//! ```

mod app;
mod context;
mod error;
mod handler;
mod request;
mod response;
mod router;
mod server;

pub mod auth;
pub mod config;
pub mod health;
pub mod logging;
pub mod metrics;
pub mod middleware;
pub mod shutdown;

pub use app::App;
pub use context::Context;
pub use error::{BoxError, Error, ErrorResponse, FieldError, FieldErrors, ResultExt, ServerError};
pub use handler::{BoxFuture, BoxedHandler, ErasedHandler, Handler, HandlerResult};
pub use request::Request;
pub use response::{ContentType, IntoResponse, Response, ResponseBuilder, respond};
pub use server::{DEFAULT_SHUTDOWN_TIMEOUT, Server};
