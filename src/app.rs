//! The request pipeline.
//!
//! [`App`] owns the route table, the process-wide middleware list and the
//! sending end of the shutdown channel. Every registration composes its
//! handler once; every dispatch creates one [`Context`] and runs the
//! composed handler.
//!
//! An error that makes it out of the composed handler has defeated the
//! [`Errors`](crate::middleware::Errors) layer. There is no correct response
//! left to send, so the pipeline asks the process to shut down and hands the
//! error back to the server, which aborts the connection.

use std::net::SocketAddr;

use bytes::Bytes;
use http::{Method, StatusCode};
use tracing::error;

use crate::context::Context;
use crate::error::Error;
use crate::handler::{ErasedHandler, Handler};
use crate::middleware::{self, BoxedMiddleware};
use crate::request::Request;
use crate::response::Response;
use crate::router::{Router, route_path};
use crate::shutdown::{ShutdownSender, Signal};

pub struct App {
    router: Router,
    mw: Vec<BoxedMiddleware>,
    shutdown: ShutdownSender,
}

impl App {
    /// A pipeline wrapping every route in `mw`, first entry outermost.
    pub fn new(shutdown: ShutdownSender, mw: Vec<BoxedMiddleware>) -> Self {
        Self { router: Router::default(), mw, shutdown }
    }

    /// Registers `handler` at `/{group}{path}`, or at `path` when `group` is
    /// empty. Returns `self` for chaining.
    ///
    /// # Panics
    ///
    /// On a malformed or conflicting path.
    pub fn handle(self, method: Method, group: &str, path: &str, handler: impl Handler) -> Self {
        self.handle_with(method, group, path, handler, &[])
    }

    /// Like [`App::handle`], with middleware that runs for this route only,
    /// inside the process-wide list.
    pub fn handle_with(
        mut self,
        method: Method,
        group: &str,
        path: &str,
        handler: impl Handler,
        route_mw: &[BoxedMiddleware],
    ) -> Self {
        let composed = middleware::compose(&self.mw, route_mw, handler.into_boxed_handler());
        self.router.insert(method, &route_path(group, path), composed);
        self
    }

    /// Asks the process to shut down gracefully. Safe to call from any task.
    pub fn signal_shutdown(&self) {
        if !self.shutdown.signal(Signal::Terminate) {
            // Either a shutdown is already pending or the server is gone.
            tracing::debug!("shutdown already requested");
        }
    }

    /// Dispatches one request.
    ///
    /// Unmatched routes get a bare 404 without running any middleware.
    pub async fn call(&self, req: http::Request<Bytes>, remote_addr: SocketAddr) -> Result<Response, Error> {
        let Some((handler, params)) = self.router.lookup(req.method(), req.uri().path()) else {
            return Ok(Response::status(StatusCode::NOT_FOUND));
        };

        let ctx = Context::new();
        let req = Request::from_http(req, remote_addr).with_params(params);

        match handler.call(ctx.clone(), req).await {
            Ok(response) => Ok(response),
            Err(err) => {
                error!(trace_id = %ctx.trace_id(), error = %err, "shutdown requested");
                self.signal_shutdown();
                Err(err)
            }
        }
    }
}
