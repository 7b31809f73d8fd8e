use std::sync::Arc;

use tracing::info;

use super::Middleware;
use crate::context::Context;
use crate::handler::{BoxedHandler, ErasedHandler, Handler};
use crate::request::Request;

/// Logs the start and completion of every request.
///
/// `request started` carries the trace id, method, path and remote address;
/// `request completed` adds the final status code and elapsed time. The
/// handler's result is passed through untouched.
pub struct Logger;

impl Middleware for Logger {
    fn wrap(&self, next: BoxedHandler) -> BoxedHandler {
        (move |ctx: Context, req: Request| {
            let next = Arc::clone(&next);
            async move {
                let method = req.method().clone();
                let path = req.path().to_owned();
                let remote_addr = req.remote_addr();

                info!(
                    trace_id = %ctx.trace_id(),
                    %method,
                    %path,
                    %remote_addr,
                    "request started"
                );

                let result = next.call(ctx.clone(), req).await;

                let status = ctx.status().map(|s| s.as_u16());
                info!(
                    trace_id = %ctx.trace_id(),
                    %method,
                    %path,
                    %remote_addr,
                    status_code = status,
                    elapsed_us = ctx.elapsed().as_micros() as u64,
                    "request completed"
                );

                result
            }
        })
        .into_boxed_handler()
    }
}
